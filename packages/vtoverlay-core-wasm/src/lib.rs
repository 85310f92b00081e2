use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
pub mod error;
// Shared data structures
pub mod models;
pub mod cache_keys;
pub mod config;
pub mod features;
pub mod tile_url;
// Viewport gate
pub mod visibility;
pub mod cancellation;
pub mod fetch;
// Feature ownership registry used for cross-tile deduplication
pub mod registry;
pub mod response_cache;
// Vector tile decoding
pub mod vectortile;
pub mod projection;
pub mod render;
pub mod tile;
// Loader, cache and render binder for one overlay instance
pub mod layer;
// Browser bindings
mod js_overlay;


pub use config::{LayerHooks, LayerOptions};
pub use error::OverlayError;
pub use features::{Feature, FeatureCollection, FeatureId};
pub use js_overlay::VectorTileOverlay;
pub use layer::{CompletionOutcome, RequestOutcome, SkipReason, TileLayer, VisibilityChange};
pub use models::{LayerStats, TileCoord};
pub use render::{MemorySurface, RenderSurface};
pub use tile::TileState;
pub use vectortile::{MvtDecoder, TileDecoder};
pub use visibility::{Transition, VisibilityGate};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

// Use the macros from our console module
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => ($crate::console::error(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

// This sets up the wasm_bindgen start functionality
#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        // Set the panic hook for better error messages
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("Vector tile overlay module initialized");
    });
}
