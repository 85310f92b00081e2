//! Error type shared by the loader, decoder and wasm surface.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Errors that can occur while loading, decoding or binding a tile.
///
/// None of these are fatal to the layer: a failed tile is left empty and the
/// next viewport-driven request retries it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OverlayError {
    /// Rejected layer configuration.
    #[error("Invalid layer configuration: {0}")]
    Config(String),

    /// Network level failure (no response at all).
    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    /// Payload could not be decoded into features.
    #[error("Failed to decode tile payload: {0}")]
    Decode(String),

    /// The payload decoded but does not contain the configured layer.
    #[error("Layer '{0}' not found in tile")]
    LayerMissing(String),

    /// The fetch was aborted because its tile was unloaded.
    #[error("Fetch for tile {0} was cancelled")]
    Cancelled(String),

    /// A JS call failed on the wasm surface.
    #[error("JS error: {0}")]
    Js(String),
}

impl OverlayError {
    /// Wraps a thrown JS value.
    pub fn from_js(value: &JsValue) -> Self {
        let message = value
            .as_string()
            .unwrap_or_else(|| format!("{:?}", value));
        OverlayError::Js(message)
    }
}

impl From<OverlayError> for JsValue {
    fn from(err: OverlayError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}

impl From<serde_wasm_bindgen::Error> for OverlayError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        OverlayError::Config(err.to_string())
    }
}
