//! The tile layer: loader, response cache, feature deduplication and render
//! binding for one overlay instance.
//!
//! Everything here runs on a single thread, driven by host events. The only
//! asynchronous step is the network fetch, which is handed back to the host
//! as a [`PendingFetch`]; its [`FetchCompletion`] re-enters through
//! [`TileLayer::complete_fetch`]. The cached path and the fetched path both
//! end up in the same `populate` call, so registry claims and releases never
//! depend on which path a tile took.

use futures::future::Abortable;
use std::collections::HashMap;
use std::rc::Rc;
use uuid::Uuid;

use crate::cache_keys::make_tile_key;
use crate::cancellation::CancellationToken;
use crate::config::{LayerHooks, LayerOptions};
use crate::error::OverlayError;
use crate::features::FeatureId;
use crate::fetch::{FetchCompletion, FetchTicket, PendingFetch, TileFetcher, TileRequest};
use crate::models::{LayerStats, TileCoord};
use crate::projection::{PathGenerator, Projection};
use crate::registry::FeatureRegistry;
use crate::render::{ElementSpec, RenderSurface};
use crate::response_cache::ResponseCache;
use crate::tile::{Tile, TileState};
use crate::tile_url::build_tile_url;
use crate::vectortile::TileDecoder;
use crate::visibility::{Transition, VisibilityGate, LAYER_CONDITION, ZOOM_CONDITION};
use crate::{console_error, console_log};

/// Why a tile request did not lead to a fetch or a population.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    Hidden,
    OutOfZoom,
    Predicate,
    AlreadyLoading,
    AlreadyLoaded,
}

#[derive(Debug)]
pub enum RequestOutcome {
    Skipped(SkipReason),
    /// Populated synchronously from the response cache.
    Populated { elements: usize },
    /// A fetch was issued; drive it and feed the completion back.
    Fetching(PendingFetch),
    /// The cached payload could not be decoded or bound.
    Failed(OverlayError),
}

#[derive(Debug, PartialEq)]
pub enum CompletionOutcome {
    Populated { elements: usize },
    Failed(OverlayError),
    /// The tile was unloaded or re-requested since this fetch started.
    Discarded,
}

/// A show/hide transition and the tiles the host should request again.
#[derive(Clone, Debug, PartialEq)]
pub struct VisibilityChange {
    pub transition: Transition,
    pub reload: Vec<TileCoord>,
}

pub struct TileLayer<F, D, S: RenderSurface> {
    instance_id: Uuid,
    options: LayerOptions,
    hooks: LayerHooks<S::Node>,
    fetcher: F,
    decoder: D,
    surface: S,
    paths: PathGenerator,
    gate: VisibilityGate,
    tiles: HashMap<String, Tile<S::Group>>,
    registry: FeatureRegistry,
    responses: ResponseCache,
    next_fetch_id: u64,
    fetches_issued: usize,
    fetch_failures: usize,
    redraws: usize,
}

impl<F, D, S> TileLayer<F, D, S>
where
    F: TileFetcher,
    D: TileDecoder,
    S: RenderSurface,
{
    pub fn new(
        options: LayerOptions,
        hooks: LayerHooks<S::Node>,
        projection: Projection,
        fetcher: F,
        decoder: D,
        surface: S,
    ) -> Result<Self, OverlayError> {
        options.validate()?;
        let paths =
            PathGenerator::new(projection, options.point_radius).with_renderer(hooks.renderer.clone());
        let instance_id = Uuid::new_v4();
        console_log!(
            "[{}] Tile layer '{}' created for {}",
            instance_id,
            options.layer_name,
            options.url
        );

        Ok(Self {
            instance_id,
            options,
            hooks,
            fetcher,
            decoder,
            surface,
            paths,
            gate: VisibilityGate::new(),
            tiles: HashMap::new(),
            registry: FeatureRegistry::new(),
            responses: ResponseCache::new(),
            next_fetch_id: 0,
            fetches_issued: 0,
            fetch_failures: 0,
            redraws: 0,
        })
    }

    /// Called when the layer is added to the map at `zoom`.
    pub fn on_add(&mut self, zoom: u32) -> Option<VisibilityChange> {
        self.on_zoom_end(zoom)
    }

    /// Re-evaluates the zoom condition after the map finished zooming.
    pub fn on_zoom_end(&mut self, zoom: u32) -> Option<VisibilityChange> {
        let in_range = self.options.zoom_in_range(zoom);
        self.set_condition(ZOOM_CONDITION, in_range)
    }

    /// Tears down every tile. The response cache outlives removal.
    pub fn on_remove(&mut self) {
        let keys: Vec<String> = self.tiles.keys().cloned().collect();
        for key in &keys {
            self.unload_key(key);
        }
        self.registry.clear();
    }

    /// Records a visibility condition. On a transition the container is
    /// shown or hidden and every tile is redrawn.
    pub fn set_condition(&mut self, namespace: &str, visible: bool) -> Option<VisibilityChange> {
        let transition = self.gate.set_condition(namespace, visible)?;
        console_log!(
            "[{}] Layer {} after '{}' changed to {}",
            self.instance_id,
            if transition.is_show() { "shown" } else { "hidden" },
            namespace,
            visible
        );
        self.surface.set_display(transition.is_show());
        let reload = self.redraw();
        Some(VisibilityChange { transition, reload })
    }

    pub fn set_layer_visible(&mut self, visible: bool) -> Option<VisibilityChange> {
        self.set_condition(LAYER_CONDITION, visible)
    }

    pub fn is_visible(&self) -> bool {
        self.gate.is_visible()
    }

    /// Unloads every live tile and returns their coordinates so the host can
    /// request them again.
    pub fn redraw(&mut self) -> Vec<TileCoord> {
        self.redraws += 1;
        let mut live: Vec<TileCoord> = self.tiles.values().map(|t| t.coord).collect();
        live.sort_by_key(|c| (c.z, c.y, c.x));

        for coord in &live {
            self.unload_key(&make_tile_key(coord));
        }
        live
    }

    fn adjust(&self, coord: TileCoord) -> TileCoord {
        if self.options.no_wrap {
            coord
        } else {
            coord.wrapped()
        }
    }

    pub fn request_tile(&mut self, coord: TileCoord) -> RequestOutcome {
        if !self.gate.is_visible() {
            return RequestOutcome::Skipped(SkipReason::Hidden);
        }
        if !self.options.zoom_in_range(coord.z) {
            return RequestOutcome::Skipped(SkipReason::OutOfZoom);
        }
        if !(self.hooks.show_layer)() {
            return RequestOutcome::Skipped(SkipReason::Predicate);
        }

        let coord = self.adjust(coord);
        let key = make_tile_key(&coord);
        let tile = self
            .tiles
            .entry(key.clone())
            .or_insert_with(|| Tile::new(coord));
        match tile.state {
            TileState::Loading => return RequestOutcome::Skipped(SkipReason::AlreadyLoading),
            TileState::Loaded => return RequestOutcome::Skipped(SkipReason::AlreadyLoaded),
            TileState::Empty | TileState::Unloaded => {}
        }

        if self.options.cache {
            if let Some(payload) = self.responses.get(&key) {
                return match self.populate(&key, &payload) {
                    Ok(elements) => RequestOutcome::Populated { elements },
                    Err(err) => {
                        // Forget the payload so the next request fetches afresh
                        self.responses.remove(&key);
                        self.report_failure(&key, &err);
                        RequestOutcome::Failed(err)
                    }
                };
            }
        }

        let request = TileRequest {
            coord,
            url: build_tile_url(&self.options, &coord),
            headers: self
                .options
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        };
        self.next_fetch_id += 1;
        let id = self.next_fetch_id;
        let (token, registration) = CancellationToken::new(id, key.clone());
        let future = Abortable::new(self.fetcher.fetch(&request), registration);
        self.fetches_issued += 1;
        if let Some(tile) = self.tiles.get_mut(&key) {
            tile.begin_loading(token);
        }

        RequestOutcome::Fetching(PendingFetch::new(
            FetchTicket {
                id,
                coord,
                tile_key: key,
            },
            future,
        ))
    }

    /// Feeds a finished fetch back into the layer.
    pub fn complete_fetch(&mut self, completion: FetchCompletion) -> CompletionOutcome {
        let FetchCompletion { ticket, result } = completion;
        let key = ticket.tile_key;

        let current = self
            .tiles
            .get(&key)
            .map(|t| t.is_current_fetch(ticket.id))
            .unwrap_or(false);
        if !current {
            console_log!(
                "[{}] Discarding stale fetch #{} for tile {}",
                self.instance_id,
                ticket.id,
                ticket.coord
            );
            return CompletionOutcome::Discarded;
        }
        if let Some(tile) = self.tiles.get_mut(&key) {
            tile.finish_loading();
        }

        let payload: Rc<[u8]> = match result {
            Ok(raw) => Rc::from(raw),
            Err(err) => {
                self.report_failure(&key, &err);
                return CompletionOutcome::Failed(err);
            }
        };
        // Only payloads that populated cleanly are worth keeping
        match self.populate(&key, &payload) {
            Ok(elements) => {
                if self.options.cache {
                    self.responses.insert(key, payload);
                }
                CompletionOutcome::Populated { elements }
            }
            Err(err) => {
                self.report_failure(&key, &err);
                CompletionOutcome::Failed(err)
            }
        }
    }

    fn report_failure(&mut self, key: &str, err: &OverlayError) {
        self.fetch_failures += 1;
        console_error!("[{}] Tile {} failed: {}", self.instance_id, key, err);
    }

    // Dedup, claim and bind one payload. Leaves the tile empty on error.
    fn populate(&mut self, key: &str, payload: &[u8]) -> Result<usize, OverlayError> {
        let coord = self
            .tiles
            .get(key)
            .map(|t| t.coord)
            .ok_or_else(|| OverlayError::Cancelled(key.to_string()))?;
        let collection = self
            .decoder
            .decode(payload, &coord, &self.options.layer_name)?;

        let tile = self
            .tiles
            .get_mut(key)
            .ok_or_else(|| OverlayError::Cancelled(key.to_string()))?;
        let survivors = self
            .registry
            .claim_features(key, collection.features, &mut tile.feature_ids);

        let mut group = match self.surface.create_group(key) {
            Ok(group) => group,
            Err(err) => {
                self.registry.release(key, tile.feature_ids.iter());
                tile.feature_ids.clear();
                return Err(err);
            }
        };

        let mut count = 0;
        for feature in survivors {
            let feature = Rc::new(feature);
            let spec = ElementSpec {
                element_name: &self.options.element_name,
                path: self.paths.path(&feature.geometry),
                transform: self.options.transform.as_deref(),
                class_name: self.options.class_name.as_deref(),
                style: self.options.style.as_deref(),
            };
            match self.surface.append_element(
                &mut group,
                &spec,
                Rc::clone(&feature),
                Rc::clone(&self.hooks.click),
            ) {
                Ok(node) => {
                    (self.hooks.each)(&*feature, &node);
                    count += 1;
                }
                Err(err) => {
                    self.surface.remove_group(group);
                    self.registry.release(key, tile.feature_ids.iter());
                    tile.feature_ids.clear();
                    return Err(err);
                }
            }
        }

        tile.mark_loaded(group, count);
        Ok(count)
    }

    /// Cancels, removes and releases everything the tile holds, then forgets
    /// the tile. Unloading a tile twice, or one that was never requested,
    /// does nothing.
    pub fn unload_tile(&mut self, coord: TileCoord) -> bool {
        let key = make_tile_key(&self.adjust(coord));
        self.unload_key(&key)
    }

    fn unload_key(&mut self, key: &str) -> bool {
        let Some(mut tile) = self.tiles.remove(key) else {
            return false;
        };
        let (group, owned) = tile.unload();
        if let Some(group) = group {
            self.surface.remove_group(group);
        }
        self.registry.release(key, owned.iter());
        true
    }

    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn options(&self) -> &LayerOptions {
        &self.options
    }

    pub fn tile(&self, coord: TileCoord) -> Option<&Tile<S::Group>> {
        self.tiles.get(&make_tile_key(&self.adjust(coord)))
    }

    pub fn tile_state(&self, coord: TileCoord) -> Option<TileState> {
        self.tile(coord).map(|t| t.state)
    }

    /// Ids the tile currently owns, in claim order.
    pub fn owned_features(&self, coord: TileCoord) -> &[FeatureId] {
        self.tile(coord)
            .map(|t| t.feature_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn stats(&self) -> LayerStats {
        let count = |state: TileState| self.tiles.values().filter(|t| t.state == state).count();
        LayerStats {
            live_tiles: self.tiles.len(),
            loading_tiles: count(TileState::Loading),
            loaded_tiles: count(TileState::Loaded),
            claimed_features: self.registry.len(),
            cached_responses: self.responses.len(),
            fetches_issued: self.fetches_issued,
            cache_hits: self.responses.hits(),
            fetch_failures: self.fetch_failures,
            redraws: self.redraws,
        }
    }
}
