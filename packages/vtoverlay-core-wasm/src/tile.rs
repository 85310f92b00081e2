use serde::Serialize;

use crate::cache_keys::make_tile_key;
use crate::cancellation::CancellationToken;
use crate::features::FeatureId;
use crate::models::TileCoord;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileState {
    Empty,
    Loading,
    Loaded,
    Unloaded,
}

/// Per-tile bookkeeping. `G` is the render surface's group handle.
#[derive(Debug)]
pub struct Tile<G> {
    pub coord: TileCoord,
    pub key: String,
    pub state: TileState,
    /// Ids this tile claimed in the ownership registry
    pub feature_ids: Vec<FeatureId>,
    pub in_flight: Option<CancellationToken>,
    pub group: Option<G>,
    pub element_count: usize,
}

impl<G> Tile<G> {
    pub fn new(coord: TileCoord) -> Self {
        Self {
            coord,
            key: make_tile_key(&coord),
            state: TileState::Empty,
            feature_ids: Vec::new(),
            in_flight: None,
            group: None,
            element_count: 0,
        }
    }

    pub fn begin_loading(&mut self, token: CancellationToken) {
        self.in_flight = Some(token);
        self.state = TileState::Loading;
    }

    /// True if `ticket_id` is the fetch currently in flight for this tile.
    pub fn is_current_fetch(&self, ticket_id: u64) -> bool {
        self.in_flight
            .as_ref()
            .map_or(false, |t| t.id == ticket_id && !t.is_cancelled())
    }

    /// Clears the in-flight fetch and drops back to `Empty`.
    pub fn finish_loading(&mut self) {
        self.in_flight = None;
        if self.state == TileState::Loading {
            self.state = TileState::Empty;
        }
    }

    /// Cancels any in-flight fetch and hands back the group and owned ids
    /// for the caller to tear down.
    pub fn unload(&mut self) -> (Option<G>, Vec<FeatureId>) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.state = TileState::Unloaded;
        self.element_count = 0;
        (self.group.take(), std::mem::take(&mut self.feature_ids))
    }

    pub fn mark_loaded(&mut self, group: G, element_count: usize) {
        self.group = Some(group);
        self.element_count = element_count;
        self.state = TileState::Loaded;
    }
}
