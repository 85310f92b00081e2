// This is the models module containing shared data structures
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer tile address as handed out by the host map's tiling grid.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl TileCoord {
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Number of tiles along one axis at this zoom level.
    pub fn grid_size(&self) -> u64 {
        1u64 << self.z.min(63)
    }

    /// Wraps `x` back into the world when the host hands out coordinates
    /// for a repeated copy of the map.
    pub fn wrapped(&self) -> Self {
        let n = self.grid_size();
        Self {
            x: (self.x as u64 % n) as u32,
            ..*self
        }
    }

    /// Y as counted from the bottom of the grid (TMS scheme).
    pub fn tms_y(&self) -> u32 {
        let flipped = (self.grid_size() - 1).saturating_sub(self.y as u64);
        u32::try_from(flipped).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerStats {
    pub live_tiles: usize,
    pub loading_tiles: usize,
    pub loaded_tiles: usize,
    pub claimed_features: usize,
    pub cached_responses: usize,
    pub fetches_issued: usize,
    pub cache_hits: usize,
    pub fetch_failures: usize,
    pub redraws: usize,
}
