// Utility functions to generate consistent cache keys across the layer.
use crate::models::TileCoord;

/// Generate the key a tile is tracked and cached under: "x y z".
pub fn make_tile_key(coord: &TileCoord) -> String {
    format!("{} {} {}", coord.x, coord.y, coord.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(make_tile_key(&TileCoord::new(2, 3, 5)), "2 3 5");
        assert_ne!(
            make_tile_key(&TileCoord::new(12, 3, 4)),
            make_tile_key(&TileCoord::new(1, 23, 4))
        );
    }
}
