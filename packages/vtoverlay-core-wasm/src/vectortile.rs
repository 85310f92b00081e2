use flate2::read::GzDecoder;
use geo::MapCoords;
use geo_types::Coord;
use geozero::mvt::{tile, Message, Tile};
use geozero::ToGeo;
use std::io::Read;

use crate::console_log;
use crate::error::OverlayError;
use crate::features::{Feature, FeatureCollection, FeatureId};
use crate::models::TileCoord;

/// Turns a raw tile payload into the named layer's features.
pub trait TileDecoder {
    fn decode(
        &self,
        raw: &[u8],
        coord: &TileCoord,
        layer_name: &str,
    ) -> Result<FeatureCollection, OverlayError>;
}

/// Decoder for Mapbox Vector Tiles, gzipped or not.
#[derive(Clone, Copy, Debug, Default)]
pub struct MvtDecoder;

impl TileDecoder for MvtDecoder {
    fn decode(
        &self,
        raw: &[u8],
        coord: &TileCoord,
        layer_name: &str,
    ) -> Result<FeatureCollection, OverlayError> {
        let data = decompress_gzip(raw)?;
        let tile = Tile::decode(data.as_slice())
            .map_err(|e| OverlayError::Decode(format!("Failed to decode MVT tile: {}", e)))?;

        let layer = tile
            .layers
            .iter()
            .find(|l| l.name == layer_name)
            .ok_or_else(|| OverlayError::LayerMissing(layer_name.to_string()))?;
        let extent = layer.extent();

        let mut features = Vec::with_capacity(layer.features.len());
        for feature in &layer.features {
            // Skip features with invalid geometry
            let geometry = match feature.to_geo() {
                Ok(geometry) => geometry,
                Err(e) => {
                    console_log!("Skipping feature in tile {}: {}", coord, e);
                    continue;
                }
            };
            let tile_coord = *coord;
            let geometry = geometry.map_coords(move |c| tile_to_lng_lat(c, extent, &tile_coord));

            let properties = decode_properties(layer, feature);
            let id = properties
                .get("id")
                .and_then(FeatureId::from_json)
                .or_else(|| feature.id.map(|id| FeatureId::new(id.to_string())));

            features.push(Feature {
                id,
                geometry,
                properties,
            });
        }

        Ok(FeatureCollection::new(features))
    }
}

// Function to detect if data is gzipped (checking for gzip magic number)
fn is_gzipped(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == 0x1F && data[1] == 0x8B
}

// Function to decompress gzipped data
fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, OverlayError> {
    if !is_gzipped(data) {
        return Ok(data.to_vec());
    }

    let mut decoder = GzDecoder::new(data);
    let mut decompressed_data = Vec::new();
    decoder
        .read_to_end(&mut decompressed_data)
        .map_err(|e| OverlayError::Decode(format!("Error decompressing gzip data: {}", e)))?;

    Ok(decompressed_data)
}

/// Convert tile-local coordinates to longitude/latitude
fn tile_to_lng_lat(c: Coord<f64>, extent: u32, tile: &TileCoord) -> Coord<f64> {
    let n = tile.grid_size() as f64;
    let extent = extent.max(1) as f64;

    let normalized_x = (tile.x as f64 + c.x / extent) / n;
    let normalized_y = (tile.y as f64 + c.y / extent) / n;

    let lng = normalized_x * 360.0 - 180.0;
    let lat = (std::f64::consts::PI * (1.0 - 2.0 * normalized_y))
        .sinh()
        .atan()
        .to_degrees();

    Coord { x: lng, y: lat }
}

fn decode_properties(
    layer: &tile::Layer,
    feature: &tile::Feature,
) -> serde_json::Map<String, serde_json::Value> {
    let mut properties = serde_json::Map::new();
    for pair in feature.tags.chunks_exact(2) {
        if let (Some(key), Some(value)) = (
            layer.keys.get(pair[0] as usize),
            layer.values.get(pair[1] as usize),
        ) {
            properties.insert(key.clone(), value_to_json(value));
        }
    }
    properties
}

// Convert the different types of MVT values to JSON values
fn value_to_json(value: &tile::Value) -> serde_json::Value {
    if let Some(s) = &value.string_value {
        serde_json::Value::String(s.clone())
    } else if let Some(i) = value.int_value {
        serde_json::Value::from(i)
    } else if let Some(u) = value.uint_value {
        serde_json::Value::from(u)
    } else if let Some(s) = value.sint_value {
        serde_json::Value::from(s)
    } else if let Some(f) = value.float_value {
        serde_json::Number::from_f64(f as f64)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(d) = value.double_value {
        serde_json::Number::from_f64(d)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)
    } else if let Some(b) = value.bool_value {
        serde_json::Value::Bool(b)
    } else {
        serde_json::Value::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use geo_types::Geometry;
    use std::io::Write;

    fn string_value(s: &str) -> tile::Value {
        tile::Value {
            string_value: Some(s.to_string()),
            ..Default::default()
        }
    }

    // One point in the middle of the tile tagged id=a, one anonymous diagonal line
    fn encoded_tile() -> Vec<u8> {
        let point = tile::Feature {
            id: Some(1),
            tags: vec![0, 0, 1, 1],
            r#type: Some(tile::GeomType::Point as i32),
            geometry: vec![9, 4096, 4096],
        };
        let line = tile::Feature {
            id: Some(7),
            tags: vec![1, 2],
            r#type: Some(tile::GeomType::Linestring as i32),
            geometry: vec![9, 0, 0, 10, 8192, 8192],
        };
        let layer = tile::Layer {
            version: 2,
            name: "roads".to_string(),
            features: vec![point, line],
            keys: vec!["id".to_string(), "name".to_string()],
            values: vec![string_value("a"), string_value("Main St"), string_value("Ring")],
            ..Default::default()
        };
        Tile {
            layers: vec![layer],
        }
        .encode_to_vec()
    }

    #[test]
    fn test_decode_point_and_line() {
        let collection = MvtDecoder
            .decode(&encoded_tile(), &TileCoord::new(0, 0, 0), "roads")
            .unwrap();
        assert_eq!(collection.len(), 2);

        let point = &collection.features[0];
        assert_eq!(point.id, Some(FeatureId::from("a")));
        assert_eq!(point.properties["name"], serde_json::json!("Main St"));
        match &point.geometry {
            Geometry::Point(p) => {
                assert!(p.x().abs() < 1e-9);
                assert!(p.y().abs() < 1e-9);
            }
            other => panic!("expected point, got {:?}", other),
        }

        // No id property, falls back to the MVT feature id
        let line = &collection.features[1];
        assert_eq!(line.id, Some(FeatureId::from("7")));
        match &line.geometry {
            Geometry::LineString(ls) => {
                let first = ls.0[0];
                let last = ls.0[ls.0.len() - 1];
                assert!((first.x + 180.0).abs() < 1e-9);
                assert!((first.y - 85.0511).abs() < 1e-3);
                assert!((last.x - 180.0).abs() < 1e-9);
                assert!((last.y + 85.0511).abs() < 1e-3);
            }
            other => panic!("expected line string, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_gzipped() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&encoded_tile()).unwrap();
        let gzipped = encoder.finish().unwrap();
        assert!(is_gzipped(&gzipped));

        let collection = MvtDecoder
            .decode(&gzipped, &TileCoord::new(0, 0, 0), "roads")
            .unwrap();
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_missing_layer() {
        let err = MvtDecoder
            .decode(&encoded_tile(), &TileCoord::new(0, 0, 0), "water")
            .unwrap_err();
        assert_eq!(err, OverlayError::LayerMissing("water".to_string()));
    }

    #[test]
    fn test_garbage_payload() {
        let err = MvtDecoder
            .decode(&[0x0a, 0xff], &TileCoord::new(0, 0, 0), "roads")
            .unwrap_err();
        assert!(matches!(err, OverlayError::Decode(_)));
    }

    #[test]
    fn test_tile_to_lng_lat_corners() {
        let tile = TileCoord::new(1, 0, 1);
        let top_left = tile_to_lng_lat(Coord { x: 0.0, y: 0.0 }, 4096, &tile);
        assert!((top_left.x - 0.0).abs() < 1e-9);
        assert!((top_left.y - 85.0511).abs() < 1e-3);
        let bottom_right = tile_to_lng_lat(Coord { x: 4096.0, y: 4096.0 }, 4096, &tile);
        assert!((bottom_right.x - 180.0).abs() < 1e-9);
        assert!(bottom_right.y.abs() < 1e-9);
    }
}
