use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier used to recognise the same logical feature across tiles.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        FeatureId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reads an id out of a property value. Numbers and non-empty strings
    /// identify a feature; anything else leaves it anonymous.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(FeatureId(s.clone())),
            serde_json::Value::Number(n) => Some(FeatureId(n.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        FeatureId(id.to_string())
    }
}

// Geographic feature reconstituted from a tile payload, coordinates in lng/lat
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Feature {
    pub id: Option<FeatureId>,
    pub geometry: Geometry<f64>,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Feature {
    pub fn new(id: Option<FeatureId>, geometry: Geometry<f64>) -> Self {
        Self {
            id,
            geometry,
            properties: serde_json::Map::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
