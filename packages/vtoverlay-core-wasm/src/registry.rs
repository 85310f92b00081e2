//! Feature ownership registry.
//!
//! Maps a feature id to the key of the tile currently rendering it. A feature
//! that straddles a tile boundary shows up in the payload of every tile it
//! touches; only the first tile to populate gets to draw it. When that tile
//! is unloaded its ids are released and the next tile containing the feature
//! may claim it.

use std::collections::HashMap;

use crate::features::{Feature, FeatureId};

#[derive(Clone, Debug, Default)]
pub struct FeatureRegistry {
    owners: HashMap<FeatureId, String>,
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `id` for `tile_key`. Returns false if another claim exists.
    pub fn claim(&mut self, id: &FeatureId, tile_key: &str) -> bool {
        if self.is_claimed(id) {
            return false;
        }
        self.owners.insert(id.clone(), tile_key.to_string());
        true
    }

    pub fn is_claimed(&self, id: &FeatureId) -> bool {
        self.owners.contains_key(id)
    }

    pub fn owner(&self, id: &FeatureId) -> Option<&str> {
        self.owners.get(id).map(String::as_str)
    }

    /// Keeps the features `tile_key` may draw, claiming their ids and
    /// recording them in `owned`. Anonymous features always pass.
    pub fn claim_features(
        &mut self,
        tile_key: &str,
        features: Vec<Feature>,
        owned: &mut Vec<FeatureId>,
    ) -> Vec<Feature> {
        features
            .into_iter()
            .filter(|feature| match &feature.id {
                Some(id) => {
                    let claimed = self.claim(id, tile_key);
                    if claimed {
                        owned.push(id.clone());
                    }
                    claimed
                }
                None => true,
            })
            .collect()
    }

    /// Releases the ids `tile_key` owns. Ids held by another tile are left
    /// alone, so a stale list can never free someone else's claim.
    pub fn release<'a, I>(&mut self, tile_key: &str, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a FeatureId>,
    {
        let mut released = 0;
        for id in ids {
            if self.owner(id) == Some(tile_key) {
                self.owners.remove(id);
                released += 1;
            }
        }
        released
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn clear(&mut self) {
        self.owners.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::{point, Geometry};

    fn feature(id: Option<&str>) -> Feature {
        Feature::new(id.map(FeatureId::from), Geometry::Point(point!(x: 1.0, y: 2.0)))
    }

    #[test]
    fn test_first_claim_wins() {
        let mut registry = FeatureRegistry::new();
        let id = FeatureId::from("b");
        assert!(registry.claim(&id, "2 3 5"));
        assert!(!registry.claim(&id, "2 4 5"));
        assert_eq!(registry.owner(&id), Some("2 3 5"));
    }

    #[test]
    fn test_claim_features_filters_and_records() {
        let mut registry = FeatureRegistry::new();
        registry.claim(&FeatureId::from("b"), "2 3 5");

        let mut owned = Vec::new();
        let kept = registry.claim_features(
            "2 4 5",
            vec![feature(Some("b")), feature(Some("c")), feature(None)],
            &mut owned,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(owned, vec![FeatureId::from("c")]);
        assert!(kept.iter().any(|f| f.id.is_none()));
    }

    #[test]
    fn test_duplicate_id_within_one_payload_is_kept_once() {
        let mut registry = FeatureRegistry::new();
        let mut owned = Vec::new();
        let kept = registry.claim_features(
            "0 0 1",
            vec![feature(Some("a")), feature(Some("a"))],
            &mut owned,
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(owned.len(), 1);
    }

    #[test]
    fn test_release_only_touches_own_claims() {
        let mut registry = FeatureRegistry::new();
        let a = FeatureId::from("a");
        let b = FeatureId::from("b");
        registry.claim(&a, "1 1 3");
        registry.claim(&b, "1 2 3");

        assert_eq!(registry.release("1 1 3", [&a, &b]), 1);
        assert!(!registry.is_claimed(&a));
        assert!(registry.is_claimed(&b));

        // Releasing again is a no-op
        assert_eq!(registry.release("1 1 3", [&a]), 0);
        assert!(registry.claim(&a, "1 2 3"));
    }
}
