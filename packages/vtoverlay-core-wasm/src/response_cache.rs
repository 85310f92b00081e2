use std::collections::HashMap;
use std::rc::Rc;

// Raw tile payloads kept for the lifetime of a layer instance. Unbounded: the
// set of tiles a user can pan across in one session is the natural limit.
#[derive(Clone, Debug, Default)]
pub struct ResponseCache {
    data: HashMap<String, Rc<[u8]>>,
    hits: usize,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &str) -> Option<Rc<[u8]>> {
        let payload = self.data.get(key).map(Rc::clone)?;
        self.hits += 1;
        Some(payload)
    }

    /// Stores a payload. A later completion for the same key replaces it.
    pub fn insert(&mut self, key: String, payload: Rc<[u8]>) {
        self.data.insert(key, payload);
    }

    pub fn remove(&mut self, key: &str) -> Option<Rc<[u8]>> {
        self.data.remove(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_hits_are_counted() {
        let mut cache = ResponseCache::new();
        assert!(cache.get("2 3 5").is_none());
        assert_eq!(cache.hits(), 0);
        cache.insert("2 3 5".to_string(), Rc::from(vec![1u8, 2, 3]));
        assert_eq!(cache.get("2 3 5").as_deref(), Some(&[1u8, 2, 3][..]));
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_remove_forgets_payload() {
        let mut cache = ResponseCache::new();
        cache.insert("2 3 5".to_string(), Rc::from(vec![1u8]));
        assert!(cache.remove("2 3 5").is_some());
        assert!(cache.is_empty());
        assert!(cache.get("2 3 5").is_none());
        assert!(cache.remove("2 3 5").is_none());
    }

    #[test]
    fn test_last_insert_wins() {
        let mut cache = ResponseCache::new();
        cache.insert("0 0 0".to_string(), Rc::from(vec![1u8]));
        cache.insert("0 0 0".to_string(), Rc::from(vec![2u8]));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("0 0 0").as_deref(), Some(&[2u8][..]));
    }
}
