//! Comparing an index against the authoritative store.

use std::collections::BTreeMap;

use serde::Serialize;

/// Differences between one index and the entries it should hold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct KeyDrift {
    /// In the store, absent from the index.
    pub missing: Vec<String>,
    /// In the index, absent from the store.
    pub orphaned: Vec<String>,
    /// In both, but the index entry is out of date.
    pub stale: Vec<String>,
}

impl KeyDrift {
    /// Compare two keyed collections. Keys come out sorted.
    pub fn between<T: PartialEq>(store: &BTreeMap<String, T>, index: &BTreeMap<String, T>) -> Self {
        let mut drift = Self::default();
        for (key, expected) in store {
            match index.get(key) {
                None => drift.missing.push(key.clone()),
                Some(found) if found != expected => drift.stale.push(key.clone()),
                Some(_) => {}
            }
        }
        drift.orphaned = index
            .keys()
            .filter(|key| !store.contains_key(*key))
            .cloned()
            .collect();
        drift
    }

    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty() && self.stale.is_empty()
    }

    pub fn len(&self) -> usize {
        self.missing.len() + self.orphaned.len() + self.stale.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clean()
    }
}

/// Drift of both indexes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexDrift {
    pub posts: KeyDrift,
    pub agents: KeyDrift,
}

impl IndexDrift {
    pub fn is_clean(&self) -> bool {
        self.posts.is_clean() && self.agents.is_clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, u32)]) -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn classifies_every_difference() {
        let store = map(&[("a", 1), ("b", 2), ("c", 3)]);
        let index = map(&[("b", 2), ("c", 9), ("z", 0)]);
        let drift = KeyDrift::between(&store, &index);
        assert_eq!(drift.missing, ["a"]);
        assert_eq!(drift.stale, ["c"]);
        assert_eq!(drift.orphaned, ["z"]);
        assert_eq!(drift.len(), 3);
        assert!(!drift.is_clean());
    }

    #[test]
    fn identical_maps_are_clean() {
        let store = map(&[("a", 1)]);
        assert!(KeyDrift::between(&store, &store.clone()).is_clean());
    }
}
