//! Content-addressed page map.

use indexmap::IndexMap;
use indexmap::map::Entry;
use serde::{Deserialize, Serialize};

use coachkb_shared::PageRecord;

/// Insertion-ordered map `content_hash -> PageRecord`.
///
/// Records are only ever added; the first record for a hash wins. Serializes
/// as a plain JSON object, which is the raw checkpoint format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupStore {
    pages: IndexMap<String, PageRecord>,
}

impl DedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.pages.contains_key(hash)
    }

    pub fn get(&self, hash: &str) -> Option<&PageRecord> {
        self.pages.get(hash)
    }

    /// Insert `record` under `hash` unless the hash is already present.
    ///
    /// Returns `true` when the record was added.
    pub fn insert(&mut self, hash: String, record: PageRecord) -> bool {
        match self.pages.entry(hash) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Pages in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PageRecord)> {
        self.pages.iter().map(|(hash, record)| (hash.as_str(), record))
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str, tags: &[&str]) -> PageRecord {
        PageRecord {
            content: content.into(),
            summary: "summary".into(),
            images: vec![],
            url: "https://en.wikipedia.org/wiki/X".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn first_record_for_a_hash_wins() {
        let mut store = DedupStore::new();
        assert!(store.insert("h1".into(), record("a", &["Jupiter"])));
        assert!(!store.insert("h1".into(), record("a", &["Io"])));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("h1").unwrap().tags, vec!["Jupiter"]);
    }

    #[test]
    fn iteration_follows_insertion_order() {
        let mut store = DedupStore::new();
        for hash in ["zz", "aa", "mm"] {
            store.insert(hash.into(), record(hash, &[]));
        }
        let order: Vec<&str> = store.iter().map(|(hash, _)| hash).collect();
        assert_eq!(order, vec!["zz", "aa", "mm"]);
    }

    #[test]
    fn serializes_as_plain_object() {
        let mut store = DedupStore::new();
        store.insert("h1".into(), record("Jupiter\nbody", &["Jupiter"]));

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["h1"]["page_content"], "Jupiter\nbody");
        assert_eq!(json["h1"]["page_tags"][0], "Jupiter");
    }
}
