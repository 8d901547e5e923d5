//! `search.json`: an insertion-ordered map of `"<kind>/<id>"` to searchable text.

use crate::content::SearchEntry;
use serde::{Serialize, Serializer, ser::SerializeMap};

#[derive(Debug, Default)]
pub struct SearchIndex<'a> {
    entries: Vec<&'a SearchEntry>,
}

impl<'a> SearchIndex<'a> {
    pub fn push(&mut self, entry: &'a SearchEntry) {
        self.entries.push(entry);
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

impl Serialize for SearchIndex<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for entry in &self.entries {
            map.serialize_entry(&entry.key, &entry.text)?;
        }
        map.end()
    }
}
