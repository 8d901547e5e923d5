//! Tag grouping and the tag index.

use crate::utils::slug::normalize_tag_uri;
use serde::Serialize;
use std::collections::BTreeMap;

/// Posts of one tag, keyed by URI segment.
#[derive(Debug, Clone, Default)]
pub struct TagGroup {
    /// First spelling seen.
    pub title: String,
    /// Indices into the post listing, in listing order.
    pub posts: Vec<usize>,
}

/// All tags of a post listing, by URI segment.
#[derive(Debug, Clone, Default)]
pub struct TagGroups(BTreeMap<String, TagGroup>);

impl TagGroups {
    pub fn add(&mut self, tag: &str, post: usize) {
        let key = normalize_tag_uri(tag);
        if key.is_empty() {
            return;
        }
        let group = self.0.entry(key).or_insert_with(|| TagGroup {
            title: tag.to_owned(),
            posts: Vec::new(),
        });
        group.posts.push(post);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagGroup)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Tag index entries: count descending, then title.
    pub fn index(&self) -> Vec<TagEntry> {
        let counts = self.0.values().map(|g| g.posts.len());
        let min = counts.clone().min().unwrap_or(0);
        let max = counts.max().unwrap_or(0);

        let mut entries: Vec<TagEntry> = self
            .0
            .iter()
            .map(|(uri, group)| {
                let count = group.posts.len();
                TagEntry {
                    title: group.title.clone(),
                    uri: format!("/tags/{uri}/"),
                    count,
                    ratio: tag_ratio(count, min, max),
                }
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.title.cmp(&b.title)));
        entries
    }
}

/// Entry of `tags.html`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagEntry {
    pub title: String,
    pub uri: String,
    pub count: usize,
    /// Relative weight in `[1.0, 2.0]`, truncated to two decimals.
    pub ratio: f64,
}

fn tag_ratio(count: usize, min: usize, max: usize) -> f64 {
    if max == min {
        return 1.0;
    }
    let ratio = (count - min) as f64 / (max - min) as f64;
    (ratio * 100.0).floor() / 100.0 + 1.0
}
