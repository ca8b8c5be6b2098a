// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Inverted index from tag to tracked keys.
//!
//! The index has no lifecycle of its own: [`super::MetadataStore`] updates it
//! in the same critical section as the entry it describes.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::metadata::QueryKey;

#[derive(Debug, Default)]
pub struct TagIndex {
    postings: HashMap<String, HashSet<QueryKey>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<'a, I>(&mut self, key: &QueryKey, tags: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for tag in tags {
            self.postings
                .entry(tag.clone())
                .or_default()
                .insert(key.clone());
        }
    }

    /// Drop `key` from the postings of `tags`, pruning empty tags.
    pub fn remove<'a, I>(&mut self, key: &QueryKey, tags: I)
    where
        I: IntoIterator<Item = &'a String>,
    {
        for tag in tags {
            if let Some(keys) = self.postings.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.postings.remove(tag);
                }
            }
        }
    }

    /// Union of keys carrying any of `tags`, in key order.
    pub fn find<'a, I>(&self, tags: I) -> BTreeSet<QueryKey>
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter()
            .filter_map(|tag| self.postings.get(tag))
            .flat_map(|keys| keys.iter().cloned())
            .collect()
    }

    pub fn tag_count(&self) -> usize {
        self.postings.len()
    }
}
