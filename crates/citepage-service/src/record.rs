// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-backed item records and community directories, for tooling and tests
// that run without a repository behind them.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use citepage_core::error::{CitepageError, Result};
use citepage_core::{ANY, CitableItem, CommunityDirectory, MetadataKey, MetadataValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An item described by a JSON document:
///
/// ```json
/// {
///   "handle": "123456789/42",
///   "collection": "Theses",
///   "community": "Faculty of Science",
///   "collection_handles": ["123456789/2"],
///   "metadata": { "dc.title": ["On Cover Pages"] }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordItem {
    pub handle: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub community: Option<String>,
    #[serde(default)]
    pub collection_handles: Vec<String>,
    /// Concrete `schema.element[.qualifier]` keys to their values. Keys keep
    /// the order they are written in, and ordinals count across them.
    #[serde(default)]
    pub metadata: IndexMap<String, Vec<String>>,
}

impl RecordItem {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(json)?;
        record.validate()?;
        Ok(record)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    /// Stored keys must be concrete: no wildcards, two or three parts.
    fn validate(&self) -> Result<()> {
        for raw in self.metadata.keys() {
            let key = MetadataKey::parse(raw)?;
            if key.element == ANY || key.qualifier.as_deref() == Some(ANY) {
                return Err(CitepageError::InvalidMetadataKey(raw.clone()));
            }
        }
        Ok(())
    }
}

impl CitableItem for RecordItem {
    fn handle(&self) -> String {
        self.handle.clone()
    }

    fn metadata_values(&self, key: &MetadataKey) -> Result<Vec<MetadataValue>> {
        let mut selected = Vec::new();
        let mut ordinal = 0u32;
        for (raw, texts) in &self.metadata {
            let stored = MetadataKey::parse(raw)?;
            for text in texts {
                if key.matches(&stored) {
                    selected.push(MetadataValue {
                        key: stored.clone(),
                        text: text.clone(),
                        ordinal,
                    });
                }
                ordinal += 1;
            }
        }
        Ok(selected)
    }

    fn owning_collection_name(&self) -> Option<String> {
        self.collection.clone()
    }

    fn owning_community_name(&self) -> Option<String> {
        self.community.clone()
    }

    fn collection_handles(&self) -> Vec<String> {
        self.collection_handles.clone()
    }
}

/// One community: its own collections and its sub-communities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommunityNode {
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub subcommunities: Vec<String>,
}

/// A community hierarchy keyed by community handle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticDirectory {
    communities: HashMap<String, CommunityNode>,
}

impl StaticDirectory {
    pub fn new(communities: HashMap<String, CommunityNode>) -> Self {
        Self { communities }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }
}

impl CommunityDirectory for StaticDirectory {
    fn collections_under(&self, community_handle: &str) -> Option<Vec<String>> {
        self.communities.get(community_handle)?;

        let mut collections = Vec::new();
        let mut visited = HashSet::new();
        let mut pending = vec![community_handle.to_string()];
        while let Some(handle) = pending.pop() {
            if !visited.insert(handle.clone()) {
                continue;
            }
            let Some(node) = self.communities.get(&handle) else {
                debug!(community = %handle, "sub-community not in directory");
                continue;
            };
            collections.extend(node.collections.iter().cloned());
            pending.extend(node.subcommunities.iter().cloned());
        }
        Some(collections)
    }
}
