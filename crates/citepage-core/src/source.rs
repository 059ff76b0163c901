// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contracts for the collaborators citepage reads from: the metadata
// repository, the community hierarchy, and binary content storage.

use crate::error::Result;
use crate::types::{Bitstream, MetadataKey, MetadataValue};

/// The bibliographic record being cited. Read-only from citepage's side.
pub trait CitableItem {
    /// Persistent identifier used in log messages (e.g. `123456789/42`).
    fn handle(&self) -> String;

    /// All values selected by `key`, in storage order.
    fn metadata_values(&self, key: &MetadataKey) -> Result<Vec<MetadataValue>>;

    /// Name of the collection that owns the item.
    fn owning_collection_name(&self) -> Option<String>;

    /// Name of the first community the item belongs to.
    fn owning_community_name(&self) -> Option<String>;

    /// Handles of every collection the item is mapped into.
    fn collection_handles(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Resolves community handles to the collections beneath them.
pub trait CommunityDirectory {
    /// Every collection handle under `community_handle`, transitively.
    /// `None` when the handle does not name a community.
    fn collections_under(&self, community_handle: &str) -> Option<Vec<String>>;
}

/// Binary content storage for original files.
pub trait ContentStore {
    fn retrieve(&self, bitstream: &Bitstream) -> Result<Vec<u8>>;
}
