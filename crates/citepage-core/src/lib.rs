// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// citepage — Core types, collaborator contracts, and error definitions shared
// across all crates.

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::{CitationConfig, CitationSettings};
pub use error::CitepageError;
pub use source::{CitableItem, CommunityDirectory, ContentStore};
pub use types::*;
