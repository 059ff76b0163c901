// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Citation page configuration.
//
// `CitationConfig` is the serialisable form read once at startup.
// `CitationConfig::freeze` expands community handles and produces the
// immutable `CitationSettings` snapshot shared by every compose call.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{CitepageError, Result};
use crate::source::CommunityDirectory;
use crate::types::PagePlacement;

/// Bundle whose files already carry a citation page.
pub const DISPLAY_BUNDLE: &str = "DISPLAY";

/// Persistent citation page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CitationConfig {
    /// Add citation pages for every item in the repository.
    pub enable_globally: bool,
    /// Collection handles with citation pages enabled.
    pub enabled_collections: Vec<String>,
    /// Community handles whose collections all get citation pages.
    pub enabled_communities: Vec<String>,
    /// Put the citation page first (true) or last (false).
    pub citation_as_first_page: bool,
    /// PDF form used as the cover page.
    pub template_path: PathBuf,
    /// Field names whose values have HTML tags removed.
    pub html_fields: Vec<String>,
    /// Bundles excluded from citation (their files already have one).
    pub excluded_bundles: Vec<String>,
    /// MIME types a citation page can be added to.
    pub citable_mime_types: Vec<String>,
}

impl Default for CitationConfig {
    fn default() -> Self {
        Self {
            enable_globally: false,
            enabled_collections: Vec::new(),
            enabled_communities: Vec::new(),
            citation_as_first_page: true,
            template_path: PathBuf::new(),
            html_fields: Vec::new(),
            excluded_bundles: vec![DISPLAY_BUNDLE.to_owned()],
            citable_mime_types: vec!["application/pdf".to_owned(), "application/x-pdf".to_owned()],
        }
    }
}

impl CitationConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|err| {
            CitepageError::Config(format!("failed to read {}: {}", path.display(), err))
        })?;
        let config = Self::from_json_str(&data)?;
        info!(path = %path.display(), "citation page configuration loaded");
        Ok(config)
    }

    /// Produce the read-only snapshot used by every compose call.
    ///
    /// Each enabled community is expanded into the handles of all
    /// collections beneath it. Handles that do not resolve to a community
    /// are logged and skipped.
    pub fn freeze(self, directory: &dyn CommunityDirectory) -> Arc<CitationSettings> {
        let mut enabled_collections: HashSet<String> = self
            .enabled_collections
            .iter()
            .map(|handle| handle.trim().to_owned())
            .filter(|handle| !handle.is_empty())
            .collect();

        for community in &self.enabled_communities {
            let handle = community.trim();
            match directory.collections_under(handle) {
                Some(collections) => {
                    debug!(community = handle, count = collections.len(), "expanded community");
                    enabled_collections.extend(collections);
                }
                None => {
                    error!("Invalid community for enabled_communities, value: {}", handle);
                }
            }
        }

        Arc::new(CitationSettings {
            enable_globally: self.enable_globally,
            enabled_collections,
            placement: PagePlacement::from_first_page_flag(self.citation_as_first_page),
            template_path: self.template_path,
            html_fields: self.html_fields.into_iter().collect(),
            excluded_bundles: self.excluded_bundles.into_iter().collect(),
            citable_mime_types: self.citable_mime_types.into_iter().collect(),
        })
    }
}

/// Immutable configuration snapshot, shared via `Arc` across threads.
#[derive(Debug, Clone)]
pub struct CitationSettings {
    pub enable_globally: bool,
    /// Enabled collection handles, including those under enabled communities.
    pub enabled_collections: HashSet<String>,
    pub placement: PagePlacement,
    pub template_path: PathBuf,
    pub html_fields: HashSet<String>,
    pub excluded_bundles: HashSet<String>,
    pub citable_mime_types: HashSet<String>,
}
