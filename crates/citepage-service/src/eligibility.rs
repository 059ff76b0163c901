// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Eligibility policy: decides whether a download should receive a citation
// page at all.

use std::sync::Arc;

use citepage_core::{Bitstream, CitationSettings, RequestContext};
use tracing::debug;

/// Applies the configured enablement rules to a single download.
#[derive(Debug, Clone)]
pub struct EligibilityPolicy {
    settings: Arc<CitationSettings>,
}

impl EligibilityPolicy {
    pub fn new(settings: Arc<CitationSettings>) -> Self {
        Self { settings }
    }

    /// Citation pages are switched on for the site, or for one of the
    /// collections the item is mapped into.
    pub fn is_citation_enabled(&self, item_collections: &[String]) -> bool {
        if self.settings.enable_globally {
            return true;
        }
        if self.settings.enabled_collections.is_empty() {
            return false;
        }
        item_collections
            .iter()
            .any(|handle| self.settings.enabled_collections.contains(handle))
    }

    /// The file's format is one a citation page can be added to.
    pub fn can_generate_citation_version(&self, bitstream: &Bitstream) -> bool {
        self.settings
            .citable_mime_types
            .contains(bitstream.mime_type.trim())
    }

    /// Full decision for one request.
    ///
    /// Files in an excluded bundle already carry a citation page, and
    /// administrators always receive the original.
    pub fn is_eligible(
        &self,
        bitstream: &Bitstream,
        item_collections: &[String],
        requester: &RequestContext,
    ) -> bool {
        if !self.is_citation_enabled(item_collections) {
            debug!(file = %bitstream.name, "citation page not enabled");
            return false;
        }
        if let Some(bundle) = bitstream
            .bundles
            .iter()
            .find(|bundle| self.settings.excluded_bundles.contains(bundle.as_str()))
        {
            debug!(file = %bitstream.name, bundle = %bundle, "bundle already cited");
            return false;
        }
        if requester.is_admin {
            debug!(file = %bitstream.name, "administrator receives the original");
            return false;
        }
        self.can_generate_citation_version(bitstream)
    }
}
