// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for citepage.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all citepage operations.
#[derive(Debug, Error)]
pub enum CitepageError {
    // -- Document errors --
    #[error("cannot add a citation page to an encrypted PDF ({context})")]
    EncryptedDocument { context: String },

    #[error("could not find cover page template file using path {}", path.display())]
    MissingTemplate { path: PathBuf },

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    // -- Field-level errors (recovered locally, never abort a compose) --
    #[error("error in processing field {field}: {reason}")]
    FieldResolution { field: String, reason: String },

    #[error("invalid metadata field key: {0}")]
    InvalidMetadataKey(String),

    // -- Configuration / eligibility --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("citation page not applicable: {0}")]
    NotEligible(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CitepageError {
    /// Field-level failures degrade to an empty form field; every other
    /// error aborts the whole compose.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CitepageError::FieldResolution { .. } | CitepageError::InvalidMetadataKey(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, CitepageError>;
