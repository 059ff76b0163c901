// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// citepage-service — The service around the composition engine: who gets a
// citation page, where original bytes come from, and what callers receive.

pub mod eligibility;
pub mod record;
pub mod service;
pub mod store;
pub mod telemetry;

pub use eligibility::EligibilityPolicy;
pub use record::{RecordItem, StaticDirectory};
pub use service::CitationDocumentService;
pub use store::DirectoryStore;
