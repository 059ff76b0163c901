// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// citepage-document — Cover page templates and PDF composition for citepage.
//
// Provides field value resolution against item metadata, AcroForm filling and
// flattening, and insertion of the finished cover page into an original PDF.

pub mod compose;
pub mod form;
pub mod pdf;
pub mod populate;
pub mod resolve;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

// Re-export the primary structs so callers can use `citepage_document::PageComposer` etc.
pub use compose::PageComposer;
pub use form::{FlattenedPage, TemplateForm};
pub use pdf::reader::PdfReader;
pub use populate::TemplateFieldPopulator;
pub use resolve::FieldValueResolver;
