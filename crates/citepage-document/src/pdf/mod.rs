// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module: opening documents, page tree manipulation, and PDF string
// encodings.

pub mod page;
pub mod reader;
pub mod text;

pub use reader::PdfReader;
