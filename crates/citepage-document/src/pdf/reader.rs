// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open existing PDF documents with `lopdf`, refusing anything
// that is access-restricted.

use std::path::Path;

use citepage_core::error::CitepageError;
use lopdf::Document;
use tracing::{debug, info, instrument};

/// Trailer key announcing a security handler.
const ENCRYPT_KEY: &[u8] = b"/Encrypt";
/// Type of a cross-reference stream, whose dictionary doubles as the trailer.
const XREF_TYPE: &[u8] = b"/XRef";

/// An opened, unencrypted PDF.
///
/// Wraps `lopdf::Document`; construction fails with
/// [`CitepageError::EncryptedDocument`] for encrypted input.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file (useful for diagnostics).
    source_path: Option<String>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CitepageError> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let data = std::fs::read(path_ref)?;
        let mut reader = Self::load(&data, &path_ref.display().to_string())?;
        reader.source_path = Some(path_ref.display().to_string());
        Ok(reader)
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, CitepageError> {
        Self::load(data, "in-memory PDF")
    }

    fn load(data: &[u8], label: &str) -> Result<Self, CitepageError> {
        // Checked on the raw bytes: lopdf may transparently decrypt files
        // with an empty user password.
        if declares_encryption(data) {
            return Err(CitepageError::EncryptedDocument {
                context: label.to_string(),
            });
        }

        let document = Document::load_mem(data).map_err(|err| {
            CitepageError::Pdf(format!("failed to load {}: {}", label, err))
        })?;

        if document.is_encrypted() || document.trailer.has(b"Encrypt") {
            return Err(CitepageError::EncryptedDocument {
                context: label.to_string(),
            });
        }

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }
}

/// Whether the file carries an `/Encrypt` entry in one of its trailer
/// dictionaries (classic `trailer` or cross-reference stream). Content
/// streams, strings and metadata are not looked at.
pub fn declares_encryption(data: &[u8]) -> bool {
    let classic = dictionaries_after(data, b"trailer");
    let xref_streams = dictionaries_after(data, b"obj")
        .filter(|names| {
            names
                .windows(2)
                .any(|pair| pair[0] == b"/Type".as_slice() && pair[1] == XREF_TYPE)
        });
    classic
        .chain(xref_streams)
        .any(|names| names.contains(&ENCRYPT_KEY))
}

// -- Raw trailer scanning -----------------------------------------------------

fn is_pdf_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | b'\n' | b'\x0c' | b'\0')
}

fn is_pdf_delimiter(byte: u8) -> bool {
    is_pdf_whitespace(byte) || b"()<>[]{}/%".contains(&byte)
}

/// Top-level names of every dictionary that directly follows `keyword`.
fn dictionaries_after<'a>(
    data: &'a [u8],
    keyword: &'a [u8],
) -> impl Iterator<Item = Vec<&'a [u8]>> + 'a {
    (0..=data.len().saturating_sub(keyword.len()))
        .filter(move |&at| {
            data[at..].starts_with(keyword)
                && (at == 0 || is_pdf_whitespace(data[at - 1]))
        })
        .filter_map(move |at| {
            let mut start = at + keyword.len();
            while start < data.len() && is_pdf_whitespace(data[start]) {
                start += 1;
            }
            dictionary_names(data, start)
        })
}

/// Names appearing at the top level of the dictionary opening at `start`,
/// keys and name values alike. `None` unless a balanced `<< >>` starts there.
fn dictionary_names(data: &[u8], start: usize) -> Option<Vec<&[u8]>> {
    if !data[start..].starts_with(b"<<") {
        return None;
    }
    let mut names = Vec::new();
    let mut depth = 0usize;
    let mut at = start;
    while at < data.len() {
        match data[at] {
            b'<' if data.get(at + 1) == Some(&b'<') => {
                depth += 1;
                at += 2;
            }
            b'>' if data.get(at + 1) == Some(&b'>') => {
                depth -= 1;
                at += 2;
                if depth == 0 {
                    return Some(names);
                }
            }
            // Hex string.
            b'<' => {
                at += data[at..].iter().position(|&b| b == b'>')? + 1;
            }
            b'(' => at = skip_literal_string(data, at)?,
            b'/' => {
                let end = data[at + 1..]
                    .iter()
                    .position(|&b| is_pdf_delimiter(b))
                    .map_or(data.len(), |len| at + 1 + len);
                if depth == 1 {
                    names.push(&data[at..end]);
                }
                at = end;
            }
            _ => at += 1,
        }
    }
    None
}

/// Index just past the literal string opening at `start`.
fn skip_literal_string(data: &[u8], start: usize) -> Option<usize> {
    let mut nesting = 0usize;
    let mut at = start;
    while at < data.len() {
        match data[at] {
            b'\\' => at += 1,
            b'(' => nesting += 1,
            b')' => {
                nesting -= 1;
                if nesting == 0 {
                    return Some(at + 1);
                }
            }
            _ => {}
        }
        at += 1;
    }
    None
}

/// Serialise a document to bytes.
pub fn save_to_bytes(document: &mut Document, context: &str) -> Result<Vec<u8>, CitepageError> {
    let mut output = Vec::new();
    document.save_to(&mut output).map_err(|err| {
        CitepageError::Pdf(format!("failed to serialise {}: {}", context, err))
    })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn counts_pages() {
        let reader = PdfReader::from_bytes(&fixtures::multi_page_pdf(5)).unwrap();
        assert_eq!(reader.page_count(), 5);
        assert!(reader.source_path().is_none());
    }

    #[test]
    fn refuses_encrypted_input() {
        let result = PdfReader::from_bytes(&fixtures::encrypted_pdf());
        assert!(matches!(result, Err(CitepageError::EncryptedDocument { .. })));
    }

    #[test]
    fn garbage_is_a_pdf_error() {
        let result = PdfReader::from_bytes(b"definitely not a pdf");
        assert!(matches!(result, Err(CitepageError::Pdf(_))));
    }

    #[test]
    fn encrypt_metadata_key_alone_is_not_encryption() {
        assert!(!declares_encryption(b"trailer << /EncryptMetadata false >>"));
        assert!(declares_encryption(b"trailer << /Encrypt 9 0 R >>"));
        assert!(declares_encryption(
            b"trailer\n<</ID [<0a1b><2c3d>] /Info (a >> b) /Encrypt 9 0 R>>"
        ));
    }

    #[test]
    fn xref_stream_dictionaries_count_as_trailers() {
        assert!(declares_encryption(
            b"12 0 obj\n<< /Type /XRef /Size 13 /Encrypt 9 0 R /W [1 2 1] >>\nstream"
        ));
        assert!(!declares_encryption(
            b"12 0 obj\n<< /Type /Annot /Contents (see /Encrypt) >>\nendobj"
        ));
    }

    #[test]
    fn encrypt_in_page_content_is_not_encryption() {
        let data = fixtures::text_page_pdf("(/Encrypt dictionary) Tj");
        let reader = PdfReader::from_bytes(&data).unwrap();
        assert_eq!(reader.page_count(), 1);
    }

    #[test]
    fn open_records_source_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), fixtures::multi_page_pdf(1)).unwrap();
        let reader = PdfReader::open(file.path()).unwrap();
        assert_eq!(reader.source_path(), Some(file.path().display().to_string().as_str()));
    }
}
