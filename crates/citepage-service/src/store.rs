// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Filesystem-backed content store.

use std::path::{Component, Path, PathBuf};

use citepage_core::error::{CitepageError, Result};
use citepage_core::{Bitstream, ContentStore};
use tracing::debug;

/// Serves bitstreams from files named after them inside one directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of `bitstream`. Names that would leave the root are refused.
    pub fn path_for(&self, bitstream: &Bitstream) -> Result<PathBuf> {
        let name = Path::new(&bitstream.name);
        let plain = name
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !plain || bitstream.name.is_empty() {
            return Err(CitepageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("bitstream name {:?} is not a plain file name", bitstream.name),
            )));
        }
        Ok(self.root.join(name))
    }
}

impl ContentStore for DirectoryStore {
    fn retrieve(&self, bitstream: &Bitstream) -> Result<Vec<u8>> {
        let path = self.path_for(bitstream)?;
        debug!(path = %path.display(), "retrieving bitstream");
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitstream(name: &str) -> Bitstream {
        Bitstream {
            name: name.into(),
            mime_type: "application/pdf".into(),
            bundles: vec!["ORIGINAL".into()],
        }
    }

    #[test]
    fn retrieves_files_by_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("thesis.pdf"), b"%PDF-1.5").unwrap();
        let store = DirectoryStore::new(dir.path());
        assert_eq!(store.retrieve(&bitstream("thesis.pdf")).unwrap(), b"%PDF-1.5");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        assert!(matches!(
            store.retrieve(&bitstream("absent.pdf")),
            Err(CitepageError::Io(_))
        ));
    }

    #[test]
    fn refuses_paths_outside_the_root() {
        let store = DirectoryStore::new("/srv/assetstore");
        assert!(store.path_for(&bitstream("../etc/passwd")).is_err());
        assert!(store.path_for(&bitstream("/etc/passwd")).is_err());
        assert!(store.path_for(&bitstream("")).is_err());
    }
}
