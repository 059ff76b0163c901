// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cited document service, the entry point download handlers call.
//
// Holds the frozen configuration and no per-request state, so a single
// instance is shared (via `Arc`) by every request thread.

use std::sync::Arc;

use citepage_core::error::Result;
use citepage_core::{
    Bitstream, CitableItem, CitationSettings, CitedDocument, ContentStore, RequestContext,
};
use citepage_document::PageComposer;
use tracing::{info, instrument, warn};

use crate::eligibility::EligibilityPolicy;

pub struct CitationDocumentService {
    settings: Arc<CitationSettings>,
    policy: EligibilityPolicy,
}

impl CitationDocumentService {
    pub fn new(settings: Arc<CitationSettings>) -> Self {
        let policy = EligibilityPolicy::new(Arc::clone(&settings));
        Self { settings, policy }
    }

    pub fn settings(&self) -> &CitationSettings {
        &self.settings
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Whether this download of `bitstream` should carry a citation page.
    pub fn is_citation_enabled_for(
        &self,
        bitstream: &Bitstream,
        item: &dyn CitableItem,
        requester: &RequestContext,
    ) -> bool {
        self.policy
            .is_eligible(bitstream, &item.collection_handles(), requester)
    }

    /// Fetch the original file and return it with a citation page added.
    #[instrument(skip_all, fields(item = %item.handle(), file = %bitstream.name))]
    pub fn make_cited_document(
        &self,
        bitstream: &Bitstream,
        item: &dyn CitableItem,
        store: &dyn ContentStore,
    ) -> Result<CitedDocument> {
        let original = store.retrieve(bitstream)?;
        self.cite_bytes(&original, item)
    }

    /// Add a citation page to PDF bytes already in memory.
    pub fn cite_bytes(&self, original: &[u8], item: &dyn CitableItem) -> Result<CitedDocument> {
        let composer = PageComposer::new(&self.settings.html_fields);
        let bytes = composer.compose(
            original,
            item,
            &self.settings.template_path,
            self.settings.placement,
        )?;
        let cited = CitedDocument::new(bytes);
        info!(len = cited.len, "cited document ready");
        Ok(cited)
    }

    /// Like [`Self::make_cited_document`], but any failure is logged and the
    /// original bytes are served instead.
    pub fn make_cited_or_original(
        &self,
        bitstream: &Bitstream,
        item: &dyn CitableItem,
        store: &dyn ContentStore,
    ) -> Result<CitedDocument> {
        let original = store.retrieve(bitstream)?;
        match self.cite_bytes(&original, item) {
            Ok(cited) => Ok(cited),
            Err(err) => {
                warn!(
                    item = %item.handle(),
                    file = %bitstream.name,
                    %err,
                    "citation page failed, serving the original"
                );
                Ok(CitedDocument::new(original))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use citepage_core::error::CitepageError;
    use citepage_core::{CitationConfig, PagePlacement};
    use citepage_document::fixtures::{self, FixtureItem};
    use lopdf::Document;

    use super::*;
    use crate::record::StaticDirectory;
    use crate::store::DirectoryStore;

    struct Fixture {
        dir: tempfile::TempDir,
        service: CitationDocumentService,
    }

    fn fixture(first_page: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("citation-page.pdf");
        std::fs::write(
            &template,
            fixtures::citation_template(&["dc.title", "community"]),
        )
        .unwrap();
        std::fs::write(dir.path().join("thesis.pdf"), fixtures::multi_page_pdf(4)).unwrap();
        std::fs::write(dir.path().join("locked.pdf"), fixtures::encrypted_pdf()).unwrap();

        let config = CitationConfig {
            enable_globally: true,
            citation_as_first_page: first_page,
            template_path: template,
            ..CitationConfig::default()
        };
        let service = CitationDocumentService::new(config.freeze(&StaticDirectory::default()));
        Fixture { dir, service }
    }

    fn bitstream(name: &str) -> Bitstream {
        Bitstream {
            name: name.into(),
            mime_type: "application/pdf".into(),
            bundles: vec!["ORIGINAL".into()],
        }
    }

    fn item() -> FixtureItem {
        FixtureItem::new("123456789/42").with("dc.title", "On Cover Pages")
    }

    fn first_page_text(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        fixtures::page_text(&doc, doc.get_pages()[&1])
    }

    #[test]
    fn makes_a_cited_document() {
        let fx = fixture(true);
        let store = DirectoryStore::new(fx.dir.path());

        let cited = fx
            .service
            .make_cited_document(&bitstream("thesis.pdf"), &item(), &store)
            .unwrap();

        assert_eq!(cited.len, cited.bytes.len() as u64);
        let doc = Document::load_mem(&cited.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 5);
        assert!(first_page_text(&cited.bytes).contains(&"On Cover Pages".to_string()));
    }

    #[test]
    fn placement_follows_configuration() {
        let fx = fixture(false);
        assert_eq!(fx.service.settings().placement, PagePlacement::Last);
        let store = DirectoryStore::new(fx.dir.path());

        let cited = fx
            .service
            .make_cited_document(&bitstream("thesis.pdf"), &item(), &store)
            .unwrap();
        assert_eq!(first_page_text(&cited.bytes), vec!["Page 1".to_string()]);
    }

    #[test]
    fn encrypted_originals_fail_but_can_fall_back() {
        let fx = fixture(true);
        let store = DirectoryStore::new(fx.dir.path());

        let err = fx
            .service
            .make_cited_document(&bitstream("locked.pdf"), &item(), &store)
            .unwrap_err();
        assert!(matches!(err, CitepageError::EncryptedDocument { .. }));
        assert!(!err.is_recoverable());

        let served = fx
            .service
            .make_cited_or_original(&bitstream("locked.pdf"), &item(), &store)
            .unwrap();
        assert_eq!(
            served.bytes,
            std::fs::read(fx.dir.path().join("locked.pdf")).unwrap()
        );
    }

    #[test]
    fn missing_template_falls_back_to_the_original() {
        let fx = fixture(true);
        std::fs::remove_file(&fx.service.settings().template_path).unwrap();
        let store = DirectoryStore::new(fx.dir.path());

        let err = fx
            .service
            .make_cited_document(&bitstream("thesis.pdf"), &item(), &store)
            .unwrap_err();
        assert!(matches!(err, CitepageError::MissingTemplate { .. }));

        let served = fx
            .service
            .make_cited_or_original(&bitstream("thesis.pdf"), &item(), &store)
            .unwrap();
        assert_eq!(
            served.bytes,
            std::fs::read(fx.dir.path().join("thesis.pdf")).unwrap()
        );
    }

    #[test]
    fn unreadable_originals_are_errors_even_with_fallback() {
        let fx = fixture(true);
        let store = DirectoryStore::new(fx.dir.path());
        let result = fx
            .service
            .make_cited_or_original(&bitstream("absent.pdf"), &item(), &store);
        assert!(matches!(result, Err(CitepageError::Io(_))));
    }

    #[test]
    fn eligibility_uses_the_items_collections() {
        let settings = Arc::new(CitationSettings {
            enable_globally: false,
            enabled_collections: HashSet::from(["123456789/2".to_string()]),
            placement: PagePlacement::First,
            template_path: PathBuf::from("unused.pdf"),
            html_fields: HashSet::new(),
            excluded_bundles: HashSet::from(["DISPLAY".to_string()]),
            citable_mime_types: HashSet::from(["application/pdf".to_string()]),
        });
        let service = CitationDocumentService::new(settings);
        let record = crate::record::RecordItem::from_json_str(
            r#"{ "handle": "123456789/42", "collection_handles": ["123456789/2"] }"#,
        )
        .unwrap();
        let anonymous = RequestContext::default();

        assert!(service.is_citation_enabled_for(&bitstream("thesis.pdf"), &record, &anonymous));
        assert!(!service.is_citation_enabled_for(&bitstream("thesis.pdf"), &item(), &anonymous));
    }
}
