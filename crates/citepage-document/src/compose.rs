// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page composition: build the populated cover page and splice it into the
// original document as a new first or last page.

use std::collections::HashSet;
use std::path::Path;

use citepage_core::error::CitepageError;
use citepage_core::{CitableItem, PagePlacement};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument};

use crate::form::{FlattenedPage, TemplateForm};
use crate::pdf::page::{
    catalog_id, insert_page, page_box, page_resources, pdf_err, rect_object, root_pages_id,
};
use crate::pdf::reader::{PdfReader, save_to_bytes};
use crate::populate::TemplateFieldPopulator;
use crate::resolve::FieldValueResolver;

/// Resource name of the imported cover page on its new page.
const COVER_XOBJECT: &str = "CitationPage";

/// Composes cited documents. Holds no per-request state, so one composer can
/// serve any number of concurrent requests.
pub struct PageComposer<'a> {
    html_fields: &'a HashSet<String>,
}

impl<'a> PageComposer<'a> {
    pub fn new(html_fields: &'a HashSet<String>) -> Self {
        Self { html_fields }
    }

    /// Return `original` with a cover page for `item` added at `placement`.
    ///
    /// The original's pages are carried over untouched. Encrypted input and
    /// a missing template abort; field-level problems only leave fields
    /// blank.
    #[instrument(skip_all, fields(item = %item.handle(), ?placement))]
    pub fn compose(
        &self,
        original: &[u8],
        item: &dyn CitableItem,
        template: &Path,
        placement: PagePlacement,
    ) -> Result<Vec<u8>, CitepageError> {
        let mut document = PdfReader::from_bytes(original)?.into_document();
        let original_pages = document.get_pages().len();

        let form = TemplateForm::open(template)?;
        let populator = TemplateFieldPopulator::new(FieldValueResolver::new(self.html_fields));
        let cover = populator.populate(form, item)?;

        let page_id = import_cover_page(&mut document, &cover)?;
        insert_page(&mut document, page_id, placement)?;

        let bytes = save_to_bytes(&mut document, "cited document")?;
        info!(
            pages = original_pages + 1,
            bytes = bytes.len(),
            "citation page added"
        );
        Ok(bytes)
    }
}

/// Copy the flattened cover page into `doc` as a Form XObject drawn on a new,
/// still-unattached page. Returns the new page's id.
///
/// The page sets every inheritable box and rotation itself, so nothing from
/// the original's page tree applies to it.
fn import_cover_page(doc: &mut Document, cover: &FlattenedPage) -> Result<ObjectId, CitepageError> {
    let mut source = Document::load_mem(cover.as_bytes())
        .map_err(|err| pdf_err("failed to load flattened cover page", err))?;
    source.renumber_objects_with(doc.max_id + 1);

    let cover_page = *source
        .get_pages()
        .get(&1)
        .ok_or_else(|| CitepageError::Pdf("flattened cover page is empty".to_string()))?;
    let bbox = page_box(&source, cover_page);
    let resources = page_resources(&source, cover_page);
    let content = source
        .get_page_content(cover_page)
        .map_err(|err| pdf_err("failed to read cover page content", err))?;

    // Page tree scaffolding and the inlined content streams stay behind.
    let mut skipped: HashSet<ObjectId> = source.page_iter().collect();
    skipped.insert(catalog_id(&source)?);
    skipped.insert(root_pages_id(&source)?);
    skipped.extend(source.get_page_contents(cover_page));

    if source.max_id > doc.max_id {
        doc.max_id = source.max_id;
    }
    let copied = source.objects.len() - skipped.len().min(source.objects.len());
    doc.objects.extend(
        source
            .objects
            .into_iter()
            .filter(|(id, _)| !skipped.contains(id)),
    );
    debug!(copied, "cover page objects imported");

    let form_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Form",
            "FormType" => 1,
            "BBox" => rect_object(bbox),
            "Resources" => resources,
        },
        content,
    ));
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        format!("q /{COVER_XOBJECT} Do Q\n").into_bytes(),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "MediaBox" => rect_object(bbox),
        "CropBox" => rect_object(bbox),
        "Rotate" => Object::Integer(0),
        "Resources" => dictionary! {
            "XObject" => dictionary! { COVER_XOBJECT => form_id },
        },
        "Contents" => content_id,
    });
    Ok(page_id)
}
