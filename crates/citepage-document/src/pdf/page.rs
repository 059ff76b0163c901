// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page tree helpers on top of `lopdf`: inheritable page attributes, page
// boxes and resources, content wrapping, and page insertion.

use citepage_core::PagePlacement;
use citepage_core::error::CitepageError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Reference chains and /Parent walks longer than this are treated as broken.
const MAX_DEPTH: usize = 32;

/// US Letter, used when a page declares no box at all.
pub const DEFAULT_PAGE_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Attributes a page inherits from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

pub(crate) fn pdf_err(context: &str, err: lopdf::Error) -> CitepageError {
    CitepageError::Pdf(format!("{}: {}", context, err))
}

/// Follow indirect references until a direct object is reached.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            direct => return Some(direct),
        }
    }
    None
}

/// Resolve `object` to a dictionary (streams yield their dictionary).
pub fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Read a rectangle and normalise it to `[llx, lly, urx, ury]`.
pub fn rect(doc: &Document, object: &Object) -> Option<[f32; 4]> {
    let values = match resolve(doc, object)? {
        Object::Array(values) if values.len() == 4 => values,
        _ => return None,
    };
    let mut coords = [0.0f32; 4];
    for (slot, value) in coords.iter_mut().zip(values) {
        *slot = number(resolve(doc, value)?)?;
    }
    Some([
        coords[0].min(coords[2]),
        coords[1].min(coords[3]),
        coords[0].max(coords[2]),
        coords[1].max(coords[3]),
    ])
}

pub fn rect_object(coords: [f32; 4]) -> Object {
    Object::Array(coords.iter().map(|&c| Object::Real(c.into())).collect())
}

/// Look up `key` on a page, walking up /Parent for inheritable attributes.
/// The returned object is fully resolved.
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &[u8]) -> Option<Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value).cloned();
        }
        node = resolve_dict(doc, node.get(b"Parent").ok()?)?;
    }
    None
}

/// Effective visible box of a page: CropBox, else MediaBox, else Letter.
pub fn page_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    [b"CropBox".as_slice(), b"MediaBox".as_slice()]
        .iter()
        .find_map(|key| {
            let value = inherited_attribute(doc, page_id, key)?;
            rect(doc, &value)
        })
        .unwrap_or(DEFAULT_PAGE_BOX)
}

/// The page's effective resource dictionary, resolved and cloned.
pub fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited_attribute(doc, page_id, b"Resources") {
        Some(Object::Dictionary(dict)) => dict,
        _ => Dictionary::new(),
    }
}

/// A sub-dictionary of a resource dictionary (e.g. /Font, /XObject), cloned.
pub fn resource_category(doc: &Document, resources: &Dictionary, category: &[u8]) -> Dictionary {
    resources
        .get(category)
        .ok()
        .and_then(|value| resolve_dict(doc, value))
        .cloned()
        .unwrap_or_default()
}

pub fn catalog_id(doc: &Document) -> Result<ObjectId, CitepageError> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|err| pdf_err("no document catalog", err))
}

/// Object id of the root /Pages node.
pub fn root_pages_id(doc: &Document) -> Result<ObjectId, CitepageError> {
    doc.get_dictionary(catalog_id(doc)?)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|err| pdf_err("no /Pages in catalog", err))
}

/// Attach an existing page object to the root of the page tree, either as
/// the very first page or after every existing page.
pub fn insert_page(
    doc: &mut Document,
    page_id: ObjectId,
    placement: PagePlacement,
) -> Result<(), CitepageError> {
    let pages_id = root_pages_id(doc)?;

    let indirect_kids = match doc.get_dictionary(pages_id).and_then(|d| d.get(b"Kids")) {
        Ok(Object::Reference(id)) => Some(*id),
        _ => None,
    };
    let kids = match indirect_kids {
        Some(id) => doc.get_object_mut(id).and_then(Object::as_array_mut),
        None => doc
            .get_object_mut(pages_id)
            .and_then(Object::as_dict_mut)
            .and_then(|dict| dict.get_mut(b"Kids"))
            .and_then(Object::as_array_mut),
    }
    .map_err(|err| pdf_err("root /Pages has no /Kids array", err))?;

    match placement {
        PagePlacement::First => kids.insert(0, Object::Reference(page_id)),
        PagePlacement::Last => kids.push(Object::Reference(page_id)),
    }

    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err("root /Pages is not a dictionary", err))?;
    let count = pages.get(b"Count").and_then(Object::as_i64).unwrap_or(0);
    pages.set("Count", Object::Integer(count + 1));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err("inserted page is not a dictionary", err))?;
    page.set("Parent", Object::Reference(pages_id));
    Ok(())
}

/// Append `content` to a page, isolating it from the graphics state left
/// behind by the page's existing content streams.
pub fn wrap_page_contents(
    doc: &mut Document,
    page_id: ObjectId,
    content: Vec<u8>,
) -> Result<(), CitepageError> {
    let existing = match doc.get_dictionary(page_id).and_then(|p| p.get(b"Contents")) {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(parts)) => parts.clone(),
            _ => vec![Object::Reference(*id)],
        },
        Ok(Object::Array(parts)) => parts.clone(),
        _ => Vec::new(),
    };

    let mut closing = b"Q\n".to_vec();
    closing.extend(content);
    let open_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
    let close_id = doc.add_object(Stream::new(dictionary! {}, closing));

    let mut parts = Vec::with_capacity(existing.len() + 2);
    parts.push(Object::Reference(open_id));
    parts.extend(existing);
    parts.push(Object::Reference(close_id));

    doc.get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err("page is not a dictionary", err))?
        .set("Contents", Object::Array(parts));
    Ok(())
}

/// Reduce the document to its first page, copying inherited attributes onto
/// the page so it stands on its own. Returns the page's object id.
pub fn keep_first_page(doc: &mut Document) -> Result<ObjectId, CitepageError> {
    let first = *doc
        .get_pages()
        .get(&1)
        .ok_or_else(|| CitepageError::Pdf("document has no pages".to_string()))?;

    let mut materialised = Vec::new();
    for key in INHERITABLE {
        if let Some(value) = inherited_attribute(doc, first, key) {
            materialised.push((key.to_vec(), value));
        }
    }

    let pages_id = root_pages_id(doc)?;
    {
        let page = doc
            .get_object_mut(first)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err("first page is not a dictionary", err))?;
        for (key, value) in materialised {
            page.set(key, value);
        }
        page.set("Parent", Object::Reference(pages_id));
    }

    let pages = doc
        .get_object_mut(pages_id)
        .and_then(Object::as_dict_mut)
        .map_err(|err| pdf_err("root /Pages is not a dictionary", err))?;
    pages.set("Kids", Object::Array(vec![Object::Reference(first)]));
    pages.set("Count", Object::Integer(1));
    Ok(first)
}
