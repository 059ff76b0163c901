// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory fixtures: small PDFs built with lopdf, a text extractor that
// follows Form XObjects, and a scripted item. Used by the unit tests here
// and, through the `fixtures` feature, by downstream tests and benches.

use std::sync::Mutex;

use citepage_core::error::{CitepageError, Result};
use citepage_core::{CitableItem, MetadataKey, MetadataValue};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Text every template widget shows before it is filled.
pub const PLACEHOLDER_TEXT: &str = "[unset]";

/// Static text printed on every fixture template.
pub const TEMPLATE_LABEL: &str = "Cite this document as:";

const A4: [i64; 4] = [0, 0, 595, 842];

fn box_object(coords: [i64; 4]) -> Object {
    Object::Array(coords.iter().map(|&c| Object::Integer(c)).collect())
}

fn helvetica(doc: &mut Document) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    })
}

fn text_stream(font: &str, size: i64, x: i64, y: i64, text: &str) -> Stream {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(size)]),
            Operation::new("Td", vec![Object::Integer(x), Object::Integer(y)]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    Stream::new(dictionary! {}, content.encode().unwrap_or_default())
}

fn finish(mut doc: Document, pages_id: ObjectId, pages: Dictionary) -> Vec<u8> {
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap_or_default();
    output
}

/// An `n`-page A4 document whose page `i` shows "Page i". Box and resources
/// live on the /Pages root and are inherited.
pub fn multi_page_pdf(pages: u32) -> Vec<u8> {
    let (doc, pages_id, root) = multi_page_document(pages);
    finish(doc, pages_id, root)
}

fn multi_page_document(pages: u32) -> (Document, ObjectId, Dictionary) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut kids = Vec::new();
    for number in 1..=pages {
        let content_id = doc.add_object(text_stream("F1", 24, 72, 720, &format!("Page {number}")));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let root = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(i64::from(pages)),
        "Kids" => kids,
        "MediaBox" => box_object(A4),
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    };
    (doc, pages_id, root)
}

/// A one-page A4 document whose content stream is `text_operators` inside a
/// text object set in F1 at 12 pt.
pub fn text_page_pdf(text_operators: &str) -> Vec<u8> {
    let (mut doc, pages_id, root) = multi_page_document(1);
    let content = format!("BT /F1 12 Tf 72 720 Td {text_operators} ET\n");
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = match root.get(b"Kids").and_then(Object::as_array) {
        Ok(kids) => kids.first().and_then(|kid| kid.as_reference().ok()),
        Err(_) => None,
    };
    if let Some(page) = page_id
        .and_then(|id| doc.get_object_mut(id).ok())
        .and_then(|page| page.as_dict_mut().ok())
    {
        page.set("Contents", content_id);
    }
    finish(doc, pages_id, root)
}

/// A two-page document whose trailer declares a security handler.
pub fn encrypted_pdf() -> Vec<u8> {
    let (mut doc, pages_id, root) = multi_page_document(2);
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => Object::Integer(2),
        "R" => Object::Integer(3),
        "Length" => Object::Integer(128),
        "P" => Object::Integer(-3904),
    });
    doc.trailer.set("Encrypt", encrypt_id);
    finish(doc, pages_id, root)
}

/// Widget appearance showing the placeholder text.
fn placeholder_appearance(doc: &mut Document, font_id: ObjectId) -> ObjectId {
    let mut stream = text_stream("Helv", 10, 2, 6, PLACEHOLDER_TEXT);
    stream.dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => box_object([0, 0, 451, 20]),
        "Resources" => dictionary! {
            "Font" => dictionary! { "Helv" => font_id },
        },
    };
    doc.add_object(stream)
}

/// A one-page A4 cover page form with one text field per name, stacked
/// from the top. Each field is a merged field/widget dictionary.
pub fn citation_template(field_names: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut fields = Vec::new();
    for (index, name) in field_names.iter().enumerate() {
        let top = 760 - 30 * index as i64;
        let appearance_id = placeholder_appearance(&mut doc, font_id);
        let field_id = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => Object::string_literal(*name),
            "Rect" => box_object([72, top - 20, 523, top]),
            "F" => Object::Integer(4),
            "P" => page_id,
            "AP" => dictionary! { "N" => appearance_id },
        });
        fields.push(Object::Reference(field_id));
    }

    let label_id = doc.add_object(text_stream("F1", 14, 72, 800, TEMPLATE_LABEL));
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => label_id,
            "MediaBox" => box_object(A4),
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "Annots" => fields.clone(),
        }),
    );

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => fields,
        "DA" => Object::string_literal("/Helv 0 Tf 0 g"),
        "DR" => dictionary! {
            "Font" => dictionary! { "Helv" => font_id },
        },
    });

    let root = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(1),
        "Kids" => vec![Object::Reference(page_id)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(root));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap_or_default();
    output
}

/// A form with a field tree `dc` → `date` → `issued`, where `issued` has
/// two separate widget annotations.
pub fn hierarchical_template() -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.new_object_id();
    let dc_id = doc.new_object_id();
    let date_id = doc.new_object_id();
    let issued_id = doc.new_object_id();
    let font_id = helvetica(&mut doc);

    let mut widgets = Vec::new();
    for top in [700, 400] {
        let appearance_id = placeholder_appearance(&mut doc, font_id);
        widgets.push(Object::Reference(doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "Parent" => issued_id,
            "Rect" => box_object([72, top - 20, 523, top]),
            "P" => page_id,
            "AP" => dictionary! { "N" => appearance_id },
        })));
    }

    doc.objects.insert(
        dc_id,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("dc"),
            "Kids" => vec![Object::Reference(date_id)],
        }),
    );
    doc.objects.insert(
        date_id,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("date"),
            "Parent" => dc_id,
            "Kids" => vec![Object::Reference(issued_id)],
        }),
    );
    doc.objects.insert(
        issued_id,
        Object::Dictionary(dictionary! {
            "T" => Object::string_literal("issued"),
            "FT" => "Tx",
            "DA" => Object::string_literal("/Helv 9 Tf 0 g"),
            "Parent" => date_id,
            "Kids" => widgets.clone(),
        }),
    );
    doc.objects.insert(
        page_id,
        Object::Dictionary(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => box_object(A4),
            "Annots" => widgets,
        }),
    );

    let acroform_id = doc.add_object(dictionary! {
        "Fields" => vec![Object::Reference(dc_id)],
        "DR" => dictionary! {
            "Font" => dictionary! { "Helv" => font_id },
        },
    });
    let root = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(1),
        "Kids" => vec![Object::Reference(page_id)],
    };
    doc.objects.insert(pages_id, Object::Dictionary(root));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
        "AcroForm" => acroform_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap_or_default();
    output
}

// -- Text extraction ----------------------------------------------------------

/// Every string shown with `Tj`/`TJ` on a page, following Form XObjects.
pub fn page_text(doc: &Document, page_id: ObjectId) -> Vec<String> {
    let content = doc.get_page_content(page_id).unwrap_or_default();
    let resources = crate::pdf::page::page_resources(doc, page_id);
    let mut out = Vec::new();
    collect_text(doc, &content, &resources, &mut out, 0);
    out
}

fn collect_text(
    doc: &Document,
    content: &[u8],
    resources: &Dictionary,
    out: &mut Vec<String>,
    depth: usize,
) {
    if depth > 8 {
        return;
    }
    let Ok(content) = Content::decode(content) else {
        return;
    };
    for operation in content.operations {
        match operation.operator.as_str() {
            "Tj" | "'" => out.extend(operation.operands.iter().filter_map(shown_string)),
            "TJ" => {
                if let Some(Object::Array(parts)) = operation.operands.first() {
                    out.push(parts.iter().filter_map(shown_string).collect());
                }
            }
            "Do" => {
                let Some(Object::Name(name)) = operation.operands.first() else {
                    continue;
                };
                let xobjects = crate::pdf::page::resource_category(doc, resources, b"XObject");
                let Ok(Object::Reference(id)) = xobjects.get(name) else {
                    continue;
                };
                let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
                    continue;
                };
                let inner = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| crate::pdf::page::resolve_dict(doc, r))
                    .cloned()
                    .unwrap_or_else(|| resources.clone());
                let bytes = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                collect_text(doc, &bytes, &inner, out, depth + 1);
            }
            _ => {}
        }
    }
}

fn shown_string(operand: &Object) -> Option<String> {
    match operand {
        Object::String(bytes, _) => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        _ => None,
    }
}

// -- Items --------------------------------------------------------------------

/// A scripted item: metadata in insertion order, optional owners, and keys
/// whose lookup fails. Records every key it is asked for.
#[derive(Debug, Default)]
pub struct FixtureItem {
    handle: String,
    values: Vec<MetadataValue>,
    community: Option<String>,
    collection: Option<String>,
    failing: Vec<MetadataKey>,
    lookups: Mutex<Vec<String>>,
}

impl FixtureItem {
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.to_string(),
            ..Self::default()
        }
    }

    /// Add a value under a concrete `schema.element[.qualifier]` key.
    pub fn with(mut self, key: &str, text: &str) -> Self {
        let key = MetadataKey::parse(key).expect("fixture metadata key");
        let ordinal = self.values.len() as u32;
        self.values.push(MetadataValue {
            key,
            text: text.to_string(),
            ordinal,
        });
        self
    }

    pub fn with_community(mut self, name: &str) -> Self {
        self.community = Some(name.to_string());
        self
    }

    pub fn with_collection(mut self, name: &str) -> Self {
        self.collection = Some(name.to_string());
        self
    }

    pub fn failing_on(mut self, key: &str) -> Self {
        self.failing.push(MetadataKey::parse(key).expect("fixture metadata key"));
        self
    }

    /// Keys looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups
            .lock()
            .map(|lookups| lookups.clone())
            .unwrap_or_default()
    }
}

impl CitableItem for FixtureItem {
    fn handle(&self) -> String {
        self.handle.clone()
    }

    fn metadata_values(&self, key: &MetadataKey) -> Result<Vec<MetadataValue>> {
        if let Ok(mut lookups) = self.lookups.lock() {
            lookups.push(key.to_string());
        }
        if self.failing.contains(key) {
            return Err(CitepageError::Io(std::io::Error::other(
                "metadata repository unavailable",
            )));
        }
        Ok(self
            .values
            .iter()
            .filter(|value| key.matches(&value.key))
            .cloned()
            .collect())
    }

    fn owning_collection_name(&self) -> Option<String> {
        self.collection.clone()
    }

    fn owning_community_name(&self) -> Option<String> {
        self.community.clone()
    }
}
