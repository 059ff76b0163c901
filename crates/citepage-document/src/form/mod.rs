// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Cover page template forms: enumerate AcroForm fields, write text into
// them, and flatten the result into a single static page.

pub mod appearance;

use std::path::Path;

use citepage_core::error::CitepageError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, info, instrument, warn};

use crate::pdf::page::{
    catalog_id, keep_first_page, page_resources, pdf_err, rect, rect_object, resolve,
    resolve_dict, resource_category, wrap_page_contents,
};
use crate::pdf::reader::{PdfReader, save_to_bytes};
use crate::pdf::text::{decode_text_string, encode_text_string};
use appearance::{DefaultAppearance, Quadding, TextLayout, text_appearance};

/// Field flag bit 13 (1-based): the text field spans several lines.
const FLAG_MULTILINE: u32 = 1 << 12;
/// Annotation flags that keep a widget from being drawn.
const ANNOT_HIDDEN: i64 = 1 << 1;
const ANNOT_NO_VIEW: i64 = 1 << 5;
/// Guard against cyclic /Kids.
const MAX_FIELD_DEPTH: usize = 32;

/// Kind of an interactive form field (/FT).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Choice,
    Button,
    Signature,
    Unknown,
}

impl FieldKind {
    fn from_ft(ft: Option<&[u8]>) -> Self {
        match ft {
            Some(b"Tx") => Self::Text,
            Some(b"Ch") => Self::Choice,
            Some(b"Btn") => Self::Button,
            Some(b"Sig") => Self::Signature,
            _ => Self::Unknown,
        }
    }

    fn accepts_text(self) -> bool {
        matches!(self, Self::Text | Self::Choice | Self::Unknown)
    }
}

/// A terminal form field and the widgets that display it.
#[derive(Debug, Clone)]
pub struct FormField {
    /// Fully qualified name: partial names joined with `.`.
    pub name: String,
    pub id: ObjectId,
    pub kind: FieldKind,
    pub flags: u32,
    /// Default appearance string, inherited from ancestors or the form.
    pub default_appearance: Option<String>,
    pub quadding: i64,
    pub widgets: Vec<ObjectId>,
}

impl FormField {
    pub fn is_multiline(&self) -> bool {
        self.flags & FLAG_MULTILINE != 0
    }
}

/// Attributes a field inherits from its ancestors.
#[derive(Debug, Clone, Default)]
struct Inherited {
    name: Option<String>,
    ft: Option<Vec<u8>>,
    flags: Option<u32>,
    da: Option<String>,
    quadding: Option<i64>,
}

/// A loaded, still-interactive cover page template.
///
/// Filling is in place ([`TemplateForm::set_text`]); flattening consumes the
/// form, so a flattened template can never be filled again.
pub struct TemplateForm {
    document: Document,
    fields: Vec<FormField>,
    /// Font resources from the form's /DR, used by generated appearances.
    fonts: Dictionary,
    /// Helvetica added on demand for fonts the form does not provide.
    fallback_font: Option<ObjectId>,
}

impl TemplateForm {
    // -- Construction ---------------------------------------------------------

    /// Load the template at `path`; a path that does not exist is a
    /// deployment error, reported as [`CitepageError::MissingTemplate`].
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CitepageError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CitepageError::MissingTemplate {
                path: path.to_path_buf(),
            });
        }
        Self::from_document(PdfReader::open(path)?.into_document())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CitepageError> {
        Self::from_document(PdfReader::from_bytes(data)?.into_document())
    }

    fn from_document(document: Document) -> Result<Self, CitepageError> {
        if document.get_pages().is_empty() {
            return Err(CitepageError::Pdf("template has no pages".to_string()));
        }
        let mut fields = Vec::new();
        let mut fonts = Dictionary::new();

        if let Some(acroform) = acroform(&document) {
            fonts = acroform
                .get(b"DR")
                .ok()
                .and_then(|dr| resolve_dict(&document, dr))
                .map(|dr| resource_category(&document, dr, b"Font"))
                .unwrap_or_default();

            let inherited = Inherited {
                da: acroform
                    .get(b"DA")
                    .ok()
                    .and_then(|da| text_value(&document, da)),
                quadding: acroform.get(b"Q").and_then(Object::as_i64).ok(),
                ..Inherited::default()
            };
            let roots = acroform
                .get(b"Fields")
                .ok()
                .and_then(|value| resolve(&document, value))
                .and_then(|value| value.as_array().ok())
                .cloned()
                .unwrap_or_default();
            for root in roots {
                if let Object::Reference(id) = root {
                    collect_fields(&document, id, &inherited, &mut fields, 0);
                }
            }
        }

        debug!(fields = fields.len(), "template form loaded");
        Ok(Self {
            document,
            fields,
            fonts,
            fallback_font: None,
        })
    }

    // -- Inspection -----------------------------------------------------------

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    /// Distinct field names in the order the form declares them.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if !names.contains(&field.name) {
                names.push(field.name.clone());
            }
        }
        names
    }

    // -- Filling --------------------------------------------------------------

    /// Set the value of every field named `name` and regenerate its widget
    /// appearances.
    pub fn set_text(&mut self, name: &str, value: &str) -> Result<(), CitepageError> {
        let targets: Vec<FormField> = self
            .fields
            .iter()
            .filter(|field| field.name == name)
            .cloned()
            .collect();
        if targets.is_empty() {
            return Err(CitepageError::FieldResolution {
                field: name.to_string(),
                reason: "no such form field".to_string(),
            });
        }

        for field in targets {
            if !field.kind.accepts_text() {
                return Err(CitepageError::FieldResolution {
                    field: name.to_string(),
                    reason: format!("{:?} fields do not take text", field.kind),
                });
            }
            let text = if field.is_multiline() {
                value.replace("\r\n", "\n")
            } else {
                value.replace(['\r', '\n', '\t'], " ")
            };

            self.document
                .get_object_mut(field.id)
                .and_then(Object::as_dict_mut)
                .map_err(|err| pdf_err("form field is not a dictionary", err))?
                .set("V", encode_text_string(&text));

            for widget in &field.widgets {
                self.write_appearance(&field, *widget, &text)?;
            }
        }
        Ok(())
    }

    fn write_appearance(
        &mut self,
        field: &FormField,
        widget_id: ObjectId,
        text: &str,
    ) -> Result<(), CitepageError> {
        let widget = self
            .document
            .get_dictionary(widget_id)
            .map_err(|err| pdf_err("widget is not a dictionary", err))?;
        let Some([llx, lly, urx, ury]) = widget
            .get(b"Rect")
            .ok()
            .and_then(|value| rect(&self.document, value))
        else {
            warn!(field = %field.name, "widget without /Rect, appearance not generated");
            return Ok(());
        };
        let (width, height) = (urx - llx, ury - lly);

        let da = DefaultAppearance::parse(field.default_appearance.as_deref().unwrap_or(""));
        let font = self.font_resource(&da.font);
        let content = text_appearance(
            &TextLayout {
                text,
                width,
                height,
                multiline: field.is_multiline(),
                quadding: Quadding::from_q(field.quadding),
            },
            &da,
        )
        .map_err(|err| pdf_err("failed to encode appearance", err))?;

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => rect_object([0.0, 0.0, width, height]),
                "Resources" => dictionary! {
                    "Font" => Dictionary::from_iter([(da.font.as_bytes().to_vec(), font)]),
                },
            },
            content,
        );
        let stream_id = self.document.add_object(stream);

        let widget = self
            .document
            .get_object_mut(widget_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err("widget is not a dictionary", err))?;
        widget.set("AP", dictionary! { "N" => stream_id });
        Ok(())
    }

    /// The font object for resource `name`. Appearance text is written as
    /// WinAnsi bytes, so a font from the form's /DR is used only when it is
    /// WinAnsi encoded; anything else gets a shared Helvetica.
    fn font_resource(&mut self, name: &str) -> Object {
        let from_form = self
            .fonts
            .get(name.as_bytes())
            .ok()
            .filter(|font| is_win_ansi_font(&self.document, font))
            .cloned();
        if let Some(font) = from_form {
            return font;
        }
        let id = match self.fallback_font {
            Some(id) => id,
            None => {
                debug!(font = name, "no WinAnsi font of that name in /DR, using Helvetica");
                let id = self.document.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "Encoding" => "WinAnsiEncoding",
                });
                self.fallback_font = Some(id);
                id
            }
        };
        Object::Reference(id)
    }

    // -- Flattening -----------------------------------------------------------

    /// Burn every visible widget appearance into its page, drop the
    /// interactive form, and keep only the first page.
    #[instrument(skip_all, fields(fields = self.fields.len()))]
    pub fn flatten(mut self) -> Result<FlattenedPage, CitepageError> {
        let page_ids: Vec<ObjectId> = self.document.get_pages().values().copied().collect();
        let mut drawn = 0usize;
        for page_id in page_ids {
            drawn += flatten_page(&mut self.document, page_id, drawn)?;
        }

        let catalog = catalog_id(&self.document)?;
        self.document
            .get_object_mut(catalog)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err("catalog is not a dictionary", err))?
            .remove(b"AcroForm");

        keep_first_page(&mut self.document)?;
        self.document.prune_objects();

        let bytes = save_to_bytes(&mut self.document, "flattened cover page")?;
        info!(widgets = drawn, bytes = bytes.len(), "cover page flattened");
        Ok(FlattenedPage { bytes })
    }
}

/// Whether `font` maps bytes through plain WinAnsiEncoding, either by name or
/// as an encoding dictionary without /Differences.
fn is_win_ansi_font(doc: &Document, font: &Object) -> bool {
    let Some(encoding) = resolve_dict(doc, font)
        .and_then(|font| font.get(b"Encoding").ok())
        .and_then(|encoding| resolve(doc, encoding))
    else {
        return false;
    };
    match encoding {
        Object::Name(name) => name == b"WinAnsiEncoding",
        Object::Dictionary(dict) => {
            !dict.has(b"Differences")
                && matches!(
                    dict.get(b"BaseEncoding").and_then(Object::as_name),
                    Ok(b"WinAnsiEncoding")
                )
        }
        _ => false,
    }
}

/// The populated cover page as a standalone single-page PDF.
#[derive(Debug, Clone)]
pub struct FlattenedPage {
    bytes: Vec<u8>,
}

impl FlattenedPage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// -- Field tree ---------------------------------------------------------------

fn acroform(doc: &Document) -> Option<&Dictionary> {
    let catalog = doc.get_dictionary(catalog_id(doc).ok()?).ok()?;
    resolve_dict(doc, catalog.get(b"AcroForm").ok()?)
}

fn text_value(doc: &Document, value: &Object) -> Option<String> {
    match resolve(doc, value)? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

fn collect_fields(
    doc: &Document,
    id: ObjectId,
    parent: &Inherited,
    out: &mut Vec<FormField>,
    depth: usize,
) {
    if depth > MAX_FIELD_DEPTH {
        warn!(?id, "form field tree too deep, ignoring the rest");
        return;
    }
    let Ok(dict) = doc.get_dictionary(id) else {
        warn!(?id, "form field is not a dictionary");
        return;
    };

    let partial = dict.get(b"T").ok().and_then(|t| text_value(doc, t));
    let inherited = Inherited {
        name: match (&parent.name, partial) {
            (Some(prefix), Some(partial)) => Some(format!("{prefix}.{partial}")),
            (None, Some(partial)) => Some(partial),
            (prefix, None) => prefix.clone(),
        },
        ft: match dict.get(b"FT") {
            Ok(Object::Name(ft)) => Some(ft.clone()),
            _ => parent.ft.clone(),
        },
        flags: dict
            .get(b"Ff")
            .and_then(Object::as_i64)
            .ok()
            .map(|ff| ff as u32)
            .or(parent.flags),
        da: dict
            .get(b"DA")
            .ok()
            .and_then(|da| text_value(doc, da))
            .or_else(|| parent.da.clone()),
        quadding: dict.get(b"Q").and_then(Object::as_i64).ok().or(parent.quadding),
    };

    let kids: Vec<ObjectId> = dict
        .get(b"Kids")
        .ok()
        .and_then(|kids| resolve(doc, kids))
        .and_then(|kids| kids.as_array().ok())
        .map(|kids| kids.iter().filter_map(|kid| kid.as_reference().ok()).collect())
        .unwrap_or_default();

    let mut widgets = Vec::new();
    if kids.is_empty() {
        if is_widget(dict) {
            widgets.push(id);
        }
    } else {
        for kid in kids {
            let is_field = doc
                .get_dictionary(kid)
                .map(|kid| kid.has(b"T"))
                .unwrap_or(false);
            if is_field {
                collect_fields(doc, kid, &inherited, out, depth + 1);
            } else {
                widgets.push(kid);
            }
        }
        if widgets.is_empty() {
            return;
        }
    }

    let Some(name) = inherited.name else {
        debug!(?id, "unnamed form field ignored");
        return;
    };
    out.push(FormField {
        name,
        id,
        kind: FieldKind::from_ft(inherited.ft.as_deref()),
        flags: inherited.flags.unwrap_or(0),
        default_appearance: inherited.da,
        quadding: inherited.quadding.unwrap_or(0),
        widgets,
    });
}

fn is_widget(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(subtype)) if subtype == b"Widget")
}

// -- Flattening ---------------------------------------------------------------

/// An appearance stream to draw and where.
struct Placement {
    appearance: ObjectId,
    matrix: [f32; 6],
}

/// Flatten the widgets of one page. Returns how many appearances were drawn.
fn flatten_page(
    doc: &mut Document,
    page_id: ObjectId,
    already_drawn: usize,
) -> Result<usize, CitepageError> {
    let annots: Vec<Object> = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| resolve(doc, annots))
        .and_then(|annots| annots.as_array().ok())
        .cloned()
        .unwrap_or_default();
    if annots.is_empty() {
        return Ok(0);
    }

    let mut kept = Vec::new();
    let mut placements = Vec::new();
    for annot in annots {
        let Some(dict) = resolve_dict(doc, &annot) else {
            continue;
        };
        if !is_widget(dict) {
            kept.push(annot);
            continue;
        }
        let flags = dict.get(b"F").and_then(Object::as_i64).unwrap_or(0);
        if flags & (ANNOT_HIDDEN | ANNOT_NO_VIEW) != 0 {
            continue;
        }
        if let Some(placement) = placement_for(doc, dict) {
            placements.push(placement);
        }
    }

    let mut resources = page_resources(doc, page_id);
    let mut xobjects = resource_category(doc, &resources, b"XObject");
    let mut content = String::new();
    for (offset, placement) in placements.iter().enumerate() {
        let name = format!("FlatField{}", already_drawn + offset + 1);
        if let Ok(Object::Stream(stream)) = doc.get_object_mut(placement.appearance) {
            stream.dict.set("Type", "XObject");
            stream.dict.set("Subtype", "Form");
        }
        xobjects.set(name.as_bytes().to_vec(), Object::Reference(placement.appearance));
        let [a, b, c, d, e, f] = placement.matrix;
        content.push_str(&format!("q {a} {b} {c} {d} {e} {f} cm /{name} Do Q\n"));
    }

    {
        let page = doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|err| pdf_err("page is not a dictionary", err))?;
        if kept.is_empty() {
            page.remove(b"Annots");
        } else {
            page.set("Annots", Object::Array(kept));
        }
        if !placements.is_empty() {
            resources.set("XObject", Object::Dictionary(xobjects));
            page.set("Resources", Object::Dictionary(resources));
        }
    }

    if !placements.is_empty() {
        wrap_page_contents(doc, page_id, content.into_bytes())?;
    }
    Ok(placements.len())
}

/// Where a widget's normal appearance lands on the page: its BBox mapped
/// onto the widget /Rect.
fn placement_for(doc: &Document, widget: &Dictionary) -> Option<Placement> {
    let normal = resolve_dict(doc, widget.get(b"AP").ok()?)?.get(b"N").ok()?;
    let appearance = match normal {
        Object::Reference(id) => match doc.get_object(*id).ok()? {
            Object::Stream(_) => *id,
            // Appearance states, e.g. /On and /Off for buttons.
            Object::Dictionary(states) => {
                let state = widget.get(b"AS").ok()?.as_name().ok()?;
                states.get(state).ok()?.as_reference().ok()?
            }
            _ => return None,
        },
        Object::Dictionary(states) => {
            let state = widget.get(b"AS").ok()?.as_name().ok()?;
            states.get(state).ok()?.as_reference().ok()?
        }
        _ => return None,
    };

    let [llx, lly, urx, ury] = rect(doc, widget.get(b"Rect").ok()?)?;
    let bbox = match doc.get_object(appearance).ok()? {
        Object::Stream(stream) => stream
            .dict
            .get(b"BBox")
            .ok()
            .and_then(|bbox| rect(doc, bbox))
            .unwrap_or([0.0, 0.0, urx - llx, ury - lly]),
        _ => return None,
    };

    let bbox_width = bbox[2] - bbox[0];
    let bbox_height = bbox[3] - bbox[1];
    if bbox_width <= 0.0 || bbox_height <= 0.0 {
        return None;
    }
    let sx = (urx - llx) / bbox_width;
    let sy = (ury - lly) / bbox_height;
    Some(Placement {
        appearance,
        matrix: [sx, 0.0, 0.0, sy, llx - bbox[0] * sx, lly - bbox[1] * sy],
    })
}
