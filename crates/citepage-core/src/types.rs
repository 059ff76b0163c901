// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for citation page composition.

use serde::{Deserialize, Serialize};

use crate::error::CitepageError;

/// Form field name that receives the owning community name.
pub const COMMUNITY_FIELD: &str = "community";
/// Form field name that receives the owning collection name.
pub const COLLECTION_FIELD: &str = "collection";
/// Separator between alternative metadata keys in a form field name.
pub const ALTERNATIVE_SEPARATOR: char = '|';
/// Separator between multiple values of the same metadata field.
pub const VALUE_SEPARATOR: &str = "; ";
/// Wildcard component in a metadata key (matches any element or qualifier).
pub const ANY: &str = "*";

/// A `schema.element[.qualifier]` triple identifying a bibliographic field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataKey {
    pub schema: String,
    pub element: String,
    pub qualifier: Option<String>,
}

impl MetadataKey {
    pub fn new(schema: &str, element: &str, qualifier: Option<&str>) -> Self {
        Self {
            schema: schema.to_owned(),
            element: element.to_owned(),
            qualifier: qualifier.map(str::to_owned),
        }
    }

    /// Parse a dotted key such as `dc.contributor.author` or `dc.title`.
    ///
    /// Surrounding whitespace is ignored. Anything other than two or three
    /// non-empty components is rejected.
    pub fn parse(raw: &str) -> Result<Self, CitepageError> {
        let parts: Vec<&str> = raw.trim().split('.').collect();
        if parts.iter().any(|part| part.trim().is_empty()) {
            return Err(CitepageError::InvalidMetadataKey(raw.to_owned()));
        }
        match parts.as_slice() {
            [schema, element] => Ok(Self::new(schema, element, None)),
            [schema, element, qualifier] => Ok(Self::new(schema, element, Some(qualifier))),
            _ => Err(CitepageError::InvalidMetadataKey(raw.to_owned())),
        }
    }

    /// Whether a stored (concrete) key is selected by this lookup key.
    ///
    /// `*` matches any element or any qualifier (including none). A lookup
    /// key without a qualifier selects only unqualified values.
    pub fn matches(&self, stored: &MetadataKey) -> bool {
        if self.schema != stored.schema {
            return false;
        }
        if self.element != ANY && self.element != stored.element {
            return false;
        }
        match self.qualifier.as_deref() {
            Some(ANY) => true,
            Some(q) => stored.qualifier.as_deref() == Some(q),
            None => stored.qualifier.is_none(),
        }
    }
}

impl std::fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}.{}", self.schema, self.element, q),
            None => write!(f, "{}.{}", self.schema, self.element),
        }
    }
}

impl std::str::FromStr for MetadataKey {
    type Err = CitepageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A single stored metadata value. `ordinal` preserves storage order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub key: MetadataKey,
    pub text: String,
    pub ordinal: u32,
}

/// How a form field name is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// Exactly `community`: the owning community name.
    Community,
    /// Exactly `collection`: the owning collection name.
    Collection,
    /// One or more metadata keys tried in order; tokens are kept verbatim.
    Alternatives(Vec<String>),
}

impl FieldSpec {
    pub fn parse(field_name: &str) -> Self {
        match field_name {
            COMMUNITY_FIELD => Self::Community,
            COLLECTION_FIELD => Self::Collection,
            other => Self::Alternatives(
                other
                    .split(ALTERNATIVE_SEPARATOR)
                    .map(str::to_owned)
                    .collect(),
            ),
        }
    }
}

impl std::fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Community => write!(f, "owning community"),
            Self::Collection => write!(f, "owning collection"),
            Self::Alternatives(tokens) => write!(f, "first of [{}]", tokens.join(", ")),
        }
    }
}

/// Where the citation page goes in the composed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PagePlacement {
    First,
    Last,
}

impl PagePlacement {
    pub fn from_first_page_flag(citation_as_first_page: bool) -> Self {
        if citation_as_first_page {
            Self::First
        } else {
            Self::Last
        }
    }
}

/// A stored file attached to an item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bitstream {
    pub name: String,
    pub mime_type: String,
    /// Names of the bundles (e.g. `ORIGINAL`, `DISPLAY`) holding this file.
    pub bundles: Vec<String>,
}

/// Who is asking for the rendition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub is_admin: bool,
}

/// A freshly composed rendition. Never persisted by citepage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitedDocument {
    pub bytes: Vec<u8>,
    pub len: u64,
}

impl CitedDocument {
    pub fn new(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        Self { bytes, len }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_qualified_key() {
        let key = MetadataKey::parse(" dc.contributor.author ").unwrap();
        assert_eq!(key, MetadataKey::new("dc", "contributor", Some("author")));
        assert_eq!(key.to_string(), "dc.contributor.author");
    }

    #[test]
    fn parse_rejects_malformed_keys() {
        for raw in ["dc", "", "dc..title", "a.b.c.d", "dc.title."] {
            assert!(
                matches!(
                    MetadataKey::parse(raw),
                    Err(CitepageError::InvalidMetadataKey(_))
                ),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn unqualified_lookup_selects_only_unqualified_values() {
        let lookup = MetadataKey::parse("dc.title").unwrap();
        assert!(lookup.matches(&MetadataKey::new("dc", "title", None)));
        assert!(!lookup.matches(&MetadataKey::new("dc", "title", Some("alternative"))));
    }

    #[test]
    fn wildcard_qualifier_selects_everything() {
        let lookup = MetadataKey::parse("dc.contributor.*").unwrap();
        assert!(lookup.matches(&MetadataKey::new("dc", "contributor", None)));
        assert!(lookup.matches(&MetadataKey::new("dc", "contributor", Some("editor"))));
        assert!(!lookup.matches(&MetadataKey::new("dcterms", "contributor", None)));
    }

    #[test]
    fn reserved_field_names_are_exact() {
        assert_eq!(FieldSpec::parse("community"), FieldSpec::Community);
        assert_eq!(FieldSpec::parse("collection"), FieldSpec::Collection);
        assert_eq!(
            FieldSpec::parse("Community"),
            FieldSpec::Alternatives(vec!["Community".into()])
        );
        // Not split into the reserved names; falls through to metadata lookup.
        assert_eq!(
            FieldSpec::parse("community|collection"),
            FieldSpec::Alternatives(vec!["community".into(), "collection".into()])
        );
    }

    #[test]
    fn alternatives_keep_raw_tokens() {
        assert_eq!(
            FieldSpec::parse("dc.creator| dc.contributor.author"),
            FieldSpec::Alternatives(vec!["dc.creator".into(), " dc.contributor.author".into()])
        );
    }

    #[test]
    fn placement_from_flag() {
        assert_eq!(PagePlacement::from_first_page_flag(true), PagePlacement::First);
        assert_eq!(PagePlacement::from_first_page_flag(false), PagePlacement::Last);
    }
}
