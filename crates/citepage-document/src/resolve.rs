// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field value resolution: maps a cover page form field name to the text it
// should receive, following `|`-separated alternatives and joining repeated
// values with "; ".

use std::borrow::Cow;
use std::collections::HashSet;

use citepage_core::error::{CitepageError, Result};
use citepage_core::{CitableItem, FieldSpec, MetadataKey, MetadataValue, VALUE_SEPARATOR};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Written into `community`/`collection` fields when the item has no owner,
/// so the placeholder never keeps its template default.
pub const BLANK_PLACEHOLDER: &str = " ";

/// A tag is `<` followed by a non-space; `a < b` survives untouched.
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^ ][^>]*>").unwrap());

/// Resolves form field names against an item's metadata.
pub struct FieldValueResolver<'a> {
    /// Metadata keys whose values get HTML tags removed.
    html_fields: &'a HashSet<String>,
}

impl<'a> FieldValueResolver<'a> {
    pub fn new(html_fields: &'a HashSet<String>) -> Self {
        Self { html_fields }
    }

    /// Text for `field_name`, or `None` when nothing resolves (the field is
    /// then left as the template has it).
    pub fn resolve(&self, field_name: &str, item: &dyn CitableItem) -> Option<String> {
        self.resolve_spec(&FieldSpec::parse(field_name), item)
    }

    pub fn resolve_spec(&self, spec: &FieldSpec, item: &dyn CitableItem) -> Option<String> {
        match spec {
            FieldSpec::Community => Some(or_blank(item.owning_community_name())),
            FieldSpec::Collection => Some(or_blank(item.owning_collection_name())),
            FieldSpec::Alternatives(tokens) => tokens
                .iter()
                .find_map(|token| self.resolve_alternative(token, item)),
        }
    }

    /// Joined, non-blank text of one alternative, or `None` to move on to the
    /// next one. Lookup failures are logged and count as "no values".
    fn resolve_alternative(&self, token: &str, item: &dyn CitableItem) -> Option<String> {
        let mut values = match lookup(token, item) {
            Ok(values) => values,
            Err(err) => {
                warn!(field = token, item = %item.handle(), %err, "Error in processing field");
                return None;
            }
        };
        values.sort_by_key(|value| value.ordinal);

        let strip_tags = self.html_fields.contains(token) || self.html_fields.contains(token.trim());
        let parts: Vec<String> = values
            .iter()
            .map(|value| sanitize_value(&value.text, strip_tags))
            .filter(|text| !is_blank(text))
            .collect();

        if parts.is_empty() {
            debug!(field = token, candidates = values.len(), "no usable values");
            return None;
        }
        Some(parts.join(VALUE_SEPARATOR))
    }
}

fn lookup(token: &str, item: &dyn CitableItem) -> Result<Vec<MetadataValue>> {
    let key = MetadataKey::parse(token).map_err(|err| CitepageError::FieldResolution {
        field: token.to_string(),
        reason: err.to_string(),
    })?;
    item.metadata_values(&key)
        .map_err(|err| CitepageError::FieldResolution {
            field: key.to_string(),
            reason: err.to_string(),
        })
}

/// Only whitespace. No-break spaces are content, so `&nbsp;` survives.
fn is_blank(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() && !matches!(c, '\u{00A0}' | '\u{2007}' | '\u{202F}'))
}

fn or_blank(name: Option<String>) -> String {
    name.filter(|name| !name.is_empty())
        .unwrap_or_else(|| BLANK_PLACEHOLDER.to_string())
}

/// Remove HTML tags, leaving the text between them.
pub fn strip_html_tags(text: &str) -> Cow<'_, str> {
    HTML_TAG.replace_all(text, "")
}

/// Decode HTML character references (`&amp;`, `&#233;`, `&eacute;`, ...).
pub fn decode_entities(text: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(text)
}

/// Prepare one stored value for a text field: optionally strip tags, then
/// decode entities.
pub fn sanitize_value(text: &str, strip_tags: bool) -> String {
    if strip_tags {
        decode_entities(&strip_html_tags(text)).into_owned()
    } else {
        decode_entities(text).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::FixtureItem;

    fn no_html() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn joins_multiple_values_in_order() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.contributor.author", "Doe, Jane")
            .with("dc.contributor.author", "Roe, Richard");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("dc.contributor.author", &item).as_deref(),
            Some("Doe, Jane; Roe, Richard")
        );
    }

    #[test]
    fn blank_values_do_not_leave_double_separators() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.subject", "X")
            .with("dc.subject", "")
            .with("dc.subject", "Y");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(resolver.resolve("dc.subject", &item).as_deref(), Some("X; Y"));
    }

    #[test]
    fn trailing_blank_value_leaves_no_separator() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.subject", "X")
            .with("dc.subject", "   ");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(resolver.resolve("dc.subject", &item).as_deref(), Some("X"));
    }

    #[test]
    fn no_break_space_is_not_blank() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.title", "&nbsp;")
            .with("dc.title.alternative", "Fallback");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("dc.title|dc.title.alternative", &item).as_deref(),
            Some("\u{00A0}")
        );
        assert!(is_blank(" \t\n"));
        assert!(!is_blank("\u{202F}"));
    }

    #[test]
    fn falls_back_past_blank_alternative_and_stops() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.creator", " ")
            .with("dc.contributor.author", "Doe, Jane")
            .with("dc.contributor.editor", "Never, Used");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);

        let text = resolver.resolve("dc.creator|dc.contributor.author|dc.contributor.editor", &item);
        assert_eq!(text.as_deref(), Some("Doe, Jane"));
        assert_eq!(
            item.lookups(),
            vec!["dc.creator".to_string(), "dc.contributor.author".to_string()]
        );
    }

    #[test]
    fn alternative_tokens_are_trimmed_for_lookup() {
        let item = FixtureItem::new("123456789/1").with("dc.date.issued", "2019");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("dc.date.available | dc.date.issued", &item).as_deref(),
            Some("2019")
        );
    }

    #[test]
    fn nothing_resolves_to_none() {
        let item = FixtureItem::new("123456789/1");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(resolver.resolve("dc.title|dc.title.alternative", &item), None);
    }

    #[test]
    fn lookup_failures_are_skipped() {
        let item = FixtureItem::new("123456789/1")
            .failing_on("dc.broken")
            .with("dc.title", "Recovered");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("dc.broken|not-a-key|dc.title", &item).as_deref(),
            Some("Recovered")
        );
        assert_eq!(resolver.resolve("dc.broken", &item), None);
    }

    #[test]
    fn html_fields_lose_their_tags() {
        let item = FixtureItem::new("123456789/1").with("dc.description.abstract", "<b>Name</b>");
        let html: HashSet<String> = HashSet::from(["dc.description.abstract".to_string()]);
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("dc.description.abstract", &item).as_deref(),
            Some("Name")
        );
    }

    #[test]
    fn other_fields_keep_tags_but_decode_entities() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.title", "<b>Name</b>")
            .with("dc.publisher", "Smith &amp; Sons &eacute;dition");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(resolver.resolve("dc.title", &item).as_deref(), Some("<b>Name</b>"));
        assert_eq!(
            resolver.resolve("dc.publisher", &item).as_deref(),
            Some("Smith & Sons édition")
        );
    }

    #[test]
    fn values_that_are_only_markup_count_as_blank() {
        let item = FixtureItem::new("123456789/1")
            .with("dc.title", "<br/>")
            .with("dc.title.alternative", "Fallback");
        let html: HashSet<String> = HashSet::from(["dc.title".to_string()]);
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("dc.title|dc.title.alternative", &item).as_deref(),
            Some("Fallback")
        );
    }

    #[test]
    fn strip_keeps_comparisons() {
        assert_eq!(strip_html_tags("a < b and <i>c</i>"), "a < b and c");
    }

    #[test]
    fn community_without_owner_is_a_blank_space() {
        let item = FixtureItem::new("123456789/1");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(resolver.resolve("community", &item).as_deref(), Some(" "));
        assert_eq!(resolver.resolve("collection", &item).as_deref(), Some(" "));
    }

    #[test]
    fn owners_are_resolved_by_name() {
        let item = FixtureItem::new("123456789/1")
            .with_community("Faculty of Science")
            .with_collection("Doctoral Theses");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        assert_eq!(
            resolver.resolve("community", &item).as_deref(),
            Some("Faculty of Science")
        );
        assert_eq!(
            resolver.resolve("collection", &item).as_deref(),
            Some("Doctoral Theses")
        );
        assert!(item.lookups().is_empty());
    }

    #[test]
    fn combined_owner_names_are_plain_metadata_lookups() {
        let item = FixtureItem::new("123456789/1").with_community("Faculty of Science");
        let html = no_html();
        let resolver = FieldValueResolver::new(&html);
        // "community" and "collection" are not metadata keys, so nothing resolves.
        assert_eq!(resolver.resolve("community|collection", &item), None);
    }
}
