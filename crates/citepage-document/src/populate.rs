// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template population: fill every form field from the item's metadata, then
// flatten the form into a static single page.

use citepage_core::CitableItem;
use citepage_core::error::CitepageError;
use tracing::{debug, instrument, warn};

use crate::form::{FlattenedPage, TemplateForm};
use crate::resolve::FieldValueResolver;

/// Fills cover page templates for one item at a time.
pub struct TemplateFieldPopulator<'a> {
    resolver: FieldValueResolver<'a>,
}

impl<'a> TemplateFieldPopulator<'a> {
    pub fn new(resolver: FieldValueResolver<'a>) -> Self {
        Self { resolver }
    }

    /// Fill `form` from `item` and flatten it.
    ///
    /// Fields that resolve to nothing keep the template's own value. A field
    /// that cannot take text is logged and skipped; only document-level
    /// failures abort.
    #[instrument(skip_all, fields(item = %item.handle()))]
    pub fn populate(
        &self,
        mut form: TemplateForm,
        item: &dyn CitableItem,
    ) -> Result<FlattenedPage, CitepageError> {
        let mut filled = 0usize;
        for name in form.field_names() {
            let Some(value) = self.resolver.resolve(&name, item) else {
                debug!(field = %name, "no value, leaving template default");
                continue;
            };
            match form.set_text(&name, &value) {
                Ok(()) => filled += 1,
                Err(err) if err.is_recoverable() => {
                    warn!(field = %name, item = %item.handle(), %err, "Error in processing field");
                }
                Err(err) => return Err(err),
            }
        }
        debug!(filled, "template populated");
        form.flatten()
    }
}
