// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the citepage-document crate: resolving field
// values and composing a full cited document from fixture PDFs.

use std::collections::HashSet;
use std::io::Write;

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use citepage_core::PagePlacement;
use citepage_document::fixtures::{self, FixtureItem};
use citepage_document::{FieldValueResolver, PageComposer};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn item() -> FixtureItem {
    FixtureItem::new("123456789/42")
        .with("dc.title", "<i>Cover Pages</i> &amp; Their Discontents")
        .with("dc.contributor.author", "Doe, Jane")
        .with("dc.contributor.author", "Roe, Richard")
        .with("dc.date.issued", "2019-04-01")
}

/// Resolve a three-way alternative chain whose first two links are empty.
fn bench_resolve(c: &mut Criterion) {
    let item = item();
    let html: HashSet<String> = HashSet::from(["dc.title".to_string()]);
    let resolver = FieldValueResolver::new(&html);

    c.bench_function("resolve alternatives", |b| {
        b.iter(|| {
            black_box(resolver.resolve(
                black_box("dc.creator|dc.contributor.editor|dc.contributor.author"),
                &item,
            ))
        });
    });
}

/// Full compose: populate and flatten the template, then splice it in front
/// of a 20-page original.
fn bench_compose(c: &mut Criterion) {
    let mut template = tempfile::NamedTempFile::new().expect("temp template");
    template
        .write_all(&fixtures::citation_template(&[
            "dc.title",
            "dc.contributor.author",
            "dc.date.issued",
            "community",
        ]))
        .expect("write template");
    let original = fixtures::multi_page_pdf(20);
    let item = item();
    let html = HashSet::new();
    let composer = PageComposer::new(&html);

    c.bench_function("compose (20 pages)", |b| {
        b.iter(|| {
            let bytes = composer
                .compose(black_box(&original), &item, template.path(), PagePlacement::First)
                .expect("compose");
            black_box(bytes.len());
        });
    });
}

criterion_group!(benches, bench_resolve, bench_compose);
criterion_main!(benches);
