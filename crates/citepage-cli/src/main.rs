// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// citepage — add citation cover pages to PDFs.
//
// Entry point. Initialises logging, parses the command line, and dispatches
// to the compose or field listing commands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use citepage_core::error::{CitepageError, Result};
use citepage_core::{Bitstream, CitationConfig, FieldSpec, RequestContext};
use citepage_document::TemplateForm;
use citepage_service::{
    CitationDocumentService, DirectoryStore, RecordItem, StaticDirectory, telemetry,
};

/// Bundle assumed for files given on the command line.
const ORIGINAL_BUNDLE: &str = "ORIGINAL";

#[derive(Parser)]
#[command(name = "citepage")]
#[command(version)]
#[command(about = "Add citation cover pages to PDFs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a cited copy of a PDF
    Compose {
        /// Citation page configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Item record with the metadata to cite (JSON)
        #[arg(short, long)]
        item: PathBuf,

        /// Original PDF
        #[arg(long)]
        input: PathBuf,

        /// Where to write the cited PDF
        #[arg(short, long)]
        output: PathBuf,

        /// Put the citation page after the last page
        #[arg(long)]
        last_page: bool,

        /// Community hierarchy used to expand enabled communities (JSON)
        #[arg(long)]
        directory: Option<PathBuf>,

        /// Compose even when the configuration does not enable citation
        /// pages for this item
        #[arg(long)]
        force: bool,
    },

    /// List the form fields of a template and how each is resolved
    Fields {
        /// Cover page template (PDF form)
        #[arg(short, long)]
        template: PathBuf,
    },
}

struct ComposeArgs {
    config: PathBuf,
    item: PathBuf,
    input: PathBuf,
    output: PathBuf,
    last_page: bool,
    directory: Option<PathBuf>,
    force: bool,
}

fn main() -> ExitCode {
    telemetry::init_tracing(None);

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Compose {
            config,
            item,
            input,
            output,
            last_page,
            directory,
            force,
        } => compose(ComposeArgs {
            config,
            item,
            input,
            output,
            last_page,
            directory,
            force,
        }),
        Commands::Fields { template } => fields(&template),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "citepage failed");
            ExitCode::FAILURE
        }
    }
}

fn compose(args: ComposeArgs) -> Result<()> {
    let mut config = CitationConfig::load(&args.config)?;
    if args.last_page {
        config.citation_as_first_page = false;
    }
    let directory = match &args.directory {
        Some(path) => StaticDirectory::load(path)?,
        None => StaticDirectory::default(),
    };
    let service = CitationDocumentService::new(config.freeze(&directory));
    let item = RecordItem::load(&args.item)?;

    let (store, bitstream) = local_bitstream(&args.input)?;
    if !args.force
        && !service.is_citation_enabled_for(&bitstream, &item, &RequestContext::default())
    {
        return Err(CitepageError::NotEligible(format!(
            "{} of item {} (use --force to compose anyway)",
            bitstream.name, item.handle
        )));
    }

    let cited = service.make_cited_document(&bitstream, &item, &store)?;
    std::fs::write(&args.output, &cited.bytes)?;
    tracing::info!(
        output = %args.output.display(),
        bytes = cited.len,
        "cited document written"
    );
    Ok(())
}

/// Describe a file on disk as a bitstream served from its own directory.
fn local_bitstream(input: &Path) -> Result<(DirectoryStore, Bitstream)> {
    let name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            CitepageError::Config(format!("{} is not a file path", input.display()))
        })?;
    let root = input
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let bitstream = Bitstream {
        mime_type: mime_type_for(input).to_string(),
        name,
        bundles: vec![ORIGINAL_BUNDLE.to_string()],
    };
    Ok((DirectoryStore::new(root), bitstream))
}

fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn fields(template: &Path) -> Result<()> {
    let form = TemplateForm::open(template)?;
    let names = form.field_names();
    if names.is_empty() {
        println!("{}: no form fields", template.display());
        return Ok(());
    }
    for name in names {
        println!("{}\t{}", name, FieldSpec::parse(&name));
    }
    Ok(())
}
