pub mod adapter;
pub mod axis;
pub mod cli;
pub mod code;
pub mod codeplan;
pub mod compare;
pub mod diff;
pub mod document;
pub mod error;
pub mod io_utils;
pub mod names;
pub mod reconcile;
pub mod rewrite;
pub mod rows;
pub mod table;
pub mod tree;
pub mod workbook;

use std::{env, fs, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use serde::Serialize;

use crate::{
    adapter::AdapterConfig,
    cli::{Cli, Commands, SheetOptions, TieBreak},
    codeplan::Codeplan,
    document::MetadataDocument,
    names::RenameTable,
    reconcile::{ReconcileOptions, RedirectMaps},
    rewrite::CodingRewriter,
    rows::{FirstSeen, LabelTieBreak, LexicographicMax},
    table::{Align, Table},
    workbook::{Workbook, WorkbookOptions},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("codeplan_sync", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Check(args) => handle_check(&args),
        Commands::Tree(args) => handle_tree(&args),
        Commands::Merge(args) => handle_merge(&args),
        Commands::Rename(args) => handle_rename(&args),
        Commands::Rewrite(args) => handle_rewrite(&args),
        Commands::Append(args) => handle_append(&args),
        Commands::Compare(args) => handle_compare(&args),
    }
}

fn tie_break(choice: TieBreak) -> &'static dyn LabelTieBreak {
    match choice {
        TieBreak::Max => &LexicographicMax,
        TieBreak::First => &FirstSeen,
    }
}

fn load_workbook(path: &Path, sheet: &SheetOptions) -> Result<Workbook> {
    let options = WorkbookOptions {
        code_column: sheet.code_column,
        delimiter: sheet.delimiter,
        encoding: io_utils::resolve_encoding(sheet.input_encoding.as_deref())?,
        keep_empty: sheet.keep_empty,
    };
    debug!(
        "Loading workbook {path:?} (code column {}, delimiter '{}')",
        options.code_column,
        options
            .delimiter
            .map(printable_delimiter)
            .unwrap_or_else(|| "auto".to_string())
    );
    let workbook = Workbook::load(path, &options, tie_break(sheet.tie_break))
        .with_context(|| format!("Loading workbook {path:?}"))?;
    info!("Loaded {} sheet(s) from {path:?}", workbook.len());
    Ok(workbook)
}

fn load_document(path: &Path) -> Result<MetadataDocument> {
    MetadataDocument::load(path).with_context(|| format!("Loading document from {path:?}"))
}

fn handle_check(args: &cli::CheckArgs) -> Result<()> {
    let workbook = load_workbook(&args.workbook, &args.sheet)?;
    let summaries = workbook
        .codeplans()
        .iter()
        .map(Codeplan::summary)
        .collect::<Vec<_>>();
    if args.json {
        print_json(&summaries)?;
    } else {
        let mut table = Table::new(["sheet", "codes", "nets", "combines", "doubled", "errors"])
            .align(1, Align::Right)
            .align(2, Align::Right)
            .align(3, Align::Right)
            .align(5, Align::Right);
        for summary in &summaries {
            table.push(vec![
                summary.name.clone(),
                summary.codes.to_string(),
                summary.nets.to_string(),
                summary.combines.to_string(),
                summary.doubled_display(),
                summary.errors.len().to_string(),
            ]);
        }
        table.print();
        for error in workbook.errors() {
            println!("{error}");
        }
    }
    if !workbook.is_valid() {
        bail!(
            "{} sheet(s) with errors in {:?}",
            workbook.codeplans().iter().filter(|c| !c.is_valid()).count(),
            args.workbook
        );
    }
    Ok(())
}

fn handle_tree(args: &cli::TreeArgs) -> Result<()> {
    let codeplan = match (&args.workbook, &args.document) {
        (Some(path), _) => {
            let name = args
                .sheet_name
                .as_deref()
                .ok_or_else(|| anyhow!("--sheet is required with --workbook"))?;
            let workbook = load_workbook(path, &args.sheet)?;
            workbook
                .codeplan(name)
                .cloned()
                .ok_or_else(|| anyhow!("Sheet '{name}' not found in {path:?}"))?
        }
        (None, Some(path)) => {
            let name = args
                .codeplan
                .as_deref()
                .ok_or_else(|| anyhow!("--codeplan is required with --document"))?;
            load_document(path)?
                .codeplan(name)
                .ok_or_else(|| anyhow!("Category set '{name}' not found in {path:?}"))?
        }
        (None, None) => bail!("Either --workbook or --document is required"),
    };
    let tree = codeplan
        .tree()
        .map_err(|errors| anyhow!("Codeplan '{}' has errors:\n{errors}", codeplan.name()))?;
    if args.axis {
        println!("{}", tree.axis());
    } else {
        print!("{}", tree.outline());
    }
    Ok(())
}

fn handle_merge(args: &cli::MergeArgs) -> Result<()> {
    let document = load_document(&args.document)?;
    let workbook = load_workbook(&args.workbook, &args.sheet)?;
    let adapter = AdapterConfig::load(&args.adapter)
        .with_context(|| format!("Loading adapter from {:?}", args.adapter))?;
    info!(
        "Merging {} mapping(s) from {:?} into {:?}",
        adapter.mappings.len(),
        args.workbook,
        args.document
    );
    let result = reconcile::reconcile(
        &document,
        &workbook,
        &adapter,
        ReconcileOptions {
            show_diff: args.show_diff,
        },
    );

    let mut table = Table::new(["sheet", "category set", "status", "detail"]);
    for report in &result.reports {
        table.push(vec![
            report.sheet.clone(),
            report.document.clone().unwrap_or_else(|| "-".to_string()),
            report.status_label().to_string(),
            report.detail(),
        ]);
    }
    table.print();

    if result.has_failures() {
        bail!(
            "{} mapping(s) could not be merged; nothing was written",
            result.failures().count()
        );
    }
    result
        .document
        .save(&args.output)
        .with_context(|| format!("Writing merged document to {:?}", args.output))?;
    info!("Merged document written to {:?}", args.output);
    if let Some(path) = &args.rename_table {
        write_yaml(path, &result.rename.table)?;
        info!("Rename table written to {path:?}");
    }
    if let Some(path) = &args.redirects {
        write_yaml(path, &result.redirects)?;
        info!(
            "Redirect maps for {} field(s) written to {path:?}",
            result.redirects.len()
        );
    }
    Ok(())
}

fn handle_rename(args: &cli::RenameArgs) -> Result<()> {
    let document = load_document(&args.document)?;
    let outcome = document.rename_outcome();
    for (label, error) in &outcome.errors {
        warn!("Variable '{label}' keeps its helper field: {error}");
    }
    let table = if args.renamed_only {
        outcome
            .table
            .renamed()
            .map(|(label, target)| (label.to_string(), target.to_string()))
            .collect::<std::collections::BTreeMap<_, _>>()
    } else {
        outcome
            .table
            .iter()
            .map(|(label, target)| (label.to_string(), target.to_string()))
            .collect()
    };
    let yaml = serde_yaml::to_string(&table).context("Serializing rename table")?;
    match &args.output {
        Some(path) => {
            fs::write(path, yaml).with_context(|| format!("Writing rename table to {path:?}"))?;
            info!("Rename table for {} variable(s) written to {path:?}", table.len());
        }
        None => print!("{yaml}"),
    }
    Ok(())
}

fn handle_rewrite(args: &cli::RewriteArgs) -> Result<()> {
    let renames: RenameTable = read_yaml(&args.rename_table)?;
    let redirects: RedirectMaps = match &args.redirects {
        Some(path) => read_yaml(path)?,
        None => RedirectMaps::default(),
    };
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let rewriter = CodingRewriter::new(args.format, &renames, &redirects)?;
    rewriter
        .rewrite_file(&args.input, args.output.as_deref(), encoding)
        .with_context(|| format!("Rewriting {:?}", args.input))?;
    Ok(())
}

fn handle_append(args: &cli::AppendArgs) -> Result<()> {
    let mut document = load_document(&args.document)?;
    let other = load_document(&args.other)?;
    let (sets, variables) = document.append(&other);
    document
        .save(&args.output)
        .with_context(|| format!("Writing document to {:?}", args.output))?;
    info!(
        "Appended {sets} category set(s) and {variables} variable(s) from {:?}",
        args.other
    );
    Ok(())
}

fn handle_compare(args: &cli::CompareArgs) -> Result<()> {
    let previous = load_document(&args.previous)?;
    let current = load_document(&args.current)?;
    let changes = compare::compare_documents(&previous, &current);
    if args.json {
        return print_json(&changes);
    }
    if changes.is_empty() {
        println!("No differences");
        return Ok(());
    }
    let mut table = Table::new(compare::headers());
    for change in &changes {
        table.push(change.to_row());
    }
    table.print();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Serializing JSON output")?;
    println!("{json}");
    Ok(())
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("Reading {path:?}"))?;
    serde_yaml::from_str(&text).with_context(|| format!("Parsing YAML from {path:?}"))
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(value).context("Serializing YAML")?;
    fs::write(path, yaml).with_context(|| format!("Writing {path:?}"))
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
