use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::rewrite::StatementFormat;

#[derive(Debug, Parser)]
#[command(author, version, about = "Reconcile survey codeplans between metadata documents and spreadsheets", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Validate every sheet of a workbook and summarize its codeplans
    Check(CheckArgs),
    /// Print the tree or axis expression of one codeplan
    Tree(TreeArgs),
    /// Merge workbook sheets into a metadata document through an adapter file
    Merge(MergeArgs),
    /// Compute the rename table of a metadata document
    Rename(RenameArgs),
    /// Rewrite a coding statement file after a merge
    Rewrite(RewriteArgs),
    /// Append the category sets and variables of one document to another
    Append(AppendArgs),
    /// Compare two waves of a metadata document
    Compare(CompareArgs),
}

/// Label kept for a code that appears with several labels in one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TieBreak {
    /// Greatest label by string ordering
    #[default]
    Max,
    /// Label of the first row mentioning the code
    First,
}

#[derive(Debug, Clone, Args)]
pub struct SheetOptions {
    /// 1-based column holding the codes; labels are read from the next column
    #[arg(long, default_value_t = 1)]
    pub code_column: usize,
    /// Sheet delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the sheet files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Keep sheets without a single valid row
    #[arg(long)]
    pub keep_empty: bool,
    /// How a code's label is chosen when rows disagree
    #[arg(long, value_enum, default_value_t = TieBreak::Max)]
    pub tie_break: TieBreak,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Workbook directory, single sheet file, or '-' for one sheet on stdin
    #[arg(short, long)]
    pub workbook: PathBuf,
    #[command(flatten)]
    pub sheet: SheetOptions,
    /// Print the summaries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Workbook directory, single sheet file, or '-' for one sheet on stdin
    #[arg(short, long, conflicts_with = "document", requires = "sheet_name")]
    pub workbook: Option<PathBuf>,
    /// Sheet to print
    #[arg(long = "sheet")]
    pub sheet_name: Option<String>,
    /// Metadata document (YAML)
    #[arg(short, long, requires = "codeplan")]
    pub document: Option<PathBuf>,
    /// Category set to print
    #[arg(long)]
    pub codeplan: Option<String>,
    /// Print the serialized axis expression instead of the outline
    #[arg(long)]
    pub axis: bool,
    #[command(flatten)]
    pub sheet: SheetOptions,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Metadata document (YAML) to merge into
    #[arg(short, long)]
    pub document: PathBuf,
    /// Workbook directory, single sheet file, or '-' for one sheet on stdin
    #[arg(short, long)]
    pub workbook: PathBuf,
    /// Adapter file mapping category sets to sheets
    #[arg(short, long)]
    pub adapter: PathBuf,
    /// Destination for the merged document
    #[arg(short, long)]
    pub output: PathBuf,
    /// Destination for the rename table
    #[arg(long)]
    pub rename_table: Option<PathBuf>,
    /// Destination for the redirect maps
    #[arg(long)]
    pub redirects: Option<PathBuf>,
    /// Log a line diff of every merged tree
    #[arg(long)]
    pub show_diff: bool,
    #[command(flatten)]
    pub sheet: SheetOptions,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Metadata document (YAML)
    #[arg(short, long)]
    pub document: PathBuf,
    /// Destination for the rename table (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// List only variables whose coding field is not the helper field
    #[arg(long)]
    pub renamed_only: bool,
}

#[derive(Debug, Args)]
pub struct RewriteArgs {
    /// Coding statement file ('-' for stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination file (stdout when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Rename table written by `merge` or `rename`
    #[arg(long)]
    pub rename_table: PathBuf,
    /// Redirect maps written by `merge`
    #[arg(long)]
    pub redirects: Option<PathBuf>,
    /// Statement style of the input file
    #[arg(long, value_enum, default_value_t = StatementFormat::Verbaco)]
    pub format: StatementFormat,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct AppendArgs {
    /// Document receiving the new entries
    #[arg(short, long)]
    pub document: PathBuf,
    /// Document whose entries are appended
    #[arg(long)]
    pub other: PathBuf,
    /// Destination for the combined document
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct CompareArgs {
    /// Earlier wave
    #[arg(long)]
    pub previous: PathBuf,
    /// Later wave
    #[arg(long)]
    pub current: PathBuf,
    /// Print the differences as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
