//! Spreadsheet collaborator.
//!
//! A workbook is either a directory of `.csv`/`.tsv` files, one per sheet and
//! named after the file stem, or a single delimited file holding one sheet.
//! The path `-` reads one comma-delimited sheet named [`STDIN_SHEET`] from
//! standard input.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use encoding_rs::Encoding;
use log::debug;

use crate::{
    codeplan::Codeplan,
    io_utils,
    rows::{LabelTieBreak, SheetRow, classify},
};

pub const STDIN_SHEET: &str = "stdin";

#[derive(Debug, Clone, Copy)]
pub struct WorkbookOptions {
    /// 1-based column holding the code; the label is read from the next one.
    pub code_column: usize,
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
    pub keep_empty: bool,
}

impl Default for WorkbookOptions {
    fn default() -> Self {
        Self {
            code_column: 1,
            delimiter: None,
            encoding: encoding_rs::UTF_8,
            keep_empty: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
    codeplans: Vec<Codeplan>,
}

impl Workbook {
    pub fn load(path: &Path, options: &WorkbookOptions, tie_break: &dyn LabelTieBreak) -> Result<Self> {
        ensure!(options.code_column >= 1, "Code column is 1-based");
        let sheets = sheet_files(path)?;
        let mut codeplans = Vec::with_capacity(sheets.len());
        for (name, sheet_path) in sheets {
            let rows = read_sheet_rows(&sheet_path, options)
                .with_context(|| format!("Reading sheet '{name}' from {sheet_path:?}"))?;
            if !options.keep_empty && !rows.iter().any(|row| classify(&row.code).is_valid()) {
                debug!("Dropping empty sheet '{name}'");
                continue;
            }
            codeplans.push(Codeplan::from_rows(name, rows, tie_break));
        }
        Ok(Self {
            path: path.to_path_buf(),
            codeplans,
        })
    }

    pub fn from_codeplans(path: impl Into<PathBuf>, codeplans: Vec<Codeplan>) -> Self {
        Self {
            path: path.into(),
            codeplans,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn codeplans(&self) -> &[Codeplan] {
        &self.codeplans
    }

    pub fn codeplan(&self, name: &str) -> Option<&Codeplan> {
        self.codeplans.iter().find(|codeplan| codeplan.name() == name)
    }

    pub fn len(&self) -> usize {
        self.codeplans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codeplans.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.codeplans.iter().all(Codeplan::is_valid)
    }

    /// Every grammar error of every sheet, prefixed with the sheet name.
    pub fn errors(&self) -> Vec<String> {
        self.codeplans
            .iter()
            .flat_map(|codeplan| {
                codeplan
                    .errors()
                    .iter()
                    .map(move |error| format!("Codeplan \"{}\": {error}", codeplan.name()))
            })
            .collect()
    }
}

fn sheet_files(path: &Path) -> Result<Vec<(String, PathBuf)>> {
    if io_utils::is_dash(path) {
        return Ok(vec![(STDIN_SHEET.to_string(), path.to_path_buf())]);
    }
    if path.is_file() {
        return Ok(vec![(sheet_name(path)?, path.to_path_buf())]);
    }
    let entries = fs::read_dir(path).with_context(|| format!("Reading workbook directory {path:?}"))?;
    let mut sheets = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Listing {path:?}"))?;
        let sheet_path = entry.path();
        if sheet_path.is_file() && io_utils::is_sheet_file(&sheet_path) {
            sheets.push((sheet_name(&sheet_path)?, sheet_path));
        }
    }
    sheets.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(sheets)
}

fn sheet_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Sheet file {path:?} has no usable name"))
}

/// Reads `(code, label)` pairs from a sheet; missing cells read as empty.
pub fn read_sheet_rows(path: &Path, options: &WorkbookOptions) -> Result<Vec<SheetRow>> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let code_idx = options.code_column - 1;
    let mut rows = Vec::new();
    for (ordinal, record) in reader.byte_records().enumerate() {
        let index = ordinal + 1;
        let record = record.with_context(|| format!("Reading row {index}"))?;
        let cells = io_utils::decode_record(&record, options.encoding)
            .with_context(|| format!("Decoding row {index}"))?;
        let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or_default();
        rows.push(SheetRow::new(index, cell(code_idx), cell(code_idx + 1)));
    }
    Ok(rows)
}
