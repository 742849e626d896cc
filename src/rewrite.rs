//! Rewrites coding statement files after a merge.
//!
//! Each statement assigns code lists to coding fields, e.g.
//!
//! ```text
//! UPDATE vdata SET q7.Coding={CB_3,CB_4} WHERE Respondent.Serial = 17
//! UPDATE vdata SET q7.Coding = {CB_3}, q8.Coding = {CB_1} WHERE Respondent.Serial = 17
//! ```
//!
//! Fields are renamed through the rename table and codes moved through the
//! redirect map of their field. Codes that collapse onto the same target
//! appear once, at the position of their first occurrence.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use encoding_rs::Encoding;
use itertools::Itertools;
use log::{info, warn};
use regex::{Captures, Regex};

use crate::{
    code::{CODE_PREFIX, Code},
    io_utils,
    names::{HELPER_FIELD, RenameTable},
    reconcile::RedirectMaps,
};

const STATEMENT_PREFIX: &str = "UPDATE vdata SET ";
const CRITERIA_SEPARATOR: &str = " WHERE ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum StatementFormat {
    /// One assignment in the fourth space-separated token, no spaces around `=`
    #[default]
    Verbaco,
    /// Comma-separated assignments written as `field = {..}`
    Ascribe,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub statements: usize,
    pub passed_through: usize,
    pub renamed_fields: usize,
    pub redirected_codes: usize,
}

pub struct CodingRewriter<'a> {
    format: StatementFormat,
    renames: &'a RenameTable,
    redirects: &'a RedirectMaps,
    assignment: Regex,
}

impl<'a> CodingRewriter<'a> {
    pub fn new(
        format: StatementFormat,
        renames: &'a RenameTable,
        redirects: &'a RedirectMaps,
    ) -> Result<Self> {
        let assignment = Regex::new(r"(?P<field>[^\s=,]+?)\s*=\s*\{(?P<codes>[^{}]*)\}")
            .context("Compiling assignment pattern")?;
        Ok(Self {
            format,
            renames,
            redirects,
            assignment,
        })
    }

    /// Rewrites one statement without its line terminator. Lines that are not
    /// coding statements come back unchanged.
    pub fn rewrite_line(&self, line: &str, stats: &mut RewriteStats) -> String {
        let Some(rest) = line.strip_prefix(STATEMENT_PREFIX) else {
            stats.passed_through += 1;
            return line.to_string();
        };
        stats.statements += 1;
        match self.format {
            StatementFormat::Verbaco => {
                let mut tokens = line.split(' ').map(str::to_string).collect::<Vec<_>>();
                if let Some(token) = tokens.get_mut(3) {
                    *token = self.rewrite_assignments(token, "=", stats);
                }
                tokens.join(" ")
            }
            StatementFormat::Ascribe => match rest.split_once(CRITERIA_SEPARATOR) {
                Some((assignments, criteria)) => format!(
                    "{STATEMENT_PREFIX}{}{CRITERIA_SEPARATOR}{criteria}",
                    self.rewrite_assignments(assignments.trim(), " = ", stats)
                ),
                None => format!(
                    "{STATEMENT_PREFIX}{}",
                    self.rewrite_assignments(rest.trim(), " = ", stats)
                ),
            },
        }
    }

    fn rewrite_assignments(&self, text: &str, equals: &str, stats: &mut RewriteStats) -> String {
        self.assignment
            .replace_all(text, |caps: &Captures| self.rewrite_assignment(caps, equals, stats))
            .into_owned()
    }

    fn rewrite_assignment(&self, caps: &Captures, equals: &str, stats: &mut RewriteStats) -> String {
        let field = &caps["field"];
        let target = field
            .strip_suffix(HELPER_FIELD)
            .and_then(|label| self.renames.get(label))
            .unwrap_or(field);
        if target != field {
            stats.renamed_fields += 1;
        }

        let redirects = self.redirects.get(field);
        let codes = caps["codes"]
            .split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                let redirected = redirects.and_then(|map| {
                    let code = token.parse::<Code>().ok()?;
                    map.get(&code).copied()
                });
                match redirected {
                    Some(code) => {
                        stats.redirected_codes += 1;
                        spell_like(token, code)
                    }
                    None => token.to_string(),
                }
            })
            .unique()
            .join(",");
        format!("{target}{equals}{{{codes}}}")
    }

    pub fn rewrite_text(&self, text: &str, stats: &mut RewriteStats) -> String {
        let mut output = String::with_capacity(text.len());
        for line in text.split_inclusive('\n') {
            let (body, ending) = split_line_ending(line);
            output.push_str(&self.rewrite_line(body, stats));
            output.push_str(ending);
        }
        output
    }

    pub fn rewrite_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        encoding: &'static Encoding,
    ) -> Result<RewriteStats> {
        let text = io_utils::read_text(input, encoding)?;
        let mut stats = RewriteStats::default();
        let rewritten = self.rewrite_text(&text, &mut stats);
        let mut writer: Box<dyn Write> = match output {
            Some(path) if !io_utils::is_dash(path) => Box::new(BufWriter::new(
                File::create(path).with_context(|| format!("Creating output file {path:?}"))?,
            )),
            _ => Box::new(BufWriter::new(io::stdout().lock())),
        };
        writer
            .write_all(rewritten.as_bytes())
            .context("Writing rewritten statements")?;
        writer.flush().context("Flushing rewritten statements")?;
        if stats.passed_through > 0 {
            warn!(
                "{} line(s) in {input:?} are not coding statements and were copied as is",
                stats.passed_through
            );
        }
        info!(
            "Rewrote {} statement(s): {} field(s) renamed, {} code(s) redirected",
            stats.statements, stats.renamed_fields, stats.redirected_codes
        );
        Ok(stats)
    }
}

fn spell_like(token: &str, code: Code) -> String {
    if token.starts_with(CODE_PREFIX) {
        code.to_string()
    } else {
        code.value().to_string()
    }
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}
