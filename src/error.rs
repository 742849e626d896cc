//! Typed errors for grammars, merges and name canonicalization.
//!
//! Grammar errors are accumulated rather than raised: a scan collects every
//! defect into [`GrammarErrors`] and only then refuses to hand back a tree.
//! Merge and name errors are fatal for the single merge or variable involved.

use std::fmt;

use thiserror::Error;

use crate::code::{Code, join_codes};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("Unterminated label in '{fragment}'")]
    UnterminatedLabel { fragment: String },
    #[error("Closing '}})' without matching net in '{fragment}'")]
    UnmatchedClose { fragment: String },
    #[error("Net '{name}' is never closed")]
    UnclosedNet { name: String },
    #[error("Malformed element '{fragment}'")]
    MalformedFragment { fragment: String },
    #[error("Net '{name}' has no elements")]
    EmptyAxisNet { name: String },
    #[error("Invalid code \"{code}\"{}", row_suffix(.row))]
    InvalidCode { code: String, row: Option<usize> },
    #[error("Code \"{code}\" is out of range{}", row_suffix(.row))]
    CodeOutOfRange { code: String, row: Option<usize> },
    #[error("Invalid * in row {row} ({} expected)", marker('*', .expected))]
    NetDepth { row: usize, expected: usize },
    #[error("Invalid # in row {row} (at most {} expected)", marker('#', .open))]
    NetClose { row: usize, open: usize },
    #[error("Empty net in row {row}")]
    EmptyNet { row: usize },
    #[error("Duplicate code {code} found in row {row}")]
    DuplicateCode { row: usize, code: Code },
    #[error("Duplicate codes found in combine row {row}")]
    DuplicateCombineCodes { row: usize },
    #[error("Empty codeplan")]
    EmptyCodeplan,
    #[error("Axis expressions are not unique ({count} distinct)")]
    AxisNotUnique { count: usize },
}

fn row_suffix(row: &Option<usize>) -> String {
    match row {
        Some(row) => format!(" in row {row}"),
        None => String::new(),
    }
}

fn marker(symbol: char, count: &usize) -> String {
    std::iter::repeat_n(symbol, *count).collect()
}

/// Every defect found by one scan, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarErrors(pub Vec<GrammarError>);

impl GrammarErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GrammarError> {
        self.0.iter()
    }
}

impl fmt::Display for GrammarErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, error) in self.0.iter().enumerate() {
            if idx > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for GrammarErrors {}

impl From<Vec<GrammarError>> for GrammarErrors {
    fn from(errors: Vec<GrammarError>) -> Self {
        GrammarErrors(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("Codeplan '{name}' has {count} grammar error(s); refusing to merge")]
    InvalidCodeplan { name: String, count: usize },
    #[error("Codes undefined in destination '{target}': {}", join_codes(.codes))]
    MissingInTarget { target: String, codes: Vec<Code> },
    #[error("No catch-all declared for '{target}' to absorb {}", join_codes(.codes))]
    NoCatchAll { target: String, codes: Vec<Code> },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Variable label is empty")]
    EmptyLabel,
    #[error("Unbalanced bracket in part '{part}' of '{label}'")]
    UnbalancedBracket { label: String, part: String },
    #[error("Missing {{iteration}} token in part '{part}' of '{label}'")]
    MissingIterationToken { label: String, part: String },
    #[error("Canonical name '{canonical}' produced by both '{first}' and '{second}'")]
    Collision {
        canonical: String,
        first: String,
        second: String,
    },
}
