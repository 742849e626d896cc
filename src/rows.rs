//! Spreadsheet row grammar.
//!
//! A sheet codeplan is a stream of `(code, label)` cells where the code cell
//! carries the structure:
//!
//! | code cell      | row kind                               |
//! |----------------|----------------------------------------|
//! | `12`           | regular category                       |
//! | `*`, `**`, ... | net opens at that depth                |
//! | `#`, `##`, ... | nets close down to depth `count - 1`   |
//! | `12.35`        | combine of the dot-separated codes     |
//! | `1, 4, 9`      | combine of the comma-separated codes   |
//!
//! Anything else is invalid. [`RowScan`] trims invalid rows from both ends,
//! accumulates structural errors in one forward pass and builds the same
//! [`CodeTree`] shape the axis grammar produces.

use std::collections::{BTreeMap, HashSet};

use crate::{
    code::{Code, is_digits},
    codeplan::Element,
    error::GrammarError,
    tree::{CodeTree, DepthPolicy, Node},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    /// 1-based ordinal position in the sheet.
    pub index: usize,
    pub code: String,
    pub label: String,
}

impl SheetRow {
    pub fn new(index: usize, code: &str, label: &str) -> Self {
        Self {
            index,
            code: code.trim().to_string(),
            label: label.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Invalid,
    Regular(Code),
    NetStart(usize),
    NetEnd(usize),
    Combine(Vec<Code>),
}

impl RowKind {
    pub fn is_valid(&self) -> bool {
        !matches!(self, RowKind::Invalid)
    }
}

/// Classifies a trimmed code cell; the first matching rule wins.
pub fn classify(code: &str) -> RowKind {
    if let Some(code) = Code::from_digits(code) {
        return RowKind::Regular(code);
    }
    if let Some(depth) = repeated(code, '*') {
        return RowKind::NetStart(depth);
    }
    if let Some(depth) = repeated(code, '#') {
        return RowKind::NetEnd(depth);
    }
    if let Some((left, right)) = code.split_once('.')
        && let (Some(left), Some(right)) = (Code::from_digits(left), Code::from_digits(right))
    {
        return RowKind::Combine(vec![left, right]);
    }
    if code.contains(',') {
        let parts = code
            .split(',')
            .map(|part| Code::from_digits(part.trim()))
            .collect::<Option<Vec<_>>>();
        if let Some(codes) = parts {
            return RowKind::Combine(codes);
        }
    }
    RowKind::Invalid
}

fn repeated(code: &str, marker: char) -> Option<usize> {
    if !code.is_empty() && code.chars().all(|c| c == marker) {
        Some(code.chars().count())
    } else {
        None
    }
}

fn invalid_row_error(row: &SheetRow) -> GrammarError {
    let code = row.code.clone();
    let row = Some(row.index);
    if is_digits(&code) {
        GrammarError::CodeOutOfRange { code, row }
    } else {
        GrammarError::InvalidCode { code, row }
    }
}

/// Picks the label kept for a code that was seen with several labels.
pub trait LabelTieBreak {
    fn pick<'a>(&self, labels: &'a [String]) -> &'a str;
}

/// Keeps the lexicographically greatest label.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicographicMax;

impl LabelTieBreak for LexicographicMax {
    fn pick<'a>(&self, labels: &'a [String]) -> &'a str {
        labels.iter().max().map(String::as_str).unwrap_or_default()
    }
}

/// Keeps the label of the first row that mentioned the code.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstSeen;

impl LabelTieBreak for FirstSeen {
    fn pick<'a>(&self, labels: &'a [String]) -> &'a str {
        labels.first().map(String::as_str).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow {
    pub row: SheetRow,
    pub kind: RowKind,
}

#[derive(Debug, Clone, Default)]
pub struct RowScan {
    rows: Vec<ClassifiedRow>,
}

impl RowScan {
    /// Classifies every row and drops invalid rows before the first and after
    /// the last valid one.
    pub fn new<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = SheetRow>,
    {
        let classified = rows
            .into_iter()
            .map(|row| ClassifiedRow {
                kind: classify(&row.code),
                row,
            })
            .collect::<Vec<_>>();
        let first = classified.iter().position(|r| r.kind.is_valid());
        let last = classified.iter().rposition(|r| r.kind.is_valid());
        let rows = match (first, last) {
            (Some(first), Some(last)) => classified[first..=last].to_vec(),
            _ => Vec::new(),
        };
        Self { rows }
    }

    pub fn rows(&self) -> &[ClassifiedRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every content and structural defect, in row order.
    pub fn validate(&self) -> Vec<GrammarError> {
        let mut errors = Vec::new();
        if self.rows.is_empty() {
            errors.push(GrammarError::EmptyCodeplan);
        }
        errors.extend(
            self.rows
                .iter()
                .filter(|r| !r.kind.is_valid())
                .map(|r| invalid_row_error(&r.row)),
        );

        let mut current_level = 0usize;
        let mut scope: HashSet<Code> = HashSet::new();
        let mut previous = &RowKind::Invalid;
        for ClassifiedRow { row, kind } in &self.rows {
            match kind {
                RowKind::NetStart(depth) => {
                    scope.clear();
                    if *depth != current_level + 1 {
                        errors.push(GrammarError::NetDepth {
                            row: row.index,
                            expected: current_level + 1,
                        });
                    }
                    current_level = *depth;
                }
                RowKind::NetEnd(depth) => {
                    if *depth > current_level {
                        errors.push(GrammarError::NetClose {
                            row: row.index,
                            open: current_level,
                        });
                    }
                    if matches!(previous, RowKind::NetStart(_)) {
                        errors.push(GrammarError::EmptyNet { row: row.index });
                    }
                    current_level = depth - 1;
                }
                RowKind::Combine(codes) => {
                    let unique = codes.iter().collect::<HashSet<_>>();
                    if unique.len() != codes.len() {
                        errors.push(GrammarError::DuplicateCombineCodes { row: row.index });
                    }
                }
                RowKind::Regular(code) => {
                    if !scope.insert(*code) {
                        errors.push(GrammarError::DuplicateCode {
                            row: row.index,
                            code: *code,
                        });
                    }
                }
                RowKind::Invalid => {}
            }
            previous = kind;
        }
        errors
    }

    /// Builds the tree with an explicit leading base. Nets are named after
    /// their row (`net7`), combines likewise (`comb9`).
    pub fn build_tree(&self) -> CodeTree {
        let mut root = vec![Node::Base];
        let mut stack: Vec<(String, String, Vec<Node>)> = Vec::new();

        for ClassifiedRow { row, kind } in &self.rows {
            match kind {
                RowKind::NetStart(_) => {
                    stack.push((format!("net{}", row.index), row.label.clone(), Vec::new()));
                }
                RowKind::NetEnd(depth) => {
                    while stack.len() > depth.saturating_sub(1) {
                        close_net(&mut stack, &mut root);
                    }
                }
                RowKind::Regular(code) => {
                    current(&mut stack, &mut root).push(Node::regular(*code, row.label.clone()));
                }
                RowKind::Combine(codes) => {
                    let node = Node::combine(format!("comb{}", row.index), row.label.clone(), codes);
                    current(&mut stack, &mut root).push(node);
                }
                RowKind::Invalid => {}
            }
        }
        while !stack.is_empty() {
            close_net(&mut stack, &mut root);
        }
        CodeTree::with_children(root, DepthPolicy::CombineNests)
    }

    /// One element per distinct code, ascending by numeric value.
    ///
    /// Regular rows contribute their label, combine rows an empty label per
    /// combined code. A code contributed more than once is doubled.
    pub fn elements(&self, tie_break: &dyn LabelTieBreak) -> Vec<Element> {
        let mut labels: BTreeMap<Code, Vec<String>> = BTreeMap::new();
        for ClassifiedRow { row, kind } in &self.rows {
            match kind {
                RowKind::Regular(code) => {
                    labels.entry(*code).or_default().push(row.label.clone());
                }
                RowKind::Combine(codes) => {
                    for code in codes {
                        labels.entry(*code).or_default().push(String::new());
                    }
                }
                _ => {}
            }
        }
        labels
            .into_iter()
            .map(|(code, seen)| Element {
                code,
                label: tie_break.pick(&seen).to_string(),
                is_doubled: seen.len() > 1,
            })
            .collect()
    }
}

fn current<'a>(
    stack: &'a mut [(String, String, Vec<Node>)],
    root: &'a mut Vec<Node>,
) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some((_, _, children)) => children,
        None => root,
    }
}

fn close_net(stack: &mut Vec<(String, String, Vec<Node>)>, root: &mut Vec<Node>) {
    if let Some((name, label, children)) = stack.pop() {
        current(stack, root).push(Node::net(name, label, children));
    }
}
