use serde::{Deserialize, Serialize};

use crate::{
    axis,
    code::{Code, join_codes},
    error::{GrammarError, GrammarErrors},
    rows::{LabelTieBreak, RowScan, SheetRow},
    tree::{CodeTree, DepthPolicy, NodeKind},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    pub code: Code,
    pub label: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_doubled: bool,
}

impl Element {
    pub fn new(code: Code, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
            is_doubled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sheet,
    Document,
}

/// A named codeplan: its tree, its flat element list and every grammar
/// error found while reading it.
///
/// The tree and axis are only handed out when no errors were recorded.
#[derive(Debug, Clone)]
pub struct Codeplan {
    name: String,
    source_kind: SourceKind,
    tree: CodeTree,
    elements: Vec<Element>,
    errors: GrammarErrors,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeplanSummary {
    pub name: String,
    pub source: SourceKind,
    pub codes: usize,
    pub nets: usize,
    pub combines: usize,
    pub doubled: Vec<Code>,
    pub errors: Vec<String>,
}

impl Codeplan {
    pub fn from_rows<I>(name: impl Into<String>, rows: I, tie_break: &dyn LabelTieBreak) -> Self
    where
        I: IntoIterator<Item = SheetRow>,
    {
        let scan = RowScan::new(rows);
        Self {
            name: name.into(),
            source_kind: SourceKind::Sheet,
            tree: scan.build_tree(),
            elements: scan.elements(tie_break),
            errors: GrammarErrors(scan.validate()),
        }
    }

    /// Codeplan read from a metadata document: the category list provides the
    /// elements, the axis expression provides the tree.
    pub fn from_axis(
        name: impl Into<String>,
        axis_expression: &str,
        mut elements: Vec<Element>,
        mut errors: Vec<GrammarError>,
    ) -> Self {
        let tree = match axis::parse(axis_expression) {
            Ok(tree) => tree,
            Err(parse_errors) => {
                errors.extend(parse_errors.0);
                CodeTree::new(DepthPolicy::CombineFlat)
            }
        };
        elements.sort_by_key(|element| element.code);
        Self {
            name: name.into(),
            source_kind: SourceKind::Document,
            tree,
            elements,
            errors: GrammarErrors(errors),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn element(&self, code: Code) -> Option<&Element> {
        self.elements
            .binary_search_by_key(&code, |element| element.code)
            .ok()
            .map(|idx| &self.elements[idx])
    }

    pub fn errors(&self) -> &GrammarErrors {
        &self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn tree(&self) -> Result<&CodeTree, GrammarErrors> {
        if self.errors.is_empty() {
            Ok(&self.tree)
        } else {
            Err(self.errors.clone())
        }
    }

    pub fn axis(&self) -> Result<&str, GrammarErrors> {
        self.tree().map(CodeTree::axis)
    }

    pub fn summary(&self) -> CodeplanSummary {
        CodeplanSummary {
            name: self.name.clone(),
            source: self.source_kind,
            codes: self.elements.len(),
            nets: self.tree.count(NodeKind::Net),
            combines: self.tree.count(NodeKind::Combine),
            doubled: self.tree.doubled_codes(),
            errors: self.errors.iter().map(ToString::to_string).collect(),
        }
    }

    /// Takes over the source's tree and elements wholesale; the memoized
    /// views of the old tree go with it.
    pub(crate) fn replace_with(&mut self, source: &Codeplan) {
        self.tree = source.tree.clone();
        self.elements = source.elements.clone();
    }
}

impl CodeplanSummary {
    pub fn doubled_display(&self) -> String {
        if self.doubled.is_empty() {
            "-".to_string()
        } else {
            join_codes(&self.doubled)
        }
    }
}
