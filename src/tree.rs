//! Shared in-memory codeplan hierarchy.
//!
//! Both grammars produce a [`CodeTree`]: an implicit root holding [`Node`]s.
//! Nets nest arbitrarily, combines hold plain categories only. Flattening and
//! axis rendering are memoized on the tree and dropped whenever the tree is
//! edited through [`CodeTree::edit`] or replaced wholesale.

use std::cell::OnceCell;
use std::collections::BTreeSet;

use serde::Serialize;

use crate::{axis, code::Code};

/// A labelled leaf category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub code: Code,
    pub label: String,
}

impl Category {
    pub fn new(code: Code, label: impl Into<String>) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }

    pub fn unlabeled(code: Code) -> Self {
        Self::new(code, String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Base,
    Net {
        name: String,
        label: String,
        children: Vec<Node>,
    },
    Combine {
        name: String,
        label: String,
        children: Vec<Category>,
    },
    Regular(Category),
}

impl Node {
    pub fn regular(code: Code, label: impl Into<String>) -> Self {
        Node::Regular(Category::new(code, label))
    }

    pub fn net(name: impl Into<String>, label: impl Into<String>, children: Vec<Node>) -> Self {
        Node::Net {
            name: name.into(),
            label: label.into(),
            children,
        }
    }

    /// Combine node with one freshly synthesized, unlabeled leaf per code.
    pub fn combine(name: impl Into<String>, label: impl Into<String>, codes: &[Code]) -> Self {
        Node::Combine {
            name: name.into(),
            label: label.into(),
            children: codes.iter().copied().map(Category::unlabeled).collect(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Base => NodeKind::Base,
            Node::Net { .. } => NodeKind::Net,
            Node::Combine { .. } => NodeKind::Combine,
            Node::Regular(_) => NodeKind::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Base,
    Net,
    Combine,
    Regular,
}

/// Whether the leaves of a combine sit one level below the combine itself.
///
/// The row grammar nests combine leaves; the axis grammar never produces
/// combines and keeps them flat. Resolved once per tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthPolicy {
    #[default]
    CombineFlat,
    CombineNests,
}

/// One node of a depth-first, parent-before-children walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatNode {
    pub kind: NodeKind,
    pub name: String,
    pub code: Option<Code>,
    pub label: String,
    pub level: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CodeTree {
    children: Vec<Node>,
    depth_policy: DepthPolicy,
    flat: OnceCell<Vec<FlatNode>>,
    axis: OnceCell<String>,
}

impl PartialEq for CodeTree {
    fn eq(&self, other: &Self) -> bool {
        self.children == other.children
    }
}

impl CodeTree {
    pub fn new(depth_policy: DepthPolicy) -> Self {
        Self::with_children(Vec::new(), depth_policy)
    }

    pub fn with_children(children: Vec<Node>, depth_policy: DepthPolicy) -> Self {
        Self {
            children,
            depth_policy,
            flat: OnceCell::new(),
            axis: OnceCell::new(),
        }
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn depth_policy(&self) -> DepthPolicy {
        self.depth_policy
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Mutates the root's children and drops both memoized views.
    pub fn edit<F, R>(&mut self, edit: F) -> R
    where
        F: FnOnce(&mut Vec<Node>) -> R,
    {
        self.invalidate();
        edit(&mut self.children)
    }

    pub fn push(&mut self, node: Node) {
        self.edit(|children| children.push(node));
    }

    fn invalidate(&mut self) {
        self.flat.take();
        self.axis.take();
    }

    pub fn flatten(&self) -> &[FlatNode] {
        self.flat.get_or_init(|| {
            let mut flat = Vec::new();
            flatten_into(&self.children, 1, self.depth_policy, &mut flat);
            flat
        })
    }

    /// Serialized axis expression including the surrounding braces.
    pub fn axis(&self) -> &str {
        self.axis.get_or_init(|| axis::render(self))
    }

    /// Leaf codes in walk order, combine leaves included.
    pub fn codes(&self) -> Vec<Code> {
        self.flatten()
            .iter()
            .filter(|node| node.kind == NodeKind::Regular)
            .filter_map(|node| node.code)
            .collect()
    }

    /// Codes that occur more than once in the walk, ascending.
    pub fn doubled_codes(&self) -> Vec<Code> {
        let mut seen = BTreeSet::new();
        let mut doubled = BTreeSet::new();
        for code in self.codes() {
            if !seen.insert(code) {
                doubled.insert(code);
            }
        }
        doubled.into_iter().collect()
    }

    pub fn count(&self, kind: NodeKind) -> usize {
        self.flatten().iter().filter(|node| node.kind == kind).count()
    }

    /// Indented `code - label` listing, four spaces per level.
    pub fn outline(&self) -> String {
        let mut output = String::new();
        for node in self.flatten() {
            output.push_str(&"    ".repeat(node.level.saturating_sub(1)));
            match node.kind {
                NodeKind::Base => output.push_str("base()"),
                _ => {
                    output.push_str(&node.name);
                    output.push_str(" - ");
                    output.push_str(&node.label);
                }
            }
            output.push('\n');
        }
        output
    }
}

fn flatten_into(nodes: &[Node], level: usize, policy: DepthPolicy, out: &mut Vec<FlatNode>) {
    for node in nodes {
        match node {
            Node::Base => out.push(FlatNode {
                kind: NodeKind::Base,
                name: String::new(),
                code: None,
                label: String::new(),
                level,
            }),
            Node::Regular(category) => out.push(flat_category(category, level)),
            Node::Net {
                name,
                label,
                children,
            } => {
                out.push(FlatNode {
                    kind: NodeKind::Net,
                    name: name.clone(),
                    code: None,
                    label: label.clone(),
                    level,
                });
                flatten_into(children, level + 1, policy, out);
            }
            Node::Combine {
                name,
                label,
                children,
            } => {
                out.push(FlatNode {
                    kind: NodeKind::Combine,
                    name: name.clone(),
                    code: None,
                    label: label.clone(),
                    level,
                });
                let child_level = match policy {
                    DepthPolicy::CombineNests => level + 1,
                    DepthPolicy::CombineFlat => level,
                };
                out.extend(children.iter().map(|c| flat_category(c, child_level)));
            }
        }
    }
}

fn flat_category(category: &Category, level: usize) -> FlatNode {
    FlatNode {
        kind: NodeKind::Regular,
        name: category.code.to_string(),
        code: Some(category.code),
        label: category.label.clone(),
        level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree(policy: DepthPolicy) -> CodeTree {
        CodeTree::with_children(
            vec![
                Node::Base,
                Node::net(
                    "net2",
                    "Positive",
                    vec![
                        Node::regular(Code::new(1), "Good"),
                        Node::combine("comb4", "Both", &[Code::new(2), Code::new(3)]),
                    ],
                ),
                Node::regular(Code::new(2), "Fast"),
            ],
            policy,
        )
    }

    #[test]
    fn flatten_visits_parents_before_children() {
        let tree = sample_tree(DepthPolicy::CombineNests);
        let kinds = tree.flatten().iter().map(|n| n.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Base,
                NodeKind::Net,
                NodeKind::Regular,
                NodeKind::Combine,
                NodeKind::Regular,
                NodeKind::Regular,
                NodeKind::Regular,
            ]
        );
        let levels = tree.flatten().iter().map(|n| n.level).collect::<Vec<_>>();
        assert_eq!(levels, vec![1, 1, 2, 2, 3, 3, 1]);
    }

    #[test]
    fn combine_flat_policy_keeps_leaves_beside_combine() {
        let tree = sample_tree(DepthPolicy::CombineFlat);
        let levels = tree.flatten().iter().map(|n| n.level).collect::<Vec<_>>();
        assert_eq!(levels, vec![1, 1, 2, 2, 2, 2, 1]);
    }

    #[test]
    fn edit_invalidates_memoized_views() {
        let mut tree = sample_tree(DepthPolicy::CombineNests);
        assert_eq!(tree.flatten().len(), 7);
        let before = tree.axis().to_string();

        tree.push(Node::regular(Code::new(9), "New"));

        assert_eq!(tree.flatten().len(), 8);
        assert_ne!(tree.axis(), before);
        assert!(tree.axis().contains("CB_9 'New'"));
    }

    #[test]
    fn doubled_codes_are_sorted_numerically() {
        let tree = sample_tree(DepthPolicy::CombineNests);
        assert_eq!(tree.doubled_codes(), vec![Code::new(2)]);
        assert_eq!(tree.count(NodeKind::Net), 1);
        assert_eq!(tree.count(NodeKind::Combine), 1);
    }

    #[test]
    fn outline_indents_by_level() {
        let tree = CodeTree::with_children(
            vec![Node::net(
                "CB_100",
                "Group",
                vec![Node::regular(Code::new(1), "One")],
            )],
            DepthPolicy::CombineFlat,
        );
        assert_eq!(tree.outline(), "CB_100 - Group\n    CB_1 - One\n");
    }
}
