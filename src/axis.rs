//! Axis expression grammar.
//!
//! The textual dialect stored on metadata variables looks like
//!
//! ```text
//! {base(),CB_1 'Good',CB_100 'Service' net({CB_2 'Fast',CB_3 'Kind'}),CB_4}
//! ```
//!
//! Labels are single-quoted with embedded quotes doubled (`'it''s'`). Parsing
//! runs in two linear passes: a quote bitmap marks every character that sits
//! inside a label, then a split pass recognizes `,`, `net({` and `})` only
//! outside labels. The resulting fragments drive a stack-based tree builder.
//! `base()` markers stay where they appear.
//! [`render`] is the structural inverse. `combine({` groupings written back
//! from spreadsheet codeplans are read the same way as nets, but may only
//! hold plain categories.

use std::str::FromStr;

use crate::{
    code::Code,
    error::{GrammarError, GrammarErrors},
    tree::{Category, CodeTree, DepthPolicy, Node},
};

const BASE_TOKEN: &str = "base()";
const NET_OPEN: [char; 5] = ['n', 'e', 't', '(', '{'];
const COMBINE_OPEN: [char; 9] = ['c', 'o', 'm', 'b', 'i', 'n', 'e', '(', '{'];
const NET_CLOSE: [char; 2] = ['}', ')'];

/// Whether rendering forces a leading `base()` sibling onto the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AxisDialect {
    #[default]
    AsIs,
    LeadingBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Separator {
    Comma,
    NetOpen,
    CombineOpen,
    NetClose,
    End,
}

/// Parses a full axis expression, with or without its outer braces.
pub fn parse(expression: &str) -> Result<CodeTree, GrammarErrors> {
    let trimmed = expression.trim();
    let body = trimmed
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .unwrap_or(trimmed);
    parse_body(body)
}

/// Parses the inside of an axis expression whose outer braces are stripped.
pub fn parse_body(body: &str) -> Result<CodeTree, GrammarErrors> {
    let chars = body.chars().collect::<Vec<_>>();
    let bitmap = label_bitmap(&chars).map_err(|error| GrammarErrors(vec![error]))?;
    let fragments = split(&chars, &bitmap);
    build(fragments)
}

/// Marks every character that is logically inside a quoted label.
///
/// A quote always enters a label. Quotes accumulate while inside; the label
/// only closes at the first non-quote character after an even number of
/// quotes, so a doubled quote stays an escaped literal.
fn label_bitmap(chars: &[char]) -> Result<Vec<bool>, GrammarError> {
    let mut bitmap = Vec::with_capacity(chars.len());
    let mut in_label = false;
    let mut quotes = 0usize;
    let mut label_start = 0usize;
    for (idx, ch) in chars.iter().enumerate() {
        if *ch == '\'' {
            if !in_label {
                label_start = idx;
            }
            in_label = true;
            quotes += 1;
        } else if in_label && quotes % 2 == 0 {
            in_label = false;
            quotes = 0;
        }
        bitmap.push(in_label);
    }
    if in_label && quotes % 2 == 1 {
        let start = chars[..label_start]
            .iter()
            .rposition(|c| *c == ',')
            .map_or(0, |pos| pos + 1);
        return Err(GrammarError::UnterminatedLabel {
            fragment: chars[start..].iter().collect::<String>().trim().to_string(),
        });
    }
    Ok(bitmap)
}

fn split(chars: &[char], bitmap: &[bool]) -> Vec<(Separator, String)> {
    let mut fragments = Vec::new();
    let mut last = 0usize;
    for idx in 0..chars.len() {
        if bitmap[idx] {
            continue;
        }
        if chars[idx] == ',' {
            fragments.push((Separator::Comma, fragment(chars, last, idx)));
            last = idx + 1;
        } else if idx >= last + 8 && chars[idx - 8..=idx] == COMBINE_OPEN {
            fragments.push((Separator::CombineOpen, fragment(chars, last, idx - 8)));
            last = idx + 1;
        } else if idx >= last + 4 && chars[idx - 4..=idx] == NET_OPEN {
            fragments.push((Separator::NetOpen, fragment(chars, last, idx - 4)));
            last = idx + 1;
        } else if idx > last && chars[idx - 1..=idx] == NET_CLOSE {
            fragments.push((Separator::NetClose, fragment(chars, last, idx - 1)));
            last = idx + 1;
        }
    }
    if last < chars.len() {
        fragments.push((Separator::End, fragment(chars, last, chars.len())));
    }
    fragments
}

fn fragment(chars: &[char], start: usize, end: usize) -> String {
    chars[start..end].iter().collect::<String>().trim().to_string()
}

struct PendingNet {
    name: String,
    label: String,
    combine: bool,
    children: Vec<Node>,
}

impl PendingNet {
    fn new(header: &str, combine: bool, errors: &mut Vec<GrammarError>) -> Self {
        let (name, label) = split_header(header).unwrap_or_else(|error| {
            errors.push(error);
            (header.to_string(), String::new())
        });
        Self {
            name,
            label,
            combine,
            children: Vec::new(),
        }
    }

    fn close(self, errors: &mut Vec<GrammarError>) -> Node {
        if self.children.is_empty() {
            errors.push(GrammarError::EmptyAxisNet {
                name: self.name.clone(),
            });
        }
        if !self.combine {
            return Node::Net {
                name: self.name,
                label: self.label,
                children: self.children,
            };
        }
        let mut categories = Vec::with_capacity(self.children.len());
        for child in self.children {
            match child {
                Node::Regular(category) => categories.push(category),
                _ => errors.push(GrammarError::MalformedFragment {
                    fragment: self.name.clone(),
                }),
            }
        }
        Node::Combine {
            name: self.name,
            label: self.label,
            children: categories,
        }
    }
}

fn build(fragments: Vec<(Separator, String)>) -> Result<CodeTree, GrammarErrors> {
    let mut errors = Vec::new();
    let mut root = Vec::new();
    let mut stack: Vec<PendingNet> = Vec::new();

    for (separator, text) in fragments {
        match separator {
            Separator::Comma | Separator::End | Separator::NetClose => {
                if text == BASE_TOKEN {
                    current(&mut stack, &mut root).push(Node::Base);
                } else if !text.is_empty() {
                    match parse_category(&text) {
                        Ok(category) => current(&mut stack, &mut root).push(Node::Regular(category)),
                        Err(error) => errors.push(error),
                    }
                }
                if separator == Separator::NetClose {
                    match stack.pop() {
                        Some(net) => {
                            let node = net.close(&mut errors);
                            current(&mut stack, &mut root).push(node);
                        }
                        None => errors.push(GrammarError::UnmatchedClose { fragment: text }),
                    }
                }
            }
            Separator::NetOpen => stack.push(PendingNet::new(&text, false, &mut errors)),
            Separator::CombineOpen => stack.push(PendingNet::new(&text, true, &mut errors)),
        }
    }

    for net in stack {
        errors.push(GrammarError::UnclosedNet { name: net.name });
    }
    if !errors.is_empty() {
        return Err(GrammarErrors(errors));
    }
    Ok(CodeTree::with_children(root, DepthPolicy::CombineFlat))
}

fn current<'a>(stack: &'a mut [PendingNet], root: &'a mut Vec<Node>) -> &'a mut Vec<Node> {
    match stack.last_mut() {
        Some(net) => &mut net.children,
        None => root,
    }
}

/// Splits `NAME 'label'` (or a bare `NAME`) into its name and unescaped label.
fn split_header(text: &str) -> Result<(String, String), GrammarError> {
    let malformed = || GrammarError::MalformedFragment {
        fragment: text.to_string(),
    };
    let (name, rest) = match text.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (text, ""),
    };
    if name.is_empty() || name.contains('\'') {
        return Err(malformed());
    }
    if rest.is_empty() {
        return Ok((name.to_string(), String::new()));
    }
    let inner = rest
        .strip_prefix('\'')
        .and_then(|value| value.strip_suffix('\''))
        .filter(|_| rest.len() >= 2)
        .ok_or_else(malformed)?;
    Ok((name.to_string(), unescape_label(inner)))
}

fn parse_category(text: &str) -> Result<Category, GrammarError> {
    let (name, label) = split_header(text)?;
    let code = Code::from_str(&name)?;
    Ok(Category::new(code, label))
}

pub fn escape_label(label: &str) -> String {
    label.replace('\'', "''")
}

fn unescape_label(label: &str) -> String {
    label.replace("''", "'")
}

/// Renders the tree exactly as stored.
pub fn render(tree: &CodeTree) -> String {
    render_with(tree, AxisDialect::AsIs)
}

pub fn render_with(tree: &CodeTree, dialect: AxisDialect) -> String {
    let mut parts = Vec::with_capacity(tree.children().len() + 1);
    if dialect == AxisDialect::LeadingBase && tree.children().first() != Some(&Node::Base) {
        parts.push(BASE_TOKEN.to_string());
    }
    parts.extend(tree.children().iter().map(render_node));
    format!("{{{}}}", parts.join(","))
}

fn render_node(node: &Node) -> String {
    match node {
        Node::Base => BASE_TOKEN.to_string(),
        Node::Regular(category) => render_category(category),
        Node::Net {
            name,
            label,
            children,
        } => {
            let body = children.iter().map(render_node).collect::<Vec<_>>();
            format!("{name} '{}' net({{{}}})", escape_label(label), body.join(","))
        }
        Node::Combine {
            name,
            label,
            children,
        } => {
            let body = children.iter().map(render_category).collect::<Vec<_>>();
            format!(
                "{name} '{}' combine({{{}}})",
                escape_label(label),
                body.join(",")
            )
        }
    }
}

fn render_category(category: &Category) -> String {
    if category.label.is_empty() {
        category.code.to_string()
    } else {
        format!("{} '{}'", category.code, escape_label(&category.label))
    }
}
