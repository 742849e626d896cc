//! Comparison of two document waves.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::{CategorySet, MetadataDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    VariableAdded,
    VariableDropped,
    VariableRelabelled,
    VariableRebound,
    CategoryAdded,
    CategoryDropped,
    CategoryRelabelled,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::VariableAdded => "variable added",
            ChangeKind::VariableDropped => "variable dropped",
            ChangeKind::VariableRelabelled => "variable relabelled",
            ChangeKind::VariableRebound => "category set changed",
            ChangeKind::CategoryAdded => "category added",
            ChangeKind::CategoryDropped => "category dropped",
            ChangeKind::CategoryRelabelled => "category relabelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Change {
    pub kind: ChangeKind,
    /// Variable name, or `set/category` for category changes.
    pub subject: String,
    pub before: String,
    pub after: String,
}

impl Change {
    fn new(kind: ChangeKind, subject: impl Into<String>, before: &str, after: &str) -> Self {
        Self {
            kind,
            subject: subject.into(),
            before: before.to_string(),
            after: after.to_string(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.kind.as_str().to_string(),
            self.subject.clone(),
            self.before.clone(),
            self.after.clone(),
        ]
    }
}

pub fn headers() -> Vec<String> {
    ["change", "subject", "before", "after"]
        .iter()
        .map(|h| h.to_string())
        .collect()
}

/// Differences going from `previous` to `current`: variables first, then the
/// categories of category sets present in both waves.
pub fn compare_documents(previous: &MetadataDocument, current: &MetadataDocument) -> Vec<Change> {
    let mut changes = Vec::new();

    let old_vars = previous
        .variables
        .iter()
        .map(|v| (v.name.as_str(), v))
        .collect::<BTreeMap<_, _>>();
    let new_vars = current
        .variables
        .iter()
        .map(|v| (v.name.as_str(), v))
        .collect::<BTreeMap<_, _>>();
    for (name, old) in &old_vars {
        match new_vars.get(name) {
            None => changes.push(Change::new(ChangeKind::VariableDropped, *name, &old.label, "")),
            Some(new) => {
                if old.label != new.label {
                    changes.push(Change::new(
                        ChangeKind::VariableRelabelled,
                        *name,
                        &old.label,
                        &new.label,
                    ));
                }
                if old.category_set != new.category_set {
                    changes.push(Change::new(
                        ChangeKind::VariableRebound,
                        *name,
                        &old.category_set,
                        &new.category_set,
                    ));
                }
            }
        }
    }
    for (name, new) in &new_vars {
        if !old_vars.contains_key(name) {
            changes.push(Change::new(ChangeKind::VariableAdded, *name, "", &new.label));
        }
    }

    for old_set in &previous.category_sets {
        if let Some(new_set) = current.category_set(&old_set.name) {
            compare_sets(old_set, new_set, &mut changes);
        }
    }
    changes
}

fn compare_sets(old: &CategorySet, new: &CategorySet, changes: &mut Vec<Change>) {
    let labels = |set: &CategorySet| {
        set.categories
            .iter()
            .map(|c| (c.name.clone(), c.label.clone()))
            .collect::<BTreeMap<_, _>>()
    };
    let (old_labels, new_labels) = (labels(old), labels(new));
    let subject = |category: &str| format!("{}/{category}", old.name);
    for (category, old_label) in &old_labels {
        match new_labels.get(category) {
            None => changes.push(Change::new(
                ChangeKind::CategoryDropped,
                subject(category),
                old_label,
                "",
            )),
            Some(new_label) if new_label != old_label => changes.push(Change::new(
                ChangeKind::CategoryRelabelled,
                subject(category),
                old_label,
                new_label,
            )),
            Some(_) => {}
        }
    }
    for (category, new_label) in &new_labels {
        if !old_labels.contains_key(category) {
            changes.push(Change::new(
                ChangeKind::CategoryAdded,
                subject(category),
                "",
                new_label,
            ));
        }
    }
}
