//! Field identity and canonical names for iterated variables.
//!
//! A variable label such as `q7loop[{_12}].q7` names the field `q7loop.q7`
//! at iteration `_12`. When the same field is bound to different category
//! sets across iterations it can no longer live under one helper field, so
//! each variable gets its own canonical name (`q7loop_q7__12_o_c`).

use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

use serde::{Deserialize, Serialize};

use crate::error::NameError;

pub const CANONICAL_SUFFIX: &str = "o_c";
pub const HELPER_FIELD: &str = ".Coding";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldName {
    pub label: String,
    pub field_name: String,
    pub iterations: Vec<String>,
    pub canonical_name: String,
}

impl FieldName {
    /// `seg[{idx}].val` → field `seg.val`, iterations `[idx]`, canonical
    /// `seg_val_idx_o_c`. Without iterations the block stays empty (`f4__o_c`).
    pub fn parse(label: &str) -> Result<Self, NameError> {
        if label.trim().is_empty() {
            return Err(NameError::EmptyLabel);
        }
        let mut parts = Vec::new();
        let mut iterations = Vec::new();
        for part in label.split('.') {
            let (field_part, iteration) = split_part(label, part)?;
            parts.push(field_part);
            iterations.extend(iteration);
        }
        let canonical_name = format!(
            "{}_{}_{CANONICAL_SUFFIX}",
            parts.join("_"),
            iterations.join("_")
        );
        Ok(Self {
            label: label.to_string(),
            field_name: parts.join("."),
            iterations: iterations.into_iter().map(str::to_string).collect(),
            canonical_name,
        })
    }

    pub fn helper_name(&self) -> String {
        helper_name(&self.label)
    }
}

pub fn helper_name(label: &str) -> String {
    format!("{label}{HELPER_FIELD}")
}

fn split_part<'a>(label: &str, part: &'a str) -> Result<(&'a str, Option<&'a str>), NameError> {
    let unbalanced = || NameError::UnbalancedBracket {
        label: label.to_string(),
        part: part.to_string(),
    };
    let Some(open) = part.find('[') else {
        if part.contains(']') {
            return Err(unbalanced());
        }
        return Ok((part, None));
    };
    let index = part[open + 1..].strip_suffix(']').ok_or_else(unbalanced)?;
    let token = index
        .strip_prefix('{')
        .and_then(|inner| inner.strip_suffix('}'))
        .filter(|inner| !inner.is_empty() && !inner.contains(['{', '}']))
        .ok_or_else(|| NameError::MissingIterationToken {
            label: label.to_string(),
            part: part.to_string(),
        })?;
    Ok((&part[..open], Some(token)))
}

/// Variable labels mapped to the field they are written back under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RenameTable {
    entries: BTreeMap<String, String>,
}

impl RenameTable {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.entries.get(label).map(String::as_str)
    }

    /// Target field for `label`, defaulting to its helper field.
    pub fn target_for(&self, label: &str) -> String {
        self.get(label)
            .map(str::to_string)
            .unwrap_or_else(|| helper_name(label))
    }

    pub fn renamed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(label, target)| **target != helper_name(label))
            .map(|(label, target)| (label.as_str(), target.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenameOutcome {
    pub table: RenameTable,
    pub errors: Vec<(String, NameError)>,
}

/// Builds the rename table for `(label, category_set)` pairs.
///
/// Fields bound to a single category set keep a helper field
/// (`label.Coding`); every variable of a field bound to several sets gets its
/// canonical name. A label that cannot be parsed, or whose canonical name is
/// already taken by a different field/iteration pair, is reported and left
/// out without affecting the others.
pub fn build_rename_table<'a, I>(variables: I) -> RenameOutcome
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut outcome = RenameOutcome::default();
    let mut parsed = Vec::new();
    for (label, category_set) in variables {
        match FieldName::parse(label) {
            Ok(field) => parsed.push((field, category_set)),
            Err(error) => outcome.errors.push((label.to_string(), error)),
        }
    }

    let mut field_sets: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (field, category_set) in &parsed {
        field_sets
            .entry(field.field_name.as_str())
            .or_default()
            .insert(*category_set);
    }

    let mut claimed: BTreeMap<String, &FieldName> = BTreeMap::new();
    for (field, _) in &parsed {
        let multitype = field_sets
            .get(field.field_name.as_str())
            .is_some_and(|sets| sets.len() > 1);
        if !multitype {
            outcome
                .table
                .entries
                .insert(field.label.clone(), field.helper_name());
            continue;
        }
        match claimed.entry(field.canonical_name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(field);
                outcome
                    .table
                    .entries
                    .insert(field.label.clone(), field.canonical_name.clone());
            }
            Entry::Occupied(slot) => {
                let first = slot.get();
                if first.field_name != field.field_name || first.iterations != field.iterations {
                    outcome.errors.push((
                        field.label.clone(),
                        NameError::Collision {
                            canonical: field.canonical_name.clone(),
                            first: first.label.clone(),
                            second: field.label.clone(),
                        },
                    ));
                }
            }
        }
    }
    outcome
}
