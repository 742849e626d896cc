//! Batch reconciliation of a metadata document with a workbook.
//!
//! Mappings are processed in adapter order. Each merge stands alone: a sheet
//! that cannot be merged is reported and its category set left as it was.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, ChangeTag, TextDiff};

use crate::{
    adapter::{AdapterConfig, AdapterEntry},
    code::Code,
    codeplan::Codeplan,
    diff::{self, MergeDecision},
    document::MetadataDocument,
    names::{self, RenameOutcome},
    tree::CodeTree,
    workbook::Workbook,
};

/// Code redirects keyed by the coding field of each variable (`q1.Coding`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RedirectMaps {
    maps: BTreeMap<String, BTreeMap<Code, Code>>,
}

impl RedirectMaps {
    pub fn get(&self, coding_field: &str) -> Option<&BTreeMap<Code, Code>> {
        self.maps.get(coding_field)
    }

    pub fn insert(&mut self, coding_field: String, redirects: BTreeMap<Code, Code>) {
        self.maps.insert(coding_field, redirects);
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum MergeStatus {
    Merged(MergeDecision),
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub sheet: String,
    pub document: Option<String>,
    pub master: Option<String>,
    #[serde(flatten)]
    pub status: MergeStatus,
}

impl MergeReport {
    pub fn status_label(&self) -> &'static str {
        match self.status {
            MergeStatus::Merged(_) => "merged",
            MergeStatus::Skipped => "skipped",
            MergeStatus::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> String {
        match &self.status {
            MergeStatus::Merged(decision) => format!(
                "{} redirected, {} relabelled",
                decision.redirect_map.len(),
                decision.label_conflicts.len()
            ),
            MergeStatus::Skipped => "no document codeplan".to_string(),
            MergeStatus::Failed(message) => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileOptions {
    pub show_diff: bool,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub document: MetadataDocument,
    pub rename: RenameOutcome,
    pub redirects: RedirectMaps,
    pub reports: Vec<MergeReport>,
}

impl Reconciliation {
    pub fn failures(&self) -> impl Iterator<Item = &MergeReport> {
        self.reports
            .iter()
            .filter(|report| matches!(report.status, MergeStatus::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

pub fn reconcile(
    document: &MetadataDocument,
    workbook: &Workbook,
    adapter: &AdapterConfig,
    options: ReconcileOptions,
) -> Reconciliation {
    let mut merged = document.clone();
    let mut redirects = RedirectMaps::default();
    let mut reports = Vec::with_capacity(adapter.mappings.len());

    for entry in &adapter.mappings {
        let status = match &entry.document {
            None => {
                debug!("Sheet '{}' has no document codeplan; skipping", entry.sheet);
                MergeStatus::Skipped
            }
            Some(name) => match merge_entry(&mut merged, workbook, entry, name, options) {
                Ok(decision) => {
                    for variable in merged.variables_of(name) {
                        if !decision.redirect_map.is_empty() {
                            redirects.insert(
                                names::helper_name(&variable.name),
                                decision.redirect_map.clone(),
                            );
                        }
                    }
                    MergeStatus::Merged(decision)
                }
                Err(message) => {
                    warn!("Sheet '{}' not merged: {message}", entry.sheet);
                    MergeStatus::Failed(message)
                }
            },
        };
        reports.push(MergeReport {
            sheet: entry.sheet.clone(),
            document: entry.document.clone(),
            master: entry.master.clone(),
            status,
        });
    }

    let rename = merged.rename_outcome();
    for (label, error) in &rename.errors {
        warn!("Variable '{label}' keeps its helper field: {error}");
    }
    merged.apply_rename_table(&rename.table);
    info!(
        "Reconciled {} mapping(s); {} variable(s) renamed",
        reports.len(),
        rename.table.renamed().count()
    );

    Reconciliation {
        document: merged,
        rename,
        redirects,
        reports,
    }
}

fn merge_entry(
    document: &mut MetadataDocument,
    workbook: &Workbook,
    entry: &AdapterEntry,
    name: &str,
    options: ReconcileOptions,
) -> Result<MergeDecision, String> {
    let sheet = workbook
        .codeplan(&entry.sheet)
        .ok_or_else(|| format!("sheet '{}' not found in workbook", entry.sheet))?;
    let mut target = document
        .codeplan(name)
        .ok_or_else(|| format!("category set '{name}' not found in document"))?;
    info!("Merging sheet '{}' into '{name}'", entry.sheet);

    let before = outline(&target);
    let decision =
        diff::merge_into(sheet, &mut target, entry.catch_all).map_err(|error| error.to_string())?;
    if options.show_diff {
        log_outline_diff(name, &before, &outline(&target));
    }
    document
        .apply_codeplan(&target)
        .map_err(|error| error.to_string())?;
    Ok(decision)
}

fn outline(codeplan: &Codeplan) -> String {
    codeplan
        .tree()
        .map(CodeTree::outline)
        .unwrap_or_default()
}

fn log_outline_diff(name: &str, before: &str, after: &str) {
    if before == after {
        info!("Tree of '{name}' unchanged");
        return;
    }
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(before, after);
    info!("Tree changes for '{name}':");
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Equal => continue,
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
        };
        info!("{sign} {}", change.value().trim_end());
    }
}
