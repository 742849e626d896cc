//! Codeplan diff and merge.
//!
//! Codes are compared by numeric identity only. A merge moves the source
//! codeplan over the target: every source code must already exist in the
//! target, target-only codes are redirected to a caller-supplied catch-all,
//! and label differences are reported but never block.

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde::Serialize;

use crate::{
    code::{Code, join_codes},
    codeplan::{Codeplan, Element},
    error::MergeError,
};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CodeplanDiff {
    pub missing_in_target: Vec<Code>,
    pub missing_in_source: Vec<Code>,
    pub shared: Vec<Code>,
}

impl CodeplanDiff {
    pub fn compute(source: &[Element], target: &[Element]) -> Self {
        let source_codes = source.iter().map(|e| e.code).collect::<BTreeSet<_>>();
        let target_codes = target.iter().map(|e| e.code).collect::<BTreeSet<_>>();
        Self {
            missing_in_target: source_codes.difference(&target_codes).copied().collect(),
            missing_in_source: target_codes.difference(&source_codes).copied().collect(),
            shared: source_codes.intersection(&target_codes).copied().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelConflict {
    pub code: Code,
    pub old_label: String,
    pub new_label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MergeDecision {
    pub missing_in_target: Vec<Code>,
    pub missing_in_source: Vec<Code>,
    pub label_conflicts: Vec<LabelConflict>,
    pub redirect_map: BTreeMap<Code, Code>,
}

/// Decides whether `source` may replace `target` without touching either.
pub fn decide(
    source: &Codeplan,
    target: &Codeplan,
    catch_all: Option<Code>,
) -> Result<MergeDecision, MergeError> {
    for codeplan in [source, target] {
        if !codeplan.is_valid() {
            return Err(MergeError::InvalidCodeplan {
                name: codeplan.name().to_string(),
                count: codeplan.errors().len(),
            });
        }
    }

    let diff = CodeplanDiff::compute(source.elements(), target.elements());
    if !diff.missing_in_target.is_empty() {
        return Err(MergeError::MissingInTarget {
            target: target.name().to_string(),
            codes: diff.missing_in_target,
        });
    }

    let mut redirect_map = BTreeMap::new();
    if !diff.missing_in_source.is_empty() {
        let Some(catch_all) = catch_all else {
            return Err(MergeError::NoCatchAll {
                target: target.name().to_string(),
                codes: diff.missing_in_source,
            });
        };
        redirect_map.extend(diff.missing_in_source.iter().map(|code| (*code, catch_all)));
    }

    let label_conflicts = diff
        .shared
        .iter()
        .filter_map(|code| {
            let old = target.element(*code)?;
            let new = source.element(*code)?;
            (old.label != new.label).then(|| LabelConflict {
                code: *code,
                old_label: old.label.clone(),
                new_label: new.label.clone(),
            })
        })
        .collect();

    Ok(MergeDecision {
        missing_in_target: diff.missing_in_target,
        missing_in_source: diff.missing_in_source,
        label_conflicts,
        redirect_map,
    })
}

/// Merges `source` into `target`. On error `target` is left untouched.
pub fn merge_into(
    source: &Codeplan,
    target: &mut Codeplan,
    catch_all: Option<Code>,
) -> Result<MergeDecision, MergeError> {
    let decision = decide(source, target, catch_all)?;
    if !decision.missing_in_source.is_empty() {
        info!(
            "'{}' codes missing in '{}': {}",
            target.name(),
            source.name(),
            join_codes(&decision.missing_in_source)
        );
        if let Some(catch_all) = catch_all
            && source.element(catch_all).is_none()
        {
            warn!(
                "Catch-all {catch_all} for '{}' is not defined in '{}'",
                target.name(),
                source.name()
            );
        }
    }
    for conflict in &decision.label_conflicts {
        info!(
            "Overwriting label for {}: \"{}\" -> \"{}\"",
            conflict.code, conflict.old_label, conflict.new_label
        );
    }
    target.replace_with(source);
    Ok(decision)
}
