//! Metadata-document collaborator.
//!
//! A document is a YAML file listing category sets (the codeplan elements)
//! and the categorical variables bound to them. Each variable carries the
//! axis expression of its category set.
//!
//! ```yaml
//! category_sets:
//!   - name: head_1
//!     categories:
//!       - { name: CB_1, label: Good }
//! variables:
//!   - name: q1
//!     label: Why did you choose us?
//!     category_set: head_1
//!     axis: "{base(),CB_1 'Good'}"
//! ```

use std::{
    collections::BTreeSet,
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    axis::{self, AxisDialect},
    code::Code,
    codeplan::{Codeplan, Element},
    error::GrammarError,
    names::{self, RenameOutcome, RenameTable},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDocument {
    #[serde(default)]
    pub category_sets: Vec<CategorySet>,
    #[serde(default)]
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet {
    pub name: String,
    #[serde(default)]
    pub categories: Vec<CategoryEntry>,
}

/// Category names are kept as written so malformed codes can be reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub name: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Full variable name, iteration tokens included (`loop[{_1}].q7`).
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub category_set: String,
    #[serde(default)]
    pub axis: String,
    /// Field the coding is written back under, once a rename table applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding_field: Option<String>,
}

impl MetadataDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening document {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).with_context(|| format!("Parsing document YAML {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating document {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing document YAML")
    }

    pub fn category_set(&self, name: &str) -> Option<&CategorySet> {
        self.category_sets.iter().find(|set| set.name == name)
    }

    pub fn variables_of<'a>(&'a self, category_set: &'a str) -> impl Iterator<Item = &'a Variable> + 'a {
        self.variables
            .iter()
            .filter(move |variable| variable.category_set == category_set)
    }

    /// Reads one category set as a codeplan.
    pub fn codeplan(&self, name: &str) -> Option<Codeplan> {
        self.category_set(name).map(|set| self.read_codeplan(set))
    }

    /// Every category set as a codeplan, in document order.
    pub fn codeplans(&self) -> Vec<Codeplan> {
        self.category_sets
            .iter()
            .map(|set| self.read_codeplan(set))
            .collect()
    }

    fn read_codeplan(&self, set: &CategorySet) -> Codeplan {
        let mut errors = Vec::new();
        let mut elements = Vec::with_capacity(set.categories.len());
        for category in &set.categories {
            match category.name.parse::<Code>() {
                Ok(code) => elements.push(Element::new(code, category.label.clone())),
                Err(error) => errors.push(error),
            }
        }

        let axes = self
            .variables_of(&set.name)
            .map(|variable| variable.axis.as_str())
            .collect::<BTreeSet<_>>();
        if axes.len() > 1 {
            errors.push(GrammarError::AxisNotUnique { count: axes.len() });
        }
        let axis = self
            .variables_of(&set.name)
            .map(|variable| variable.axis.as_str())
            .next()
            .unwrap_or_default();
        if axis.is_empty() {
            debug!("Category set '{}' has no axis expression", set.name);
        }
        Codeplan::from_axis(set.name.clone(), axis, elements, errors)
    }

    /// Writes a merged codeplan back: the category set takes its elements and
    /// every variable bound to it takes its axis.
    pub fn apply_codeplan(&mut self, codeplan: &Codeplan) -> Result<()> {
        let axis_expression = codeplan
            .tree()
            .map(|tree| axis::render_with(tree, AxisDialect::LeadingBase))
            .map_err(|errors| anyhow!("Codeplan '{}' is invalid:\n{errors}", codeplan.name()))?;
        let set = self
            .category_sets
            .iter_mut()
            .find(|set| set.name == codeplan.name())
            .ok_or_else(|| anyhow!("Category set '{}' not found in document", codeplan.name()))?;
        set.categories = codeplan
            .elements()
            .iter()
            .map(|element| CategoryEntry {
                name: element.code.to_string(),
                label: element.label.clone(),
            })
            .collect();
        for variable in self
            .variables
            .iter_mut()
            .filter(|variable| variable.category_set == codeplan.name())
        {
            variable.axis.clone_from(&axis_expression);
        }
        Ok(())
    }

    pub fn rename_outcome(&self) -> RenameOutcome {
        names::build_rename_table(
            self.variables
                .iter()
                .map(|variable| (variable.name.as_str(), variable.category_set.as_str())),
        )
    }

    /// Records on every variable the field its coding is written back under.
    pub fn apply_rename_table(&mut self, table: &RenameTable) {
        for variable in &mut self.variables {
            variable.coding_field = Some(table.target_for(&variable.name));
        }
    }

    /// Appends the category sets and variables of `other` whose names are not
    /// present yet. Returns how many of each were added.
    pub fn append(&mut self, other: &MetadataDocument) -> (usize, usize) {
        let known_sets = self
            .category_sets
            .iter()
            .map(|set| set.name.clone())
            .collect::<BTreeSet<_>>();
        let new_sets = other
            .category_sets
            .iter()
            .filter(|set| !known_sets.contains(&set.name))
            .cloned()
            .collect::<Vec<_>>();

        let known_variables = self
            .variables
            .iter()
            .map(|variable| variable.name.clone())
            .collect::<BTreeSet<_>>();
        let new_variables = other
            .variables
            .iter()
            .filter(|variable| !known_variables.contains(&variable.name))
            .cloned()
            .collect::<Vec<_>>();

        let added = (new_sets.len(), new_variables.len());
        self.category_sets.extend(new_sets);
        self.variables.extend(new_variables);
        added
    }
}
