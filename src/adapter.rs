//! Adapter configuration: which document codeplan is reconciled with which
//! spreadsheet sheet.
//!
//! ```yaml
//! mappings:
//!   - document: head_11326
//!     sheet: CP Insurers
//!     master: cp_brands
//!     catch_all: CB_999
//!   - sheet: CP Not in document yet
//! ```

use std::{collections::BTreeSet, fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::code::Code;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default)]
    pub mappings: Vec<AdapterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterEntry {
    /// Category set name in the document; sheets without one are not merged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    pub sheet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catch_all: Option<Code>,
}

impl AdapterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening adapter file {path:?}"))?;
        let reader = BufReader::new(file);
        let config: AdapterConfig =
            serde_yaml::from_reader(reader).context("Parsing adapter YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects a document codeplan mapped more than once.
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for name in self.mappings.iter().filter_map(|entry| entry.document.as_deref()) {
            if !seen.insert(name) {
                bail!("Document codeplan '{name}' is mapped more than once");
            }
        }
        Ok(())
    }

    pub fn entry_for_sheet(&self, sheet: &str) -> Option<&AdapterEntry> {
        self.mappings.iter().find(|entry| entry.sheet == sheet)
    }
}
