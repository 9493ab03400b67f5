//! Job configuration: processes, systematics and output naming for one card.
//!
//! ```yaml
//! year: "2018"
//! category: SR
//! bin_prefix: ttHbb
//! processes:
//!   - { name: ttH, samples: [ttHTobb], signal: true }
//!   - { name: tt, samples: [TTToSemiLeptonic, TTTo2L2Nu] }
//! data: { samples: [DATA_SingleMuon] }
//! systematics:
//!   - { name: lumi, type: lnN, processes: [ttH, tt], value: 1.02 }
//!   - { name: JES, datacard_name: CMS_scale_j, type: shape, processes: [tt], value: 1.0 }
//! ```

use std::path::Path;

use dc_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::datacard::DatacardOptions;
use crate::process::{Process, ProcessKind, Processes};
use crate::systematics::{Magnitude, ProcessSelection, SystematicUncertainty, Systematics};

fn default_card_name() -> String {
    "datacard.txt".into()
}

fn default_shapes_name() -> String {
    DatacardOptions::default().shapes_filename
}

/// One expected process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Datacard process name.
    pub name: String,
    /// Upstream sample names.
    pub samples: Vec<String>,
    /// Signal rather than background.
    #[serde(default)]
    pub signal: bool,
    /// Active years; empty means every year.
    #[serde(default)]
    pub years: Vec<String>,
    /// Display label.
    #[serde(default)]
    pub label: Option<String>,
}

/// The observed-data process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Upstream data sample names.
    pub samples: Vec<String>,
}

/// One systematic declaration; declarations sharing a card name are merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystematicConfig {
    /// Physics name, used for upstream variation names.
    pub name: String,
    /// Nuisance name in the card; defaults to `name`.
    #[serde(default)]
    pub datacard_name: Option<String>,
    /// `lnN`, `shape`, ...
    #[serde(rename = "type")]
    pub typ: String,
    /// Affected processes: a list sharing `value`, or a `process: value` map.
    pub processes: ProcessSelection,
    /// Shared magnitude; only valid with a process list.
    #[serde(default)]
    pub value: Option<Magnitude>,
    /// Active years; empty means every year.
    #[serde(default)]
    pub years: Vec<String>,
}

/// Everything needed to render one datacard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Data-taking period.
    pub year: String,
    /// Analysis category.
    pub category: String,
    /// Optional bin name prefix.
    #[serde(default)]
    pub bin_prefix: Option<String>,
    /// Datacard file name.
    #[serde(default = "default_card_name")]
    pub card_name: String,
    /// Shape file name.
    #[serde(default = "default_shapes_name")]
    pub shapes_name: String,
    /// Expected processes.
    pub processes: Vec<ProcessConfig>,
    /// Observed data, if any.
    #[serde(default)]
    pub data: Option<DataConfig>,
    /// Systematic declarations.
    #[serde(default)]
    pub systematics: Vec<SystematicConfig>,
}

impl JobConfig {
    /// Read a job from JSON (`.json`) or YAML (anything else).
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("").to_ascii_lowercase();
        let cfg: JobConfig = if ext == "json" {
            serde_json::from_slice(&bytes)?
        } else {
            serde_yaml_ng::from_slice(&bytes)?
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the fields the model constructors do not cover.
    pub fn validate(&self) -> Result<()> {
        if self.year.is_empty() || self.category.is_empty() {
            return Err(Error::Validation("year and category must not be empty".into()));
        }
        if self.card_name.is_empty() || self.card_name == self.shapes_name {
            return Err(Error::Validation(format!(
                "card name '{}' must be non-empty and differ from the shape file name",
                self.card_name
            )));
        }
        Ok(())
    }

    /// Validated process collection.
    pub fn processes(&self) -> Result<Processes> {
        let mut out = Vec::with_capacity(self.processes.len() + 1);
        for p in &self.processes {
            let kind = if p.signal { ProcessKind::Signal } else { ProcessKind::Background };
            let mut process =
                Process::new(p.name.as_str(), p.samples.iter().map(String::as_str), kind)?
                    .with_years(p.years.iter().map(String::as_str));
            if let Some(label) = &p.label {
                process = process.with_label(label.as_str());
            }
            out.push(process);
        }
        if let Some(data) = &self.data {
            out.push(Process::data(data.samples.iter().map(String::as_str))?);
        }
        Processes::new(out)
    }

    /// Merged systematics registry.
    pub fn systematics(&self) -> Result<Systematics> {
        let mut out = Vec::with_capacity(self.systematics.len());
        for s in &self.systematics {
            let mut syst = SystematicUncertainty::new(
                s.name.as_str(),
                s.typ.as_str(),
                s.processes.clone(),
                s.value,
            )?
            .with_years(s.years.iter().map(String::as_str));
            if let Some(name) = &s.datacard_name {
                syst = syst.with_datacard_name(name.as_str());
            }
            out.push(syst);
        }
        Systematics::merge(out)
    }

    /// Rendering options.
    pub fn options(&self) -> DatacardOptions {
        DatacardOptions {
            bin_prefix: self.bin_prefix.clone(),
            shapes_filename: self.shapes_name.clone(),
        }
    }
}
