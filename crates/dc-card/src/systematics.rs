//! Systematic uncertainties and the de-duplicating registry.
//!
//! Two declarations that share `(datacard_name, name)` collapse into one
//! nuisance parameter whose per-process magnitudes are the union of both.

use std::collections::BTreeSet;
use std::fmt;

use dc_core::{Error, Result};
use dc_hist::NOMINAL;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Nuisance type as written in the datacard (`shape`, `lnN`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SystematicType {
    /// Template morphing between `Up`/`Down` histograms.
    Shape,
    /// Log-normal normalization.
    LnN,
    /// Any other Combine nuisance type, written verbatim.
    Other(String),
}

impl From<String> for SystematicType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "shape" => SystematicType::Shape,
            "lnN" => SystematicType::LnN,
            _ => SystematicType::Other(s),
        }
    }
}

impl From<&str> for SystematicType {
    fn from(s: &str) -> Self {
        SystematicType::from(s.to_string())
    }
}

impl From<SystematicType> for String {
    fn from(t: SystematicType) -> Self {
        t.to_string()
    }
}

impl fmt::Display for SystematicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystematicType::Shape => f.write_str("shape"),
            SystematicType::LnN => f.write_str("lnN"),
            SystematicType::Other(s) => f.write_str(s),
        }
    }
}

/// Magnitude of a systematic on one process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Magnitude {
    /// One number, e.g. `1.02`.
    Symmetric(f64),
    /// `(down, up)` pair, written `down/up`.
    Asymmetric(f64, f64),
}

impl Magnitude {
    fn is_finite(&self) -> bool {
        match *self {
            Magnitude::Symmetric(v) => v.is_finite(),
            Magnitude::Asymmetric(d, u) => d.is_finite() && u.is_finite(),
        }
    }
}

impl From<f64> for Magnitude {
    fn from(v: f64) -> Self {
        Magnitude::Symmetric(v)
    }
}

impl From<(f64, f64)> for Magnitude {
    fn from((down, up): (f64, f64)) -> Self {
        Magnitude::Asymmetric(down, up)
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Magnitude::Symmetric(v) => write!(f, "{}", v),
            Magnitude::Asymmetric(down, up) => write!(f, "{}/{}", down, up),
        }
    }
}

/// How a systematic names the processes it affects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProcessSelection {
    /// Process names sharing one `value`.
    Shared(Vec<String>),
    /// Explicit magnitude per process.
    PerProcess(IndexMap<String, Magnitude>),
}

/// Input and output spelling of one histogram variation.
///
/// Upstream histograms name variations after the physics name
/// (`{name}Up`); the unified histogram and the shape file use the card name
/// (`{datacard_name}Up`) so Combine's `$SYSTEMATIC` substitution resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VariationName {
    /// Variation value on the upstream histogram.
    pub input: String,
    /// Variation value in the unified histogram and shape file.
    pub output: String,
}

impl VariationName {
    /// The nominal template.
    pub fn nominal() -> Self {
        Self { input: NOMINAL.to_string(), output: NOMINAL.to_string() }
    }

    /// Whether this is the nominal template.
    pub fn is_nominal(&self) -> bool {
        self.output == NOMINAL
    }
}

/// One systematic uncertainty.
#[derive(Debug, Clone, PartialEq)]
pub struct SystematicUncertainty {
    name: String,
    datacard_name: String,
    typ: SystematicType,
    processes: IndexMap<String, Magnitude>,
    years: BTreeSet<String>,
}

impl SystematicUncertainty {
    /// Create a systematic.
    ///
    /// Exactly one of these must hold: `processes` is a shared list and
    /// `value` is given, or `processes` is a per-process mapping and `value`
    /// is `None`.
    pub fn new(
        name: impl Into<String>,
        typ: impl Into<SystematicType>,
        processes: ProcessSelection,
        value: Option<Magnitude>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Construction("systematic name must not be empty".into()));
        }
        let processes: IndexMap<String, Magnitude> = match (processes, value) {
            (ProcessSelection::Shared(list), Some(v)) => {
                list.into_iter().map(|p| (p, v)).collect()
            }
            (ProcessSelection::Shared(_), None) => {
                return Err(Error::Construction(format!(
                    "systematic '{}': a process list requires a value",
                    name
                )));
            }
            (ProcessSelection::PerProcess(_), Some(_)) => {
                return Err(Error::Construction(format!(
                    "systematic '{}': value and per-process magnitudes are mutually exclusive",
                    name
                )));
            }
            (ProcessSelection::PerProcess(map), None) => map,
        };
        if processes.is_empty() {
            return Err(Error::Construction(format!(
                "systematic '{}' applies to no process",
                name
            )));
        }
        if let Some((p, m)) = processes.iter().find(|(_, m)| !m.is_finite()) {
            return Err(Error::Construction(format!(
                "systematic '{}': non-finite magnitude {} for process '{}'",
                name, m, p
            )));
        }
        Ok(Self {
            datacard_name: name.clone(),
            name,
            typ: typ.into(),
            processes,
            years: BTreeSet::new(),
        })
    }

    /// Systematic with one magnitude shared by every listed process.
    pub fn shared<P: Into<String>>(
        name: impl Into<String>,
        typ: impl Into<SystematicType>,
        processes: impl IntoIterator<Item = P>,
        value: impl Into<Magnitude>,
    ) -> Result<Self> {
        let list = processes.into_iter().map(Into::into).collect();
        Self::new(name, typ, ProcessSelection::Shared(list), Some(value.into()))
    }

    /// Systematic with an explicit magnitude per process.
    pub fn per_process<P: Into<String>, M: Into<Magnitude>>(
        name: impl Into<String>,
        typ: impl Into<SystematicType>,
        processes: impl IntoIterator<Item = (P, M)>,
    ) -> Result<Self> {
        let map = processes.into_iter().map(|(p, m)| (p.into(), m.into())).collect();
        Self::new(name, typ, ProcessSelection::PerProcess(map), None)
    }

    /// Override the nuisance name written to the card.
    pub fn with_datacard_name(mut self, datacard_name: impl Into<String>) -> Self {
        self.datacard_name = datacard_name.into();
        self
    }

    /// Restrict to data-taking periods (empty = all).
    pub fn with_years<Y: Into<String>>(mut self, years: impl IntoIterator<Item = Y>) -> Self {
        self.years = years.into_iter().map(Into::into).collect();
        self
    }

    /// Physics name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nuisance name in the card.
    pub fn datacard_name(&self) -> &str {
        &self.datacard_name
    }

    /// Nuisance type.
    pub fn typ(&self) -> &SystematicType {
        &self.typ
    }

    /// Magnitude per process.
    pub fn processes(&self) -> &IndexMap<String, Magnitude> {
        &self.processes
    }

    /// Data-taking periods (empty = all).
    pub fn years(&self) -> &BTreeSet<String> {
        &self.years
    }

    /// Magnitude on `process`, if it is affected.
    pub fn magnitude(&self, process: &str) -> Option<Magnitude> {
        self.processes.get(process).copied()
    }

    /// Whether the systematic applies in `year`.
    pub fn applies_to(&self, year: &str) -> bool {
        self.years.is_empty() || self.years.contains(year)
    }

    /// `Up`/`Down` variations for shape systematics, empty otherwise.
    pub fn variations(&self) -> Vec<VariationName> {
        if self.typ != SystematicType::Shape {
            return Vec::new();
        }
        ["Up", "Down"]
            .iter()
            .map(|dir| VariationName {
                input: format!("{}{}", self.name, dir),
                output: format!("{}{}", self.datacard_name, dir),
            })
            .collect()
    }
}

/// Registry of systematics keyed by datacard name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Systematics {
    items: IndexMap<String, SystematicUncertainty>,
}

impl Systematics {
    /// Build the registry, merging declarations that share `(datacard_name, name)`.
    ///
    /// Merged members must agree on type and years, and may only overlap on
    /// processes where they assign the same magnitude. Every conflict is
    /// reported in one error.
    pub fn merge(systematics: impl IntoIterator<Item = SystematicUncertainty>) -> Result<Self> {
        let mut groups: IndexMap<(String, String), Vec<SystematicUncertainty>> = IndexMap::new();
        for s in systematics {
            groups.entry((s.datacard_name.clone(), s.name.clone())).or_default().push(s);
        }

        let mut conflicts: Vec<String> = Vec::new();
        let mut items: IndexMap<String, SystematicUncertainty> = IndexMap::new();

        for ((datacard_name, name), members) in groups {
            let merged = match merge_group(members) {
                Ok(s) => s,
                Err(reason) => {
                    conflicts.push(format!("'{}' ({}): {}", datacard_name, name, reason));
                    continue;
                }
            };
            if let Some(existing) = items.get(&datacard_name) {
                conflicts.push(format!(
                    "'{}': datacard name shared by systematics '{}' and '{}'",
                    datacard_name, existing.name, merged.name
                ));
                continue;
            }
            items.insert(datacard_name, merged);
        }

        if !conflicts.is_empty() {
            return Err(Error::MergeConflict(conflicts.join("; ")));
        }
        Ok(Self { items })
    }

    /// Number of nuisance parameters.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up by datacard name.
    pub fn get(&self, datacard_name: &str) -> Option<&SystematicUncertainty> {
        self.items.get(datacard_name)
    }

    /// Systematics in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &SystematicUncertainty> {
        self.items.values()
    }

    /// Datacard names of every systematic of type `typ`.
    pub fn list_type(&self, typ: &SystematicType) -> Vec<&str> {
        self.iter().filter(|s| &s.typ == typ).map(|s| s.datacard_name.as_str()).collect()
    }

    /// Systematics of type `typ`, keyed by datacard name.
    pub fn get_by_type(&self, typ: &SystematicType) -> IndexMap<&str, &SystematicUncertainty> {
        self.iter().filter(|s| &s.typ == typ).map(|s| (s.datacard_name.as_str(), s)).collect()
    }

    /// Systematics affecting `process`, keyed by datacard name.
    pub fn get_by_process(&self, process: &str) -> IndexMap<&str, &SystematicUncertainty> {
        self.iter()
            .filter(|s| s.processes.contains_key(process))
            .map(|s| (s.datacard_name.as_str(), s))
            .collect()
    }

    /// `{datacard_name}Up` / `{datacard_name}Down` for every shape systematic.
    pub fn variations_names(&self) -> Vec<String> {
        self.variations().into_iter().map(|v| v.output).collect()
    }

    /// Shape variations with their upstream and output spellings.
    pub fn variations(&self) -> Vec<VariationName> {
        self.iter().flat_map(SystematicUncertainty::variations).collect()
    }

    /// `nominal` followed by every shape variation.
    pub fn required_variations(&self) -> Vec<VariationName> {
        std::iter::once(VariationName::nominal()).chain(self.variations()).collect()
    }

    /// Copy of the registry restricted to systematics active in `year`.
    pub fn for_year(&self, year: &str) -> Systematics {
        let items = self
            .items
            .iter()
            .filter(|(_, s)| s.applies_to(year))
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect();
        Systematics { items }
    }
}

fn merge_group(
    members: Vec<SystematicUncertainty>,
) -> std::result::Result<SystematicUncertainty, String> {
    let mut iter = members.into_iter();
    let Some(mut merged) = iter.next() else {
        return Err("empty group".into());
    };
    for other in iter {
        if other.typ != merged.typ {
            return Err(format!("differing types '{}' and '{}'", merged.typ, other.typ));
        }
        if other.years != merged.years {
            return Err(format!("differing years {:?} and {:?}", merged.years, other.years));
        }
        for (process, magnitude) in other.processes {
            match merged.processes.get(&process) {
                Some(existing) if *existing != magnitude => {
                    return Err(format!(
                        "process '{}' has magnitudes {} and {}",
                        process, existing, magnitude
                    ));
                }
                Some(_) => {}
                None => {
                    merged.processes.insert(process, magnitude);
                }
            }
        }
    }
    tracing::debug!(
        systematic = %merged.datacard_name,
        processes = merged.processes.len(),
        "merged systematic"
    );
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lumi(processes: &[&str], value: f64) -> SystematicUncertainty {
        SystematicUncertainty::shared("lumi", "lnN", processes.iter().copied(), value).unwrap()
    }

    #[test]
    fn construction_contract() {
        let list = ProcessSelection::Shared(vec!["tt".into()]);
        let map = ProcessSelection::PerProcess(IndexMap::from([(
            "tt".to_string(),
            Magnitude::Symmetric(1.1),
        )]));
        let value = Some(Magnitude::Symmetric(1.1));
        assert!(SystematicUncertainty::new("a", "lnN", list.clone(), value).is_ok());
        assert!(SystematicUncertainty::new("a", "lnN", map.clone(), None).is_ok());
        assert!(matches!(
            SystematicUncertainty::new("a", "lnN", list, None),
            Err(Error::Construction(_))
        ));
        assert!(matches!(
            SystematicUncertainty::new("a", "lnN", map, value),
            Err(Error::Construction(_))
        ));
        let none: [&str; 0] = [];
        assert!(SystematicUncertainty::shared("a", "lnN", none, 1.1).is_err());
        assert!(SystematicUncertainty::shared("a", "lnN", ["tt"], f64::NAN).is_err());
    }

    #[test]
    fn list_is_normalized_to_mapping() {
        let s = SystematicUncertainty::shared("lumi", "lnN", ["ttH", "tt"], (0.98, 1.02)).unwrap();
        assert_eq!(s.magnitude("tt"), Some(Magnitude::Asymmetric(0.98, 1.02)));
        assert_eq!(s.magnitude("ttZ"), None);
        assert_eq!(s.datacard_name(), "lumi");
    }

    #[test]
    fn merge_disjoint_gives_union() {
        let reg = Systematics::merge([lumi(&["tt"], 1.02), lumi(&["ttH"], 1.02)]).unwrap();
        assert_eq!(reg.len(), 1);
        let s = reg.get("lumi").unwrap();
        assert_eq!(s.processes().keys().collect::<Vec<_>>(), vec!["tt", "ttH"]);
    }

    #[test]
    fn merge_overlap_same_magnitude() {
        let reg = Systematics::merge([lumi(&["tt", "ttH"], 1.02), lumi(&["ttH"], 1.02)]).unwrap();
        assert_eq!(reg.get("lumi").unwrap().processes().len(), 2);
    }

    #[test]
    fn merge_overlap_different_magnitude_fails() {
        let err = Systematics::merge([lumi(&["tt"], 1.02), lumi(&["tt"], 1.025)]).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, Error::MergeConflict(_)));
        assert!(msg.contains("lumi"), "{msg}");
        assert!(msg.contains("'tt'"), "{msg}");
    }

    #[test]
    fn merge_requires_same_type_and_years() {
        let shape = SystematicUncertainty::shared("lumi", "shape", ["ttH"], 1.0).unwrap();
        assert!(Systematics::merge([lumi(&["tt"], 1.02), shape]).is_err());

        let y17 = lumi(&["ttH"], 1.02).with_years(["2017"]);
        assert!(Systematics::merge([lumi(&["tt"], 1.02), y17]).is_err());
    }

    #[test]
    fn merge_reports_every_conflict() {
        let err = Systematics::merge([
            lumi(&["tt"], 1.02),
            lumi(&["tt"], 1.03),
            SystematicUncertainty::shared("pu", "shape", ["tt"], 1.0).unwrap(),
            SystematicUncertainty::shared("pu", "lnN", ["ttH"], 1.1).unwrap(),
        ])
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'lumi'") && msg.contains("'pu'"), "{msg}");
    }

    #[test]
    fn datacard_name_collision_is_a_conflict() {
        let a = lumi(&["tt"], 1.02).with_datacard_name("lumi_13TeV");
        let b = SystematicUncertainty::shared("lumi_corr", "lnN", ["ttH"], 1.01)
            .unwrap()
            .with_datacard_name("lumi_13TeV");
        assert!(Systematics::merge([a, b]).is_err());
    }

    #[test]
    fn queries() {
        let reg = Systematics::merge([
            lumi(&["tt", "ttH"], 1.02),
            SystematicUncertainty::per_process("JES", "shape", [("tt", 1.0)]).unwrap(),
            SystematicUncertainty::per_process("JES", "shape", [("ttH", 1.0)]).unwrap(),
            SystematicUncertainty::shared("btag", "shape", ["ttH"], 1.0)
                .unwrap()
                .with_datacard_name("CMS_btag"),
        ])
        .unwrap();

        assert_eq!(reg.list_type(&SystematicType::Shape), vec!["JES", "CMS_btag"]);
        assert_eq!(reg.list_type(&SystematicType::LnN), vec!["lumi"]);
        assert_eq!(reg.get_by_type(&SystematicType::LnN).len(), 1);
        assert_eq!(reg.get_by_process("ttH").len(), 3);
        let tt: Vec<&str> = reg.get_by_process("tt").keys().copied().collect();
        assert_eq!(tt, vec!["lumi", "JES"]);
        assert_eq!(
            reg.variations_names(),
            vec!["JESUp", "JESDown", "CMS_btagUp", "CMS_btagDown"]
        );

        let required = reg.required_variations();
        assert!(required[0].is_nominal());
        assert_eq!(required[3].input, "btagUp");
        assert_eq!(required[3].output, "CMS_btagUp");
    }

    #[test]
    fn magnitude_rendering() {
        assert_eq!(Magnitude::Symmetric(1.02).to_string(), "1.02");
        assert_eq!(Magnitude::Asymmetric(0.97, 1.04).to_string(), "0.97/1.04");
        assert_eq!(SystematicType::from("lnU").to_string(), "lnU");
    }

    #[test]
    fn magnitude_deserializes_number_or_pair() {
        let m: Magnitude = serde_json::from_str("1.05").unwrap();
        assert_eq!(m, Magnitude::Symmetric(1.05));
        let m: Magnitude = serde_json::from_str("[0.95, 1.05]").unwrap();
        assert_eq!(m, Magnitude::Asymmetric(0.95, 1.05));
    }
}
