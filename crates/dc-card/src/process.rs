//! Physics processes and the ordered process collection.

use std::collections::BTreeSet;

use dc_core::{Error, Result};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Conventional name of the observed-data process.
pub const DATA_OBS: &str = "data_obs";

/// Role of a process in the datacard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    /// Signal hypothesis (ids `0, -1, -2, ...`).
    Signal,
    /// Background (ids `1, 2, 3, ...`).
    Background,
    /// Observed data; excluded from the expectation table.
    Data,
}

/// One physics process aggregating one or more samples.
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    name: String,
    samples: Vec<String>,
    years: BTreeSet<String>,
    kind: ProcessKind,
    label: String,
    id: Option<i32>,
}

impl Process {
    /// Create a process. Samples are de-duplicated keeping first occurrence.
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        samples: impl IntoIterator<Item = S>,
        kind: ProcessKind,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Construction("process name must not be empty".into()));
        }
        if kind == ProcessKind::Data && name != DATA_OBS {
            return Err(Error::Construction(format!(
                "data process must be named '{}', got '{}'",
                DATA_OBS, name
            )));
        }
        let samples: IndexSet<String> = samples.into_iter().map(Into::into).collect();
        if samples.is_empty() {
            return Err(Error::Construction(format!("process '{}' has no samples", name)));
        }
        if samples.iter().any(String::is_empty) {
            return Err(Error::Construction(format!("process '{}' has an empty sample name", name)));
        }
        Ok(Self {
            label: name.clone(),
            name,
            samples: samples.into_iter().collect(),
            years: BTreeSet::new(),
            kind,
            id: None,
        })
    }

    /// Signal process.
    pub fn signal<S: Into<String>>(
        name: impl Into<String>,
        samples: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        Self::new(name, samples, ProcessKind::Signal)
    }

    /// Background process.
    pub fn background<S: Into<String>>(
        name: impl Into<String>,
        samples: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        Self::new(name, samples, ProcessKind::Background)
    }

    /// Observed-data process, named [`DATA_OBS`].
    pub fn data<S: Into<String>>(samples: impl IntoIterator<Item = S>) -> Result<Self> {
        Self::new(DATA_OBS, samples, ProcessKind::Data)
    }

    /// Restrict the process to the given data-taking periods.
    ///
    /// An empty set means every period.
    pub fn with_years<Y: Into<String>>(mut self, years: impl IntoIterator<Item = Y>) -> Self {
        self.years = years.into_iter().map(Into::into).collect();
        self
    }

    /// Set the display label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Process name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Samples in declaration order, without duplicates.
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Data-taking periods (empty = all).
    pub fn years(&self) -> &BTreeSet<String> {
        &self.years
    }

    /// Process role.
    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Display label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Datacard process id, once assigned.
    pub fn id(&self) -> Option<i32> {
        self.id
    }

    /// Whether this is a signal process.
    pub fn is_signal(&self) -> bool {
        self.kind == ProcessKind::Signal
    }

    /// Whether this is the observed-data process.
    pub fn is_data(&self) -> bool {
        self.kind == ProcessKind::Data
    }

    /// Whether the process contributes in `year`.
    pub fn applies_to(&self, year: &str) -> bool {
        self.years.is_empty() || self.years.contains(year)
    }
}

/// Processes keyed by name, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Processes {
    items: IndexMap<String, Process>,
}

impl Processes {
    /// Collect processes, rejecting duplicate names and more than one data process.
    pub fn new(processes: impl IntoIterator<Item = Process>) -> Result<Self> {
        let mut items: IndexMap<String, Process> = IndexMap::new();
        for p in processes {
            if p.is_data() && items.values().any(Process::is_data) {
                return Err(Error::Structure(format!(
                    "at most one data process is allowed, got a second one with samples [{}]",
                    p.samples.join(", ")
                )));
            }
            if items.contains_key(&p.name) {
                return Err(Error::Construction(format!("duplicate process '{}'", p.name)));
            }
            items.insert(p.name.clone(), p);
        }
        Ok(Self { items })
    }

    /// Look up a process by name.
    pub fn get(&self, name: &str) -> Option<&Process> {
        self.items.get(name)
    }

    /// Whether a process with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Processes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.items.values()
    }

    /// Number of processes, data included.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Signal processes in declaration order.
    pub fn signals(&self) -> impl Iterator<Item = &Process> {
        self.iter().filter(|p| p.kind == ProcessKind::Signal)
    }

    /// Background processes in declaration order.
    pub fn backgrounds(&self) -> impl Iterator<Item = &Process> {
        self.iter().filter(|p| p.kind == ProcessKind::Background)
    }

    /// The observed-data process, if declared.
    pub fn data(&self) -> Option<&Process> {
        self.iter().find(|p| p.is_data())
    }

    /// Expectation-table columns: signals then backgrounds, each in declaration order.
    pub fn columns(&self) -> Vec<&Process> {
        self.signals().chain(self.backgrounds()).collect()
    }

    /// Copy of the collection restricted to processes active in `year`.
    pub fn for_year(&self, year: &str) -> Processes {
        let items = self
            .items
            .iter()
            .filter(|(_, p)| p.applies_to(year))
            .map(|(k, p)| (k.clone(), p.clone()))
            .collect();
        Processes { items }
    }

    /// Assign datacard ids: signals `0, -1, -2, ...`, backgrounds `1, 2, 3, ...`.
    ///
    /// Data keeps `None`.
    pub fn assign_ids(&mut self) {
        let mut next_signal = 0;
        let mut next_background = 1;
        for p in self.items.values_mut() {
            p.id = match p.kind {
                ProcessKind::Signal => {
                    let id = next_signal;
                    next_signal -= 1;
                    Some(id)
                }
                ProcessKind::Background => {
                    let id = next_background;
                    next_background += 1;
                    Some(id)
                }
                ProcessKind::Data => None,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_are_unique_and_ordered() {
        let p = Process::background("tt", ["TTToSemiLep", "TTTo2L2Nu", "TTToSemiLep"]).unwrap();
        assert_eq!(p.samples(), &["TTToSemiLep".to_string(), "TTTo2L2Nu".to_string()]);
        assert_eq!(p.label(), "tt");
        assert_eq!(p.id(), None);
    }

    #[test]
    fn construction_errors() {
        let empty: [&str; 0] = [];
        assert!(matches!(Process::signal("ttH", empty), Err(Error::Construction(_))));
        assert!(Process::new("", ["s"], ProcessKind::Background).is_err());
        assert!(Process::new("data", ["DATA_SingleMu"], ProcessKind::Data).is_err());
        assert_eq!(Process::data(["DATA_SingleMu"]).unwrap().name(), DATA_OBS);
    }

    #[test]
    fn years_filter() {
        let p = Process::background("tt", ["tt"]).unwrap().with_years(["2017", "2018"]);
        assert!(p.applies_to("2018"));
        assert!(!p.applies_to("2016"));
        let q = Process::background("st", ["st"]).unwrap();
        assert!(q.applies_to("2016"));

        let all = Processes::new([p, q]).unwrap();
        let only_2016 = all.for_year("2016");
        assert_eq!(only_2016.iter().map(Process::name).collect::<Vec<_>>(), vec!["st"]);
    }

    #[test]
    fn collection_rejects_duplicates_and_second_data() {
        let a = Process::background("tt", ["tt"]).unwrap();
        let err = Processes::new([a.clone(), a]).unwrap_err();
        assert!(matches!(err, Error::Construction(_)));

        let err = Processes::new([
            Process::data(["DATA_A"]).unwrap(),
            Process::background("tt", ["tt"]).unwrap(),
            Process::data(["DATA_B"]).unwrap(),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Structure(_)), "{err}");
        assert!(err.to_string().contains("DATA_B"));
    }

    #[test]
    fn ids_follow_declaration_order_per_stream() {
        let mut procs = Processes::new([
            Process::background("tt", ["tt"]).unwrap(),
            Process::signal("ttH", ["ttH"]).unwrap(),
            Process::data(["DATA"]).unwrap(),
            Process::background("ttZ", ["ttZ"]).unwrap(),
            Process::signal("tHq", ["tHq"]).unwrap(),
        ])
        .unwrap();
        procs.assign_ids();

        let cols: Vec<(&str, Option<i32>)> =
            procs.columns().into_iter().map(|p| (p.name(), p.id())).collect();
        assert_eq!(
            cols,
            vec![("ttH", Some(0)), ("tHq", Some(-1)), ("tt", Some(1)), ("ttZ", Some(2))]
        );
        assert_eq!(procs.data().and_then(Process::id), None);
    }
}
