//! Inputs handed over by the event-processing pipeline.
//!
//! - the histogram mapping `sample -> dataset -> histogram`;
//! - dataset metadata `year -> sample -> [dataset]`, selecting which
//!   datasets contribute to a data-taking period.

use std::collections::BTreeMap;
use std::path::Path;

use dc_core::Result;
use dc_hist::CategoryHistogram;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Histograms keyed by sample, then by dataset.
pub type HistogramMap<H = CategoryHistogram> = IndexMap<String, IndexMap<String, H>>;

/// Read a [`HistogramMap`] from a JSON file.
pub fn read_histograms(path: &Path) -> Result<HistogramMap> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Datasets per data-taking period and sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    /// `year -> sample -> datasets`.
    #[serde(default)]
    pub by_datataking_period: BTreeMap<String, IndexMap<String, Vec<String>>>,
}

impl DatasetMetadata {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read metadata from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Register `dataset` as part of `sample` in `year`.
    pub fn insert(&mut self, year: &str, sample: &str, dataset: &str) {
        let datasets = self
            .by_datataking_period
            .entry(year.to_string())
            .or_default()
            .entry(sample.to_string())
            .or_default();
        if !datasets.iter().any(|d| d == dataset) {
            datasets.push(dataset.to_string());
        }
    }

    /// Builder form of [`DatasetMetadata::insert`].
    pub fn with(mut self, year: &str, sample: &str, dataset: &str) -> Self {
        self.insert(year, sample, dataset);
        self
    }

    /// Datasets of `sample` taken in `year`.
    pub fn datasets(&self, year: &str, sample: &str) -> Option<&[String]> {
        self.by_datataking_period.get(year)?.get(sample).map(Vec::as_slice)
    }

    /// Data-taking periods known to the metadata.
    pub fn years(&self) -> impl Iterator<Item = &str> {
        self.by_datataking_period.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_lookup() {
        let meta = DatasetMetadata::new()
            .with("2018", "DATA_SingleMuon", "DATA_SingleMuon_2018_EraA")
            .with("2018", "DATA_SingleMuon", "DATA_SingleMuon_2018_EraB")
            .with("2018", "DATA_SingleMuon", "DATA_SingleMuon_2018_EraA")
            .with("2017", "TTToSemiLeptonic", "TTToSemiLeptonic_2017");

        assert_eq!(meta.datasets("2018", "DATA_SingleMuon").map(<[String]>::len), Some(2));
        assert_eq!(meta.datasets("2017", "DATA_SingleMuon"), None);
        assert_eq!(meta.years().collect::<Vec<_>>(), vec!["2017", "2018"]);
    }

    #[test]
    fn metadata_json_layout() {
        let meta: DatasetMetadata = serde_json::from_str(
            r#"{"by_datataking_period": {"2018": {"ttHTobb": ["ttHTobb_2018"]}}}"#,
        )
        .unwrap();
        assert_eq!(meta.datasets("2018", "ttHTobb"), Some(&["ttHTobb_2018".to_string()][..]));
    }
}
