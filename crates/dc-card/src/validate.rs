//! Completeness check of the input histograms.
//!
//! Runs once before rearrangement and reports every gap at once: missing
//! samples, missing datasets, missing categories and missing variations.

use std::fmt;

use dc_core::{Error, Result};
use dc_hist::{CATEGORY_AXIS, HistogramView, VARIATION_AXIS};

use crate::inputs::{DatasetMetadata, HistogramMap};
use crate::process::{Process, Processes};
use crate::systematics::VariationName;

/// What is missing for one sample or dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gap {
    /// The metadata lists no dataset of the sample for the year.
    NoDatasets {
        /// Data-taking period.
        year: String,
    },
    /// The sample has no entry in the histogram mapping.
    NoSample,
    /// The dataset has no histogram.
    NoHistogram,
    /// The histogram lacks the category.
    NoCategory(String),
    /// The histogram lacks these variations.
    Variations(Vec<String>),
}

/// One offending sample/dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingEntry {
    /// Process owning the sample.
    pub process: String,
    /// Sample name.
    pub sample: String,
    /// Dataset name, when the gap is dataset-specific.
    pub dataset: Option<String>,
    /// What is missing.
    pub gap: Gap,
}

impl fmt::Display for MissingEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dataset {
            Some(d) => write!(f, "  {}/{} (process '{}'): ", self.sample, d, self.process)?,
            None => write!(f, "  {} (process '{}'): ", self.sample, self.process)?,
        }
        match &self.gap {
            Gap::NoDatasets { year } => write!(f, "no datasets for year {}", year),
            Gap::NoSample => f.write_str("sample missing from histograms"),
            Gap::NoHistogram => f.write_str("histogram missing"),
            Gap::NoCategory(c) => write!(f, "category '{}' missing", c),
            Gap::Variations(v) => write!(f, "missing variations [{}]", v.join(", ")),
        }
    }
}

/// Every gap found in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletenessReport {
    /// Offending entries in process/sample/dataset order.
    pub entries: Vec<MissingEntry>,
}

impl CompletenessReport {
    /// Whether the inputs are complete.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `Ok(())` when complete, otherwise one aggregated error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() { Ok(()) } else { Err(Error::Completeness(self.to_string())) }
    }
}

impl fmt::Display for CompletenessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.entries.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

/// Variations a process must provide: data only needs the nominal template.
pub(crate) fn variations_for<'a>(
    process: &Process,
    variations: &'a [VariationName],
) -> impl Iterator<Item = &'a VariationName> {
    let data = process.is_data();
    variations.iter().filter(move |v| !data || v.is_nominal())
}

/// Collect every gap between the declared processes and the input histograms.
pub fn check_completeness<H: HistogramView>(
    histograms: &HistogramMap<H>,
    metadata: &DatasetMetadata,
    processes: &Processes,
    variations: &[VariationName],
    year: &str,
    category: &str,
) -> CompletenessReport {
    let mut report = CompletenessReport::default();

    for process in processes.iter() {
        for sample in process.samples() {
            let entry = |dataset: Option<&str>, gap: Gap| MissingEntry {
                process: process.name().to_string(),
                sample: sample.clone(),
                dataset: dataset.map(str::to_string),
                gap,
            };

            let Some(datasets) = metadata.datasets(year, sample).filter(|d| !d.is_empty())
            else {
                report.entries.push(entry(None, Gap::NoDatasets { year: year.to_string() }));
                continue;
            };
            let Some(by_dataset) = histograms.get(sample) else {
                report.entries.push(entry(None, Gap::NoSample));
                continue;
            };

            for dataset in datasets {
                let Some(hist) = by_dataset.get(dataset) else {
                    report.entries.push(entry(Some(dataset), Gap::NoHistogram));
                    continue;
                };
                let categories = hist.axis_values(CATEGORY_AXIS).unwrap_or_default();
                if !categories.iter().any(|c| c == category) {
                    report
                        .entries
                        .push(entry(Some(dataset), Gap::NoCategory(category.to_string())));
                    continue;
                }
                let present = hist.axis_values(VARIATION_AXIS).unwrap_or_default();
                let missing: Vec<String> = variations_for(process, variations)
                    .filter(|v| !present.iter().any(|p| *p == v.input))
                    .map(|v| v.input.clone())
                    .collect();
                if !missing.is_empty() {
                    report.entries.push(entry(Some(dataset), Gap::Variations(missing)));
                }
            }
        }
    }

    report
}

/// [`check_completeness`] as a fatal check.
pub fn validate<H: HistogramView>(
    histograms: &HistogramMap<H>,
    metadata: &DatasetMetadata,
    processes: &Processes,
    variations: &[VariationName],
    year: &str,
    category: &str,
) -> Result<()> {
    check_completeness(histograms, metadata, processes, variations, year, category).into_result()
}
