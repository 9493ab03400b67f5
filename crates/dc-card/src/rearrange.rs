//! Rearrangement of `sample -> dataset` histograms into one
//! `(process, variation, observable)` histogram for a fixed year and category.

use dc_core::{Error, Result};
use dc_hist::{CategoryHistogram, HistogramView, VARIATION_AXIS};

use crate::inputs::{DatasetMetadata, HistogramMap};
use crate::process::Processes;
use crate::systematics::VariationName;
use crate::validate::variations_for;

/// Name of the process axis of the unified histogram.
pub const PROCESS_AXIS: &str = "process";

/// Accumulate every contributing dataset into the unified histogram.
///
/// Inputs are expected to have passed [`crate::validate::validate`]; a
/// missing histogram, category or variation here is reported as an error
/// but indicates a skipped validation.
pub fn rearrange<H: HistogramView>(
    histograms: &HistogramMap<H>,
    metadata: &DatasetMetadata,
    processes: &Processes,
    variations: &[VariationName],
    year: &str,
    category: &str,
) -> Result<CategoryHistogram> {
    let axis = histograms
        .values()
        .find_map(|by_dataset| by_dataset.values().next())
        .map(|h| h.observable().clone())
        .ok_or_else(|| Error::Completeness("  no input histograms".into()))?;

    let mut unified = CategoryHistogram::with_axes(PROCESS_AXIS, VARIATION_AXIS, axis);
    for process in processes.iter() {
        unified.declare_first(process.name());
    }
    for v in variations {
        unified.declare_second(&v.output);
    }

    for process in processes.iter() {
        for sample in process.samples() {
            let datasets = metadata.datasets(year, sample).ok_or_else(|| {
                Error::Completeness(format!("  {}: no datasets for year {}", sample, year))
            })?;
            for dataset in datasets {
                let hist = histograms.get(sample).and_then(|d| d.get(dataset)).ok_or_else(|| {
                    Error::Completeness(format!("  {}/{}: histogram missing", sample, dataset))
                })?;
                if !hist.observable().same_binning(unified.observable()) {
                    return Err(Error::Histogram(format!(
                        "{}/{}: binning {:?} differs from {:?}",
                        sample,
                        dataset,
                        hist.observable().edges(),
                        unified.observable().edges()
                    )));
                }
                tracing::debug!(
                    process = process.name(),
                    sample = %sample,
                    dataset = %dataset,
                    "accumulating dataset"
                );
                for v in variations_for(process, variations) {
                    let cells = hist.slice(category, &v.input)?;
                    unified.add_slice(process.name(), &v.output, &cells)?;
                }
            }
        }
    }

    Ok(unified)
}
