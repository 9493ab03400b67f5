//! Weight-storage histograms.
//!
//! [`WeightedHistogram`] is a 1D histogram over an observable [`Axis`].
//! [`CategoryHistogram`] adds two string-category axes in front of the
//! observable, e.g. `(category, variation, observable)` for upstream inputs
//! or `(process, variation, observable)` for the unified datacard histogram.

use std::collections::BTreeMap;
use std::ops::Range;

use dc_core::{Error, Result};

use crate::axis::{Axis, StrCategory};
use crate::storage::WeightedSum;

/// Default name of the analysis-category axis.
pub const CATEGORY_AXIS: &str = "cat";
/// Default name of the systematic-variation axis.
pub const VARIATION_AXIS: &str = "variation";
/// Variation value of the nominal template.
pub const NOMINAL: &str = "nominal";

/// Cell selection for sums over the observable axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinRange {
    /// Every cell, underflow and overflow included.
    All,
    /// Regular bins only.
    Inner,
    /// Explicit flow-inclusive index range.
    Span(Range<usize>),
}

impl BinRange {
    fn resolve(&self, extent: usize) -> Result<Range<usize>> {
        let r = match self {
            BinRange::All => 0..extent,
            BinRange::Inner => 1..extent - 1,
            BinRange::Span(r) => r.clone(),
        };
        if r.start > r.end || r.end > extent {
            return Err(Error::Histogram(format!(
                "bin range {:?} out of bounds for {} cells",
                r, extent
            )));
        }
        Ok(r)
    }
}

/// Sum the cells selected by `range`.
pub fn sum_cells(cells: &[WeightedSum], range: &BinRange) -> Result<WeightedSum> {
    let r = range.resolve(cells.len())?;
    Ok(cells[r].iter().sum())
}

/// 1D histogram with weight storage and flow bins.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedHistogram {
    axis: Axis,
    cells: Vec<WeightedSum>,
}

impl WeightedHistogram {
    /// Empty histogram over `axis`.
    pub fn new(axis: Axis) -> Self {
        let cells = vec![WeightedSum::default(); axis.extent()];
        Self { axis, cells }
    }

    /// Histogram from flow-inclusive cells (length = n_bins + 2).
    pub fn from_cells(axis: Axis, cells: Vec<WeightedSum>) -> Result<Self> {
        if cells.len() != axis.extent() {
            return Err(Error::Histogram(format!(
                "axis '{}' has {} cells but {} were given",
                axis.name(),
                axis.extent(),
                cells.len()
            )));
        }
        Ok(Self { axis, cells })
    }

    /// Histogram from flow-inclusive value and variance arrays.
    pub fn from_parts(axis: Axis, values: &[f64], variances: &[f64]) -> Result<Self> {
        if values.len() != variances.len() {
            return Err(Error::Histogram(format!(
                "values ({}) and variances ({}) differ in length",
                values.len(),
                variances.len()
            )));
        }
        let cells =
            values.iter().zip(variances).map(|(&v, &w2)| WeightedSum::new(v, w2)).collect();
        Self::from_cells(axis, cells)
    }

    /// Observable axis.
    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    /// Flow-inclusive cells.
    pub fn cells(&self) -> &[WeightedSum] {
        &self.cells
    }

    /// Flow-inclusive sums of weights.
    pub fn values(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.value).collect()
    }

    /// Flow-inclusive sums of squared weights.
    pub fn variances(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.variance).collect()
    }

    /// Record one entry at `x` with weight `w`.
    pub fn fill(&mut self, x: f64, w: f64) {
        let i = self.axis.index(x);
        self.cells[i].fill(w);
    }

    /// Sum of the cells selected by `range`.
    pub fn sum(&self, range: BinRange) -> Result<WeightedSum> {
        sum_cells(&self.cells, &range)
    }

    /// Accumulate another histogram with identical binning.
    pub fn add(&mut self, other: &WeightedHistogram) -> Result<()> {
        if !self.axis.same_binning(&other.axis) {
            return Err(Error::Histogram(format!(
                "cannot add histograms with different binning: {:?} vs {:?}",
                self.axis.edges(),
                other.axis.edges()
            )));
        }
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a += *b;
        }
        Ok(())
    }
}

/// Histogram over two string-category axes and one observable axis.
///
/// Cells for a (first, second) pair are allocated on first write; a pair
/// whose values both exist on their axes but was never written reads as zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryHistogram {
    first: StrCategory,
    second: StrCategory,
    observable: Axis,
    cells: BTreeMap<(usize, usize), Vec<WeightedSum>>,
}

impl CategoryHistogram {
    /// Empty `(cat, variation, observable)` histogram.
    pub fn new(observable: Axis) -> Self {
        Self::with_axes(CATEGORY_AXIS, VARIATION_AXIS, observable)
    }

    /// Empty histogram with explicit names for the two category axes.
    pub fn with_axes(first: &str, second: &str, observable: Axis) -> Self {
        Self {
            first: StrCategory::new(first),
            second: StrCategory::new(second),
            observable,
            cells: BTreeMap::new(),
        }
    }

    /// Observable axis.
    pub fn observable(&self) -> &Axis {
        &self.observable
    }

    /// First category axis (`cat` or `process`).
    pub fn first_axis(&self) -> &StrCategory {
        &self.first
    }

    /// Second category axis (`variation`).
    pub fn second_axis(&self) -> &StrCategory {
        &self.second
    }

    /// Register a value on the first category axis without writing content.
    pub fn declare_first(&mut self, value: &str) {
        self.first.insert(value);
    }

    /// Register a value on the second category axis without writing content.
    pub fn declare_second(&mut self, value: &str) {
        self.second.insert(value);
    }

    fn cell_mut(&mut self, first: &str, second: &str) -> &mut Vec<WeightedSum> {
        let i = self.first.insert(first);
        let j = self.second.insert(second);
        let extent = self.observable.extent();
        self.cells.entry((i, j)).or_insert_with(|| vec![WeightedSum::default(); extent])
    }

    /// Record one entry at `x` with weight `w`.
    pub fn fill(&mut self, first: &str, second: &str, x: f64, w: f64) {
        let bin = self.observable.index(x);
        self.cell_mut(first, second)[bin].fill(w);
    }

    /// Accumulate flow-inclusive cells into the `(first, second)` slice.
    pub fn add_slice(&mut self, first: &str, second: &str, cells: &[WeightedSum]) -> Result<()> {
        if cells.len() != self.observable.extent() {
            return Err(Error::Histogram(format!(
                "slice has {} cells, observable axis '{}' has {}",
                cells.len(),
                self.observable.name(),
                self.observable.extent()
            )));
        }
        for (a, b) in self.cell_mut(first, second).iter_mut().zip(cells) {
            *a += *b;
        }
        Ok(())
    }

    /// Flow-inclusive cells of the `(first, second)` slice.
    pub fn cells(&self, first: &str, second: &str) -> Result<Vec<WeightedSum>> {
        let i = self.first.index_of(first).ok_or_else(|| {
            Error::Histogram(format!("'{}' not on axis '{}'", first, self.first.name()))
        })?;
        let j = self.second.index_of(second).ok_or_else(|| {
            Error::Histogram(format!("'{}' not on axis '{}'", second, self.second.name()))
        })?;
        Ok(match self.cells.get(&(i, j)) {
            Some(c) => c.clone(),
            None => vec![WeightedSum::default(); self.observable.extent()],
        })
    }

    /// The `(first, second)` slice as a 1D histogram.
    pub fn project(&self, first: &str, second: &str) -> Result<WeightedHistogram> {
        let cells = self.cells(first, second)?;
        WeightedHistogram::from_cells(self.observable.clone(), cells)
    }

    /// Iterate over written slices as `(first, second, cells)`.
    pub fn slices(&self) -> impl Iterator<Item = (&str, &str, &[WeightedSum])> {
        self.cells.iter().filter_map(|(&(i, j), cells)| {
            let a = self.first.get(i)?;
            let b = self.second.get(j)?;
            Some((a, b, cells.as_slice()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn axis() -> Axis {
        Axis::variable("x", vec![0.0, 1.0, 2.0]).unwrap()
    }

    #[test]
    fn fill_and_sum() {
        let mut h = WeightedHistogram::new(axis());
        h.fill(0.5, 2.0);
        h.fill(1.5, 3.0);
        h.fill(0.5, 1.0);
        h.fill(-1.0, 1.0);
        assert_eq!(h.values(), vec![1.0, 3.0, 3.0, 0.0]);
        assert_eq!(h.variances(), vec![1.0, 5.0, 9.0, 0.0]);
        assert_relative_eq!(h.sum(BinRange::All).unwrap().value, 7.0);
        assert_relative_eq!(h.sum(BinRange::Inner).unwrap().value, 6.0);
        assert_relative_eq!(h.sum(BinRange::Span(2..4)).unwrap().variance, 9.0);
        assert!(h.sum(BinRange::Span(0..9)).is_err());
    }

    #[test]
    fn add_requires_same_binning() {
        let mut a = WeightedHistogram::new(axis());
        let b = WeightedHistogram::new(Axis::variable("x", vec![0.0, 2.0]).unwrap());
        assert!(a.add(&b).is_err());

        let mut c = WeightedHistogram::new(axis());
        c.fill(0.1, 4.0);
        a.add(&c).unwrap();
        a.add(&c).unwrap();
        assert_eq!(a.values(), vec![0.0, 8.0, 0.0, 0.0]);
        assert_eq!(a.variances(), vec![0.0, 32.0, 0.0, 0.0]);
    }

    #[test]
    fn category_slices_accumulate() {
        let mut h = CategoryHistogram::new(axis());
        h.fill("SR", NOMINAL, 0.5, 1.0);
        h.fill("SR", "JESUp", 1.5, 2.0);
        let extra = vec![WeightedSum::new(1.0, 1.0); 4];
        h.add_slice("SR", NOMINAL, &extra).unwrap();

        let nominal = h.project("SR", NOMINAL).unwrap();
        assert_eq!(nominal.values(), vec![1.0, 2.0, 1.0, 1.0]);

        // declared on both axes but never written
        h.fill("CR", NOMINAL, 0.5, 1.0);
        let empty = h.cells("CR", "JESUp").unwrap();
        assert!(empty.iter().all(|c| *c == WeightedSum::default()));

        assert!(h.cells("SR", "JESDown").is_err());
        assert!(h.add_slice("SR", NOMINAL, &extra[..2]).is_err());
        let keys: Vec<(&str, &str)> = h.slices().map(|(c, v, _)| (c, v)).collect();
        assert_eq!(keys, vec![("SR", NOMINAL), ("SR", "JESUp"), ("CR", NOMINAL)]);
    }
}
