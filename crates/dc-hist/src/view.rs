//! Read-only view over an upstream `(category, variation, observable)` histogram.
//!
//! The datacard layer only consumes histograms through this trait, so any
//! array backend can feed it.

use dc_core::Result;

use crate::axis::Axis;
use crate::histogram::{BinRange, CategoryHistogram, sum_cells};
use crate::storage::WeightedSum;

/// Narrow read-only histogram interface.
pub trait HistogramView {
    /// Observable axis shared by every slice.
    fn observable(&self) -> &Axis;

    /// Ordered values of a category axis, `None` if the axis does not exist.
    fn axis_values(&self, axis: &str) -> Option<Vec<String>>;

    /// Flow-inclusive cells of the `(category, variation)` slice.
    fn slice(&self, category: &str, variation: &str) -> Result<Vec<WeightedSum>>;

    /// Sum of a slice over `range`.
    fn sum(&self, category: &str, variation: &str, range: BinRange) -> Result<WeightedSum> {
        let cells = self.slice(category, variation)?;
        sum_cells(&cells, &range)
    }
}

impl HistogramView for CategoryHistogram {
    fn observable(&self) -> &Axis {
        CategoryHistogram::observable(self)
    }

    fn axis_values(&self, axis: &str) -> Option<Vec<String>> {
        [self.first_axis(), self.second_axis()]
            .into_iter()
            .find(|a| a.name() == axis)
            .map(|a| a.values().map(str::to_string).collect())
    }

    fn slice(&self, category: &str, variation: &str) -> Result<Vec<WeightedSum>> {
        self.cells(category, variation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{CATEGORY_AXIS, NOMINAL, VARIATION_AXIS};

    #[test]
    fn view_over_category_histogram() {
        let mut h = CategoryHistogram::new(Axis::variable("x", vec![0.0, 1.0, 2.0]).unwrap());
        h.fill("SR", NOMINAL, 0.5, 10.0);
        h.fill("SR", NOMINAL, 1.5, 20.0);
        h.fill("SR", "lumiUp", 5.0, 1.0);

        let view: &dyn HistogramView = &h;
        assert_eq!(view.axis_values(CATEGORY_AXIS), Some(vec!["SR".to_string()]));
        assert_eq!(
            view.axis_values(VARIATION_AXIS),
            Some(vec![NOMINAL.to_string(), "lumiUp".to_string()])
        );
        assert_eq!(view.axis_values("x"), None);
        assert_eq!(view.sum("SR", NOMINAL, BinRange::All).unwrap().value, 30.0);
        assert_eq!(view.sum("SR", "lumiUp", BinRange::Inner).unwrap().value, 0.0);
        assert_eq!(view.sum("SR", "lumiUp", BinRange::All).unwrap().value, 1.0);
    }
}
