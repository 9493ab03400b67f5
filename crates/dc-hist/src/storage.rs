//! Weight storage: sum of weights and sum of squared weights per cell.

use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// One weight-storage cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightedSum {
    /// Sum of weights.
    pub value: f64,
    /// Sum of squared weights.
    pub variance: f64,
}

impl WeightedSum {
    /// Cell with explicit value and variance.
    pub fn new(value: f64, variance: f64) -> Self {
        Self { value, variance }
    }

    /// Record one entry of weight `w`.
    pub fn fill(&mut self, w: f64) {
        self.value += w;
        self.variance += w * w;
    }
}

impl Add for WeightedSum {
    type Output = WeightedSum;

    fn add(self, rhs: WeightedSum) -> WeightedSum {
        WeightedSum { value: self.value + rhs.value, variance: self.variance + rhs.variance }
    }
}

impl AddAssign for WeightedSum {
    fn add_assign(&mut self, rhs: WeightedSum) {
        self.value += rhs.value;
        self.variance += rhs.variance;
    }
}

impl Sum for WeightedSum {
    fn sum<I: Iterator<Item = WeightedSum>>(iter: I) -> Self {
        iter.fold(WeightedSum::default(), |acc, c| acc + c)
    }
}

impl<'a> Sum<&'a WeightedSum> for WeightedSum {
    fn sum<I: Iterator<Item = &'a WeightedSum>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_tracks_sumw2() {
        let mut c = WeightedSum::default();
        c.fill(2.0);
        c.fill(-1.0);
        assert_eq!(c, WeightedSum::new(1.0, 5.0));
    }

    #[test]
    fn sum_of_cells() {
        let cells = [WeightedSum::new(1.0, 1.0), WeightedSum::new(2.5, 0.5)];
        let total: WeightedSum = cells.iter().sum();
        assert_eq!(total, WeightedSum::new(3.5, 1.5));
    }
}
