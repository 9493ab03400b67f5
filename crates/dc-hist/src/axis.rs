//! Histogram axes: a variable-width observable axis with flow bins and
//! growable string-category axes.

use dc_core::{Error, Result};
use indexmap::IndexSet;

/// Observable axis with explicit bin edges plus underflow and overflow bins.
///
/// Flow-inclusive indexing is used throughout the crate: index `0` is the
/// underflow, `1..=n_bins` are the regular bins, `n_bins + 1` is the overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    name: String,
    edges: Vec<f64>,
}

impl Axis {
    /// Build an axis from sorted bin edges (length = n_bins + 1).
    pub fn variable(name: impl Into<String>, edges: Vec<f64>) -> Result<Self> {
        let name = name.into();
        if edges.len() < 2 {
            return Err(Error::Histogram(format!(
                "axis '{}' needs at least 2 edges, got {}",
                name,
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::Histogram(format!("axis '{}' has non-finite edges", name)));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Histogram(format!(
                "axis '{}' edges must be strictly increasing: {:?}",
                name, edges
            )));
        }
        Ok(Self { name, edges })
    }

    /// Build an axis of `n_bins` equal-width bins on `[lo, hi)`.
    pub fn regular(name: impl Into<String>, n_bins: usize, lo: f64, hi: f64) -> Result<Self> {
        if n_bins == 0 {
            return Err(Error::Histogram("regular axis needs at least one bin".into()));
        }
        let width = (hi - lo) / n_bins as f64;
        let mut edges: Vec<f64> = (0..n_bins).map(|i| lo + width * i as f64).collect();
        edges.push(hi);
        Self::variable(name, edges)
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bin edges (length = n_bins + 1).
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Number of regular bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Number of cells including underflow and overflow.
    pub fn extent(&self) -> usize {
        self.edges.len() + 1
    }

    /// Flow-inclusive index of the cell containing `x`.
    ///
    /// NaN lands in the overflow.
    pub fn index(&self, x: f64) -> usize {
        let last = self.edges.len() - 1;
        if x.is_nan() || x >= self.edges[last] {
            return last + 1;
        }
        if x < self.edges[0] {
            return 0;
        }
        // edges[i-1] <= x < edges[i]  =>  regular bin i-1  =>  flow index i
        self.edges.partition_point(|&e| e <= x)
    }

    /// Whether two axes share the same binning.
    pub fn same_binning(&self, other: &Axis) -> bool {
        self.edges == other.edges
    }
}

/// Growable axis of string categories, kept in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrCategory {
    name: String,
    values: IndexSet<String>,
}

impl StrCategory {
    /// Empty category axis.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), values: IndexSet::new() }
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of `value` on the axis.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.values.get_index_of(value)
    }

    /// Insert `value` if absent and return its position.
    pub fn insert(&mut self, value: &str) -> usize {
        match self.values.get_index_of(value) {
            Some(i) => i,
            None => self.values.insert_full(value.to_string()).0,
        }
    }

    /// Value at position `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get_index(index).map(String::as_str)
    }

    /// Whether `value` is on the axis.
    pub fn contains(&self, value: &str) -> bool {
        self.values.contains(value)
    }

    /// Category values in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(String::as_str)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the axis holds no category yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_edge_cases() {
        let ax = Axis::variable("x", vec![0.0, 1.0, 2.0, 3.0]).unwrap();
        assert_eq!(ax.index(-0.5), 0);
        assert_eq!(ax.index(0.0), 1);
        assert_eq!(ax.index(1.0), 2);
        assert_eq!(ax.index(2.99), 3);
        assert_eq!(ax.index(3.0), 4);
        assert_eq!(ax.index(f64::NAN), 4);
        assert_eq!(ax.extent(), 5);
    }

    #[test]
    fn regular_axis_edges() {
        let ax = Axis::regular("mbb", 4, 0.0, 200.0).unwrap();
        assert_eq!(ax.edges(), &[0.0, 50.0, 100.0, 150.0, 200.0]);
        assert_eq!(ax.n_bins(), 4);
    }

    #[test]
    fn rejects_bad_edges() {
        assert!(Axis::variable("x", vec![1.0]).is_err());
        assert!(Axis::variable("x", vec![0.0, 2.0, 1.0]).is_err());
        assert!(Axis::variable("x", vec![0.0, f64::INFINITY]).is_err());
        assert!(Axis::regular("x", 0, 0.0, 1.0).is_err());
    }

    #[test]
    fn category_keeps_insertion_order() {
        let mut cat = StrCategory::new("variation");
        assert_eq!(cat.insert("nominal"), 0);
        assert_eq!(cat.insert("JESUp"), 1);
        assert_eq!(cat.insert("nominal"), 0);
        assert_eq!(cat.values().collect::<Vec<_>>(), vec!["nominal", "JESUp"]);
        assert_eq!(cat.index_of("JESUp"), Some(1));
        assert!(!cat.contains("JESDown"));
        assert_eq!(cat.get(1), Some("JESUp"));
        assert_eq!(cat.get(2), None);
    }
}
