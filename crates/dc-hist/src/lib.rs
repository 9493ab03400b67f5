//! # dc-hist
//!
//! Weight-storage histograms for dcard.
//!
//! Upstream inputs are `(cat, variation, observable)` histograms; the
//! datacard layer rearranges them into a `(process, variation, observable)`
//! histogram and exports 1D templates.
//!
//! ## Example
//!
//! ```
//! use dc_hist::{Axis, BinRange, CategoryHistogram, HistogramView, NOMINAL};
//!
//! let mut h = CategoryHistogram::new(Axis::regular("mbb", 2, 0.0, 200.0).unwrap());
//! h.fill("SR", NOMINAL, 42.0, 1.5);
//! h.fill("SR", NOMINAL, 250.0, 0.5);
//! let total = h.sum("SR", NOMINAL, BinRange::All).unwrap();
//! assert_eq!(total.value, 2.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axis;
pub mod histogram;
pub mod repr;
pub mod storage;
pub mod view;

pub use axis::{Axis, StrCategory};
pub use histogram::{
    BinRange, CATEGORY_AXIS, CategoryHistogram, NOMINAL, VARIATION_AXIS, WeightedHistogram,
    sum_cells,
};
pub use repr::{CategoryHistogramDoc, CellDoc, UhiHistogram};
pub use storage::WeightedSum;
pub use view::HistogramView;
