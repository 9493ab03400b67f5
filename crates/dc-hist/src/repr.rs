//! JSON representations.
//!
//! - [`WeightedHistogram`] uses the scikit-hep UHI serialization layout
//!   (`axes` + `storage`), which is what the shape file stores.
//! - [`CategoryHistogram`] uses a compact cell list, which is what the
//!   upstream histogram mapping is read from.

use dc_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::histogram::{CATEGORY_AXIS, CategoryHistogram, VARIATION_AXIS, WeightedHistogram};
use crate::storage::WeightedSum;

/// UHI axis description (variable edges only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UhiAxis {
    /// Axis type, always `"variable"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Underflow bin present.
    pub underflow: bool,
    /// Overflow bin present.
    pub overflow: bool,
    /// Circular axis flag (always false).
    #[serde(default)]
    pub circular: bool,
    /// Free-form metadata; carries the axis name.
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// UHI weighted storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UhiStorage {
    /// Storage type, always `"weighted"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Flow-inclusive sums of weights.
    pub values: Vec<f64>,
    /// Flow-inclusive sums of squared weights.
    pub variances: Vec<f64>,
}

/// UHI document for one 1D histogram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UhiHistogram {
    /// UHI schema version.
    pub uhi_schema: u32,
    /// Axes (exactly one).
    pub axes: Vec<UhiAxis>,
    /// Storage.
    pub storage: UhiStorage,
}

impl From<&WeightedHistogram> for UhiHistogram {
    fn from(h: &WeightedHistogram) -> Self {
        let mut metadata = serde_json::Map::new();
        metadata.insert("name".into(), serde_json::Value::String(h.axis().name().to_string()));
        UhiHistogram {
            uhi_schema: 1,
            axes: vec![UhiAxis {
                kind: "variable".into(),
                edges: h.axis().edges().to_vec(),
                underflow: true,
                overflow: true,
                circular: false,
                metadata,
            }],
            storage: UhiStorage {
                kind: "weighted".into(),
                values: h.values(),
                variances: h.variances(),
            },
        }
    }
}

impl TryFrom<UhiHistogram> for WeightedHistogram {
    type Error = Error;

    fn try_from(doc: UhiHistogram) -> Result<Self> {
        let [ax] = <[UhiAxis; 1]>::try_from(doc.axes).map_err(|axes| {
            Error::Histogram(format!("expected exactly one axis, got {}", axes.len()))
        })?;
        if ax.kind != "variable" || !ax.underflow || !ax.overflow {
            return Err(Error::Histogram(format!(
                "unsupported axis (type='{}', underflow={}, overflow={})",
                ax.kind, ax.underflow, ax.overflow
            )));
        }
        if doc.storage.kind != "weighted" {
            return Err(Error::Histogram(format!(
                "unsupported storage type '{}'",
                doc.storage.kind
            )));
        }
        let name = ax.metadata.get("name").and_then(|v| v.as_str()).unwrap_or("x").to_string();
        let axis = Axis::variable(name, ax.edges)?;
        WeightedHistogram::from_parts(axis, &doc.storage.values, &doc.storage.variances)
    }
}

impl Serialize for WeightedHistogram {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        UhiHistogram::from(self).serialize(s)
    }
}

impl<'de> Deserialize<'de> for WeightedHistogram {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let doc = UhiHistogram::deserialize(d)?;
        WeightedHistogram::try_from(doc).map_err(serde::de::Error::custom)
    }
}

/// One written slice of a [`CategoryHistogram`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellDoc {
    /// Value on the first category axis.
    pub category: String,
    /// Value on the second category axis.
    pub variation: String,
    /// Sums of weights, either flow-inclusive (n_bins + 2) or regular bins only.
    pub values: Vec<f64>,
    /// Sums of squared weights; defaults to `values` (unit weights).
    #[serde(default)]
    pub variances: Option<Vec<f64>>,
}

/// Compact JSON document for a [`CategoryHistogram`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryHistogramDoc {
    /// Name of the first category axis.
    #[serde(default = "default_category_axis")]
    pub category_axis: String,
    /// Name of the second category axis.
    #[serde(default = "default_variation_axis")]
    pub variation_axis: String,
    /// Observable axis name.
    #[serde(default = "default_observable_name")]
    pub observable: String,
    /// Observable bin edges.
    pub edges: Vec<f64>,
    /// Categories present on the first axis, including ones with no content.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Values present on the second axis, including ones with no content.
    #[serde(default)]
    pub variations: Vec<String>,
    /// Written slices.
    #[serde(default)]
    pub cells: Vec<CellDoc>,
}

fn default_category_axis() -> String {
    CATEGORY_AXIS.to_string()
}

fn default_variation_axis() -> String {
    VARIATION_AXIS.to_string()
}

fn default_observable_name() -> String {
    "x".to_string()
}

impl From<&CategoryHistogram> for CategoryHistogramDoc {
    fn from(h: &CategoryHistogram) -> Self {
        CategoryHistogramDoc {
            category_axis: h.first_axis().name().to_string(),
            variation_axis: h.second_axis().name().to_string(),
            observable: h.observable().name().to_string(),
            edges: h.observable().edges().to_vec(),
            categories: h.first_axis().values().map(str::to_string).collect(),
            variations: h.second_axis().values().map(str::to_string).collect(),
            cells: h
                .slices()
                .map(|(c, v, cells)| CellDoc {
                    category: c.to_string(),
                    variation: v.to_string(),
                    values: cells.iter().map(|x| x.value).collect(),
                    variances: Some(cells.iter().map(|x| x.variance).collect()),
                })
                .collect(),
        }
    }
}

impl TryFrom<CategoryHistogramDoc> for CategoryHistogram {
    type Error = Error;

    fn try_from(doc: CategoryHistogramDoc) -> Result<Self> {
        let axis = Axis::variable(doc.observable, doc.edges)?;
        let extent = axis.extent();
        let n_bins = axis.n_bins();
        let mut h = CategoryHistogram::with_axes(&doc.category_axis, &doc.variation_axis, axis);
        for c in &doc.categories {
            h.declare_first(c);
        }
        for v in &doc.variations {
            h.declare_second(v);
        }
        for cell in doc.cells {
            let variances = cell.variances.unwrap_or_else(|| cell.values.clone());
            if variances.len() != cell.values.len() {
                return Err(Error::Histogram(format!(
                    "cell ({}, {}): {} values but {} variances",
                    cell.category,
                    cell.variation,
                    cell.values.len(),
                    variances.len()
                )));
            }
            let mut cells: Vec<WeightedSum> = cell
                .values
                .iter()
                .zip(&variances)
                .map(|(&v, &w2)| WeightedSum::new(v, w2))
                .collect();
            if cells.len() == n_bins {
                // regular bins only: pad empty flow cells
                cells.insert(0, WeightedSum::default());
                cells.push(WeightedSum::default());
            }
            if cells.len() != extent {
                return Err(Error::Histogram(format!(
                    "cell ({}, {}) has {} bins, expected {} or {}",
                    cell.category,
                    cell.variation,
                    cell.values.len(),
                    n_bins,
                    extent
                )));
            }
            h.add_slice(&cell.category, &cell.variation, &cells)?;
        }
        Ok(h)
    }
}

impl Serialize for CategoryHistogram {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        CategoryHistogramDoc::from(self).serialize(s)
    }
}

impl<'de> Deserialize<'de> for CategoryHistogram {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let doc = CategoryHistogramDoc::deserialize(d)?;
        CategoryHistogram::try_from(doc).map_err(serde::de::Error::custom)
    }
}
