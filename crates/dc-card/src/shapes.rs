//! Shape file: one container holding every `{process}_{variation}` template.

use std::path::Path;

use dc_core::Result;
use dc_hist::WeightedHistogram;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Named 1D weight-storage templates, in export order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeFile {
    histograms: IndexMap<String, WeightedHistogram>,
}

impl ShapeFile {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `histogram` under `{process}_{variation}`.
    pub fn insert(&mut self, process: &str, variation: &str, histogram: WeightedHistogram) {
        self.histograms.insert(shape_key(process, variation), histogram);
    }

    /// Template by full key.
    pub fn get(&self, key: &str) -> Option<&WeightedHistogram> {
        self.histograms.get(key)
    }

    /// Keys in export order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.histograms.keys().map(String::as_str)
    }

    /// Templates in export order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &WeightedHistogram)> {
        self.histograms.iter().map(|(k, h)| (k.as_str(), h))
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.histograms.len()
    }

    /// Whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.histograms.is_empty()
    }

    /// Serialized container (pretty JSON, trailing newline).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Read a container written by [`ShapeFile::to_bytes`].
    pub fn read(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Object name of one template, as resolved by `$PROCESS_$SYSTEMATIC`.
pub fn shape_key(process: &str, variation: &str) -> String {
    format!("{}_{}", process, variation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dc_hist::Axis;

    #[test]
    fn keys_keep_insertion_order() {
        let axis = Axis::variable("x", vec![0.0, 1.0]).unwrap();
        let mut f = ShapeFile::new();
        f.insert("tt", "nominal", WeightedHistogram::new(axis.clone()));
        f.insert("ttH", "nominal", WeightedHistogram::new(axis.clone()));
        f.insert("tt", "JESUp", WeightedHistogram::new(axis));
        assert_eq!(f.keys().collect::<Vec<_>>(), vec!["tt_nominal", "ttH_nominal", "tt_JESUp"]);

        let text = String::from_utf8(f.to_bytes().unwrap()).unwrap();
        let back: ShapeFile = serde_json::from_str(&text).unwrap();
        assert_eq!(back, f);
        assert!(text.find("tt_nominal").unwrap() < text.find("tt_JESUp").unwrap());
    }
}
