//! Error types for dcard

use thiserror::Error;

/// dcard error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// A process or systematic was declared with inconsistent fields.
    #[error("Construction error: {0}")]
    Construction(String),

    /// Same-named systematics could not be merged into one nuisance.
    #[error("Systematic merge conflict: {0}")]
    MergeConflict(String),

    /// Input histograms do not cover every declared sample/dataset/variation.
    #[error("Incomplete input histograms:\n{0}")]
    Completeness(String),

    /// The process layout cannot be rendered into a datacard.
    #[error("Datacard structure error: {0}")]
    Structure(String),

    /// Histogram axis or binning error
    #[error("Histogram error: {0}")]
    Histogram(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_convert() {
        fn open() -> Result<()> {
            std::fs::read("/definitely/not/here/dcard.json")?;
            Ok(())
        }
        let err = open().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().starts_with("I/O error"));
    }

    #[test]
    fn completeness_message_keeps_report_lines() {
        let err = Error::Completeness("  ttbar/ttbar_2018: JESUp".into());
        assert_eq!(err.to_string(), "Incomplete input histograms:\n  ttbar/ttbar_2018: JESUp");
    }
}
