//! # dc-card
//!
//! CMS Combine datacard synthesis.
//!
//! Takes the `sample -> dataset -> histogram` mapping produced by event
//! processing, a list of processes and a list of systematics, and writes one
//! text datacard plus the shape file it references for a fixed
//! `(year, category)`.
//!
//! ## Example
//!
//! ```
//! use dc_card::{Datacard, DatacardOptions, DatasetMetadata, HistogramMap, Process, Processes};
//! use dc_card::{SystematicUncertainty, Systematics};
//! use dc_hist::{Axis, CategoryHistogram, NOMINAL};
//!
//! let mut tt = CategoryHistogram::new(Axis::variable("mbb", vec![0.0, 100.0, 200.0]).unwrap());
//! tt.fill("SR", NOMINAL, 50.0, 30.0);
//! tt.fill("SR", NOMINAL, 150.0, 40.0);
//!
//! let mut histograms = HistogramMap::new();
//! histograms.entry("TTToSemiLeptonic".into()).or_default().insert("TT_2018".into(), tt);
//! let metadata = DatasetMetadata::new().with("2018", "TTToSemiLeptonic", "TT_2018");
//!
//! let processes =
//!     Processes::new([Process::background("tt", ["TTToSemiLeptonic"]).unwrap()]).unwrap();
//! let systematics =
//!     Systematics::merge([SystematicUncertainty::shared("lumi", "lnN", ["tt"], 1.02).unwrap()])
//!         .unwrap();
//!
//! let card = Datacard::new(
//!     &histograms,
//!     &metadata,
//!     &processes,
//!     &systematics,
//!     "2018",
//!     "SR",
//!     DatacardOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(card.rate("tt").unwrap(), 70.0);
//! assert!(card.content().unwrap().contains("observation -1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod datacard;
pub mod inputs;
pub mod process;
pub mod rearrange;
pub mod shapes;
pub mod systematics;
pub mod validate;

pub use config::{DataConfig, JobConfig, ProcessConfig, SystematicConfig};
pub use datacard::{Datacard, DatacardOptions, DatacardOutput, OBSERVATION};
pub use inputs::{DatasetMetadata, HistogramMap, read_histograms};
pub use process::{DATA_OBS, Process, ProcessKind, Processes};
pub use rearrange::{PROCESS_AXIS, rearrange};
pub use shapes::{ShapeFile, shape_key};
pub use systematics::{
    Magnitude, ProcessSelection, SystematicType, SystematicUncertainty, Systematics, VariationName,
};
pub use validate::{CompletenessReport, Gap, MissingEntry, check_completeness, validate};
