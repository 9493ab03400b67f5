//! Datacard rendering: process ids, rates, the text card and its shape file.
//!
//! Card layout, each section closed by a line of 80 dashes:
//!
//! ```text
//! imax 1 number of channels
//! jmax 1 number of background processes
//! kmax 1 number of nuisance parameters
//! --------------------------------------------------------------------------------
//! shapes * SR_2018 shapes.json $PROCESS_nominal $PROCESS_$SYSTEMATIC
//! --------------------------------------------------------------------------------
//! bin SR_2018
//! observation -1
//! --------------------------------------------------------------------------------
//! bin         SR_2018    SR_2018
//! process     ttH        tt
//! process     0          1
//! rate        30         70
//! --------------------------------------------------------------------------------
//! lumi lnN    1.02       1.02
//! --------------------------------------------------------------------------------
//! ```

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use dc_core::{Error, Result};
use dc_hist::{BinRange, CategoryHistogram, HistogramView, NOMINAL};

use crate::inputs::{DatasetMetadata, HistogramMap};
use crate::process::{Process, Processes};
use crate::rearrange::rearrange;
use crate::shapes::ShapeFile;
use crate::systematics::{Systematics, VariationName};
use crate::validate::validate;

const SEPARATOR_WIDTH: usize = 80;
const COLUMN_PADDING: usize = 4;

/// `observation` written to every card: Combine derives it from the
/// expectation (Asimov) when the count is `-1`.
pub const OBSERVATION: i64 = -1;

/// Rendering options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatacardOptions {
    /// Prefix of the bin name (`{prefix}_{category}_{year}`).
    pub bin_prefix: Option<String>,
    /// Shape file name referenced by the `shapes` directive.
    pub shapes_filename: String,
}

impl Default for DatacardOptions {
    fn default() -> Self {
        Self { bin_prefix: None, shapes_filename: "shapes.json".into() }
    }
}

/// Paths written by [`Datacard::dump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatacardOutput {
    /// Text datacard.
    pub card: PathBuf,
    /// Shape file.
    pub shapes: PathBuf,
}

/// One datacard for a fixed `(year, category)`.
#[derive(Debug, Clone)]
pub struct Datacard {
    processes: Processes,
    systematics: Systematics,
    year: String,
    category: String,
    options: DatacardOptions,
    variations: Vec<VariationName>,
    histogram: CategoryHistogram,
}

impl Datacard {
    /// Validate the inputs and build the unified histogram.
    ///
    /// Processes and systematics not active in `year` are dropped first.
    pub fn new<H: HistogramView>(
        histograms: &HistogramMap<H>,
        metadata: &DatasetMetadata,
        processes: &Processes,
        systematics: &Systematics,
        year: &str,
        category: &str,
        options: DatacardOptions,
    ) -> Result<Self> {
        let mut active = processes.for_year(year);
        for p in processes.iter().filter(|p| !p.applies_to(year)) {
            tracing::warn!(process = p.name(), year, "process not active in year, skipped");
        }
        if active.columns().is_empty() {
            return Err(Error::Structure(format!(
                "no signal or background process for year {}",
                year
            )));
        }
        active.assign_ids();

        let systematics = systematics.for_year(year);
        for s in systematics.iter() {
            if !s.processes().keys().any(|p| active.contains(p)) {
                tracing::warn!(
                    systematic = s.datacard_name(),
                    "systematic affects no active process"
                );
            }
        }

        tracing::info!(
            year,
            category,
            processes = active.len(),
            systematics = systematics.len(),
            "building datacard"
        );

        let variations = systematics.required_variations();
        validate(histograms, metadata, &active, &variations, year, category)?;
        let histogram = rearrange(histograms, metadata, &active, &variations, year, category)?;

        Ok(Self {
            processes: active,
            systematics,
            year: year.to_string(),
            category: category.to_string(),
            options,
            variations,
            histogram,
        })
    }

    /// Processes active in the card's year, ids assigned.
    pub fn processes(&self) -> &Processes {
        &self.processes
    }

    /// Systematics active in the card's year.
    pub fn systematics(&self) -> &Systematics {
        &self.systematics
    }

    /// Unified `(process, variation, observable)` histogram.
    pub fn histogram(&self) -> &CategoryHistogram {
        &self.histogram
    }

    /// Bin (channel) name: `[{prefix}_]{category}_{year}`.
    pub fn bin_name(&self) -> String {
        match &self.options.bin_prefix {
            Some(prefix) => format!("{}_{}_{}", prefix, self.category, self.year),
            None => format!("{}_{}", self.category, self.year),
        }
    }

    /// Number of channels (one bin per card).
    pub fn imax(&self) -> usize {
        1
    }

    /// Number of background processes.
    pub fn jmax(&self) -> usize {
        self.processes.backgrounds().count()
    }

    /// Number of nuisance parameters.
    pub fn kmax(&self) -> usize {
        self.systematics.len()
    }

    /// Observed count written to the card.
    pub fn observation(&self) -> i64 {
        OBSERVATION
    }

    /// Expectation columns: signals then backgrounds.
    pub fn columns(&self) -> Vec<&Process> {
        self.processes.columns()
    }

    /// Nominal rate of `process`.
    pub fn rate(&self, process: &str) -> Result<f64> {
        self.rate_of(process, NOMINAL)
    }

    /// Rate of `process` in `variation`: sum of values over every bin, flow included.
    pub fn rate_of(&self, process: &str, variation: &str) -> Result<f64> {
        Ok(self.histogram.sum(process, variation, BinRange::All)?.value)
    }

    /// Datacard text.
    pub fn content(&self) -> Result<String> {
        let bin = self.bin_name();
        let columns = self.columns();
        let separator = "-".repeat(SEPARATOR_WIDTH);

        let first_width = self
            .systematics
            .iter()
            .map(|s| format!("{} {}", s.datacard_name(), s.typ()).len())
            .chain(std::iter::once("process".len()))
            .max()
            .unwrap_or(0)
            + COLUMN_PADDING;
        let width = columns
            .iter()
            .map(|p| p.name().len())
            .chain(std::iter::once(bin.len()))
            .max()
            .unwrap_or(0)
            + COLUMN_PADDING;
        let row = |label: &str, cells: Vec<String>| {
            let mut line = format!("{:<first_width$}", label);
            for cell in cells {
                let _ = write!(line, "{:<width$}", cell);
            }
            line
        };

        let mut ids = Vec::with_capacity(columns.len());
        let mut rates = Vec::with_capacity(columns.len());
        for p in &columns {
            let id = p.id().ok_or_else(|| {
                Error::Structure(format!("process '{}' has no datacard id", p.name()))
            })?;
            ids.push(id.to_string());
            rates.push(self.rate(p.name())?.to_string());
        }

        let mut lines: Vec<String> = vec![
            format!("imax {} number of channels", self.imax()),
            format!("jmax {} number of background processes", self.jmax()),
            format!("kmax {} number of nuisance parameters", self.kmax()),
            separator.clone(),
            format!(
                "shapes * {} {} $PROCESS_nominal $PROCESS_$SYSTEMATIC",
                bin, self.options.shapes_filename
            ),
            separator.clone(),
            format!("bin {}", bin),
            format!("observation {}", self.observation()),
            separator.clone(),
            row("bin", vec![bin.clone(); columns.len()]),
            row("process", columns.iter().map(|p| p.name().to_string()).collect()),
            row("process", ids),
            row("rate", rates),
            separator.clone(),
        ];
        for s in self.systematics.iter() {
            let cells = columns
                .iter()
                .map(|p| match s.magnitude(p.name()) {
                    Some(m) => m.to_string(),
                    None => "-".to_string(),
                })
                .collect();
            lines.push(row(&format!("{} {}", s.datacard_name(), s.typ()), cells));
        }
        lines.push(separator);

        let mut out = lines.join("\n");
        out.push('\n');
        Ok(out)
    }

    /// Every `{process}_{variation}` template.
    ///
    /// Expected processes export every variation; data exports `nominal` only.
    pub fn shape_file(&self) -> Result<ShapeFile> {
        let mut file = ShapeFile::new();
        for p in self.columns() {
            for v in &self.variations {
                file.insert(p.name(), &v.output, self.histogram.project(p.name(), &v.output)?);
            }
        }
        if let Some(data) = self.processes.data() {
            file.insert(data.name(), NOMINAL, self.histogram.project(data.name(), NOMINAL)?);
        }
        Ok(file)
    }

    /// Write `card_name` and the shape file into `directory`.
    ///
    /// Both artifacts are staged as `.tmp` siblings and renamed into place
    /// only once both are fully written.
    pub fn dump(&self, directory: &Path, card_name: &str) -> Result<DatacardOutput> {
        if card_name == self.options.shapes_filename {
            return Err(Error::Structure(format!(
                "datacard and shape file share the name '{}'",
                card_name
            )));
        }
        let content = self.content()?;
        let shapes = self.shape_file()?.to_bytes()?;

        std::fs::create_dir_all(directory)?;
        let out = DatacardOutput {
            card: directory.join(card_name),
            shapes: directory.join(&self.options.shapes_filename),
        };
        publish(&[
            (out.shapes.as_path(), shapes.as_slice()),
            (out.card.as_path(), content.as_bytes()),
        ])?;
        tracing::info!(
            card = %out.card.display(),
            shapes = %out.shapes.display(),
            "datacard written"
        );
        Ok(out)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Files being published together with their staged copies and backups.
struct Publish<'a> {
    files: &'a [(&'a Path, &'a [u8])],
    staged: Vec<PathBuf>,
    backups: Vec<PathBuf>,
    moved_aside: Vec<usize>,
    placed: Vec<usize>,
}

impl Publish<'_> {
    fn run(&mut self) -> Result<()> {
        for (path, _) in self.files {
            if path.is_dir() {
                return Err(Error::Structure(format!(
                    "output path '{}' is a directory",
                    path.display()
                )));
            }
        }
        for ((_, bytes), tmp) in self.files.iter().zip(&self.staged) {
            std::fs::write(tmp, bytes)?;
        }
        for (i, (path, _)) in self.files.iter().enumerate() {
            if path.exists() {
                std::fs::rename(path, &self.backups[i])?;
                self.moved_aside.push(i);
            }
            std::fs::rename(&self.staged[i], path)?;
            self.placed.push(i);
        }
        Ok(())
    }

    /// Undo every rename done so far and drop the staged copies.
    fn rollback(&self) {
        for &i in &self.placed {
            let _ = std::fs::remove_file(self.files[i].0);
        }
        for &i in &self.moved_aside {
            if let Err(e) = std::fs::rename(&self.backups[i], self.files[i].0) {
                tracing::error!(
                    path = %self.files[i].0.display(),
                    error = %e,
                    "failed to restore previous output"
                );
            }
        }
        for tmp in &self.staged {
            let _ = std::fs::remove_file(tmp);
        }
    }
}

/// Publish every file or none: stage all as `.tmp`, move existing outputs
/// aside as `.bak`, rename into place, and restore the previous outputs if
/// any step fails.
fn publish(files: &[(&Path, &[u8])]) -> Result<()> {
    let mut job = Publish {
        files,
        staged: files.iter().map(|(p, _)| sibling(p, ".tmp")).collect(),
        backups: files.iter().map(|(p, _)| sibling(p, ".bak")).collect(),
        moved_aside: Vec::new(),
        placed: Vec::new(),
    };
    match job.run() {
        Ok(()) => {
            for &i in &job.moved_aside {
                let _ = std::fs::remove_file(&job.backups[i]);
            }
            Ok(())
        }
        Err(e) => {
            job.rollback();
            Err(e)
        }
    }
}
