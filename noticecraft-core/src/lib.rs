//! noticecraft-core: fills exam room, seat, date and time into a notification
//! sheet from one or more exam arrangement tables.

pub mod access;
pub mod arrangement;
pub mod cell_ref;
pub mod classify;
pub mod config;
pub mod error;
pub mod reader;
pub mod walker;
pub mod writer;

use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use access::{Highlight, SpreadsheetAccess};
pub use arrangement::{ArrangementField, ArrangementIndex, ArrangementSource, StudentRecord};
pub use config::{OUTPUT_STEM, ProcessConfig};
pub use error::{NoticeError, Result};
pub use reader::{CellValue, Sheet, Workbook, read_workbook};
pub use walker::{Layout, NotificationWalker, WalkSummary};
pub use writer::save_workbook;

/// Outcome of one reconciliation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub output: PathBuf,
    /// Arrangement tables loaded
    pub sources: usize,
    /// Student anchors found in the notification sheet
    pub students: usize,
    /// Subject rows written
    pub records: usize,
}

/// Main reconciliation interface
pub struct Reconciler {
    config: ProcessConfig,
}

impl Reconciler {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// Load every arrangement table, fill the notification sheet and save it.
    ///
    /// All arrangement headers are validated before the notification sheet
    /// is opened, so a bad table leaves no partial output behind.
    pub fn run(&self) -> Result<RunSummary> {
        self.config.validate()?;

        let index = self.load_arrangements()?;
        log::info!("loaded {} arrangement table(s)", index.sources().len());

        let mut notification = read_workbook(&self.config.notification)?;
        let sheet = notification
            .first_sheet_mut()
            .ok_or_else(|| NoticeError::EmptyWorkbook(self.config.notification.clone()))?;

        let walk = NotificationWalker::new(&self.config.layout, self.config.highlight)
            .walk(sheet, &index);
        log::info!(
            "{} student(s), {} subject row(s) filled",
            walk.students,
            walk.records
        );

        let output = self.config.output_path();
        save_workbook(&notification, &output)?;

        Ok(RunSummary {
            output,
            sources: index.sources().len(),
            students: walk.students,
            records: walk.records,
        })
    }

    /// Read arrangement workbooks in parallel, keeping configuration order
    pub fn load_arrangements(&self) -> Result<ArrangementIndex<Sheet>> {
        let sources = self
            .config
            .arrangements
            .par_iter()
            .map(|path| load_source(path))
            .collect::<Result<Vec<_>>>()?;
        Ok(ArrangementIndex::new(sources))
    }
}

fn load_source(path: &Path) -> Result<ArrangementSource<Sheet>> {
    let workbook = read_workbook(path)?;
    let sheet = workbook
        .into_first_sheet()
        .ok_or_else(|| NoticeError::EmptyWorkbook(path.to_path_buf()))?;
    let label = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    log::debug!("{}: {} row(s)", label, sheet.used_row_count());
    ArrangementSource::new(label, sheet)
}
