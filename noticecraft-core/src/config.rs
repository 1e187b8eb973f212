//! Run configuration: which workbooks to reconcile and how the notification
//! sheet is laid out

use crate::error::{NoticeError, Result};
use crate::reader::WorkbookFormat;
use crate::walker::Layout;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File stem of the processed notification sheet
pub const OUTPUT_STEM: &str = "考试通知单-处理后";

/// Rows in an `.xlsx` worksheet
const MAX_ROWS: u32 = 1_048_576;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// The notification sheet to fill in
    pub notification: PathBuf,
    /// Arrangement tables, in load order
    pub arrangements: Vec<PathBuf>,
    /// Also write the student name and colour the written rows
    #[serde(default)]
    pub highlight: bool,
    /// Where to save; next to the notification sheet when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub layout: Layout,
}

impl ProcessConfig {
    pub fn new(notification: impl Into<PathBuf>, arrangements: Vec<PathBuf>) -> Self {
        Self {
            notification: notification.into(),
            arrangements,
            highlight: false,
            output: None,
            layout: Layout::default(),
        }
    }

    /// Load configuration from a TOML file. Relative paths are resolved
    /// against the file's directory.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config: ProcessConfig = toml::from_str(&content)?;

        if let Some(base) = path.parent() {
            config.notification = base.join(&config.notification);
            for arrangement in &mut config.arrangements {
                *arrangement = base.join(&*arrangement);
            }
            if let Some(output) = &mut config.output {
                *output = base.join(&*output);
            }
        }

        Ok(config)
    }

    /// Output path, defaulting to `考试通知单-处理后.xlsx` (or `.xlsm`)
    /// in the notification sheet's directory
    pub fn output_path(&self) -> PathBuf {
        if let Some(output) = &self.output {
            return output.clone();
        }

        let extension = match WorkbookFormat::from_path(&self.notification) {
            Some(WorkbookFormat::Xlsm) => "xlsm",
            _ => "xlsx",
        };
        self.notification
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(format!("{}.{}", OUTPUT_STEM, extension))
    }

    /// Check the configuration before any workbook is opened
    pub fn validate(&self) -> Result<()> {
        if self.arrangements.is_empty() {
            return Err(NoticeError::Config(
                "at least one arrangement workbook is required".to_string(),
            ));
        }

        if self.arrangements.contains(&self.notification) {
            return Err(NoticeError::Config(format!(
                "{} is both the notification sheet and an arrangement source",
                self.notification.display()
            )));
        }

        let output = self.output_path();
        if output == self.notification || self.arrangements.contains(&output) {
            return Err(NoticeError::Config(format!(
                "output {} would overwrite an input workbook",
                output.display()
            )));
        }

        let layout = &self.layout;
        let columns = [
            ("room_column", layout.room_column),
            ("seat_column", layout.seat_column),
            ("date_column", layout.date_column),
            ("time_column", layout.time_column),
            ("name_column", layout.name_column),
            ("highlight_first_column", layout.highlight_first_column),
            ("highlight_last_column", layout.highlight_last_column),
        ];
        for (name, col) in columns {
            // Column 1 holds the anchors and subject codes
            if col < 2 {
                return Err(NoticeError::Config(format!(
                    "layout.{} must be 2 or greater, got {}",
                    name, col
                )));
            }
        }
        if layout.highlight_first_column > layout.highlight_last_column {
            return Err(NoticeError::Config(format!(
                "layout highlight columns {}..{} are reversed",
                layout.highlight_first_column, layout.highlight_last_column
            )));
        }
        let rows = [
            ("first_row", layout.first_row),
            ("header_rows", layout.header_rows),
            ("site_rows", layout.site_rows),
        ];
        for (name, value) in rows {
            if !(1..=MAX_ROWS).contains(&value) {
                return Err(NoticeError::Config(format!(
                    "layout.{} must be between 1 and {}, got {}",
                    name, MAX_ROWS, value
                )));
            }
        }
        if layout.time_format.trim().is_empty() {
            return Err(NoticeError::Config(
                "layout.time_format must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
