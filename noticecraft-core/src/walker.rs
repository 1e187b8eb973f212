//! Notification sheet walker
//!
//! The notification sheet is a sequence of per-student blocks:
//!
//! ```text
//! 学号：1234567890123 ...     <- student anchor
//! 试卷号 | 科目 | ...          <- subject table header
//! 1001 | 高等数学 | ...        <- one row per subject, filled in here
//! 1002 | ...
//! 考点：...                    <- exam site, then three rows to the next anchor
//! ```

use crate::access::{Highlight, SpreadsheetAccess};
use crate::arrangement::{ArrangementIndex, SubjectRecords};
use crate::classify::{RowKind, classify_row, subject_code};
use serde::{Deserialize, Serialize};

/// System time-of-day display format
pub const TIME_DISPLAY_FORMAT: &str = r"[$-F400]h:mm:ss\ AM/PM";

/// Column numbers and row skips of the notification sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    /// First row examined
    pub first_row: u32,
    /// Rows from a student anchor to its first subject row
    pub header_rows: u32,
    /// Rows from the exam-site row to the next anchor candidate
    pub site_rows: u32,
    pub room_column: u32,
    pub seat_column: u32,
    pub date_column: u32,
    pub time_column: u32,
    pub name_column: u32,
    pub highlight_first_column: u32,
    pub highlight_last_column: u32,
    pub highlight: Highlight,
    pub time_format: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            first_row: 2,
            header_rows: 2,
            site_rows: 3,
            room_column: 4,
            seat_column: 5,
            date_column: 6,
            time_column: 7,
            name_column: 9,
            highlight_first_column: 4,
            highlight_last_column: 9,
            highlight: Highlight::default(),
            time_format: TIME_DISPLAY_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct WalkSummary {
    /// Student anchors found
    pub students: usize,
    /// Subject rows written
    pub records: usize,
    /// Loop iterations, never more than the used row count
    pub steps: usize,
}

enum WalkState {
    SeekStudent,
    SubjectRows { records: SubjectRecords },
}

pub struct NotificationWalker<'a> {
    layout: &'a Layout,
    highlight_enabled: bool,
}

impl<'a> NotificationWalker<'a> {
    pub fn new(layout: &'a Layout, highlight_enabled: bool) -> Self {
        Self {
            layout,
            highlight_enabled,
        }
    }

    /// Fill every subject row of `sheet` that has an arrangement in `index`
    pub fn walk<N, A>(&self, sheet: &mut N, index: &ArrangementIndex<A>) -> WalkSummary
    where
        N: SpreadsheetAccess,
        A: SpreadsheetAccess,
    {
        let max_row = sheet.used_row_count();
        let mut summary = WalkSummary::default();
        let mut state = WalkState::SeekStudent;
        let mut row = self.layout.first_row.max(1);

        while row <= max_row {
            summary.steps += 1;
            let (next, advance) = match state {
                WalkState::SeekStudent => match classify_row(sheet.cell_value(row, 1)) {
                    RowKind::StudentAnchor(student_id) => {
                        summary.students += 1;
                        log::debug!("row {}: student {}", row, student_id);
                        let records = index.lookup_student(&student_id);
                        (
                            WalkState::SubjectRows { records },
                            self.layout.header_rows.max(1),
                        )
                    }
                    _ => (WalkState::SeekStudent, 1),
                },
                WalkState::SubjectRows { records } => {
                    let code = sheet
                        .cell_value(row, 1)
                        .to_text()
                        .and_then(|text| subject_code(&text));
                    match code {
                        Some(code) => {
                            if self.write_subject(sheet, row, &code, &records) {
                                summary.records += 1;
                            }
                            (WalkState::SubjectRows { records }, 1)
                        }
                        None => (WalkState::SeekStudent, self.layout.site_rows.max(1)),
                    }
                }
            };

            // Past the last addressable row
            let Some(next_row) = row.checked_add(advance) else {
                break;
            };
            row = next_row;
            state = next;
        }

        summary
    }

    fn write_subject<N: SpreadsheetAccess>(
        &self,
        sheet: &mut N,
        row: u32,
        code: &str,
        records: &SubjectRecords,
    ) -> bool {
        let Some(record) = records.get(code) else {
            log::debug!("row {}: no arrangement for subject {}", row, code);
            return false;
        };
        let layout = self.layout;

        sheet.set_cell_value(row, layout.room_column, record.room.clone());
        sheet.set_cell_value(row, layout.seat_column, record.seat.clone());
        sheet.set_cell_value(row, layout.date_column, record.exam_date.clone());
        sheet.set_cell_value(row, layout.time_column, record.exam_time.clone());
        sheet.set_display_format(row, layout.time_column, &layout.time_format);

        if self.highlight_enabled {
            sheet.set_cell_value(row, layout.name_column, record.student_name.clone());
            sheet.set_range_highlight(
                row,
                layout.highlight_first_column,
                row,
                layout.highlight_last_column,
                layout.highlight,
            );
        }

        true
    }
}
