//! Exam arrangement tables and the per-student index built over them

use crate::access::SpreadsheetAccess;
use crate::error::{NoticeError, Result};
use crate::reader::CellValue;
use std::collections::{BTreeMap, HashMap};

/// Header fields every arrangement table must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrangementField {
    Room,
    ExamDate,
    ExamTime,
    Subject,
    StudentId,
    Seat,
    StudentName,
}

impl ArrangementField {
    /// In the order they are validated
    pub const REQUIRED: [ArrangementField; 7] = [
        ArrangementField::Room,
        ArrangementField::ExamDate,
        ArrangementField::ExamTime,
        ArrangementField::Subject,
        ArrangementField::StudentId,
        ArrangementField::Seat,
        ArrangementField::StudentName,
    ];

    /// Header text in row 1 of the arrangement table
    pub fn header(self) -> &'static str {
        match self {
            ArrangementField::Room => "考场号",
            ArrangementField::ExamDate => "考试日期",
            ArrangementField::ExamTime => "考试时间",
            ArrangementField::Subject => "科目",
            ArrangementField::StudentId => "学号",
            ArrangementField::Seat => "座位号",
            ArrangementField::StudentName => "姓名",
        }
    }
}

/// One student's arrangement for one subject
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StudentRecord {
    pub room: CellValue,
    pub exam_date: CellValue,
    pub exam_time: CellValue,
    pub subject: CellValue,
    pub student_id: CellValue,
    pub seat: CellValue,
    pub student_name: CellValue,
}

impl StudentRecord {
    pub fn get(&self, field: ArrangementField) -> &CellValue {
        match field {
            ArrangementField::Room => &self.room,
            ArrangementField::ExamDate => &self.exam_date,
            ArrangementField::ExamTime => &self.exam_time,
            ArrangementField::Subject => &self.subject,
            ArrangementField::StudentId => &self.student_id,
            ArrangementField::Seat => &self.seat,
            ArrangementField::StudentName => &self.student_name,
        }
    }

    fn set(&mut self, field: ArrangementField, value: CellValue) {
        let slot = match field {
            ArrangementField::Room => &mut self.room,
            ArrangementField::ExamDate => &mut self.exam_date,
            ArrangementField::ExamTime => &mut self.exam_time,
            ArrangementField::Subject => &mut self.subject,
            ArrangementField::StudentId => &mut self.student_id,
            ArrangementField::Seat => &mut self.seat,
            ArrangementField::StudentName => &mut self.student_name,
        };
        *slot = value;
    }
}

/// A student's records, keyed by subject code
pub type SubjectRecords = BTreeMap<String, StudentRecord>;

/// Map every non-blank header in row 1 to its column
pub fn build_field_map<S: SpreadsheetAccess>(sheet: &S) -> HashMap<String, u32> {
    let mut fields = HashMap::new();
    for col in 1..=sheet.used_column_count() {
        if let Some(name) = sheet.cell_value(1, col).to_text() {
            let name = name.trim();
            if !name.is_empty() {
                fields.insert(name.to_string(), col);
            }
        }
    }
    fields
}

/// One loaded arrangement table with a validated header
#[derive(Debug)]
pub struct ArrangementSource<S> {
    label: String,
    sheet: S,
    rows: u32,
    cols: u32,
    fields: HashMap<String, u32>,
}

impl<S: SpreadsheetAccess> ArrangementSource<S> {
    /// Scan the header row and check that every required field is present
    pub fn new(label: impl Into<String>, sheet: S) -> Result<Self> {
        let label = label.into();
        let fields = build_field_map(&sheet);

        for field in ArrangementField::REQUIRED {
            if !fields.contains_key(field.header()) {
                return Err(NoticeError::MissingRequiredField {
                    source_label: label,
                    field: field.header().to_string(),
                });
            }
        }

        Ok(Self {
            rows: sheet.used_row_count(),
            cols: sheet.used_column_count(),
            label,
            sheet,
            fields,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn row_count(&self) -> u32 {
        self.rows
    }

    pub fn column_count(&self) -> u32 {
        self.cols
    }

    pub fn column_of(&self, field: ArrangementField) -> Option<u32> {
        self.fields.get(field.header()).copied()
    }

    /// All rows of this table for `student_id`, top to bottom
    pub fn records_for(&self, student_id: &str) -> Vec<StudentRecord> {
        let Some(id_col) = self.column_of(ArrangementField::StudentId) else {
            return Vec::new();
        };

        self.sheet
            .find_all_exact_matches(1..=self.rows, id_col, student_id)
            .into_iter()
            .map(|row| {
                let mut record = StudentRecord::default();
                for field in ArrangementField::REQUIRED {
                    if let Some(col) = self.column_of(field) {
                        record.set(field, self.sheet.cell_value(row, col).clone());
                    }
                }
                record
            })
            .collect()
    }
}

/// Every loaded arrangement table, in load order
#[derive(Debug)]
pub struct ArrangementIndex<S> {
    sources: Vec<ArrangementSource<S>>,
}

impl<S: SpreadsheetAccess> ArrangementIndex<S> {
    pub fn new(sources: Vec<ArrangementSource<S>>) -> Self {
        Self { sources }
    }

    pub fn sources(&self) -> &[ArrangementSource<S>] {
        &self.sources
    }

    /// Merge the records of all sources for one student.
    ///
    /// Sources are visited in load order and rows top to bottom; when two
    /// records share a subject code the later one replaces the earlier.
    pub fn lookup_student(&self, student_id: &str) -> SubjectRecords {
        let mut merged = SubjectRecords::new();

        for source in &self.sources {
            for record in source.records_for(student_id) {
                let Some(code) = record.subject.to_text() else {
                    log::debug!(
                        "{}: row for {} has no subject code, skipped",
                        source.label(),
                        student_id
                    );
                    continue;
                };
                if merged.insert(code.clone(), record).is_some() {
                    log::warn!(
                        "student {} has more than one arrangement for subject {}, using the one from {}",
                        student_id,
                        code,
                        source.label()
                    );
                }
            }
        }

        merged
    }
}
