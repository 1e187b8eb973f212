//! Row classification for the notification sheet

use crate::reader::CellValue;
use regex::Regex;
use std::sync::LazyLock;

/// `学号：` followed by a 13-digit student ID, anywhere in the cell text
static STUDENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"学号[：:]\s*([0-9]{13})").expect("valid student id pattern"));

/// A 4-digit subject code at the start of the cell text
static SUBJECT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}").expect("valid subject code pattern"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    StudentAnchor(String),
    SubjectRow(String),
    Other,
}

/// Classify a notification row by the value of its first column
pub fn classify_row(first_cell: &CellValue) -> RowKind {
    let Some(text) = first_cell.to_text() else {
        return RowKind::Other;
    };
    if let Some(id) = student_id(&text) {
        return RowKind::StudentAnchor(id);
    }
    if let Some(code) = subject_code(&text) {
        return RowKind::SubjectRow(code);
    }
    RowKind::Other
}

pub fn student_id(text: &str) -> Option<String> {
    STUDENT_ID
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn subject_code(text: &str) -> Option<String> {
    SUBJECT_CODE.find(text).map(|m| m.as_str().to_string())
}
