use super::domain::StudentRecord;
use super::identifier::looks_like_identifier;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const CLASS_LIST_COLUMNS: usize = 5;

pub const IDENTIFIER_LENGTH: usize = 8;
pub const RESERVED_IDENTIFIER_PREFIX: char = 's';
pub const EXAM_NUMBER_LENGTH: usize = 7;
pub const RESERVED_EXAM_NUMBER_PREFIX: char = 'b';

#[derive(Debug, thiserror::Error)]
pub enum ClassListError {
    #[error("could not read class list: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid class list CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("class list line {line} has {found} columns, expected 5")]
    Malformed { line: u64, found: usize },
}

/// Positional view of a class-list row: UUN, Exam Number, First Name, Last
/// Name, Minutes of Extra Time Allowed.
#[derive(Debug, Deserialize)]
struct ClassListRow {
    identifier: String,
    exam_number: String,
    first_name: String,
    last_name: String,
    extra_time: String,
}

pub fn load_class_list<P: AsRef<Path>>(path: P) -> Result<Vec<StudentRecord>, ClassListError> {
    let file = std::fs::File::open(path)?;
    read_class_list(file)
}

/// Reads class-list rows in file order. A first row whose identifier cell is
/// not shaped like an identifier (e.g. `UUN`) is taken as a header and
/// skipped; otherwise it is a student like every other row.
pub fn read_class_list<R: Read>(reader: R) -> Result<Vec<StudentRecord>, ClassListError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut students = Vec::new();
    for (index, result) in csv_reader.records().enumerate() {
        let record = result?;
        if record.len() != CLASS_LIST_COLUMNS {
            return Err(ClassListError::Malformed {
                line: record.position().map(|pos| pos.line()).unwrap_or_default(),
                found: record.len(),
            });
        }
        if index == 0 && !looks_like_identifier(&record[0]) {
            debug!(first_cell = %&record[0], "skipping class list header");
            continue;
        }

        let row: ClassListRow = record.deserialize(None)?;
        students.push(row.into_student());
    }

    Ok(students)
}

impl ClassListRow {
    fn into_student(self) -> StudentRecord {
        let identifier = self.identifier.to_ascii_uppercase();
        let extra_time_minutes = parse_extra_time(&self.extra_time).unwrap_or_else(|| {
            warn!(
                identifier = %identifier,
                value = %self.extra_time,
                "unreadable extra time, assuming 0 minutes"
            );
            0
        });

        StudentRecord {
            identifier,
            exam_number: self.exam_number,
            first_name: self.first_name,
            last_name: self.last_name,
            extra_time_minutes,
        }
    }
}

fn parse_extra_time(raw: &str) -> Option<u32> {
    if raw.is_empty() {
        return Some(0);
    }
    raw.parse::<u32>().ok()
}

/// Checks the length and reserved leading letter of a student identifier.
pub fn check_identifier(value: &str) -> Result<(), String> {
    check_shape(value, IDENTIFIER_LENGTH, RESERVED_IDENTIFIER_PREFIX)
}

/// Checks the length and reserved leading letter of an exam number.
pub fn check_exam_number(value: &str) -> Result<(), String> {
    check_shape(value, EXAM_NUMBER_LENGTH, RESERVED_EXAM_NUMBER_PREFIX)
}

fn check_shape(value: &str, expected_len: usize, reserved: char) -> Result<(), String> {
    let actual_len = value.chars().count();
    if actual_len != expected_len {
        return Err(format!(
            "wrong length: got {actual_len}, expected {expected_len}"
        ));
    }
    if value
        .chars()
        .next()
        .is_some_and(|first| first.eq_ignore_ascii_case(&reserved))
    {
        return Err(format!("must not start with '{reserved}'"));
    }
    Ok(())
}
