use super::identifier::extract_identifier;
use chrono::NaiveDateTime;
use std::path::Path;

/// Timestamp format embedded in Learn attempt filenames.
pub const SUBMITTED_AT_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// A stored file listed in a receipt's `Files:` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptFile {
    pub original_filename: Option<String>,
    pub filename: String,
}

/// Metadata describing one submission event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub identifier: Option<String>,
    pub submitted_at: Option<NaiveDateTime>,
    pub files: Vec<ReceiptFile>,
}

impl Receipt {
    pub fn declared_file_count(&self) -> usize {
        self.files.len()
    }

    pub fn source_filename(&self) -> Option<&str> {
        self.files.first().map(|file| file.filename.as_str())
    }

    pub fn original_filename(&self) -> Option<&str> {
        self.files
            .first()
            .and_then(|file| file.original_filename.as_deref())
    }

    /// Names every submitted file whose original name is not a PDF.
    pub fn filetype_error(&self) -> Option<String> {
        let offending: Vec<&str> = self
            .files
            .iter()
            .map(|file| file.original_filename.as_deref().unwrap_or(&file.filename))
            .filter(|name| !has_pdf_extension(name))
            .collect();

        if offending.is_empty() {
            None
        } else {
            Some(format!("not a pdf: {}", offending.join(", ")))
        }
    }
}

fn has_pdf_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[derive(Debug, thiserror::Error)]
pub enum ReceiptError {
    #[error("could not read receipt: {0}")]
    Io(#[from] std::io::Error),
    #[error("receipt is not a Learn submission receipt (no Name or Files section)")]
    Unrecognized,
}

/// Turns a receipt file into structured submission metadata.
pub trait ReceiptParser {
    fn parse(&self, path: &Path) -> Result<Receipt, ReceiptError>;
}

/// Parser for the plain-text receipts in a Learn assignment download.
#[derive(Debug, Default, Clone, Copy)]
pub struct LearnReceiptParser;

impl ReceiptParser for LearnReceiptParser {
    fn parse(&self, path: &Path) -> Result<Receipt, ReceiptError> {
        let text = std::fs::read_to_string(path)?;
        let mut receipt = parse_receipt_text(&text)?;

        if receipt.identifier.is_none() {
            receipt.identifier = path
                .file_name()
                .and_then(|name| extract_identifier(&name.to_string_lossy()));
        }
        if receipt.submitted_at.is_none() {
            receipt.submitted_at = path
                .file_name()
                .and_then(|name| attempt_timestamp(&name.to_string_lossy()));
        }

        Ok(receipt)
    }
}

pub(crate) fn parse_receipt_text(text: &str) -> Result<Receipt, ReceiptError> {
    let mut receipt = Receipt {
        identifier: None,
        submitted_at: None,
        files: Vec::new(),
    };
    let mut saw_name = false;
    let mut saw_files = false;
    let mut pending_original: Option<String> = None;

    for line in text.lines() {
        let Some((key, value)) = line.trim().split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim().to_ascii_lowercase().as_str() {
            "name" => {
                saw_name = true;
                receipt.identifier = name_identifier(value);
            }
            "date submitted" => receipt.submitted_at = parse_submitted_at(value),
            "files" => saw_files = true,
            "original filename" => pending_original = Some(value.to_string()),
            "filename" if !value.is_empty() => receipt.files.push(ReceiptFile {
                original_filename: pending_original.take(),
                filename: value.to_string(),
            }),
            _ => {}
        }
    }

    if !saw_name && !saw_files {
        return Err(ReceiptError::Unrecognized);
    }

    Ok(receipt)
}

/// Upper-cased identifier from the bracketed part of `Ada Lovelace (s1234567)`.
fn name_identifier(value: &str) -> Option<String> {
    let (_, rest) = value.rsplit_once('(')?;
    let identifier = rest.trim_end_matches(')').trim();
    (!identifier.is_empty()).then(|| identifier.to_ascii_uppercase())
}

/// Accepts `Wednesday, 22 April 2020 15:59:00 o'clock BST` as written by
/// Learn, or the dashed attempt format.
pub(crate) fn parse_submitted_at(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, SUBMITTED_AT_FORMAT) {
        return Some(parsed);
    }

    let without_weekday = value
        .split_once(',')
        .map(|(_, rest)| rest)
        .unwrap_or(value);
    let without_zone = without_weekday
        .split(" o'clock")
        .next()
        .unwrap_or(without_weekday)
        .trim();

    NaiveDateTime::parse_from_str(without_zone, "%d %B %Y %H:%M:%S").ok()
}

fn attempt_timestamp(filename: &str) -> Option<NaiveDateTime> {
    let (_, rest) = filename.split_once("_attempt_")?;
    let stamp = rest.get(..19)?;
    NaiveDateTime::parse_from_str(stamp, SUBMITTED_AT_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const RECEIPT: &str = "Name: Ada Lovelace (s1234567)\n\
Assignment: MATH00000 Exam Submission\n\
Date Submitted: Wednesday, 22 April 2020 15:59:00 o'clock BST\n\
Current Grade: Needs Grading\n\
\n\
Submission Field:\n\
There is no student submission text data for this assignment.\n\
\n\
Comments:\n\
There are no student comments for this assignment.\n\
\n\
Files:\n\
\tOriginal filename: answers.pdf\n\
\tFilename: MATH00000 Exam_s1234567_attempt_2020-04-22-15-59-00_answers.pdf\n";

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2020, 4, 22)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn parses_learn_receipt() {
        let receipt = parse_receipt_text(RECEIPT).expect("receipt parses");
        assert_eq!(receipt.identifier.as_deref(), Some("S1234567"));
        assert_eq!(receipt.submitted_at, Some(at(15, 59, 0)));
        assert_eq!(receipt.declared_file_count(), 1);
        assert_eq!(receipt.original_filename(), Some("answers.pdf"));
        assert_eq!(
            receipt.source_filename(),
            Some("MATH00000 Exam_s1234567_attempt_2020-04-22-15-59-00_answers.pdf")
        );
        assert!(receipt.filetype_error().is_none());
    }

    #[test]
    fn counts_multiple_files_and_flags_non_pdf() {
        let text = "Name: Ada Lovelace (s1234567)\nFiles:\n\
Original filename: page1.jpg\nFilename: x_page1.jpg\n\
Original filename: page2.pdf\nFilename: x_page2.pdf\n";
        let receipt = parse_receipt_text(text).expect("receipt parses");
        assert_eq!(receipt.declared_file_count(), 2);
        assert_eq!(receipt.filetype_error().as_deref(), Some("not a pdf: page1.jpg"));
    }

    #[test]
    fn receipt_without_files_declares_zero() {
        let receipt = parse_receipt_text("Name: Ada (s1234567)\nFiles:\n").expect("parses");
        assert_eq!(receipt.declared_file_count(), 0);
        assert!(receipt.source_filename().is_none());
    }

    #[test]
    fn name_without_identifier_leaves_it_unset() {
        let receipt = parse_receipt_text("Name: Ada Lovelace\nFiles:\n").expect("parses");
        assert_eq!(receipt.identifier, None);
        assert_eq!(name_identifier("Alan Turing ( s7654321 )"), Some("S7654321".to_string()));
    }

    #[test]
    fn arbitrary_text_is_unrecognized() {
        match parse_receipt_text("hello world\nnothing to see") {
            Err(ReceiptError::Unrecognized) => {}
            other => panic!("expected unrecognized receipt, got {other:?}"),
        }
    }

    #[test]
    fn submitted_at_accepts_both_formats() {
        assert_eq!(parse_submitted_at("2020-04-22-16-05-00"), Some(at(16, 5, 0)));
        assert_eq!(
            parse_submitted_at("Wednesday, 22 April 2020 16:20:00 o'clock BST"),
            Some(at(16, 20, 0))
        );
        assert_eq!(parse_submitted_at("sometime on Wednesday"), None);
    }

    #[test]
    fn attempt_timestamp_reads_filename() {
        assert_eq!(
            attempt_timestamp("Exam_s1234567_attempt_2020-04-22-16-05-00.txt"),
            Some(at(16, 5, 0))
        );
        assert_eq!(attempt_timestamp("Exam_s1234567.txt"), None);
    }
}
