use super::domain::{ProcessedSubmission, SubmissionOutcome};
use super::receipt::SUBMITTED_AT_FORMAT;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Timestamp prefix of report filenames.
pub const REPORT_TIME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

const REPORT_HEADERS: [&str; 14] = [
    "UUN",
    "Exam Number",
    "First Name",
    "Last Name",
    "Extra Time",
    "Source",
    "Filename",
    "Original Filename",
    "Date Submitted",
    "Number Of Files",
    "Output File",
    "Late Submission",
    "Status",
    "Reason",
];

/// Flat CSV view of one processed student. Column order matches
/// `REPORT_HEADERS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub identifier: String,
    pub exam_number: String,
    pub first_name: String,
    pub last_name: String,
    pub extra_time_minutes: u32,
    pub provenance: String,
    pub source_filename: String,
    pub original_filename: String,
    pub submitted_at: String,
    pub declared_file_count: String,
    pub output_file: String,
    pub late: String,
    pub status: String,
    pub reason: String,
}

impl ReportRow {
    pub fn from_submission(entry: &ProcessedSubmission) -> Self {
        let student = &entry.student;
        let artifact = entry.artifact.as_ref();

        let (output_file, late, status, reason) = match &entry.outcome {
            SubmissionOutcome::Placed {
                target,
                late,
                status,
            } => (
                target.display().to_string(),
                if *late { "LATE" } else { "" }.to_string(),
                status.label().to_string(),
                String::new(),
            ),
            SubmissionOutcome::Quarantined(reason) => (
                String::new(),
                String::new(),
                "Quarantined".to_string(),
                reason.to_string(),
            ),
            SubmissionOutcome::Unmatched { detail } => (
                String::new(),
                String::new(),
                "Unmatched".to_string(),
                detail
                    .clone()
                    .unwrap_or_else(|| "no submission found".to_string()),
            ),
        };

        Self {
            identifier: student.identifier.clone(),
            exam_number: student.exam_number.clone(),
            first_name: student.first_name.clone(),
            last_name: student.last_name.clone(),
            extra_time_minutes: student.extra_time_minutes,
            provenance: artifact
                .map(|a| a.provenance.label().to_string())
                .unwrap_or_default(),
            source_filename: artifact.map(|a| a.source_filename()).unwrap_or_default(),
            original_filename: artifact
                .and_then(|a| a.original_filename.clone())
                .unwrap_or_default(),
            submitted_at: artifact
                .and_then(|a| a.submitted_at)
                .map(|at| at.format(SUBMITTED_AT_FORMAT).to_string())
                .unwrap_or_default(),
            declared_file_count: artifact
                .map(|a| a.declared_file_count.to_string())
                .unwrap_or_default(),
            output_file,
            late,
            status,
            reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportPaths {
    pub success: PathBuf,
    pub errors: PathBuf,
}

/// Collects outcomes in processing order, split into placed submissions and
/// bad submissions that need a human.
#[derive(Debug, Default)]
pub struct ReportAggregator {
    successes: Vec<ProcessedSubmission>,
    bad_submissions: Vec<ProcessedSubmission>,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ProcessedSubmission) {
        if entry.outcome.is_placed() {
            self.successes.push(entry);
        } else {
            self.bad_submissions.push(entry);
        }
    }

    pub fn successes(&self) -> &[ProcessedSubmission] {
        &self.successes
    }

    pub fn bad_submissions(&self) -> &[ProcessedSubmission] {
        &self.bad_submissions
    }

    pub fn len(&self) -> usize {
        self.successes.len() + self.bad_submissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes `{time}-learn-success.csv` and `{time}-learn-errors.csv` into
    /// `dir`. Both files are always written, header-only when empty.
    pub fn write_reports(
        &self,
        dir: &Path,
        run_time: NaiveDateTime,
    ) -> Result<ReportPaths, csv::Error> {
        let stamp = run_time.format(REPORT_TIME_FORMAT);
        let paths = ReportPaths {
            success: dir.join(format!("{stamp}-learn-success.csv")),
            errors: dir.join(format!("{stamp}-learn-errors.csv")),
        };

        write_report(&self.successes, &paths.success)?;
        write_report(&self.bad_submissions, &paths.errors)?;
        Ok(paths)
    }
}

pub fn write_report(entries: &[ProcessedSubmission], path: &Path) -> Result<(), csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(REPORT_HEADERS)?;
    for entry in entries {
        writer.serialize(ReportRow::from_submission(entry))?;
    }
    writer.flush()?;
    Ok(())
}
