pub mod classlist;
pub mod document;
pub mod domain;
pub mod identifier;
pub mod lateness;
pub mod matcher;
pub mod placement;
pub mod receipt;
pub mod report;

pub use classlist::{check_exam_number, check_identifier, load_class_list, ClassListError};
pub use document::{DocumentProbe, DocumentReader, PdfHeaderProbe};
pub use domain::{
    CandidateArtifact, PlacementStatus, ProcessedSubmission, Provenance, QuarantineReason,
    StudentRecord, SubmissionOutcome,
};
pub use matcher::{ReceiptIndex, Resolution, SubmissionMatcher};
pub use placement::PlacementEngine;
pub use receipt::{LearnReceiptParser, Receipt, ReceiptError, ReceiptParser};
pub use report::{ReportAggregator, ReportPaths, ReportRow};

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Everything one ingest run needs to know.
#[derive(Debug, Clone)]
pub struct IngestJob {
    pub course: String,
    pub classlist: PathBuf,
    pub learn_dir: PathBuf,
    pub output_dir: PathBuf,
    pub deadline: NaiveDateTime,
}

#[derive(Debug)]
pub enum IngestError {
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
    LearnDir {
        path: PathBuf,
        source: std::io::Error,
    },
    ClassList(ClassListError),
    Report(csv::Error),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::OutputDir { path, source } => write!(
                f,
                "cannot use output folder {}: {}",
                path.display(),
                source
            ),
            IngestError::LearnDir { path, source } => write!(
                f,
                "cannot read Learn folder {}: {}",
                path.display(),
                source
            ),
            IngestError::ClassList(err) => write!(f, "{}", err),
            IngestError::Report(err) => write!(f, "failed to write report: {}", err),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::OutputDir { source, .. } | IngestError::LearnDir { source, .. } => {
                Some(source)
            }
            IngestError::ClassList(err) => Some(err),
            IngestError::Report(err) => Some(err),
        }
    }
}

impl From<ClassListError> for IngestError {
    fn from(err: ClassListError) -> Self {
        Self::ClassList(err)
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        Self::Report(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub course: String,
    pub students: usize,
    pub placed: usize,
    pub late: usize,
    pub quarantined: usize,
    pub unmatched: usize,
    pub reports: ReportPaths,
}

#[derive(Debug)]
pub struct IngestReport {
    pub summary: RunSummary,
    pub entries: ReportAggregator,
}

/// Reconciles a Learn download against the class list and places one file per
/// student. Runs are sequential and must not share an output folder.
pub struct IngestPipeline<P = LearnReceiptParser, D = PdfHeaderProbe> {
    parser: P,
    documents: D,
}

impl IngestPipeline {
    pub fn learn() -> Self {
        Self::with_collaborators(LearnReceiptParser, PdfHeaderProbe)
    }
}

impl<P: ReceiptParser, D: DocumentReader> IngestPipeline<P, D> {
    pub fn with_collaborators(parser: P, documents: D) -> Self {
        Self { parser, documents }
    }

    pub fn run(
        &self,
        job: &IngestJob,
        run_time: NaiveDateTime,
    ) -> Result<IngestReport, IngestError> {
        ensure_output_dir(&job.output_dir)?;
        if !job.learn_dir.is_dir() {
            return Err(IngestError::LearnDir {
                path: job.learn_dir.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        info!(
            course = %job.course,
            deadline = %job.deadline.format("%Y-%m-%d at %H:%M"),
            classlist = %job.classlist.display(),
            learn_dir = %job.learn_dir.display(),
            "starting ingest"
        );

        let index = ReceiptIndex::scan(&job.learn_dir).map_err(|source| IngestError::LearnDir {
            path: job.learn_dir.clone(),
            source,
        })?;
        info!(receipts = index.len(), "indexed Learn receipts");

        let students = load_class_list(&job.classlist)?;
        let matcher = SubmissionMatcher::new(&job.learn_dir, &index, &self.parser);
        let mut engine = PlacementEngine::new(&job.output_dir);
        let mut aggregator = ReportAggregator::new();

        for student in &students {
            let entry = self.process_student(student, &matcher, &mut engine, job.deadline);
            aggregator.record(entry);
        }

        let reports = aggregator.write_reports(&job.output_dir, run_time)?;
        let summary = summarize(&job.course, &aggregator, reports);
        info!(
            placed = summary.placed,
            late = summary.late,
            quarantined = summary.quarantined,
            unmatched = summary.unmatched,
            "ingest finished"
        );

        Ok(IngestReport {
            summary,
            entries: aggregator,
        })
    }

    fn process_student(
        &self,
        student: &StudentRecord,
        matcher: &SubmissionMatcher<'_, P>,
        engine: &mut PlacementEngine,
        deadline: NaiveDateTime,
    ) -> ProcessedSubmission {
        let resolution = matcher.resolve(student);
        let outcome = match &resolution {
            Resolution::Receipt(artifact) | Resolution::Fallback(artifact) => {
                let late =
                    lateness::is_late(artifact.submitted_at, deadline, student.extra_time_minutes);
                engine.place(student, artifact, late)
            }
            Resolution::Rejected { reason, .. } => SubmissionOutcome::Quarantined(reason.clone()),
            Resolution::Unmatched { detail } => SubmissionOutcome::Unmatched {
                detail: detail.clone(),
            },
        };

        match &outcome {
            SubmissionOutcome::Placed {
                target,
                late,
                status,
            } => {
                info!(
                    identifier = %student.identifier,
                    exam_number = %student.exam_number,
                    late = *late,
                    target = %target.display(),
                    "{}",
                    status.label()
                );
                self.log_document(target);
            }
            SubmissionOutcome::Quarantined(reason) => warn!(
                identifier = %student.identifier,
                exam_number = %student.exam_number,
                %reason,
                "bad submission"
            ),
            SubmissionOutcome::Unmatched { .. } => debug!(
                identifier = %student.identifier,
                "no submission found"
            ),
        }

        ProcessedSubmission {
            student: student.clone(),
            artifact: resolution.artifact().cloned(),
            outcome,
        }
    }

    fn log_document(&self, target: &Path) {
        match self.documents.probe(target) {
            Ok(probe) if !probe.is_pdf => {
                warn!(target = %target.display(), "placed file does not look like a PDF")
            }
            Ok(probe) if probe.encrypted => {
                warn!(target = %target.display(), "placed PDF is encrypted")
            }
            Ok(probe) => debug!(target = %target.display(), bytes = probe.bytes, "placed PDF"),
            Err(err) => debug!(target = %target.display(), error = %err, "could not probe file"),
        }
    }
}

fn summarize(course: &str, aggregator: &ReportAggregator, reports: ReportPaths) -> RunSummary {
    let bad = aggregator.bad_submissions();
    RunSummary {
        course: course.to_string(),
        students: aggregator.len(),
        placed: aggregator.successes().len(),
        late: aggregator
            .successes()
            .iter()
            .filter(|entry| entry.outcome.is_late())
            .count(),
        quarantined: bad
            .iter()
            .filter(|entry| matches!(entry.outcome, SubmissionOutcome::Quarantined(_)))
            .count(),
        unmatched: bad
            .iter()
            .filter(|entry| matches!(entry.outcome, SubmissionOutcome::Unmatched { .. }))
            .count(),
        reports,
    }
}

/// Creates the output folder if needed and restricts it to the owner.
fn ensure_output_dir(path: &Path) -> Result<(), IngestError> {
    let to_error = |source| IngestError::OutputDir {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(path).map_err(to_error)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).map_err(to_error)?;
    }
    if !path.is_dir() {
        return Err(to_error(std::io::Error::new(
            std::io::ErrorKind::Other,
            "not a directory",
        )));
    }
    Ok(())
}
