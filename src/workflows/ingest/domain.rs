use chrono::NaiveDateTime;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// One row of the class list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub identifier: String,
    pub exam_number: String,
    pub first_name: String,
    pub last_name: String,
    pub extra_time_minutes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Receipt,
    ManualFallback,
}

impl Provenance {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Receipt => "Learn receipt",
            Self::ManualFallback => "Manual file",
        }
    }
}

/// A file in the ingest directory bound to a single student for this run.
#[derive(Debug, Clone)]
pub struct CandidateArtifact {
    pub provenance: Provenance,
    pub source: PathBuf,
    pub receipt: Option<PathBuf>,
    pub submitted_at: Option<NaiveDateTime>,
    pub declared_file_count: usize,
    pub filetype_error: Option<String>,
    pub original_filename: Option<String>,
}

impl CandidateArtifact {
    pub(crate) fn manual(source: PathBuf) -> Self {
        let original_filename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Self {
            provenance: Provenance::ManualFallback,
            source,
            receipt: None,
            submitted_at: None,
            declared_file_count: 1,
            filetype_error: None,
            original_filename,
        }
    }

    pub fn source_filename(&self) -> String {
        self.source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlacementStatus {
    Created,
    AlreadyExists,
    Replaced,
}

impl PlacementStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "File created",
            Self::AlreadyExists => "File already exists",
            Self::Replaced => "File replaced",
        }
    }
}

/// Why a submission was routed to manual handling instead of being placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarantineReason {
    FileCount(usize),
    Filetype(String),
    MissingExamNumber,
    Collision { target: PathBuf },
    VariantConflict { existing: PathBuf },
    CopyFailed(String),
    UnsafeFilename(String),
    IdentifierMismatch { expected: String, found: String },
}

impl fmt::Display for QuarantineReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuarantineReason::FileCount(count) => {
                write!(f, "receipt declares {} files, expected exactly 1", count)
            }
            QuarantineReason::Filetype(detail) => write!(f, "filetype error: {}", detail),
            QuarantineReason::MissingExamNumber => write!(f, "class list has no exam number"),
            QuarantineReason::Collision { target } => write!(
                f,
                "target {} already claimed by another student this run",
                target.display()
            ),
            QuarantineReason::VariantConflict { existing } => write!(
                f,
                "{} already exists with the other lateness marking",
                existing.display()
            ),
            QuarantineReason::CopyFailed(err) => write!(f, "copy failed: {}", err),
            QuarantineReason::UnsafeFilename(name) => {
                write!(f, "'{}' is not a plain file name", name)
            }
            QuarantineReason::IdentifierMismatch { expected, found } => write!(
                f,
                "receipt belongs to {} but was indexed under {}",
                found, expected
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Placed {
        target: PathBuf,
        late: bool,
        status: PlacementStatus,
    },
    Quarantined(QuarantineReason),
    Unmatched {
        detail: Option<String>,
    },
}

impl SubmissionOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, SubmissionOutcome::Placed { .. })
    }

    pub fn is_late(&self) -> bool {
        matches!(self, SubmissionOutcome::Placed { late: true, .. })
    }
}

/// Audit entry for one student: the record, the artifact it resolved to (if
/// any), and the final outcome.
#[derive(Debug, Clone)]
pub struct ProcessedSubmission {
    pub student: StudentRecord,
    pub artifact: Option<CandidateArtifact>,
    pub outcome: SubmissionOutcome,
}
