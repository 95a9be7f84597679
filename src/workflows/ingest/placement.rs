use super::domain::{
    CandidateArtifact, PlacementStatus, QuarantineReason, StudentRecord, SubmissionOutcome,
};
use super::identifier::is_plain_filename;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LATE_PREFIX: &str = "LATE-";

#[derive(Debug, thiserror::Error)]
pub enum PlacementError {
    #[error("{path} is not a regular file")]
    NotRegular { path: String },
    #[error("{0}")]
    Io(#[from] io::Error),
}

/// Output file name for an exam number.
pub fn target_filename(exam_number: &str, late: bool) -> String {
    if late {
        format!("{LATE_PREFIX}{exam_number}.pdf")
    } else {
        format!("{exam_number}.pdf")
    }
}

/// Places artifacts into the output directory and remembers which exam
/// numbers this run has already claimed.
#[derive(Debug)]
pub struct PlacementEngine {
    output_dir: PathBuf,
    claimed: HashMap<String, PathBuf>,
}

impl PlacementEngine {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            claimed: HashMap::new(),
        }
    }

    pub fn target_path(&self, exam_number: &str, late: bool) -> PathBuf {
        self.output_dir.join(target_filename(exam_number, late))
    }

    pub fn place(
        &mut self,
        student: &StudentRecord,
        artifact: &CandidateArtifact,
        late: bool,
    ) -> SubmissionOutcome {
        match self.check_preconditions(student, artifact, late) {
            Ok(target) => self.execute(artifact, target, late),
            Err(reason) => SubmissionOutcome::Quarantined(reason),
        }
    }

    fn check_preconditions(
        &mut self,
        student: &StudentRecord,
        artifact: &CandidateArtifact,
        late: bool,
    ) -> Result<PathBuf, QuarantineReason> {
        if artifact.declared_file_count != 1 {
            return Err(QuarantineReason::FileCount(artifact.declared_file_count));
        }
        if let Some(detail) = &artifact.filetype_error {
            return Err(QuarantineReason::Filetype(detail.clone()));
        }
        if student.exam_number.is_empty() {
            return Err(QuarantineReason::MissingExamNumber);
        }
        let filename = target_filename(&student.exam_number, late);
        if !is_plain_filename(&filename) {
            return Err(QuarantineReason::UnsafeFilename(filename));
        }

        let target = self.output_dir.join(filename);
        if let Some(claimed) = self.claimed.get(&student.exam_number) {
            return Err(QuarantineReason::Collision {
                target: claimed.clone(),
            });
        }
        self.claimed
            .insert(student.exam_number.clone(), target.clone());

        let other_variant = self.target_path(&student.exam_number, !late);
        if other_variant.exists() {
            return Err(QuarantineReason::VariantConflict {
                existing: other_variant,
            });
        }

        Ok(target)
    }

    fn execute(
        &self,
        artifact: &CandidateArtifact,
        target: PathBuf,
        late: bool,
    ) -> SubmissionOutcome {
        let status = match move_file(&artifact.source, &target) {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    source = %artifact.source.display(),
                    target = %target.display(),
                    error = %err,
                    "could not place submission"
                );
                return SubmissionOutcome::Quarantined(QuarantineReason::CopyFailed(
                    err.to_string(),
                ));
            }
        };

        if let Some(receipt) = &artifact.receipt {
            remove_quietly(receipt);
        }

        SubmissionOutcome::Placed {
            target,
            late,
            status,
        }
    }
}

/// Moves `source` to `target` unless `target` is already newer. The source is
/// removed once the target holds its final contents.
///
/// A newer target is taken as already settled: modification times are
/// compared, not contents, so manual edits to earlier output survive a re-run.
pub fn move_file(source: &Path, target: &Path) -> Result<PlacementStatus, PlacementError> {
    let source_meta = fs::metadata(source)?;
    if !source_meta.is_file() {
        return Err(PlacementError::NotRegular {
            path: source.display().to_string(),
        });
    }

    let status = match fs::metadata(target) {
        Ok(target_meta) => {
            if !target_meta.is_file() {
                return Err(PlacementError::NotRegular {
                    path: target.display().to_string(),
                });
            }
            if target_meta.modified()? > source_meta.modified()? {
                debug!(target = %target.display(), "target is newer, keeping it");
                PlacementStatus::AlreadyExists
            } else {
                copy_into_place(source, target)?;
                PlacementStatus::Replaced
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if fs::hard_link(source, target).is_err() {
                copy_into_place(source, target)?;
            }
            PlacementStatus::Created
        }
        Err(err) => return Err(err.into()),
    };

    remove_quietly(source);
    Ok(status)
}

/// Copies through a sibling partial file and renames it over `target`, so the
/// final name never holds a half-written file.
fn copy_into_place(source: &Path, target: &Path) -> io::Result<()> {
    let partial = partial_path(target);
    let result = write_partial(source, &partial).and_then(|_| fs::rename(&partial, target));
    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn write_partial(source: &Path, partial: &Path) -> io::Result<()> {
    let mut input = fs::File::open(source)?;
    let mut output = fs::File::create(partial)?;
    io::copy(&mut input, &mut output)?;
    output.sync_all()
}

fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.partial"))
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "could not remove ingested file");
    }
}
