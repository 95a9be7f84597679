use super::domain::{CandidateArtifact, Provenance, QuarantineReason, StudentRecord};
use super::identifier::{extract_identifier, fallback_filename, is_plain_filename};
use super::receipt::{ReceiptError, ReceiptParser};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Receipts in the learn folder keyed by upper-cased identifier. Built once per
/// run.
#[derive(Debug, Default, Clone)]
pub struct ReceiptIndex {
    receipts: BTreeMap<String, PathBuf>,
}

impl ReceiptIndex {
    pub fn scan(learn_dir: &Path) -> std::io::Result<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(learn_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_receipt_name(&name) {
                names.push(name);
            }
        }
        names.sort();

        let mut receipts = BTreeMap::new();
        for name in names {
            let Some(identifier) = extract_identifier(&name) else {
                warn!(file = %name, "receipt name carries no student identifier, skipping");
                continue;
            };
            if let Some(previous) = receipts.insert(identifier.clone(), learn_dir.join(&name)) {
                warn!(
                    identifier = %identifier,
                    replaced = %previous.display(),
                    kept = %name,
                    "several receipts for one student, using the latest attempt"
                );
            }
        }

        Ok(Self { receipts })
    }

    pub fn get(&self, identifier: &str) -> Option<&Path> {
        self.receipts.get(identifier).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.receipts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receipts.is_empty()
    }
}

fn is_receipt_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"))
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Receipt(CandidateArtifact),
    Fallback(CandidateArtifact),
    /// A receipt that parsed but cannot be trusted to name this student's file.
    Rejected {
        artifact: CandidateArtifact,
        reason: QuarantineReason,
    },
    Unmatched { detail: Option<String> },
}

impl Resolution {
    pub fn artifact(&self) -> Option<&CandidateArtifact> {
        match self {
            Resolution::Receipt(artifact)
            | Resolution::Fallback(artifact)
            | Resolution::Rejected { artifact, .. } => Some(artifact),
            Resolution::Unmatched { .. } => None,
        }
    }
}

/// Binds each student to at most one artifact: a parsed receipt first, then a
/// manually placed `{identifier}.pdf`.
pub struct SubmissionMatcher<'a, P: ReceiptParser> {
    learn_dir: &'a Path,
    index: &'a ReceiptIndex,
    parser: &'a P,
}

impl<'a, P: ReceiptParser> SubmissionMatcher<'a, P> {
    pub fn new(learn_dir: &'a Path, index: &'a ReceiptIndex, parser: &'a P) -> Self {
        Self {
            learn_dir,
            index,
            parser,
        }
    }

    pub fn resolve(&self, student: &StudentRecord) -> Resolution {
        let mut receipt_error = None;

        if let Some(receipt_path) = self.index.get(&student.identifier) {
            match self.from_receipt(student, receipt_path) {
                Ok(resolution) => return resolution,
                Err(err) => {
                    warn!(
                        identifier = %student.identifier,
                        receipt = %receipt_path.display(),
                        error = %err,
                        "could not parse receipt, looking for a manual file"
                    );
                    receipt_error = Some(format!("receipt unreadable: {err}"));
                }
            }
        }

        let manual_name = fallback_filename(&student.identifier);
        let manual = self.learn_dir.join(&manual_name);
        if is_plain_filename(&manual_name) && manual.is_file() {
            debug!(identifier = %student.identifier, file = %manual.display(), "using manual file");
            return Resolution::Fallback(CandidateArtifact::manual(manual));
        }

        Resolution::Unmatched {
            detail: receipt_error,
        }
    }

    fn from_receipt(
        &self,
        student: &StudentRecord,
        receipt_path: &Path,
    ) -> Result<Resolution, ReceiptError> {
        let receipt = self.parser.parse(receipt_path)?;
        let unsafe_name = receipt
            .files
            .iter()
            .map(|file| file.filename.as_str())
            .find(|name| !is_plain_filename(name));
        let source = match receipt.source_filename() {
            Some(filename) if unsafe_name.is_none() => self.learn_dir.join(filename),
            _ => receipt_path.to_path_buf(),
        };

        let artifact = CandidateArtifact {
            provenance: Provenance::Receipt,
            filetype_error: receipt.filetype_error(),
            declared_file_count: receipt.declared_file_count(),
            original_filename: receipt.original_filename().map(str::to_string),
            submitted_at: receipt.submitted_at,
            receipt: Some(receipt_path.to_path_buf()),
            source,
        };

        if let Some(name) = unsafe_name {
            warn!(
                identifier = %student.identifier,
                receipt = %receipt_path.display(),
                filename = %name,
                "receipt names a file outside the learn folder"
            );
            return Ok(Resolution::Rejected {
                reason: QuarantineReason::UnsafeFilename(name.to_string()),
                artifact,
            });
        }

        match receipt.identifier {
            Some(found) if found != student.identifier => {
                warn!(
                    identifier = %student.identifier,
                    receipt = %receipt_path.display(),
                    found = %found,
                    "receipt names a different student"
                );
                Ok(Resolution::Rejected {
                    reason: QuarantineReason::IdentifierMismatch {
                        expected: student.identifier.clone(),
                        found,
                    },
                    artifact,
                })
            }
            _ => Ok(Resolution::Receipt(artifact)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::ingest::receipt::{LearnReceiptParser, Receipt};
    use std::fs;

    fn student(identifier: &str) -> StudentRecord {
        StudentRecord {
            identifier: identifier.to_string(),
            exam_number: "1234567".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            extra_time_minutes: 0,
        }
    }

    fn write_receipt(dir: &Path, name: &str, stored: &str) {
        write_receipt_for(dir, name, "s1234567", stored);
    }

    fn write_receipt_for(dir: &Path, name: &str, uun: &str, stored: &str) {
        let text = format!(
            "Name: Ada Lovelace ({uun})\n\
Date Submitted: 2020-04-22-15-59-00\n\
Files:\n\
Original filename: answers.pdf\n\
Filename: {stored}\n"
        );
        fs::write(dir.join(name), text).expect("write receipt");
    }

    struct FailingParser;

    impl ReceiptParser for FailingParser {
        fn parse(&self, _path: &Path) -> Result<Receipt, ReceiptError> {
            Err(ReceiptError::Unrecognized)
        }
    }

    #[test]
    fn index_skips_unrecognized_names_and_keeps_latest_attempt() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_receipt(dir.path(), "Exam_s1234567_attempt_2020-04-22-15-00-00.txt", "a.pdf");
        write_receipt(dir.path(), "Exam_s1234567_attempt_2020-04-22-15-59-00.txt", "b.pdf");
        fs::write(dir.path().join("notes.txt"), "misc").expect("write notes");
        fs::write(dir.path().join("s7654321.pdf"), "%PDF-").expect("write pdf");

        let index = ReceiptIndex::scan(dir.path()).expect("scan");
        assert_eq!(index.len(), 1);
        let kept = index.get("S1234567").expect("receipt indexed");
        assert!(kept.ends_with("Exam_s1234567_attempt_2020-04-22-15-59-00.txt"));
    }

    #[test]
    fn receipt_wins_over_manual_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_receipt(dir.path(), "Exam_s1234567_attempt_2020-04-22-15-59-00.txt", "stored.pdf");
        fs::write(dir.path().join("s1234567.pdf"), "%PDF-manual").expect("write manual");

        let index = ReceiptIndex::scan(dir.path()).expect("scan");
        let parser = LearnReceiptParser;
        let matcher = SubmissionMatcher::new(dir.path(), &index, &parser);

        match matcher.resolve(&student("S1234567")) {
            Resolution::Receipt(artifact) => {
                assert_eq!(artifact.source, dir.path().join("stored.pdf"));
                assert_eq!(artifact.declared_file_count, 1);
                assert!(artifact.submitted_at.is_some());
            }
            other => panic!("expected receipt resolution, got {other:?}"),
        }
    }

    #[test]
    fn unparseable_receipt_falls_back_to_manual_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_receipt(dir.path(), "Exam_s1234567_attempt_2020-04-22-15-59-00.txt", "stored.pdf");
        fs::write(dir.path().join("s1234567.pdf"), "%PDF-manual").expect("write manual");

        let index = ReceiptIndex::scan(dir.path()).expect("scan");
        let matcher = SubmissionMatcher::new(dir.path(), &index, &FailingParser);

        match matcher.resolve(&student("S1234567")) {
            Resolution::Fallback(artifact) => {
                assert_eq!(artifact.provenance, Provenance::ManualFallback);
                assert!(artifact.submitted_at.is_none());
            }
            other => panic!("expected fallback resolution, got {other:?}"),
        }
    }

    #[test]
    fn unmatched_carries_receipt_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_receipt(dir.path(), "Exam_s1234567_attempt_2020-04-22-15-59-00.txt", "stored.pdf");

        let index = ReceiptIndex::scan(dir.path()).expect("scan");
        let matcher = SubmissionMatcher::new(dir.path(), &index, &FailingParser);

        match matcher.resolve(&student("S1234567")) {
            Resolution::Unmatched { detail: Some(detail) } => {
                assert!(detail.contains("receipt unreadable"))
            }
            other => panic!("expected unmatched with detail, got {other:?}"),
        }

        match matcher.resolve(&student("S7654321")) {
            Resolution::Unmatched { detail: None } => {}
            other => panic!("expected plain unmatched, got {other:?}"),
        }
    }

    #[test]
    fn receipt_pointing_outside_learn_folder_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let learn = dir.path().join("learn");
        fs::create_dir(&learn).expect("learn dir");
        fs::write(dir.path().join("outside.pdf"), "%PDF-private").expect("write outside");
        write_receipt(&learn, "Exam_s1234567_attempt_2020-04-22-15-59-00.txt", "../outside.pdf");
        let absolute = dir.path().join("outside.pdf");
        write_receipt_for(
            &learn,
            "Exam_s7654321_attempt_2020-04-22-15-59-00.txt",
            "s7654321",
            &absolute.display().to_string(),
        );

        let index = ReceiptIndex::scan(&learn).expect("scan");
        let parser = LearnReceiptParser;
        let matcher = SubmissionMatcher::new(&learn, &index, &parser);

        match matcher.resolve(&student("S1234567")) {
            Resolution::Rejected {
                artifact,
                reason: QuarantineReason::UnsafeFilename(name),
            } => {
                assert_eq!(name, "../outside.pdf");
                assert!(artifact.source.starts_with(&learn));
            }
            other => panic!("expected unsafe filename rejection, got {other:?}"),
        }
        match matcher.resolve(&student("S7654321")) {
            Resolution::Rejected {
                reason: QuarantineReason::UnsafeFilename(name),
                ..
            } => assert_eq!(name, absolute.display().to_string()),
            other => panic!("expected unsafe filename rejection, got {other:?}"),
        }
    }

    #[test]
    fn receipt_for_another_student_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_receipt_for(
            dir.path(),
            "Exam_s1234567_attempt_2020-04-22-15-59-00.txt",
            "s7654321",
            "stored.pdf",
        );

        let index = ReceiptIndex::scan(dir.path()).expect("scan");
        let parser = LearnReceiptParser;
        let matcher = SubmissionMatcher::new(dir.path(), &index, &parser);

        match matcher.resolve(&student("S1234567")) {
            Resolution::Rejected {
                reason: QuarantineReason::IdentifierMismatch { expected, found },
                ..
            } => {
                assert_eq!(expected, "S1234567");
                assert_eq!(found, "S7654321");
            }
            other => panic!("expected identifier mismatch, got {other:?}"),
        }
    }
}
