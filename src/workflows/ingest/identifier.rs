use regex::Regex;
use std::path::{Component, Path};
use std::sync::OnceLock;

static LEARN_IDENTIFIER: OnceLock<Regex> = OnceLock::new();
static IDENTIFIER_SHAPE: OnceLock<Regex> = OnceLock::new();

fn learn_identifier() -> &'static Regex {
    LEARN_IDENTIFIER.get_or_init(|| {
        Regex::new(r"(?i)_(s[0-9]{7})_attempt_").expect("identifier pattern is valid")
    })
}

/// Pulls the student identifier out of a Learn export filename such as
/// `Exam_s1234567_attempt_2020-04-22-15-59-00.txt`, upper-cased.
pub fn extract_identifier(filename: &str) -> Option<String> {
    learn_identifier()
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .map(|found| found.as_str().to_ascii_uppercase())
}

/// True for a bare identifier such as `s1234567`: one letter, seven digits.
pub fn looks_like_identifier(value: &str) -> bool {
    IDENTIFIER_SHAPE
        .get_or_init(|| Regex::new(r"^[A-Za-z][0-9]{7}$").expect("identifier shape is valid"))
        .is_match(value.trim())
}

/// Name of a manually placed substitute submission for `identifier`.
pub fn fallback_filename(identifier: &str) -> String {
    format!("{}.pdf", identifier.to_ascii_lowercase())
}

/// True when `name` is a single normal path component, so joining it onto a
/// folder cannot leave that folder.
pub fn is_plain_filename(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
