use chrono::NaiveDateTime;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Format of the course deadline, e.g. `2020-04-22-16-00`.
pub const DEADLINE_FORMAT: &str = "%Y-%m-%d-%H-%M";

/// Top-level configuration for an ingest run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub course: String,
    pub paths: IngestPaths,
    pub deadline: NaiveDateTime,
    pub telemetry: TelemetryConfig,
}

impl IngestConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let course = env::var("INGEST_COURSE").unwrap_or_else(|_| "MATH00000".to_string());
        let classlist = env::var("INGEST_CLASSLIST")
            .unwrap_or_else(|_| "MATH00000_enrolment.csv".to_string());
        let learn_dir = env::var("INGEST_LEARN_DIR").unwrap_or_else(|_| "learn_dir".to_string());
        let output_dir =
            env::var("INGEST_OUTPUT_DIR").unwrap_or_else(|_| "output_dir".to_string());
        let deadline = parse_deadline(
            &env::var("INGEST_DEADLINE").unwrap_or_else(|_| "2020-04-22-16-00".to_string()),
        )?;
        let log_level = env::var("INGEST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            course,
            paths: IngestPaths {
                classlist: classlist.into(),
                learn_dir: learn_dir.into(),
                output_dir: output_dir.into(),
            },
            deadline,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Filesystem locations consumed and produced by a run.
#[derive(Debug, Clone)]
pub struct IngestPaths {
    pub classlist: PathBuf,
    pub learn_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

pub fn parse_deadline(raw: &str) -> Result<NaiveDateTime, ConfigError> {
    NaiveDateTime::parse_from_str(raw.trim(), DEADLINE_FORMAT).map_err(|source| {
        ConfigError::InvalidDeadline {
            value: raw.to_string(),
            source,
        }
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidDeadline {
        value: String,
        source: chrono::ParseError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidDeadline { value, .. } => write!(
                f,
                "deadline '{}' must be formatted as YYYY-MM-DD-HH-MM",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidDeadline { source, .. } => Some(source),
        }
    }
}
