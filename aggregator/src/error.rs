//! Error types for ingestion
//!
//! `IngestError` aborts a run before any output is produced. `SkipReason`
//! describes a single dropped record; those are counted, never propagated.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal ingestion failure
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed export at byte {position}: {message}")]
    Malformed { position: usize, message: String },

    #[error("read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a single record was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingType,
    MissingStartDate,
    MissingValue,
    MissingEndDate,
    InvalidTimestamp,
    InvalidValue,
    MalformedAttribute,
    DurationOutOfRange,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingType => "missing type",
            Self::MissingStartDate => "missing start date",
            Self::MissingValue => "missing value",
            Self::MissingEndDate => "missing end date",
            Self::InvalidTimestamp => "invalid timestamp",
            Self::InvalidValue => "invalid value",
            Self::MalformedAttribute => "malformed attribute",
            Self::DurationOutOfRange => "duration out of range",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
