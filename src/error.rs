//! Domain errors raised while ingesting uploaded assessment files.
//!
//! File-level failures are [`IngestError`]; they are reported per file and never
//! abort the rest of a batch. Row-level problems are not errors: they are
//! [`RowSkipReason`] values recorded through the event sink.

use thiserror::Error;

use crate::encoding::TextEncoding;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("file {file_name} could not be decoded with any of: {tried}")]
    Decode { file_name: String, tried: String },

    #[error("file {file_name} has no column header line")]
    MissingHeader { file_name: String },

    #[error("file {file_name} is not valid delimited text: {reason}")]
    Table { file_name: String, reason: String },

    #[error("processing file {file_name} failed and was rolled back: {message}")]
    Transaction { file_name: String, message: String },
}

impl IngestError {
    pub fn decode(file_name: &str, tried: &[TextEncoding]) -> Self {
        let tried = tried
            .iter()
            .map(|encoding| encoding.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self::Decode {
            file_name: file_name.to_string(),
            tried,
        }
    }

    /// Wraps any failure raised inside a file's transaction.
    pub fn transaction(file_name: &str, err: &anyhow::Error) -> Self {
        Self::Transaction {
            file_name: file_name.to_string(),
            message: format!("{err:#}"),
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            Self::Decode { file_name, .. }
            | Self::MissingHeader { file_name }
            | Self::Table { file_name, .. }
            | Self::Transaction { file_name, .. } => file_name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode",
            Self::MissingHeader { .. } | Self::Table { .. } | Self::Transaction { .. } => {
                "transaction"
            }
        }
    }
}

/// Why a single parsed row was left out of the store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowSkipReason {
    #[error("crew group, name and work certificate are all empty")]
    EmptyIdentity,

    #[error("work certificate {value:?} is not a number of at least five digits")]
    InvalidWorkCertificate { value: String },

    #[error("record date {value:?} is not a YYYYMMDD date")]
    MalformedRecordDate { value: String },
}

impl RowSkipReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyIdentity => "empty_identity",
            Self::InvalidWorkCertificate { .. } => "invalid_work_certificate",
            Self::MalformedRecordDate { .. } => "malformed_record_date",
        }
    }
}
