use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::duration::TimeSpan;
use crate::schema::DetailVariant;

/// One raw upload: the client-side file name and its undecoded bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentOutcome {
    Excellent,
    Qualified,
    NotQualified,
    #[default]
    Other,
}

impl AssessmentOutcome {
    /// Exact match on the three labels used by the drill sheets.
    pub fn from_label(label: Option<&str>) -> Self {
        match label {
            Some("优秀") => Self::Excellent,
            Some("合格") => Self::Qualified,
            Some("不合格") => Self::NotQualified,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Excellent => "优秀",
            Self::Qualified => "合格",
            Self::NotQualified => "不合格",
            Self::Other => "其他",
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Excellent => 3,
            Self::Qualified => 2,
            Self::NotQualified => 1,
            Self::Other => 0,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            3 => Self::Excellent,
            2 => Self::Qualified,
            1 => Self::NotQualified,
            _ => Self::Other,
        }
    }
}

/// Identity and outcome of one evaluation event.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseRecord {
    pub file_name: String,
    pub record_date: Option<NaiveDate>,
    pub crew_group: Option<String>,
    pub name: Option<String>,
    pub work_certificate_number: String,
    pub vehicle_model: Option<String>,
    pub assessment_item: Option<String>,
    pub outcome: AssessmentOutcome,
    /// Trailing step columns keyed by header, as uploaded.
    pub additional_data: Map<String, Value>,
}

/// Step timings of one evaluation, positionally aligned with `variant.fields()`.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRecord {
    pub variant: DetailVariant,
    pub durations: Vec<Option<TimeSpan>>,
}

impl DetailRecord {
    pub fn duration(&self, column: &str) -> Option<TimeSpan> {
        self.variant
            .fields()
            .iter()
            .position(|field| field.column == column)
            .and_then(|index| self.durations.get(index).copied().flatten())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRow {
    pub row_index: usize,
    pub reason: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FileSummary {
    pub encoding: String,
    pub rows_read: usize,
    pub rows_admitted: usize,
    pub rows_skipped: usize,
    pub duplicates_removed: usize,
    pub base_records_deleted: usize,
    pub base_records_inserted: usize,
    pub detail_records_inserted: usize,
    pub duration_parse_failures: usize,
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub skipped_rows: Vec<SkippedRow>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file_name: String,
    pub sha256: String,
    pub status: FileStatus,
    pub error_kind: Option<String>,
    pub message: Option<String>,
    /// Present on success, and for undecodable files whose purge was committed.
    pub summary: Option<FileSummary>,
}

impl FileOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == FileStatus::Succeeded
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchOutcome {
    pub files: Vec<FileOutcome>,
}

impl BatchOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.files.iter().all(FileOutcome::succeeded)
    }

    pub fn first_failure(&self) -> Option<&FileOutcome> {
        self.files.iter().find(|outcome| !outcome.succeeded())
    }

    /// The single message shown to the uploader for the whole batch.
    pub fn detail_message(&self) -> String {
        match self.first_failure() {
            Some(failed) => failed
                .message
                .clone()
                .unwrap_or_else(|| format!("file {} failed", failed.file_name)),
            None => format!("all {} files uploaded", self.files.len()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub db_path: String,
    pub dry_run: bool,
    pub encoding_candidates: Vec<String>,
    pub delimiter: String,
    pub fallback_step_offset: usize,
    pub files: Vec<FileOutcome>,
    pub notes: Vec<String>,
}
