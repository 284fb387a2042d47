use anyhow::Result;
use tracing::{debug, error, info};

use super::admission::RowAdmission;
use super::dedup::keep_last_per_key;
use super::dispatch::{build_detail, locate_step_columns, step_values_by_header};
use super::events::{IngestEvent, IngestSink, PendingEvents};
use super::table::{AssessmentTable, parse_table};
use crate::duration;
use crate::encoding::{self, DEFAULT_CANDIDATES, TextEncoding};
use crate::error::IngestError;
use crate::model::{
    BaseRecord, BatchOutcome, FileOutcome, FileStatus, FileSummary, SkippedRow, UploadedFile,
};
use crate::schema::DetailVariant;
use crate::store::{AtomicScope, RecordStore};
use crate::util::sha256_hex;

pub(crate) const DEFAULT_FALLBACK_STEP_OFFSET: usize = 7;

#[derive(Debug, Clone)]
pub(crate) struct IngestConfig {
    pub encodings: Vec<TextEncoding>,
    pub delimiter: u8,
    pub fallback_step_offset: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            encodings: DEFAULT_CANDIDATES.to_vec(),
            delimiter: b',',
            fallback_step_offset: DEFAULT_FALLBACK_STEP_OFFSET,
        }
    }
}

enum FileAttempt {
    Loaded(FileSummary),
    // The purge of earlier rows still commits.
    Undecodable {
        summary: FileSummary,
        error: IngestError,
    },
}

/// Ingests every file independently, one transaction per file, in input order.
pub(crate) fn ingest_batch<S: AtomicScope>(
    store: &mut S,
    files: &[UploadedFile],
    config: &IngestConfig,
    sink: &mut dyn IngestSink,
) -> Result<BatchOutcome> {
    let admission = RowAdmission::new()?;
    let mut batch = BatchOutcome::default();

    for file in files {
        let outcome = ingest_file(store, file, config, &admission, sink);
        batch.files.push(outcome);
    }

    Ok(batch)
}

fn ingest_file<S: AtomicScope>(
    store: &mut S,
    file: &UploadedFile,
    config: &IngestConfig,
    admission: &RowAdmission,
    sink: &mut dyn IngestSink,
) -> FileOutcome {
    let sha256 = sha256_hex(&file.bytes);
    info!(file = %file.file_name, bytes = file.bytes.len(), "ingesting file");

    // Events reach `sink` only for work that was not rolled back.
    let mut pending = PendingEvents::default();
    let attempt = store.atomic(|records| {
        let mut summary = FileSummary {
            base_records_deleted: records.delete_base_records_by_file_name(&file.file_name)?,
            ..FileSummary::default()
        };

        let decoded = match encoding::resolve(&file.file_name, &file.bytes, &config.encodings) {
            Ok(decoded) => decoded,
            Err(error) => return Ok(FileAttempt::Undecodable { summary, error }),
        };
        summary.encoding = decoded.encoding.as_str().to_string();

        let table = parse_table(&file.file_name, &decoded.text, config.delimiter)?;
        load_table(
            records,
            file,
            table,
            config,
            admission,
            &mut pending,
            &mut summary,
        )?;

        Ok(FileAttempt::Loaded(summary))
    });

    match attempt {
        Ok(FileAttempt::Loaded(summary)) => {
            pending.flush_into(sink);
            info!(
                file = %file.file_name,
                encoding = %summary.encoding,
                rows = summary.rows_read,
                admitted = summary.rows_admitted,
                skipped = summary.rows_skipped,
                duplicates = summary.duplicates_removed,
                replaced = summary.base_records_deleted,
                inserted = summary.base_records_inserted,
                details = summary.detail_records_inserted,
                needs_review = summary.needs_review,
                "file ingested"
            );
            FileOutcome {
                file_name: file.file_name.clone(),
                sha256,
                status: FileStatus::Succeeded,
                error_kind: None,
                message: None,
                summary: Some(summary),
            }
        }
        Ok(FileAttempt::Undecodable { summary, error }) => {
            pending.flush_into(sink);
            failed_outcome(file, sha256, &error, Some(summary))
        }
        Err(err) => {
            let discarded = pending.discard();
            if discarded > 0 {
                debug!(file = %file.file_name, discarded, "dropped events of rolled-back file");
            }
            let error = IngestError::transaction(&file.file_name, &err);
            failed_outcome(file, sha256, &error, None)
        }
    }
}

fn failed_outcome(
    file: &UploadedFile,
    sha256: String,
    error: &IngestError,
    summary: Option<FileSummary>,
) -> FileOutcome {
    error!(file = %error.file_name(), kind = error.kind(), error = %error, "file failed");
    FileOutcome {
        file_name: file.file_name.clone(),
        sha256,
        status: FileStatus::Failed,
        error_kind: Some(error.kind().to_string()),
        message: Some(error.to_string()),
        summary,
    }
}

fn load_table(
    records: &mut dyn RecordStore,
    file: &UploadedFile,
    table: AssessmentTable,
    config: &IngestConfig,
    admission: &RowAdmission,
    sink: &mut dyn IngestSink,
    summary: &mut FileSummary,
) -> Result<()> {
    let columns = table.column_index();
    let AssessmentTable { headers, rows } = table;
    summary.rows_read = rows.len();

    let step_columns = locate_step_columns(&headers, config.fallback_step_offset);
    if step_columns.used_fallback() {
        summary.needs_review = true;
        summary.review_reason = Some(format!(
            "no 整体耗时/整体用时 column; step columns read from offset {}",
            step_columns.start
        ));
        sink.record(IngestEvent::StepOffsetFallback {
            file_name: file.file_name.clone(),
            offset: step_columns.start,
        });
    }

    let mut admitted = Vec::with_capacity(rows.len());
    for row in rows {
        let row_index = row.index;
        match admission.admit(&columns, row) {
            Ok(row) => admitted.push(row),
            Err(reason) => {
                summary.rows_skipped += 1;
                summary.skipped_rows.push(SkippedRow {
                    row_index,
                    reason: reason.code().to_string(),
                    message: reason.to_string(),
                });
                sink.record(IngestEvent::RowSkipped {
                    file_name: file.file_name.clone(),
                    row_index,
                    reason,
                });
            }
        }
    }
    summary.rows_admitted = admitted.len();

    let deduplicated = keep_last_per_key(admitted);
    summary.duplicates_removed = deduplicated.duplicates_removed;

    for row in deduplicated.rows {
        let variant = row
            .vehicle_model
            .as_deref()
            .and_then(DetailVariant::for_vehicle_model);

        let base = BaseRecord {
            file_name: file.file_name.clone(),
            record_date: row.record_date,
            crew_group: row.crew_group,
            name: row.name,
            work_certificate_number: row.work_certificate_number,
            vehicle_model: row.vehicle_model,
            assessment_item: row.assessment_item,
            outcome: row.outcome,
            additional_data: step_values_by_header(&headers, &row.cells, step_columns),
        };
        let base_id = records.create_base_record(&base)?;
        summary.base_records_inserted += 1;

        let Some(variant) = variant else {
            continue;
        };

        let detail = build_detail(variant, &row.cells, step_columns);
        for failure in detail.failures {
            summary.duration_parse_failures += 1;
            sink.record(IngestEvent::DurationParseFailure {
                file_name: file.file_name.clone(),
                row_index: row.index,
                field: failure.field.column,
                error: failure.error,
            });
        }
        let total = duration::format(detail.record.duration("total_duration"));
        debug!(
            file = %file.file_name,
            row = row.index,
            schema = variant.as_str(),
            total = %total.as_deref().unwrap_or("-"),
            "dispatched detail record"
        );
        records.create_detail_record(base_id, &detail.record)?;
        summary.detail_records_inserted += 1;
    }

    Ok(())
}
