use chrono::{NaiveDate, TimeDelta};
use encoding_rs::GBK;
use rusqlite::OptionalExtension;

use super::admission::{AdmittedRow, RowAdmission};
use super::dedup::keep_last_per_key;
use super::dispatch::{StepColumns, build_detail, locate_step_columns};
use super::events::{EventLog, IngestEvent};
use super::pipeline::{IngestConfig, ingest_batch};
use super::table::{SourceRow, parse_table};
use crate::encoding::TextEncoding;
use crate::error::RowSkipReason;
use crate::model::{AssessmentOutcome, BatchOutcome, FileStatus, UploadedFile};
use crate::schema::DetailVariant;
use crate::store::SqliteStore;

const TITLE: &str = "逃生门释放和收回考核记录表";
const HEADER: &str = "乘务班组,姓名,工作证编号,车型,考核项目,考核结果,记录日期,整体耗时,逃生门释放耗时,解锁逃生门红色手柄耗时,向外推逃生门以完全释放耗时,备注";

fn sheet(rows: &[&str]) -> Vec<u8> {
    sheet_with_header(HEADER, rows)
}

fn sheet_with_header(header: &str, rows: &[&str]) -> Vec<u8> {
    format!("{TITLE}\n{header}\n{}\n", rows.join("\n")).into_bytes()
}

fn upload(store: &mut SqliteStore, files: Vec<UploadedFile>) -> (BatchOutcome, EventLog) {
    upload_with(store, files, &IngestConfig::default())
}

fn upload_with(
    store: &mut SqliteStore,
    files: Vec<UploadedFile>,
    config: &IngestConfig,
) -> (BatchOutcome, EventLog) {
    let mut events = EventLog::default();
    let batch = ingest_batch(store, &files, config, &mut events).unwrap();
    (batch, events)
}

fn base_count(store: &SqliteStore, file_name: &str) -> i64 {
    store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM assessment_base WHERE file_name = ?1",
            [file_name],
            |row| row.get(0),
        )
        .unwrap()
}

fn table_count(store: &SqliteStore, table: &str) -> i64 {
    store
        .connection()
        .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
}

fn micros(store: &SqliteStore, table: &str, column: &str) -> Option<i64> {
    store
        .connection()
        .query_row(&format!("SELECT {column} FROM {table}"), [], |row| {
            row.get(0)
        })
        .unwrap()
}

fn admitted(name: &str, certificate: &str, model: &str, item: &str, index: usize) -> AdmittedRow {
    AdmittedRow {
        index,
        crew_group: Some("一班".to_string()),
        name: Some(name.to_string()),
        work_certificate_number: certificate.to_string(),
        vehicle_model: Some(model.to_string()),
        assessment_item: Some(item.to_string()),
        outcome: AssessmentOutcome::Other,
        record_date: None,
        cells: Vec::new(),
    }
}

#[test]
fn parse_table_skips_title_and_drops_remarks() {
    let text = String::from_utf8(sheet(&[
        "一班,张三,12345,09A02,逃生门,合格,20231110,1:38.5,0:45.0,0:03.4,,迟到",
        "二班,李四,23456,09A02,逃生门,优秀,20231111,1:20.0",
    ]))
    .unwrap();

    let table = parse_table("a.csv", &text, b',').unwrap();

    assert_eq!(table.headers.len(), 11);
    assert!(!table.headers.iter().any(|header| header == "备注"));
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0].index, 0);
    assert_eq!(table.rows[0].cells.len(), 11);
    assert_eq!(table.rows[0].cells[10], None);
    assert_eq!(table.rows[1].cells[7].as_deref(), Some("1:20.0"));
    assert_eq!(table.rows[1].cells[8], None);
}

#[test]
fn parse_table_without_header_line_fails() {
    let err = parse_table("title-only.csv", TITLE, b',').unwrap_err();
    assert_eq!(err.file_name(), "title-only.csv");
    assert!(err.to_string().contains("no column header"));
}

#[test]
fn parse_table_treats_spreadsheet_missing_tokens_as_empty() {
    let text = format!("{TITLE}\n姓名,工作证编号\nNaN,#N/A\n");
    let table = parse_table("a.csv", &text, b',').unwrap();
    assert_eq!(table.rows[0].cells, vec![None, None]);
}

#[test]
fn admission_normalizes_certificates_and_dates() {
    let text = String::from_utf8(sheet(&[
        "一班,张三,12345.0,09A02,逃生门,优秀,20231110.0,,,,,",
        "一班,李四,123,09A02,逃生门,合格,20231110,,,,,",
        ",,,,,,,,,,,",
        "一班,王五,23456,09A02,逃生门,合格,2023-11-10,,,,,",
        "一班,赵六,34567,09A02,逃生门,良好,,,,,,",
        "一班,钱七,A4567,09A02,逃生门,合格,20231310,,,,,",
    ]))
    .unwrap();
    let table = parse_table("a.csv", &text, b',').unwrap();
    let columns = table.column_index();
    let admission = RowAdmission::new().unwrap();

    let results: Vec<_> = table
        .rows
        .iter()
        .cloned()
        .map(|row| admission.admit(&columns, row))
        .collect();

    let first = results[0].as_ref().unwrap();
    assert_eq!(first.work_certificate_number, "12345");
    assert_eq!(first.record_date, NaiveDate::from_ymd_opt(2023, 11, 10));
    assert_eq!(first.outcome, AssessmentOutcome::Excellent);

    assert_eq!(
        results[1].as_ref().unwrap_err(),
        &RowSkipReason::InvalidWorkCertificate {
            value: "123".to_string()
        }
    );
    assert_eq!(results[2].as_ref().unwrap_err(), &RowSkipReason::EmptyIdentity);
    assert_eq!(
        results[3].as_ref().unwrap_err(),
        &RowSkipReason::MalformedRecordDate {
            value: "2023-11-10".to_string()
        }
    );

    let missing_date = results[4].as_ref().unwrap();
    assert_eq!(missing_date.record_date, None);
    assert_eq!(missing_date.outcome, AssessmentOutcome::Other);

    assert_eq!(
        results[5].as_ref().unwrap_err(),
        &RowSkipReason::InvalidWorkCertificate {
            value: "A4567".to_string()
        }
    );
}

#[test]
fn admission_rejects_impossible_calendar_dates() {
    let admission = RowAdmission::new().unwrap();
    let text = format!("{TITLE}\n姓名,工作证编号,记录日期\n张三,12345,20231310\n");
    let table = parse_table("a.csv", &text, b',').unwrap();
    let columns = table.column_index();
    let row: SourceRow = table.rows[0].clone();

    assert_eq!(
        admission.admit(&columns, row).unwrap_err(),
        RowSkipReason::MalformedRecordDate {
            value: "20231310".to_string()
        }
    );
}

#[test]
fn admission_falls_back_to_short_date_header() {
    let admission = RowAdmission::new().unwrap();
    let text = format!("{TITLE}\n姓名,工作证编号,日期\n张三,12345,20240102\n");
    let table = parse_table("a.csv", &text, b',').unwrap();
    let columns = table.column_index();

    let row = admission.admit(&columns, table.rows[0].clone()).unwrap();
    assert_eq!(row.record_date, NaiveDate::from_ymd_opt(2024, 1, 2));
}

#[test]
fn dedup_keeps_last_row_in_file_order() {
    let rows = vec![
        admitted("张三", "12345", "09A02", "逃生门", 0),
        admitted("李四", "23456", "09A02", "逃生门", 1),
        admitted("张三", "12345", "09A02", "逃生门", 2),
        admitted("张三", "12345", "09A03", "逃生门", 3),
        admitted("张三", "12345", "09A02", "逃生门", 4),
    ];

    let result = keep_last_per_key(rows);

    assert_eq!(result.duplicates_removed, 2);
    let mut kept: Vec<usize> = result.rows.iter().map(|row| row.index).collect();
    kept.sort_unstable();
    assert_eq!(kept, vec![1, 3, 4]);
}

#[test]
fn locate_step_columns_prefers_total_duration_headers() {
    let headers: Vec<String> = ["姓名", "整体用时", "步骤"].iter().map(|h| h.to_string()).collect();
    assert_eq!(
        locate_step_columns(&headers, 7),
        StepColumns {
            start: 1,
            marker: Some("整体用时")
        }
    );

    let plain: Vec<String> = ["姓名", "步骤"].iter().map(|h| h.to_string()).collect();
    let fallback = locate_step_columns(&plain, 7);
    assert!(fallback.used_fallback());
    assert_eq!(fallback.start, 2);
}

#[test]
fn build_detail_fills_declared_order_and_nulls_short_rows() {
    let cells = vec![
        Some("张三".to_string()),
        Some("0:50.0".to_string()),
        Some("bad".to_string()),
        None,
        Some("0:02.5".to_string()),
    ];
    let step_columns = StepColumns {
        start: 1,
        marker: Some("整体耗时"),
    };

    let detail = build_detail(DetailVariant::Model10A01, &cells, step_columns);

    assert_eq!(detail.record.durations.len(), 15);
    assert_eq!(
        detail.record.duration("total_duration"),
        Some(TimeDelta::seconds(50))
    );
    assert_eq!(detail.record.duration("emergency_door_release_duration"), None);
    assert_eq!(detail.record.duration("unlock_escape_door_box"), None);
    assert_eq!(
        detail.record.duration("remove_escape_door_box_cover"),
        Some(TimeDelta::milliseconds(2_500))
    );
    assert_eq!(detail.record.duration("confirm_ddu_escape_door_display"), None);
    assert_eq!(detail.failures.len(), 1);
    assert_eq!(
        detail.failures[0].field.column,
        "emergency_door_release_duration"
    );
}

#[test]
fn short_certificate_is_skipped_and_five_digits_admitted() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&[
        "一班,张三,123,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,李四,12345,09A02,逃生门,合格,20231110,1:00.0,,,,",
    ]);

    let (batch, events) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert_eq!(base_count(&store, "a.csv"), 1);
    assert_eq!(
        events.skipped(),
        vec![(
            0,
            RowSkipReason::InvalidWorkCertificate {
                value: "123".to_string()
            }
        )]
    );

    let summary = batch.files[0].summary.as_ref().unwrap();
    assert_eq!(summary.rows_read, 2);
    assert_eq!(summary.rows_skipped, 1);
    assert_eq!(summary.skipped_rows[0].reason, "invalid_work_certificate");
}

#[test]
fn long_certificates_are_stored_digit_for_digit() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&[
        "一班,张三,12345678901234567890,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,李四,12345678901234567.0,09A02,逃生门,合格,20231110,1:00.0,,,,",
    ]);

    let (batch, events) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert!(events.skipped().is_empty());
    let mut statement = store
        .connection()
        .prepare("SELECT work_certificate_number FROM assessment_base ORDER BY work_certificate_number")
        .unwrap();
    let stored: Vec<String> = statement
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(stored, vec!["12345678901234567", "12345678901234567890"]);
}

#[test]
fn padded_cells_are_trimmed_before_admission() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&["一班 , 张三 , 12345 ,09A02, 逃生门 , 合格 ,20231110, 1:00.0 ,,,,"]);

    let (batch, _) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    let (name, certificate, result): (String, String, i64) = store
        .connection()
        .query_row(
            "SELECT name, work_certificate_number, assessment_result FROM assessment_base",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(name, "张三");
    assert_eq!(certificate, "12345");
    assert_eq!(AssessmentOutcome::from_code(result), AssessmentOutcome::Qualified);
    assert_eq!(
        micros(&store, "assessment_09a02", "total_duration"),
        Some(60_000_000)
    );
}

#[test]
fn later_duplicate_row_wins() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&[
        "一班,张三,12345,09A02,逃生门,不合格,20231110,2:00.0,,,,",
        "一班,张三,12345,09A02,逃生门,优秀,20231112,1:30.0,,,,",
    ]);

    let (batch, _) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert_eq!(base_count(&store, "a.csv"), 1);
    let (result, date): (i64, String) = store
        .connection()
        .query_row(
            "SELECT assessment_result, record_date FROM assessment_base",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(AssessmentOutcome::from_code(result), AssessmentOutcome::Excellent);
    assert_eq!(date, "2023-11-12");
    assert_eq!(
        micros(&store, "assessment_09a02", "total_duration"),
        Some(90_000_000)
    );
    assert_eq!(batch.files[0].summary.as_ref().unwrap().duplicates_removed, 1);
}

#[test]
fn reupload_replaces_previous_rows_for_same_file_name() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let first = sheet(&[
        "一班,张三,10001,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,李四,10002,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,王五,10003,09A02,逃生门,合格,20231110,1:00.0,,,,",
    ]);
    let second = sheet(&[
        "一班,张三,10001,09A02,逃生门,优秀,20231111,0:58.0,,,,",
        "一班,李四,10002,09A02,逃生门,优秀,20231111,0:59.0,,,,",
    ]);
    let other = sheet(&["二班,赵六,20001,10A01,逃生门,合格,20231110,1:10.0,,,,"]);

    upload(
        &mut store,
        vec![
            UploadedFile::new("a.csv", first),
            UploadedFile::new("b.csv", other),
        ],
    );
    let (batch, _) = upload(&mut store, vec![UploadedFile::new("a.csv", second)]);

    assert!(batch.all_succeeded());
    assert_eq!(base_count(&store, "a.csv"), 2);
    assert_eq!(base_count(&store, "b.csv"), 1);
    assert_eq!(table_count(&store, "assessment_09a02"), 2);
    assert_eq!(table_count(&store, "assessment_10a01"), 1);
    assert_eq!(
        batch.files[0].summary.as_ref().unwrap().base_records_deleted,
        3
    );
}

#[test]
fn known_model_row_gets_detail_from_marker_columns() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&["一班,张三,12345,09A02,逃生门,合格,20231110,1:38.5,0:45.0,0:03.4,,按时"]);

    let (batch, _) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert_eq!(table_count(&store, "assessment_09a02"), 1);
    assert_eq!(
        micros(&store, "assessment_09a02", "total_duration"),
        Some(98_500_000)
    );
    assert_eq!(
        micros(&store, "assessment_09a02", "emergency_door_release_duration"),
        Some(45_000_000)
    );
    assert_eq!(
        micros(&store, "assessment_09a02", "unlock_handle_duration"),
        Some(3_400_000)
    );
    assert_eq!(micros(&store, "assessment_09a02", "push_door_duration"), None);
    assert_eq!(
        micros(&store, "assessment_09a02", "confirm_hmi_display_duration"),
        None
    );

    let linked: i64 = store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM assessment_09a02 d
             JOIN assessment_base b ON b.id = d.assessment_base_id
             WHERE b.work_certificate_number = '12345'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(linked, 1);
}

#[test]
fn shared_schema_models_land_in_one_table() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&[
        "一班,张三,12345,09A03,逃生门,合格,20231110,1:00.0,,,,",
        "一班,李四,23456,09A04,逃生门,合格,20231110,1:05.0,,,,",
    ]);

    upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert_eq!(table_count(&store, "assessment_09a0304"), 2);
    assert_eq!(table_count(&store, "assessment_09a02"), 0);
}

#[test]
fn unknown_model_row_has_no_detail_but_keeps_raw_steps() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&["一班,张三,12345,11A01,逃生门,合格,20231110,1:38.5,0:45.0,,,"]);

    let (batch, _) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert_eq!(base_count(&store, "a.csv"), 1);
    for variant in crate::schema::ALL_VARIANTS {
        assert_eq!(table_count(&store, variant.table_name()), 0);
    }

    let raw: String = store
        .connection()
        .query_row("SELECT additional_data FROM assessment_base", [], |row| {
            row.get(0)
        })
        .unwrap();
    let data: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(data["整体耗时"], "1:38.5");
    assert_eq!(data["逃生门释放耗时"], "0:45.0");
    assert!(data["解锁逃生门红色手柄耗时"].is_null());
    assert!(data.get("备注").is_none());
    assert!(data.get("姓名").is_none());
}

#[test]
fn undecodable_file_fails_alone_and_valid_file_still_succeeds() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let config = IngestConfig {
        encodings: vec![TextEncoding::Utf8, TextEncoding::Ascii],
        ..IngestConfig::default()
    };
    let valid = sheet(&["一班,张三,12345,09A02,逃生门,合格,20231110,1:00.0,,,,"]);

    let (batch, _) = upload_with(
        &mut store,
        vec![
            UploadedFile::new("broken.csv", vec![0xFF, 0xFE, 0xFD, 0x80]),
            UploadedFile::new("good.csv", valid),
        ],
        &config,
    );

    assert!(!batch.all_succeeded());
    assert_eq!(batch.files[0].status, FileStatus::Failed);
    assert_eq!(batch.files[0].error_kind.as_deref(), Some("decode"));
    assert!(batch.detail_message().contains("broken.csv"));
    assert_eq!(batch.files[1].status, FileStatus::Succeeded);
    assert_eq!(base_count(&store, "broken.csv"), 0);
    assert_eq!(base_count(&store, "good.csv"), 1);
}

#[test]
fn undecodable_reupload_still_purges_previous_rows() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let valid = sheet(&["一班,张三,12345,09A02,逃生门,合格,20231110,1:00.0,,,,"]);
    upload(&mut store, vec![UploadedFile::new("a.csv", valid)]);
    assert_eq!(base_count(&store, "a.csv"), 1);

    let config = IngestConfig {
        encodings: vec![TextEncoding::Utf8],
        ..IngestConfig::default()
    };
    let (batch, _) = upload_with(
        &mut store,
        vec![UploadedFile::new("a.csv", vec![0xC3, 0x28])],
        &config,
    );

    assert!(!batch.all_succeeded());
    assert_eq!(base_count(&store, "a.csv"), 0);
    assert_eq!(table_count(&store, "assessment_09a02"), 0);
}

#[test]
fn failure_mid_file_rolls_back_that_file_only() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let good = sheet(&[
        "一班,张三,10001,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,李四,10002,09A02,逃生门,合格,20231110,1:00.0,,,,",
    ]);
    let too_long = "长".repeat(101);
    let third = format!("一班,{too_long},10003,09A02,逃生门,合格,20231110,1:00.0,,,,");
    let bad = sheet(&[
        "一班,王五,20001,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,孙八,200,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,赵六,20002,09A02,逃生门,合格,20231110,一分钟,,,,",
        &third,
    ]);

    let (batch, events) = upload(
        &mut store,
        vec![
            UploadedFile::new("good.csv", good),
            UploadedFile::new("bad.csv", bad),
        ],
    );

    assert_eq!(batch.files[0].status, FileStatus::Succeeded);
    assert_eq!(batch.files[1].status, FileStatus::Failed);
    assert_eq!(batch.files[1].error_kind.as_deref(), Some("transaction"));
    assert!(
        batch.files[1]
            .message
            .as_deref()
            .unwrap()
            .contains("bad.csv")
    );
    assert_eq!(base_count(&store, "good.csv"), 2);
    assert_eq!(base_count(&store, "bad.csv"), 0);
    assert_eq!(table_count(&store, "assessment_09a02"), 2);

    // Skips and parse failures of the rolled-back file are not reported.
    assert!(events.is_empty());
}

#[test]
fn committed_files_keep_their_events_when_a_later_file_rolls_back() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let good = sheet(&[
        "一班,张三,10001,09A02,逃生门,合格,20231110,1:00.0,,,,",
        "一班,李四,100,09A02,逃生门,合格,20231110,1:00.0,,,,",
    ]);
    let too_long = "长".repeat(101);
    let bad = sheet(&[
        "一班,王五,200,09A02,逃生门,合格,20231110,1:00.0,,,,",
        &format!("一班,{too_long},20003,09A02,逃生门,合格,20231110,1:00.0,,,,"),
    ]);

    let (batch, events) = upload(
        &mut store,
        vec![
            UploadedFile::new("good.csv", good),
            UploadedFile::new("bad.csv", bad),
        ],
    );

    assert_eq!(batch.files[1].status, FileStatus::Failed);
    assert_eq!(events.len(), 1);
    assert!(events.events().iter().all(|event| matches!(
        event,
        IngestEvent::RowSkipped { file_name, row_index: 1, .. } if file_name == "good.csv"
    )));
}

#[test]
fn title_only_file_is_a_transaction_failure() {
    let mut store = SqliteStore::open_in_memory().unwrap();

    let (batch, _) = upload(
        &mut store,
        vec![UploadedFile::new("empty.csv", TITLE.as_bytes().to_vec())],
    );

    assert_eq!(batch.files[0].status, FileStatus::Failed);
    assert!(
        batch.files[0]
            .message
            .as_deref()
            .unwrap()
            .contains("no column header")
    );
}

#[test]
fn unparseable_duration_is_stored_as_null_and_reported() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let bytes = sheet(&["一班,张三,12345,09A02,逃生门,合格,20231110,1:38.5,四十五秒,0:03.4,,"]);

    let (batch, events) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert_eq!(
        micros(&store, "assessment_09a02", "emergency_door_release_duration"),
        None
    );
    assert_eq!(
        micros(&store, "assessment_09a02", "unlock_handle_duration"),
        Some(3_400_000)
    );
    assert_eq!(
        batch.files[0].summary.as_ref().unwrap().duration_parse_failures,
        1
    );
    assert!(events.events().iter().any(|event| matches!(
        event,
        IngestEvent::DurationParseFailure { field: "emergency_door_release_duration", row_index: 0, .. }
    )));
}

#[test]
fn missing_total_duration_header_uses_fallback_and_flags_review() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let header = "乘务班组,姓名,工作证编号,车型,考核项目,考核结果,记录日期,第一步,第二步";
    let bytes = sheet_with_header(header, &["一班,张三,12345,09A02,逃生门,合格,20231110,1:10.0,0:20.0"]);

    let (batch, events) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    let summary = batch.files[0].summary.as_ref().unwrap();
    assert!(batch.all_succeeded());
    assert!(summary.needs_review);
    assert!(events.events().iter().any(|event| matches!(
        event,
        IngestEvent::StepOffsetFallback { offset: 7, .. }
    )));
    assert_eq!(
        micros(&store, "assessment_09a02", "total_duration"),
        Some(70_000_000)
    );
    assert_eq!(
        micros(&store, "assessment_09a02", "emergency_door_release_duration"),
        Some(20_000_000)
    );
}

#[test]
fn gbk_encoded_upload_is_decoded() {
    let mut store = SqliteStore::open_in_memory().unwrap();
    let text = String::from_utf8(sheet(&["一班,张三,12345,10A02,逃生门,优秀,20231110,1:00.0,,,,"])).unwrap();
    let (bytes, _, had_errors) = GBK.encode(&text);
    assert!(!had_errors);

    let (batch, _) = upload(&mut store, vec![UploadedFile::new("gbk.csv", bytes.into_owned())]);

    assert!(batch.all_succeeded());
    assert_eq!(batch.files[0].summary.as_ref().unwrap().encoding, "gbk");
    let name: Option<String> = store
        .connection()
        .query_row(
            "SELECT name FROM assessment_base WHERE file_name = 'gbk.csv'",
            [],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
        .flatten();
    assert_eq!(name.as_deref(), Some("张三"));
    assert_eq!(table_count(&store, "assessment_10a02"), 1);
}

#[test]
fn dry_run_reports_counts_without_persisting() {
    let mut store = SqliteStore::open_in_memory().unwrap().rollback_only(true);
    let bytes = sheet(&["一班,张三,12345,09A02,逃生门,合格,20231110,1:00.0,,,,"]);

    let (batch, _) = upload(&mut store, vec![UploadedFile::new("a.csv", bytes)]);

    assert!(batch.all_succeeded());
    assert_eq!(
        batch.files[0].summary.as_ref().unwrap().base_records_inserted,
        1
    );
    assert_eq!(base_count(&store, "a.csv"), 0);
}
