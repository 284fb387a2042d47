use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cli::ShowArgs;
use crate::duration::{self, TimeSpan};
use crate::model::AssessmentOutcome;
use crate::schema::DetailVariant;

#[derive(Debug, Clone, Default)]
struct RecordFilter {
    file_name: Option<String>,
    vehicle_model: Option<String>,
    assessment_item: Option<String>,
    slower_than: Option<TimeSpan>,
    limit: usize,
}

#[derive(Debug, Clone, Serialize)]
struct ShownDuration {
    field: &'static str,
    label: &'static str,
    value: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ShownRecord {
    id: i64,
    file_name: String,
    record_date: Option<NaiveDate>,
    crew_group: Option<String>,
    name: Option<String>,
    work_certificate_number: String,
    vehicle_model: Option<String>,
    assessment_item: Option<String>,
    outcome: &'static str,
    detail_schema: Option<DetailVariant>,
    durations: Vec<ShownDuration>,
    additional_data: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct Combination {
    vehicle_model: Option<String>,
    assessment_item: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShowResponse {
    limit: usize,
    returned: usize,
    records: Vec<ShownRecord>,
}

pub fn run(args: ShowArgs) -> Result<()> {
    let db_path = args.resolved_db_path();
    if !db_path.exists() {
        bail!("database not found: {}", db_path.display());
    }

    let connection = Connection::open_with_flags(
        &db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open database read-only: {}", db_path.display()))?;

    if args.combinations {
        let combinations = load_combinations(&connection)?;
        info!(count = combinations.len(), "loaded model/item combinations");
        return if args.json {
            write_json(&combinations)
        } else {
            write_combinations_text(&combinations)
        };
    }

    let slower_than = match args.slower_than.as_deref() {
        Some(raw) => match duration::parse(Some(raw)) {
            Some(span) => Some(span),
            None => bail!("--slower-than expects a M:SS.f duration, got {raw:?}"),
        },
        None => None,
    };

    let filter = RecordFilter {
        file_name: args.file_name.clone(),
        vehicle_model: args.vehicle_model.clone(),
        assessment_item: args.assessment_item.clone(),
        slower_than,
        limit: args.limit,
    };
    let records = load_records(&connection, &filter)?;
    info!(db = %db_path.display(), returned = records.len(), "loaded records");

    if args.json {
        write_json(&ShowResponse {
            limit: filter.limit,
            returned: records.len(),
            records,
        })
    } else {
        write_records_text(&records)
    }
}

fn load_records(connection: &Connection, filter: &RecordFilter) -> Result<Vec<ShownRecord>> {
    let mut statement = connection
        .prepare(
            "SELECT id, file_name, record_date, crew_group, name, work_certificate_number,
                    vehicle_model, assessment_item, assessment_result, additional_data
             FROM assessment_base
             WHERE (?1 IS NULL OR file_name = ?1)
               AND (?2 IS NULL OR vehicle_model = ?2)
               AND (?3 IS NULL OR assessment_item = ?3)
             ORDER BY id",
        )
        .context("failed to prepare record query")?;

    let mut rows = statement.query(params![
        filter.file_name,
        filter.vehicle_model,
        filter.assessment_item
    ])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        if records.len() >= filter.limit {
            break;
        }

        let id: i64 = row.get(0)?;
        let vehicle_model: Option<String> = row.get(6)?;
        let raw_additional: String = row.get(9)?;
        let additional_data = serde_json::from_str(&raw_additional)
            .with_context(|| format!("record {id} has invalid additional_data"))?;

        let variant = vehicle_model
            .as_deref()
            .and_then(DetailVariant::for_vehicle_model);
        let spans = match variant {
            Some(variant) => load_detail_spans(connection, variant, id)?,
            None => None,
        };
        let total = spans.as_ref().and_then(|spans| spans.first().copied().flatten());

        if let Some(threshold) = filter.slower_than {
            if !total.is_some_and(|total| total > threshold) {
                continue;
            }
        }

        let durations = match (variant, spans) {
            (Some(variant), Some(spans)) => variant
                .fields()
                .iter()
                .zip(spans)
                .map(|(field, span)| ShownDuration {
                    field: field.column,
                    label: field.label,
                    value: duration::format(span),
                })
                .collect(),
            _ => Vec::new(),
        };

        records.push(ShownRecord {
            id,
            file_name: row.get(1)?,
            record_date: row.get(2)?,
            crew_group: row.get(3)?,
            name: row.get(4)?,
            work_certificate_number: row.get(5)?,
            vehicle_model,
            assessment_item: row.get(7)?,
            outcome: AssessmentOutcome::from_code(row.get(8)?).label(),
            detail_schema: variant,
            durations,
            additional_data,
        });
    }

    Ok(records)
}

fn load_detail_spans(
    connection: &Connection,
    variant: DetailVariant,
    base_id: i64,
) -> Result<Option<Vec<Option<TimeSpan>>>> {
    let fields = variant.fields();
    let columns = fields
        .iter()
        .map(|field| field.column)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {columns} FROM {} WHERE assessment_base_id = ?1",
        variant.table_name()
    );

    connection
        .query_row(&sql, [base_id], |row| {
            (0..fields.len())
                .map(|index| {
                    let micros: Option<i64> = row.get(index)?;
                    Ok(micros.map(duration::from_micros))
                })
                .collect::<rusqlite::Result<Vec<_>>>()
        })
        .optional()
        .with_context(|| {
            format!(
                "failed to load {} detail for record {base_id}",
                variant.as_str()
            )
        })
}

fn load_combinations(connection: &Connection) -> Result<Vec<Combination>> {
    let mut statement = connection
        .prepare(
            "SELECT DISTINCT vehicle_model, assessment_item
             FROM assessment_base
             ORDER BY vehicle_model, assessment_item",
        )
        .context("failed to prepare combination query")?;

    let combinations = statement
        .query_map([], |row| {
            Ok(Combination {
                vehicle_model: row.get(0)?,
                assessment_item: row.get(1)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(combinations)
}

fn write_json<T: Serialize>(value: &T) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    serde_json::to_writer_pretty(&mut output, value)
        .context("failed to serialize show json output")?;
    writeln!(output)?;
    output.flush()?;
    Ok(())
}

fn write_records_text(records: &[ShownRecord]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Records: {}", records.len())?;

    for record in records {
        writeln!(
            output,
            "{}.\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.id,
            record.file_name,
            record
                .record_date
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string()),
            or_dash(record.crew_group.as_deref()),
            or_dash(record.name.as_deref()),
            record.work_certificate_number,
            or_dash(record.vehicle_model.as_deref()),
            or_dash(record.assessment_item.as_deref()),
            record.outcome,
        )?;

        for shown in &record.durations {
            writeln!(
                output,
                "\t{}\t{}",
                shown.label,
                or_dash(shown.value.as_deref())
            )?;
        }
    }

    output.flush()?;
    Ok(())
}

fn write_combinations_text(combinations: &[Combination]) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    for combination in combinations {
        writeln!(
            output,
            "{}\t{}",
            or_dash(combination.vehicle_model.as_deref()),
            or_dash(combination.assessment_item.as_deref())
        )?;
    }
    output.flush()?;
    Ok(())
}

fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}
