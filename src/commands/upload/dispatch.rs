use serde_json::{Map, Value};

use super::table::{TOTAL_DURATION_HEADERS, column_position};
use crate::duration::{self, DurationParseError};
use crate::model::DetailRecord;
use crate::schema::{DetailVariant, StepField};

/// Where the timed-step run of a table begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StepColumns {
    pub start: usize,
    pub marker: Option<&'static str>,
}

impl StepColumns {
    pub fn used_fallback(&self) -> bool {
        self.marker.is_none()
    }
}

#[derive(Debug)]
pub(crate) struct FieldFailure {
    pub field: &'static StepField,
    pub error: DurationParseError,
}

#[derive(Debug)]
pub(crate) struct DispatchedDetail {
    pub record: DetailRecord,
    pub failures: Vec<FieldFailure>,
}

/// Finds the total-duration marker column; without one, the step run starts at
/// `fallback_offset` (clamped to the header width).
pub(crate) fn locate_step_columns(headers: &[String], fallback_offset: usize) -> StepColumns {
    for marker in TOTAL_DURATION_HEADERS {
        if let Some(start) = column_position(headers, marker) {
            return StepColumns {
                start,
                marker: Some(marker),
            };
        }
    }

    StepColumns {
        start: fallback_offset.min(headers.len()),
        marker: None,
    }
}

/// Raw step values keyed by header, kept on the base record.
pub(crate) fn step_values_by_header(
    headers: &[String],
    cells: &[Option<String>],
    step_columns: StepColumns,
) -> Map<String, Value> {
    headers
        .iter()
        .zip(cells)
        .skip(step_columns.start)
        .map(|(header, value)| {
            let value = value.clone().map(Value::String).unwrap_or(Value::Null);
            (header.clone(), value)
        })
        .collect()
}

/// Reads the step run positionally into `variant`'s fields. Fields past the end
/// of the row stay `None`; values that fail to parse become `None` and are
/// returned as failures.
pub(crate) fn build_detail(
    variant: DetailVariant,
    cells: &[Option<String>],
    step_columns: StepColumns,
) -> DispatchedDetail {
    let step_cells = cells.get(step_columns.start..).unwrap_or_default();
    let mut failures = Vec::new();

    let durations = variant
        .fields()
        .iter()
        .enumerate()
        .map(|(position, field)| {
            let raw = step_cells.get(position).and_then(|cell| cell.as_deref())?;
            match duration::try_parse(raw) {
                Ok(span) => span,
                Err(error) => {
                    failures.push(FieldFailure { field, error });
                    None
                }
            }
        })
        .collect();

    DispatchedDetail {
        record: DetailRecord { variant, durations },
        failures,
    }
}
