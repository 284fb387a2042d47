use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::Regex;

use super::table::{ColumnIndex, SourceRow};
use crate::error::RowSkipReason;
use crate::model::AssessmentOutcome;
use crate::util::canonical_integer_text;

/// A row that passed admission, with its identity fields normalized.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AdmittedRow {
    pub index: usize,
    pub crew_group: Option<String>,
    pub name: Option<String>,
    pub work_certificate_number: String,
    pub vehicle_model: Option<String>,
    pub assessment_item: Option<String>,
    pub outcome: AssessmentOutcome,
    pub record_date: Option<NaiveDate>,
    pub cells: Vec<Option<String>>,
}

pub(crate) type DedupKey<'a> = (Option<&'a str>, &'a str, Option<&'a str>, Option<&'a str>);

impl AdmittedRow {
    /// (name, work certificate, vehicle model, assessment item)
    pub fn dedup_key(&self) -> DedupKey<'_> {
        (
            self.name.as_deref(),
            self.work_certificate_number.as_str(),
            self.vehicle_model.as_deref(),
            self.assessment_item.as_deref(),
        )
    }
}

pub(crate) struct RowAdmission {
    work_certificate: Regex,
    record_date: Regex,
}

impl RowAdmission {
    pub fn new() -> Result<Self> {
        Ok(Self {
            work_certificate: Regex::new(r"^\d{5,}$")
                .context("failed to compile work certificate regex")?,
            record_date: Regex::new(r"^\d{8}$").context("failed to compile record date regex")?,
        })
    }

    pub fn admit(
        &self,
        columns: &ColumnIndex,
        row: SourceRow,
    ) -> std::result::Result<AdmittedRow, RowSkipReason> {
        let raw_certificate = row.cell(columns.work_certificate);
        let certificate = raw_certificate.and_then(canonical_integer_text);

        let crew_group = row.cell(columns.crew_group).map(str::to_string);
        let name = row.cell(columns.name).map(str::to_string);

        if crew_group.is_none() && name.is_none() && certificate.is_none() {
            return Err(RowSkipReason::EmptyIdentity);
        }

        let work_certificate_number = match certificate {
            Some(value) if self.work_certificate.is_match(&value) => value,
            Some(value) => return Err(RowSkipReason::InvalidWorkCertificate { value }),
            None => {
                return Err(RowSkipReason::InvalidWorkCertificate {
                    value: raw_certificate.unwrap_or_default().to_string(),
                });
            }
        };

        let date_cell = row
            .cell(columns.record_date)
            .or_else(|| row.cell(columns.date));
        let record_date = match date_cell {
            Some(raw) => Some(self.parse_record_date(raw)?),
            None => None,
        };

        let outcome = AssessmentOutcome::from_label(row.cell(columns.outcome));

        Ok(AdmittedRow {
            index: row.index,
            crew_group,
            name,
            work_certificate_number,
            vehicle_model: row.cell(columns.vehicle_model).map(str::to_string),
            assessment_item: row.cell(columns.assessment_item).map(str::to_string),
            outcome,
            record_date,
            cells: row.cells,
        })
    }

    fn parse_record_date(&self, raw: &str) -> std::result::Result<NaiveDate, RowSkipReason> {
        let token = canonical_integer_text(raw).unwrap_or_else(|| raw.to_string());
        if !self.record_date.is_match(&token) {
            return Err(RowSkipReason::MalformedRecordDate {
                value: raw.to_string(),
            });
        }
        NaiveDate::parse_from_str(&token, "%Y%m%d").map_err(|_| {
            RowSkipReason::MalformedRecordDate {
                value: raw.to_string(),
            }
        })
    }
}
