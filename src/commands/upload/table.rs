use csv::{ReaderBuilder, Trim};

use crate::error::IngestError;

pub(crate) const COL_CREW_GROUP: &str = "乘务班组";
pub(crate) const COL_NAME: &str = "姓名";
pub(crate) const COL_WORK_CERTIFICATE: &str = "工作证编号";
pub(crate) const COL_VEHICLE_MODEL: &str = "车型";
pub(crate) const COL_ASSESSMENT_ITEM: &str = "考核项目";
pub(crate) const COL_OUTCOME: &str = "考核结果";
pub(crate) const COL_RECORD_DATE: &str = "记录日期";
pub(crate) const COL_DATE: &str = "日期";
pub(crate) const COL_REMARKS: &str = "备注";
pub(crate) const TOTAL_DURATION_HEADERS: [&str; 2] = ["整体耗时", "整体用时"];

// Spreadsheet tools write these for empty cells.
const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

#[derive(Debug, Clone)]
pub(crate) struct AssessmentTable {
    pub headers: Vec<String>,
    pub rows: Vec<SourceRow>,
}

/// One data row; `cells` is aligned with the table headers and `None` marks an
/// empty cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SourceRow {
    pub index: usize,
    pub cells: Vec<Option<String>>,
}

/// Positions of the identity columns in one uploaded table.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ColumnIndex {
    pub crew_group: Option<usize>,
    pub name: Option<usize>,
    pub work_certificate: Option<usize>,
    pub vehicle_model: Option<usize>,
    pub assessment_item: Option<usize>,
    pub outcome: Option<usize>,
    pub record_date: Option<usize>,
    pub date: Option<usize>,
}

impl AssessmentTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        column_position(&self.headers, name)
    }

    pub fn column_index(&self) -> ColumnIndex {
        ColumnIndex {
            crew_group: self.column(COL_CREW_GROUP),
            name: self.column(COL_NAME),
            work_certificate: self.column(COL_WORK_CERTIFICATE),
            vehicle_model: self.column(COL_VEHICLE_MODEL),
            assessment_item: self.column(COL_ASSESSMENT_ITEM),
            outcome: self.column(COL_OUTCOME),
            record_date: self.column(COL_RECORD_DATE),
            date: self.column(COL_DATE),
        }
    }
}

impl SourceRow {
    pub fn cell(&self, column: Option<usize>) -> Option<&str> {
        column
            .and_then(|index| self.cells.get(index))
            .and_then(|value| value.as_deref())
    }
}

pub(crate) fn column_position(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|header| header == name)
}

/// Parses decoded text into a table. The first physical line is a free-text
/// title; the second holds the column names. A remarks column is dropped.
pub(crate) fn parse_table(
    file_name: &str,
    text: &str,
    delimiter: u8,
) -> Result<AssessmentTable, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = reader.records();

    // Title line.
    if let Some(title) = records.next() {
        title.map_err(|err| table_error(file_name, &err))?;
    }

    let header_record = match records.next() {
        Some(record) => record.map_err(|err| table_error(file_name, &err))?,
        None => {
            return Err(IngestError::MissingHeader {
                file_name: file_name.to_string(),
            });
        }
    };

    let mut headers: Vec<String> = header_record.iter().map(str::to_string).collect();
    let remarks = column_position(&headers, COL_REMARKS);
    if let Some(position) = remarks {
        headers.remove(position);
    }

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        let record = record.map_err(|err| table_error(file_name, &err))?;

        let mut cells: Vec<Option<String>> = record
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != remarks)
            .map(|(_, value)| normalize_cell(value))
            .collect();
        cells.resize(headers.len(), None);

        rows.push(SourceRow { index, cells });
    }

    Ok(AssessmentTable { headers, rows })
}

fn normalize_cell(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || MISSING_TOKENS.contains(&value) {
        None
    } else {
        Some(value.to_string())
    }
}

fn table_error(file_name: &str, err: &csv::Error) -> IngestError {
    IngestError::Table {
        file_name: file_name.to_string(),
        reason: err.to_string(),
    }
}
