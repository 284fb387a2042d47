use tracing::debug;

use super::admission::AdmittedRow;

#[derive(Debug)]
pub(crate) struct Deduplicated {
    pub rows: Vec<AdmittedRow>,
    pub duplicates_removed: usize,
}

/// Keeps the last row in file order for every dedup key.
///
/// Rows are stably sorted by key first, so duplicates sit next to each other in
/// their original order and the survivor of each run is the latest one.
pub(crate) fn keep_last_per_key(mut rows: Vec<AdmittedRow>) -> Deduplicated {
    rows.sort_by(|a, b| a.dedup_key().cmp(&b.dedup_key()));

    let mut kept: Vec<AdmittedRow> = Vec::with_capacity(rows.len());
    let mut duplicates_removed = 0;

    for row in rows {
        if let Some(previous) = kept.last_mut() {
            if previous.dedup_key() == row.dedup_key() {
                debug!(
                    replaced_row = previous.index,
                    kept_row = row.index,
                    "dropped earlier duplicate"
                );
                *previous = row;
                duplicates_removed += 1;
                continue;
            }
        }
        kept.push(row);
    }

    Deduplicated {
        rows: kept,
        duplicates_removed,
    }
}
