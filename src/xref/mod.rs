//! Cross-reference worker: one `person` lookup per spreadsheet row, with the
//! hits merged into `*_found` columns placed in front of the original data.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use anyhow::{bail, Result};
use log::{info, warn};
use sqlx::MySqlPool;

use crate::db::schema::find_person;
use crate::models::{CellValue, DataTable, LookupKey, PersonRecord, FOUND_COLUMNS};

/// Source of person records keyed by pid/cid/hn.
#[allow(async_fn_in_trait)]
pub trait PersonDirectory {
    async fn find(&mut self, key: LookupKey, value: &str) -> Result<Option<PersonRecord>>;
}

pub struct MySqlDirectory<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MySqlDirectory<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self { Self { pool } }
}

impl PersonDirectory for MySqlDirectory<'_> {
    async fn find(&mut self, key: LookupKey, value: &str) -> Result<Option<PersonRecord>> {
        find_person(self.pool, key, value).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XrefProgress {
    pub processed: usize,
    pub total: usize,
}

impl XrefProgress {
    pub fn percent(&self) -> f32 {
        if self.total == 0 { 100.0 } else { self.processed as f32 * 100.0 / self.total as f32 }
    }
}

#[derive(Debug, Clone)]
pub struct XrefOutcome {
    pub table: DataTable,
    pub found: usize,
    pub not_found: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

pub async fn cross_reference<D, F>(
    table: &DataTable,
    key: LookupKey,
    directory: &mut D,
    cancel: &AtomicBool,
    mut progress: F,
) -> Result<XrefOutcome>
where
    D: PersonDirectory,
    F: FnMut(XrefProgress),
{
    let Some(key_col) = table.column_index(key.sheet_column()) else {
        bail!("Column '{}' not found in the loaded sheet", key.sheet_column());
    };
    let start = Instant::now();
    let total = table.row_count();

    // re-running replaces earlier results instead of stacking duplicates
    let kept: Vec<usize> = (0..table.column_count())
        .filter(|&c| !FOUND_COLUMNS.contains(&table.columns[c].as_str()))
        .collect();
    let mut columns: Vec<String> = FOUND_COLUMNS.iter().map(|c| c.to_string()).collect();
    columns.extend(kept.iter().map(|&c| table.columns[c].clone()));

    let mut rows = Vec::with_capacity(total);
    let (mut found, mut not_found, mut skipped) = (0usize, 0usize, 0usize);
    let mut cancelled = false;

    info!("Cross-reference on '{}' ({} rows) started", key, total);
    for (idx, src) in table.rows.iter().enumerate() {
        let mut found_cells: [CellValue; 5] = Default::default();
        if cancelled || cancel.load(Ordering::Relaxed) {
            cancelled = true;
        } else {
            match src.get(key_col).and_then(CellValue::lookup_text) {
                None => skipped += 1,
                Some(value) => match directory.find(key, &value).await {
                    Ok(Some(person)) => {
                        found_cells = person.found_cells();
                        found += 1;
                    }
                    Ok(None) => not_found += 1,
                    Err(e) => {
                        warn!("Lookup for {}={} failed: {:#}", key, value, e);
                        not_found += 1;
                    }
                },
            }
            progress(XrefProgress { processed: idx + 1, total });
        }
        let mut row: Vec<CellValue> = found_cells.into_iter().collect();
        row.extend(kept.iter().map(|&c| src.get(c).cloned().unwrap_or_default()));
        rows.push(row);
    }

    info!(
        "Cross-reference on '{}' finished in {:?}: found={} not_found={} skipped={} cancelled={}",
        key,
        start.elapsed(),
        found,
        not_found,
        skipped,
        cancelled
    );
    Ok(XrefOutcome { table: DataTable::new(columns, rows), found, not_found, skipped, cancelled })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_empty() {
        assert_eq!(XrefProgress { processed: 0, total: 0 }.percent(), 100.0);
        assert_eq!(XrefProgress { processed: 1, total: 4 }.percent(), 25.0);
    }
}
