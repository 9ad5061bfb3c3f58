use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};

use exchange_unsen::models::{CellValue, DataTable, LookupKey, PersonRecord, FOUND_COLUMNS};
use exchange_unsen::xref::{cross_reference, PersonDirectory, XrefProgress};

#[derive(Default)]
struct MemoryDirectory {
    people: HashMap<String, PersonRecord>,
    calls: Vec<(LookupKey, String)>,
    fail_on: Option<String>,
    cancel_after: Option<(usize, Arc<AtomicBool>)>,
}

impl PersonDirectory for MemoryDirectory {
    async fn find(&mut self, key: LookupKey, value: &str) -> Result<Option<PersonRecord>> {
        self.calls.push((key, value.to_string()));
        if let Some((n, flag)) = &self.cancel_after {
            if self.calls.len() >= *n {
                flag.store(true, Ordering::Relaxed);
            }
        }
        if self.fail_on.as_deref() == Some(value) {
            bail!("lost connection to MySQL server");
        }
        Ok(self.people.get(value).cloned())
    }
}

fn person(id: &str, cid: &str, fname: &str, lname: &str, hn: &str) -> PersonRecord {
    PersonRecord {
        person_id: Some(id.into()),
        cid: Some(cid.into()),
        fname: Some(fname.into()),
        lname: Some(lname.into()),
        patient_hn: Some(hn.into()),
    }
}

fn sheet() -> DataTable {
    DataTable::new(
        vec!["cid".into(), "note".into()],
        vec![
            vec![CellValue::Float(1101700000001.0), CellValue::text("first")],
            vec![CellValue::Empty, CellValue::text("no key")],
            vec![CellValue::text("3100000000000"), CellValue::text("unknown")],
            vec![CellValue::text("1101700000002"), CellValue::text("second")],
        ],
    )
}

fn directory() -> MemoryDirectory {
    let mut people = HashMap::new();
    people.insert("1101700000001".to_string(), person("11", "1101700000001", "Somchai", "Jaidee", "000123"));
    people.insert("1101700000002".to_string(), person("12", "1101700000002", "Somsri", "Rakdee", "000124"));
    MemoryDirectory { people, ..Default::default() }
}

#[tokio::test]
async fn fills_found_columns_in_front() {
    let table = sheet();
    let mut dir = directory();
    let cancel = AtomicBool::new(false);
    let mut seen: Vec<XrefProgress> = Vec::new();

    let out = cross_reference(&table, LookupKey::Cid, &mut dir, &cancel, |p| seen.push(p)).await.unwrap();

    let mut expected: Vec<String> = FOUND_COLUMNS.iter().map(|c| c.to_string()).collect();
    expected.extend(["cid".to_string(), "note".to_string()]);
    assert_eq!(out.table.columns, expected);
    assert_eq!((out.found, out.not_found, out.skipped, out.cancelled), (2, 1, 1, false));

    let t = &out.table;
    assert_eq!(t.cell(0, 0).unwrap().to_string(), "11");
    assert_eq!(t.cell(0, 2).unwrap().to_string(), "Somchai");
    assert_eq!(t.cell(0, 4).unwrap().to_string(), "000123");
    assert!(t.cell(1, 0).unwrap().is_empty());
    assert!(t.cell(2, 2).unwrap().is_empty());
    assert_eq!(t.cell(3, 3).unwrap().to_string(), "Rakdee");
    assert_eq!(t.cell(2, 6).unwrap().to_string(), "unknown");

    // float cids go out without a fractional part; empty keys are never queried
    assert_eq!(dir.calls[0], (LookupKey::Cid, "1101700000001".to_string()));
    assert_eq!(dir.calls.len(), 3);
    assert_eq!(seen.len(), 4);
    assert_eq!(seen.last(), Some(&XrefProgress { processed: 4, total: 4 }));
}

#[tokio::test]
async fn rerun_replaces_previous_results() {
    let table = sheet();
    let cancel = AtomicBool::new(false);
    let first = cross_reference(&table, LookupKey::Cid, &mut directory(), &cancel, |_| {}).await.unwrap();
    let second = cross_reference(&first.table, LookupKey::Cid, &mut directory(), &cancel, |_| {}).await.unwrap();
    assert_eq!(second.table.columns, first.table.columns);
    assert_eq!(second.found, 2);
}

#[tokio::test]
async fn lookup_errors_count_as_not_found() {
    let table = sheet();
    let mut dir = directory();
    dir.fail_on = Some("1101700000001".into());
    let cancel = AtomicBool::new(false);
    let out = cross_reference(&table, LookupKey::Cid, &mut dir, &cancel, |_| {}).await.unwrap();
    assert_eq!((out.found, out.not_found, out.skipped), (1, 2, 1));
    assert!(out.table.cell(0, 0).unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_leaves_remaining_rows_blank() {
    let table = sheet();
    let cancel = Arc::new(AtomicBool::new(false));
    let mut dir = directory();
    dir.cancel_after = Some((1, cancel.clone()));
    let mut last = None;
    let out = cross_reference(&table, LookupKey::Cid, &mut dir, &cancel, |p| last = Some(p)).await.unwrap();

    assert!(out.cancelled);
    assert_eq!(out.found, 1);
    assert_eq!(dir.calls.len(), 1);
    assert_eq!(out.table.row_count(), 4);
    assert!(out.table.cell(3, 0).unwrap().is_empty());
    assert_eq!(out.table.cell(3, 6).unwrap().to_string(), "second");
    assert_eq!(last, Some(XrefProgress { processed: 1, total: 4 }));
}

#[tokio::test]
async fn missing_key_column_is_an_error() {
    let table = sheet();
    let cancel = AtomicBool::new(false);
    let err = cross_reference(&table, LookupKey::Hn, &mut directory(), &cancel, |_| {}).await.unwrap_err();
    assert!(err.to_string().contains("'hn'"));
}
