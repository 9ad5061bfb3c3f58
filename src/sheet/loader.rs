use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use calamine::{open_workbook_auto, DataType, Range, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use log::{debug, info};

use crate::config::{MAX_WORKBOOK_BYTES, SUPPORTED_EXTENSIONS};
use crate::error::SheetError;
use crate::models::{CellValue, DataTable};

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Sheet to read; the first sheet when `None`.
    pub sheet: Option<String>,
    /// Drop blank rows/columns and trim text after reading.
    pub clean: bool,
}

pub fn validate_workbook_path(path: &Path) -> Result<(), SheetError> {
    if path.as_os_str().is_empty() {
        return Err(SheetError::NoPath);
    }
    if !path.exists() {
        return Err(SheetError::NotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(SheetError::NotAFile(path.to_path_buf()));
    }
    let ext = path.extension().map(|e| e.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(SheetError::UnsupportedExtension(ext));
    }
    let size = std::fs::metadata(path)?.len();
    if size > MAX_WORKBOOK_BYTES {
        return Err(SheetError::TooLarge {
            size_mb: size as f64 / (1024.0 * 1024.0),
            limit_mb: MAX_WORKBOOK_BYTES / (1024 * 1024),
        });
    }
    Ok(())
}

pub fn list_sheets(path: &Path) -> Result<Vec<String>, SheetError> {
    validate_workbook_path(path)?;
    let workbook = open_workbook_auto(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// Stages reported while a workbook loads.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    Validated { bytes: u64 },
    Opened { sheets: Vec<String> },
    Reading { sheet: String },
    Cleaning,
    Done { rows: usize, columns: usize },
}

pub fn load_workbook(path: &Path, opts: &LoadOptions) -> Result<DataTable, SheetError> {
    load_workbook_with_progress(path, opts, |_| {})
}

pub fn load_workbook_with_progress<F>(path: &Path, opts: &LoadOptions, mut progress: F) -> Result<DataTable, SheetError>
where
    F: FnMut(LoadEvent),
{
    validate_workbook_path(path)?;
    progress(LoadEvent::Validated { bytes: std::fs::metadata(path)?.len() });
    let start = Instant::now();
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names().to_vec();
    progress(LoadEvent::Opened { sheets: names.clone() });
    let sheet = match &opts.sheet {
        Some(name) => {
            if !names.iter().any(|n| n == name) {
                return Err(SheetError::UnknownSheet(name.clone()));
            }
            name.clone()
        }
        None => names.first().cloned().ok_or(SheetError::NoSheets)?,
    };
    progress(LoadEvent::Reading { sheet: sheet.clone() });
    let range = workbook
        .worksheet_range(&sheet)
        .ok_or_else(|| SheetError::UnknownSheet(sheet.clone()))??;

    let mut table = range_to_table(&range)?;
    if opts.clean {
        progress(LoadEvent::Cleaning);
        table.clean();
        if table.is_empty() {
            return Err(SheetError::Empty);
        }
    }
    info!(
        "Loaded sheet '{}' from {}: {} rows x {} columns in {:?}",
        sheet,
        path.display(),
        table.row_count(),
        table.column_count(),
        start.elapsed()
    );
    progress(LoadEvent::Done { rows: table.row_count(), columns: table.column_count() });
    Ok(table)
}

fn range_to_table(range: &Range<DataType>) -> Result<DataTable, SheetError> {
    let mut rows = range.rows();
    let header = rows.next().ok_or(SheetError::Empty)?;
    let columns = header_names(header);

    let mut data: Vec<Vec<CellValue>> = rows.map(|r| r.iter().map(cell_value).collect()).collect();
    while data.last().map(|r| r.iter().all(CellValue::is_empty)).unwrap_or(false) {
        data.pop();
    }
    if data.is_empty() {
        return Err(SheetError::Empty);
    }
    debug!("header: {:?}", columns);
    Ok(DataTable::new(columns, data))
}

/// Blank headers become `Unnamed: i`; repeated names get `.1`, `.2`, ...
fn header_names(header: &[DataType]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut emitted: HashSet<String> = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            let base = cell_value(cell).to_string().trim().to_string();
            let base = if base.is_empty() { format!("Unnamed: {}", i) } else { base };
            let n = counts.entry(base.clone()).or_insert(0);
            let mut name = if *n == 0 { base.clone() } else { format!("{}.{}", base, n) };
            // a suffixed name may already be a literal header
            while emitted.contains(&name) {
                *n += 1;
                name = format!("{}.{}", base, n);
            }
            *n += 1;
            emitted.insert(name.clone());
            name
        })
        .collect()
}

fn cell_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Empty,
        DataType::String(s) => CellValue::text(s.clone()),
        DataType::Int(v) => CellValue::Int(*v),
        DataType::Float(v) => CellValue::Float(*v),
        DataType::Bool(v) => CellValue::Bool(*v),
        DataType::DateTime(serial) => excel_serial_to_datetime(*serial)
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Float(*serial)),
        other => CellValue::text(other.to_string()),
    }
}

/// Excel's 1900 date system, counting from 1899-12-30 to absorb the leap-year bug.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serial_dates() {
        let dt = excel_serial_to_datetime(45292.0).unwrap();
        assert_eq!(dt.format("%Y-%m-%d").to_string(), "2024-01-01");
        let dt = excel_serial_to_datetime(45292.5).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "12:00");
        assert!(excel_serial_to_datetime(-1.0).is_none());
    }

    #[test]
    fn header_dedup_and_blank() {
        let h = vec![
            DataType::String("cid".into()),
            DataType::Empty,
            DataType::String("cid".into()),
            DataType::String("cid".into()),
        ];
        assert_eq!(header_names(&h), vec!["cid", "Unnamed: 1", "cid.1", "cid.2"]);
    }

    #[test]
    fn header_suffix_skips_existing_names() {
        let h = vec![
            DataType::String("a".into()),
            DataType::String("a.1".into()),
            DataType::String("a".into()),
            DataType::String("a".into()),
        ];
        let names = header_names(&h);
        assert_eq!(names, vec!["a", "a.1", "a.2", "a.3"]);
        let unique: HashSet<&String> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn trailing_blank_rows_dropped() {
        let mut r: Range<DataType> = Range::new((0, 0), (3, 1));
        r.set_value((0, 0), DataType::String("cid".into()));
        r.set_value((0, 1), DataType::String("name".into()));
        r.set_value((1, 0), DataType::Float(1.0));
        let t = range_to_table(&r).unwrap();
        assert_eq!(t.row_count(), 1);
        assert_eq!(t.cell(0, 1), Some(&CellValue::Empty));

        let mut header_only: Range<DataType> = Range::new((0, 0), (0, 0));
        header_only.set_value((0, 0), DataType::String("x".into()));
        assert!(matches!(range_to_table(&header_only), Err(SheetError::Empty)));
    }

    #[test]
    fn rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("data.txt");
        std::fs::write(&p, "x").unwrap();
        assert!(matches!(validate_workbook_path(&p), Err(SheetError::UnsupportedExtension(e)) if e == "txt"));
        assert!(matches!(validate_workbook_path(&dir.path().join("nope.xlsx")), Err(SheetError::NotFound(_))));
        assert!(matches!(validate_workbook_path(dir.path()), Err(SheetError::NotAFile(_))));
        assert!(matches!(validate_workbook_path(Path::new("")), Err(SheetError::NoPath)));
    }
}
