use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use csv::Writer;

use super::{ensure_parent_dir, summary_for, ExportSummary};
use crate::models::DataTable;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Writes the table as UTF-8 CSV with a BOM so Excel picks the right encoding.
pub fn export_table_csv(table: &DataTable, path: &str) -> Result<ExportSummary> {
    super::ensure_not_empty(table)?;
    ensure_parent_dir(path)?;
    let mut file = File::create(path).with_context(|| format!("Failed to create {}", path))?;
    file.write_all(UTF8_BOM)?;

    let mut w = Writer::from_writer(file);
    w.write_record(&table.columns)?;
    for row in &table.rows {
        w.write_record(row.iter().map(|c| c.to_string()))?;
    }
    w.flush()?;
    summary_for(table, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    #[test]
    fn writes_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let path = path.to_string_lossy().to_string();
        let t = DataTable::new(
            vec!["cid".into(), "name".into()],
            vec![vec![CellValue::Float(1101700000001.0), CellValue::text("สมชาย, ใจดี")]],
        );
        let s = export_table_csv(&t, &path).unwrap();
        assert_eq!((s.rows, s.columns), (1, 2));
        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["cid,name", "1101700000001,\"สมชาย, ใจดี\""]);
    }
}
