pub mod csv_export;
pub mod xlsx_export;

use std::fs;
use std::path::Path;

use anyhow::{bail, Result};

use crate::models::DataTable;

pub use csv_export::export_table_csv;
pub use xlsx_export::export_table_xlsx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat { Csv, Xlsx }

impl ExportFormat {
    /// `.csv` exports as CSV, everything else as xlsx.
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path).extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => Self::Csv,
            _ => Self::Xlsx,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub columns: usize,
    pub bytes: u64,
}

pub fn export_table(table: &DataTable, path: &str, format: ExportFormat) -> Result<ExportSummary> {
    let summary = match format {
        ExportFormat::Csv => export_table_csv(table, path)?,
        ExportFormat::Xlsx => export_table_xlsx(table, path)?,
    };
    log::info!("Exported {} rows x {} columns to {} ({} bytes)", summary.rows, summary.columns, path, summary.bytes);
    Ok(summary)
}

pub(crate) fn ensure_not_empty(table: &DataTable) -> Result<()> {
    if table.is_empty() {
        bail!("No data to export (every row may be filtered out)");
    }
    Ok(())
}

pub(crate) fn ensure_parent_dir(path: &str) -> Result<()> {
    let p = Path::new(path);
    if let Some(parent) = p.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

pub(crate) fn summary_for(table: &DataTable, path: &str) -> Result<ExportSummary> {
    let bytes = fs::metadata(path)?.len();
    Ok(ExportSummary { rows: table.row_count(), columns: table.column_count(), bytes })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(ExportFormat::from_path("out.CSV"), ExportFormat::Csv);
        assert_eq!(ExportFormat::from_path("out.xlsx"), ExportFormat::Xlsx);
        assert_eq!(ExportFormat::from_path("out"), ExportFormat::Xlsx);
    }

    #[test]
    fn empty_table_is_refused() {
        let t = DataTable::new(vec!["a".into()], vec![]);
        assert!(export_table(&t, "unused.csv", ExportFormat::Csv).is_err());
    }
}
