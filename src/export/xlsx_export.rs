use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook, Worksheet};

use super::{ensure_not_empty, ensure_parent_dir, summary_for, ExportSummary};
use crate::models::{CellValue, DataTable};

pub const SHEET_NAME: &str = "Data";

fn header_format() -> Format {
    Format::new().set_bold().set_align(FormatAlign::Center)
}

fn row_format_even() -> Format {
    Format::new().set_background_color(Color::RGB(0xF2F2F2))
}

fn date_format() -> Format {
    Format::new().set_num_format("yyyy-mm-dd")
}

fn datetime_format() -> Format {
    Format::new().set_num_format("yyyy-mm-dd hh:mm:ss")
}

fn excel_serial(dt: &chrono::NaiveDateTime) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();
    (*dt - epoch).num_milliseconds() as f64 / 86_400_000.0
}

fn write_cell(ws: &mut Worksheet, r: u32, c: u16, value: &CellValue) -> Result<()> {
    match value {
        CellValue::Empty => {}
        CellValue::Text(s) => { ws.write_string(r, c, s)?; }
        CellValue::Int(v) => { ws.write_number(r, c, *v as f64)?; }
        CellValue::Float(v) => { ws.write_number(r, c, *v)?; }
        CellValue::Bool(v) => { ws.write_boolean(r, c, *v)?; }
        CellValue::DateTime(dt) => {
            let fmt = if value.to_string().len() == 10 { date_format() } else { datetime_format() };
            ws.write_number_with_format(r, c, excel_serial(dt), &fmt)?;
        }
    }
    Ok(())
}

fn write_data_sheet(ws: &mut Worksheet, table: &DataTable) -> Result<()> {
    let hfmt = header_format();
    for (c, h) in table.columns.iter().enumerate() {
        ws.write_string_with_format(0, c as u16, h, &hfmt)?;
        let width = (h.chars().count() as f64 + 4.0).clamp(10.0, 40.0);
        ws.set_column_width(c as u16, width)?;
    }

    let even = row_format_even();
    for (i, row) in table.rows.iter().enumerate() {
        let r = (i + 1) as u32;
        if i % 2 == 0 { ws.set_row_format(r, &even)?; }
        for (c, value) in row.iter().enumerate() {
            write_cell(ws, r, c as u16, value)?;
        }
    }
    ws.set_freeze_panes(1, 0)?;
    Ok(())
}

pub fn export_table_xlsx(table: &DataTable, path: &str) -> Result<ExportSummary> {
    ensure_not_empty(table)?;
    ensure_parent_dir(path)?;
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name(SHEET_NAME)?;
    write_data_sheet(ws, table)?;
    wb.save(path).with_context(|| format!("Failed to save {}", path))?;
    summary_for(table, path)
}
