use std::collections::HashSet;
use std::fmt;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Result columns appended by the cross-reference worker, in display order.
pub const FOUND_COLUMNS: [&str; 5] = ["pid_found", "cid_found", "fname_found", "lname_found", "hn_found"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, CellValue::Int(_) | CellValue::Float(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Int(v) => Some(*v as f64),
            CellValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Text used as a database lookup key; `None` for blank cells.
    pub fn lookup_text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        Some(self.to_string().trim().to_string())
    }

    pub fn text<S: Into<String>>(s: S) -> Self {
        let s = s.into();
        if s.is_empty() { CellValue::Empty } else { CellValue::Text(s) }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Int(v) => write!(f, "{}", v),
            // 13-digit citizen ids often arrive as floats
            CellValue::Float(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", *v as i64),
            CellValue::Float(v) => write!(f, "{}", v),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::DateTime(dt) => {
                if dt.time().num_seconds_from_midnight() == 0 {
                    write!(f, "{}", dt.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S"))
                }
            }
        }
    }
}

/// In-memory tabular data loaded from a worksheet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl DataTable {
    /// Builds a table, padding or truncating every row to the header width.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, CellValue::Empty);
                r
            })
            .collect();
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize { self.rows.len() }
    pub fn column_count(&self) -> usize { self.columns.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() || self.columns.is_empty() }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn column_values(&self, col: usize) -> impl Iterator<Item = &CellValue> + '_ {
        self.rows.iter().filter_map(move |r| r.get(col))
    }

    /// Drops all-empty rows and columns and trims text cells.
    pub fn clean(&mut self) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let CellValue::Text(s) = cell {
                    let trimmed = s.trim();
                    *cell = CellValue::text(trimmed);
                }
            }
        }
        self.rows.retain(|r| r.iter().any(|c| !c.is_empty()));
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|c| self.column_values(c).any(|v| !v.is_empty()))
            .collect();
        let mut idx = 0;
        self.columns.retain(|_| { let k = keep[idx]; idx += 1; k });
        for row in &mut self.rows {
            let mut idx = 0;
            row.retain(|_| { let k = keep[idx]; idx += 1; k });
        }
    }

    /// `(distinct non-empty values, empty cells)` for a column.
    pub fn column_stats(&self, col: usize) -> ColumnStats {
        let mut seen = HashSet::new();
        let mut empty = 0usize;
        for v in self.column_values(col) {
            if v.is_empty() { empty += 1; } else { seen.insert(v.to_string()); }
        }
        ColumnStats { unique: seen.len(), empty }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnStats {
    pub unique: usize,
    pub empty: usize,
}

/// Which identifier column drives the person lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum LookupKey { Pid, Cid, Hn }

impl LookupKey {
    pub const ALL: [LookupKey; 3] = [LookupKey::Pid, LookupKey::Cid, LookupKey::Hn];

    /// Column name expected in the spreadsheet.
    pub fn sheet_column(&self) -> &'static str {
        match self {
            Self::Pid => "pid",
            Self::Cid => "cid",
            Self::Hn => "hn",
        }
    }

    /// Column of the `person` table queried for this key.
    pub fn db_column(&self) -> &'static str {
        match self {
            Self::Pid => "person_id",
            Self::Cid => "cid",
            Self::Hn => "patient_hn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pid" => Some(Self::Pid),
            "cid" => Some(Self::Cid),
            "hn" => Some(Self::Hn),
            _ => None,
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sheet_column())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersonRecord {
    pub person_id: Option<String>,
    pub cid: Option<String>,
    pub fname: Option<String>,
    pub lname: Option<String>,
    pub patient_hn: Option<String>,
}

impl PersonRecord {
    /// Values in `FOUND_COLUMNS` order.
    pub fn found_cells(&self) -> [CellValue; 5] {
        let c = |v: &Option<String>| CellValue::text(v.clone().unwrap_or_default());
        [c(&self.person_id), c(&self.cid), c(&self.fname), c(&self.lname), c(&self.patient_hn)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn float_ids_render_without_fraction() {
        assert_eq!(CellValue::Float(1234567890123.0).to_string(), "1234567890123");
        assert_eq!(CellValue::Float(2.5).to_string(), "2.5");
        assert_eq!(CellValue::Float(42.0).lookup_text().as_deref(), Some("42"));
    }

    #[test]
    fn dates_drop_midnight_time() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(CellValue::DateTime(d.and_hms_opt(0, 0, 0).unwrap()).to_string(), "2024-05-01");
        assert_eq!(CellValue::DateTime(d.and_hms_opt(8, 30, 0).unwrap()).to_string(), "2024-05-01 08:30:00");
    }

    #[test]
    fn blank_text_is_empty() {
        assert!(CellValue::Text("   ".into()).is_empty());
        assert_eq!(CellValue::Text("  ".into()).lookup_text(), None);
    }

    #[test]
    fn clean_drops_empty_rows_and_columns() {
        let mut t = DataTable::new(
            vec!["a".into(), "blank".into(), "b".into()],
            vec![
                vec![CellValue::text(" x "), CellValue::Empty, CellValue::Int(1)],
                vec![CellValue::Empty, CellValue::Empty, CellValue::Empty],
                vec![CellValue::text("y"), CellValue::text("  "), CellValue::Empty],
            ],
        );
        t.clean();
        assert_eq!(t.columns, vec!["a", "b"]);
        assert_eq!(t.row_count(), 2);
        assert_eq!(t.rows[0][0], CellValue::Text("x".into()));
    }

    #[test]
    fn new_pads_short_rows() {
        let t = DataTable::new(vec!["a".into(), "b".into()], vec![vec![CellValue::Int(1)]]);
        assert_eq!(t.rows[0], vec![CellValue::Int(1), CellValue::Empty]);
    }

    #[test]
    fn column_stats_counts_distinct_and_empty() {
        let t = DataTable::new(
            vec!["cid".into()],
            vec![vec![CellValue::text("1")], vec![CellValue::text("1")], vec![CellValue::Empty], vec![CellValue::text("2")]],
        );
        assert_eq!(t.column_stats(0), ColumnStats { unique: 2, empty: 1 });
    }

    #[test]
    fn lookup_key_maps_columns() {
        assert_eq!(LookupKey::parse("HN"), Some(LookupKey::Hn));
        assert_eq!(LookupKey::Pid.db_column(), "person_id");
        assert_eq!(LookupKey::Hn.db_column(), "patient_hn");
        assert_eq!(LookupKey::parse("name"), None);
    }
}
