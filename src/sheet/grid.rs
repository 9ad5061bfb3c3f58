use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::models::{CellValue, DataTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder { Ascending, Descending }

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Sortable, filterable view over a loaded table. The source rows are never
/// reordered; the view is a list of source row indices.
#[derive(Debug, Clone)]
pub struct GridModel {
    source: DataTable,
    view: Vec<usize>,
    filters: BTreeMap<usize, String>,
    sort: Option<(usize, SortOrder)>,
}

impl GridModel {
    pub fn new(source: DataTable) -> Self {
        let view = (0..source.row_count()).collect();
        Self { source, view, filters: BTreeMap::new(), sort: None }
    }

    pub fn source(&self) -> &DataTable { &self.source }
    pub fn into_source(self) -> DataTable { self.source }

    pub fn row_count(&self) -> usize { self.view.len() }
    pub fn column_count(&self) -> usize { self.source.column_count() }

    pub fn header(&self, col: usize) -> Option<&str> {
        self.source.columns.get(col).map(String::as_str)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.view.get(row).and_then(|&r| self.source.cell(r, col))
    }

    pub fn cell_text(&self, row: usize, col: usize) -> String {
        self.cell(row, col).map(ToString::to_string).unwrap_or_default()
    }

    pub fn row(&self, row: usize) -> Option<&[CellValue]> {
        self.view.get(row).and_then(|&r| self.source.rows.get(r)).map(Vec::as_slice)
    }

    /// Empty text removes the filter for that column.
    pub fn apply_column_filter(&mut self, col: usize, text: &str) {
        if col >= self.column_count() {
            return;
        }
        let text = text.trim();
        if text.is_empty() {
            self.filters.remove(&col);
        } else {
            self.filters.insert(col, text.to_string());
        }
        self.rebuild();
    }

    pub fn column_filter(&self, col: usize) -> &str {
        self.filters.get(&col).map(String::as_str).unwrap_or("")
    }

    pub fn active_filters(&self) -> &BTreeMap<usize, String> { &self.filters }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.rebuild();
    }

    pub fn sort(&mut self, col: usize, order: SortOrder) {
        if col >= self.column_count() {
            return;
        }
        self.sort = Some((col, order));
        self.apply_sort();
    }

    pub fn sort_state(&self) -> Option<(usize, SortOrder)> { self.sort }

    /// Distinct non-empty values of a source column in first-seen order.
    pub fn unique_values(&self, col: usize) -> Vec<String> {
        let mut seen = HashSet::new();
        self.source
            .column_values(col)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .filter(|s| seen.insert(s.clone()))
            .collect()
    }

    /// The rows currently visible, in display order.
    pub fn visible_table(&self) -> DataTable {
        DataTable {
            columns: self.source.columns.clone(),
            rows: self.view.iter().map(|&r| self.source.rows[r].clone()).collect(),
        }
    }

    pub fn row_details(&self, row: usize) -> Vec<(String, String)> {
        match self.row(row) {
            Some(cells) => self
                .source
                .columns
                .iter()
                .zip(cells)
                .map(|(h, v)| (h.clone(), v.to_string()))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Initial column width in points from the header and the first rows.
    pub fn suggested_width(&self, col: usize) -> f32 {
        let header = self.header(col).map(|h| h.chars().count()).unwrap_or(0);
        let content = (0..self.row_count().min(5))
            .map(|r| self.cell_text(r, col).chars().count())
            .max()
            .unwrap_or(0);
        let w = (header * 10 + 20).max(content * 8 + 20).clamp(80, 300);
        w as f32
    }

    fn rebuild(&mut self) {
        let needles: Vec<(usize, String)> = self.filters.iter().map(|(c, t)| (*c, t.to_lowercase())).collect();
        self.view = (0..self.source.row_count())
            .filter(|&r| {
                needles.iter().all(|(c, needle)| {
                    self.source
                        .cell(r, *c)
                        .map(|v| v.to_string().to_lowercase().contains(needle.as_str()))
                        .unwrap_or(false)
                })
            })
            .collect();
        self.apply_sort();
    }

    fn apply_sort(&mut self) {
        let Some((col, order)) = self.sort else { return };
        let source = &self.source;
        self.view.sort_by(|&a, &b| {
            let (va, vb) = (source.cell(a, col), source.cell(b, col));
            let ea = va.map(CellValue::is_empty).unwrap_or(true);
            let eb = vb.map(CellValue::is_empty).unwrap_or(true);
            // blanks stay at the bottom in both directions
            match (ea, eb) {
                (true, true) => return Ordering::Equal,
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                _ => {}
            }
            let ord = compare_cells(va.unwrap_or(&CellValue::Empty), vb.unwrap_or(&CellValue::Empty));
            match order {
                SortOrder::Ascending => ord,
                SortOrder::Descending => ord.reverse(),
            }
        });
    }
}

fn compare_cells(a: &CellValue, b: &CellValue) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().to_lowercase().cmp(&b.to_string().to_lowercase()),
    }
}
