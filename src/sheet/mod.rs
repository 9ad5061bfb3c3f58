pub mod grid;
pub mod loader;

pub use grid::{GridModel, SortOrder};
pub use loader::{list_sheets, load_workbook, load_workbook_with_progress, validate_workbook_path, LoadEvent, LoadOptions};
