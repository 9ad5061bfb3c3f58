use std::path::{Path, MAIN_SEPARATOR};

/// Elides the leading directories of `path` so it fits in `max` characters,
/// keeping the file name and as many trailing directories as possible.
pub fn shorten_path(path: &str, max: usize) -> String {
    if path.chars().count() <= max {
        return path.to_string();
    }
    let p = Path::new(path);
    let file_name = p.file_name().map(|f| f.to_string_lossy().into_owned()).unwrap_or_default();
    let sep = MAIN_SEPARATOR.to_string();

    if file_name.chars().count() + 4 > max {
        let stem = p.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let ext = p.extension().map(|e| format!(".{}", e.to_string_lossy())).unwrap_or_default();
        let keep = max.saturating_sub(7 + ext.chars().count()).max(1);
        let short: String = stem.chars().take(keep).collect();
        return format!("...{}{}...{}", sep, short, ext);
    }

    let mut result = file_name;
    let dirs: Vec<String> = p
        .parent()
        .map(|d| d.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect())
        .unwrap_or_default();
    for dir in dirs.iter().rev() {
        if dir == &sep || dir.is_empty() {
            continue;
        }
        if result.chars().count() + dir.chars().count() + 1 + 4 <= max {
            result = format!("{}{}{}", dir, sep, result);
        } else {
            break;
        }
    }
    format!("...{}{}", sep, result)
}

pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".into();
    }
    let mut size = bytes as f64;
    let mut i = 0;
    while size >= 1024.0 && i < UNITS.len() - 1 {
        size /= 1024.0;
        i += 1;
    }
    format!("{:.1} {}", size, UNITS[i])
}
