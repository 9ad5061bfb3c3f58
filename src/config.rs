use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const APP_NAME: &str = "ExchangeUnsen";
pub const RELEASE_DATE: &str = "2025-06-15";
pub const SETTINGS_FILE: &str = ".exchange_unsen.json";
pub const SETTINGS_ENV: &str = "EXCHANGE_UNSEN_SETTINGS";

pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["xlsx", "xlsm", "xls"];
pub const MAX_WORKBOOK_BYTES: u64 = 100 * 1024 * 1024;
pub const DEFAULT_XLSX_EXPORT: &str = "exported_data.xlsx";
pub const DEFAULT_CSV_EXPORT: &str = "exported_data.csv";

pub const DEFAULT_MANIFEST_URL: &str = "https://raw.githubusercontent.com/tehnplk/exchange_unsen/master/version.json";
pub const DEFAULT_DOWNLOAD_BASE: &str = "https://github.com/tehnplk/exchange_unsen/raw/master";

/// Static facts about the running build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppInfo {
    pub name: String,
    pub version: String,
    pub version_code: u32,
    pub release: String,
    pub description: String,
    pub window_title: String,
    pub window_size: [f32; 2],
    pub min_window_size: [f32; 2],
}

impl AppInfo {
    pub fn current() -> Self {
        let version = env!("CARGO_PKG_VERSION").to_string();
        let version_code = version_code_for(&version).unwrap_or(1);
        Self {
            name: APP_NAME.into(),
            version,
            version_code,
            release: RELEASE_DATE.into(),
            description: env!("CARGO_PKG_DESCRIPTION").into(),
            window_title: "Excel File Reader".into(),
            window_size: [1000.0, 700.0],
            min_window_size: [800.0, 600.0],
        }
    }
}

/// `1.0.1` -> 101. Components beyond the third are ignored.
pub fn version_code_for(version: &str) -> Option<u32> {
    let mut parts = version.trim().trim_start_matches('v').split('.');
    let mut code = 0u32;
    for weight in [100u32, 10, 1] {
        let n: u32 = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        code = code.checked_add(n.checked_mul(weight)?)?;
    }
    Some(code)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub auto_connect: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            database: "hos".into(),
            username: String::new(),
            password: String::new(),
            auto_connect: false,
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() { return Err(ConfigError::Missing("host")); }
        if self.database.trim().is_empty() { return Err(ConfigError::Missing("database")); }
        if self.username.trim().is_empty() { return Err(ConfigError::Missing("username")); }
        if self.port == 0 { return Err(ConfigError::OutOfRange { field: "port", value: self.port.to_string() }); }
        Ok(())
    }

    /// Connection label with the password left out, for logs and the status bar.
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}/{}", self.username, self.host, self.port, self.database)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    pub manifest_url: String,
    pub publish_url: Option<String>,
    pub timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub user_agent: String,
    pub check_on_startup: bool,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            manifest_url: DEFAULT_MANIFEST_URL.into(),
            publish_url: None,
            timeout_secs: 10,
            download_timeout_secs: 30,
            user_agent: "ExchangeUnsen-Downloader/1.0".into(),
            check_on_startup: true,
        }
    }
}

impl UpdateConfig {
    pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs.max(1)) }
    pub fn download_timeout(&self) -> Duration { Duration::from_secs(self.download_timeout_secs.max(1)) }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.manifest_url.trim().is_empty() { return Err(ConfigError::Missing("manifest_url")); }
        if !(self.manifest_url.starts_with("http://") || self.manifest_url.starts_with("https://")) {
            return Err(ConfigError::OutOfRange { field: "manifest_url", value: self.manifest_url.clone() });
        }
        Ok(())
    }
}

/// User-editable settings persisted between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub update: UpdateConfig,
}

impl Settings {
    pub fn default_path() -> PathBuf {
        std::env::var_os(SETTINGS_ENV).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
    }

    /// Missing file yields defaults; unreadable or malformed files are errors.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(ConfigError::Read { path: path.to_path_buf(), source: e }),
        };
        serde_json::from_str(&text).map_err(|e| ConfigError::Malformed { path: path.to_path_buf(), source: e })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write { path: path.to_path_buf(), source: e })?;
            }
        }
        let body = serde_json::to_string_pretty(self).map_err(|e| ConfigError::Malformed { path: path.to_path_buf(), source: e })?;
        std::fs::write(path, body).map_err(|e| ConfigError::Write { path: path.to_path_buf(), source: e })
    }

    pub fn load() -> Result<Self, ConfigError> { Self::load_from(&Self::default_path()) }
    pub fn save(&self) -> Result<(), ConfigError> { self.save_to(&Self::default_path()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_codes() {
        assert_eq!(version_code_for("1.0.1"), Some(101));
        assert_eq!(version_code_for("v2.3"), Some(230));
        assert_eq!(version_code_for("1.x"), None);
    }

    #[test]
    fn app_info_matches_crate_version() {
        let info = AppInfo::current();
        assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(info.name, "ExchangeUnsen");
    }
}
