use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::AppInfo;
use crate::error::UpdateError;

/// Single-object `version.json` published next to the executable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionManifest {
    #[serde(default)]
    pub name: Option<String>,
    pub version: String,
    #[serde(default, deserialize_with = "lenient_code", skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
    #[serde(default)]
    pub backup_url: Option<String>,
    #[serde(default)]
    pub changelog_url: Option<String>,
    #[serde(default)]
    pub repository_url: Option<String>,
    #[serde(default)]
    pub minimum_version: Option<String>,
    #[serde(default)]
    pub update_required: bool,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// One row of the release listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseEntry {
    pub version_name: String,
    #[serde(default, deserialize_with = "lenient_code")]
    pub version_code: Option<u32>,
    #[serde(default)]
    pub release: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
enum RawManifest {
    Listing(Vec<ReleaseEntry>),
    Single(VersionManifest),
}

/// Remote release normalised from either manifest shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseInfo {
    pub version: String,
    pub version_code: Option<u32>,
    pub release_date: Option<String>,
    pub notes: Vec<String>,
    pub download_url: Option<String>,
    pub update_required: bool,
}

impl From<VersionManifest> for ReleaseInfo {
    fn from(m: VersionManifest) -> Self {
        Self {
            version: m.version,
            version_code: m.version_code,
            release_date: m.release_date,
            notes: m.notes,
            download_url: m.download_url.or(m.backup_url),
            update_required: m.update_required,
        }
    }
}

impl From<ReleaseEntry> for ReleaseInfo {
    fn from(e: ReleaseEntry) -> Self {
        Self {
            version: e.version_name,
            version_code: e.version_code,
            release_date: e.release,
            notes: Vec::new(),
            download_url: e.download_url,
            update_required: false,
        }
    }
}

// Version codes show up both as numbers and as strings.
fn lenient_code<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v: Option<Value> = Option::deserialize(d)?;
    Ok(match v {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Parses either manifest shape. For listings the entry with the highest
/// version code wins; on ties the first one listed.
pub fn parse_manifest(body: &str) -> Result<ReleaseInfo, UpdateError> {
    let raw: RawManifest = serde_json::from_str(body).map_err(|e| UpdateError::Manifest(e.to_string()))?;
    match raw {
        RawManifest::Single(m) => Ok(m.into()),
        RawManifest::Listing(entries) => {
            let mut best: Option<ReleaseEntry> = None;
            for e in entries {
                let better = match &best {
                    None => true,
                    Some(b) => e.version_code.unwrap_or(0) > b.version_code.unwrap_or(0),
                };
                if better {
                    best = Some(e);
                }
            }
            best.map(Into::into).ok_or(UpdateError::NoReleases)
        }
    }
}

/// Builds the manifest describing the running build.
pub fn generate_manifest(info: &AppInfo, download_base: &str) -> VersionManifest {
    let base = download_base.trim_end_matches('/');
    let exe = format!("{}{}", info.name, std::env::consts::EXE_SUFFIX);
    VersionManifest {
        name: Some(info.name.clone()),
        version: info.version.clone(),
        version_code: Some(info.version_code),
        description: Some(info.description.clone()),
        author: None,
        release_date: Some(info.release.clone()),
        download_url: Some(format!("{}/{}", base, exe)),
        backup_url: Some(format!("{}/dist/{}", base, exe)),
        changelog_url: None,
        repository_url: None,
        minimum_version: Some("1.0.0".into()),
        update_required: false,
        notes: vec![
            "Automatic update check on startup".into(),
            "Download and install from the About dialog".into(),
        ],
    }
}

/// Checks the fields the updater relies on.
pub fn validate_manifest(value: &Value) -> Result<(), UpdateError> {
    let missing: Vec<&str> = ["name", "version", "download_url"]
        .into_iter()
        .filter(|f| value.get(f).map(|v| v.is_null()).unwrap_or(true))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(UpdateError::Manifest(format!("missing fields: {}", missing.join(", "))))
    }
}
