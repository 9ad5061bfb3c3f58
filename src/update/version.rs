use std::cmp::Ordering;

use crate::error::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionStatus {
    UpdateAvailable,
    UpToDate,
    /// The running build is ahead of the published one (development build).
    NewerLocal,
}

impl From<Ordering> for VersionStatus {
    /// `remote.cmp(current)`
    fn from(o: Ordering) -> Self {
        match o {
            Ordering::Greater => Self::UpdateAvailable,
            Ordering::Equal => Self::UpToDate,
            Ordering::Less => Self::NewerLocal,
        }
    }
}

/// Dotted numeric version; a leading `v` and any `-pre`/`+build` suffix are ignored.
pub fn parse_version(s: &str) -> Option<Vec<u64>> {
    let s = s.trim().trim_start_matches(['v', 'V']);
    let core = s.split(['-', '+']).next().unwrap_or("");
    if core.is_empty() {
        return None;
    }
    core.split('.').map(|p| p.trim().parse::<u64>().ok()).collect()
}

pub fn compare_versions(current: &str, remote: &str) -> Result<VersionStatus, UpdateError> {
    let err = || UpdateError::Version { current: current.to_string(), remote: remote.to_string() };
    let mut a = parse_version(current).ok_or_else(err)?;
    let mut b = parse_version(remote).ok_or_else(err)?;
    let n = a.len().max(b.len());
    a.resize(n, 0);
    b.resize(n, 0);
    Ok(b.cmp(&a).into())
}

/// Unparseable versions count as newer whenever the strings differ.
pub fn is_newer(current: &str, remote: &str) -> bool {
    match compare_versions(current, remote) {
        Ok(status) => status == VersionStatus::UpdateAvailable,
        Err(_) => current.trim() != remote.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert_eq!(compare_versions("1.0.1", "1.0.2").unwrap(), VersionStatus::UpdateAvailable);
        assert_eq!(compare_versions("1.0", "1.0.0").unwrap(), VersionStatus::UpToDate);
        assert_eq!(compare_versions("1.10.0", "1.9.9").unwrap(), VersionStatus::NewerLocal);
        assert_eq!(compare_versions("v1.2.0", "1.2.0-beta").unwrap(), VersionStatus::UpToDate);
    }

    #[test]
    fn garbage_versions() {
        assert!(compare_versions("1.0", "latest").is_err());
        assert!(is_newer("1.0", "latest"));
        assert!(!is_newer("dev", "dev"));
    }
}
