use reqwest::Client;

use super::manifest::{parse_manifest, ReleaseInfo};
use super::version::{compare_versions, is_newer, VersionStatus};
use crate::config::{AppInfo, UpdateConfig};
use crate::error::UpdateError;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCheck {
    Available(ReleaseInfo),
    UpToDate(ReleaseInfo),
    NewerLocal(ReleaseInfo),
}

impl UpdateCheck {
    pub fn release(&self) -> &ReleaseInfo {
        match self {
            Self::Available(r) | Self::UpToDate(r) | Self::NewerLocal(r) => r,
        }
    }

    pub fn is_available(&self) -> bool { matches!(self, Self::Available(_)) }
}

pub fn build_client(cfg: &UpdateConfig, download: bool) -> Result<Client, UpdateError> {
    let timeout = if download { cfg.download_timeout() } else { cfg.timeout() };
    Ok(Client::builder().timeout(timeout).user_agent(cfg.user_agent.clone()).build()?)
}

/// Codes decide when both sides carry one; otherwise the version strings,
/// where an unparseable but different remote version counts as newer.
pub fn classify(current: &AppInfo, release: ReleaseInfo) -> UpdateCheck {
    let status = match release.version_code {
        Some(code) => code.cmp(&current.version_code).into(),
        None => compare_versions(&current.version, &release.version).unwrap_or_else(|e| {
            log::warn!("[UPDATE] {}", e);
            if is_newer(&current.version, &release.version) {
                VersionStatus::UpdateAvailable
            } else {
                VersionStatus::UpToDate
            }
        }),
    };
    match status {
        VersionStatus::UpdateAvailable => UpdateCheck::Available(release),
        VersionStatus::UpToDate => UpdateCheck::UpToDate(release),
        VersionStatus::NewerLocal => UpdateCheck::NewerLocal(release),
    }
}

pub struct UpdateChecker {
    client: Client,
    manifest_url: String,
    current: AppInfo,
}

impl UpdateChecker {
    pub fn new(cfg: &UpdateConfig, current: AppInfo) -> Result<Self, UpdateError> {
        Ok(Self { client: build_client(cfg, false)?, manifest_url: cfg.manifest_url.clone(), current })
    }

    pub fn client(&self) -> &Client { &self.client }
    pub fn current(&self) -> &AppInfo { &self.current }

    pub async fn fetch_release(&self) -> Result<ReleaseInfo, UpdateError> {
        log::info!("[UPDATE] Checking {}", self.manifest_url);
        let resp = self.client.get(&self.manifest_url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(UpdateError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        parse_manifest(&body)
    }

    pub async fn check(&self) -> Result<UpdateCheck, UpdateError> {
        let release = self.fetch_release().await?;
        let result = classify(&self.current, release);
        log::info!(
            "[UPDATE] current {} remote {} -> {}",
            self.current.version,
            result.release().version,
            if result.is_available() { "update available" } else { "no update" }
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(version: &str, code: Option<u32>) -> ReleaseInfo {
        ReleaseInfo {
            version: version.into(),
            version_code: code,
            release_date: None,
            notes: vec![],
            download_url: None,
            update_required: false,
        }
    }

    fn app(version: &str, code: u32) -> AppInfo {
        AppInfo { version: version.into(), version_code: code, ..AppInfo::current() }
    }

    #[test]
    fn codes_win_over_strings() {
        let current = app("1.0.1", 101);
        assert!(classify(&current, release("0.0.0", Some(102))).is_available());
        assert!(matches!(classify(&current, release("9.9.9", Some(101))), UpdateCheck::UpToDate(_)));
        assert!(matches!(classify(&current, release("1.0.0", Some(100))), UpdateCheck::NewerLocal(_)));
    }

    #[test]
    fn strings_when_no_code() {
        let current = app("1.0.1", 101);
        assert!(classify(&current, release("1.0.2", None)).is_available());
        assert!(matches!(classify(&current, release("1.0.1", None)), UpdateCheck::UpToDate(_)));
        assert!(classify(&current, release("nightly", None)).is_available());
    }
}
