use reqwest::Client;
use serde::Serialize;

use crate::config::AppInfo;
use crate::error::UpdateError;

#[derive(Debug, Serialize)]
pub struct PublishRequest<'a> {
    pub version_name: &'a str,
    pub version_code: u32,
    pub release: &'a str,
    pub action: &'static str,
}

impl<'a> From<&'a AppInfo> for PublishRequest<'a> {
    fn from(info: &'a AppInfo) -> Self {
        Self { version_name: &info.version, version_code: info.version_code, release: &info.release, action: "add" }
    }
}

/// Registers the running build with the release listing endpoint and
/// returns the server's response body.
pub async fn publish_version(client: &Client, url: &str, info: &AppInfo) -> Result<String, UpdateError> {
    let body = PublishRequest::from(info);
    log::info!("[UPDATE] Publishing {} ({}) to {}", body.version_name, body.version_code, url);
    let resp = client.post(url).json(&body).send().await?;
    let status = resp.status();
    let text = resp.text().await?;
    if !status.is_success() {
        log::warn!("[UPDATE] Publish rejected: HTTP {} {}", status.as_u16(), text);
        return Err(UpdateError::Status(status.as_u16()));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let info = AppInfo { version: "1.0.1".into(), version_code: 101, release: "2025-06-15".into(), ..AppInfo::current() };
        let v = serde_json::to_value(PublishRequest::from(&info)).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"version_name": "1.0.1", "version_code": 101, "release": "2025-06-15", "action": "add"})
        );
    }
}
