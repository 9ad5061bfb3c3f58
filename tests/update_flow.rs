use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use exchange_unsen::config::{AppInfo, UpdateConfig};
use exchange_unsen::error::UpdateError;
use exchange_unsen::update::download::backup_path_for;
use exchange_unsen::update::{build_client, download_update, publish_version, UpdateCheck, UpdateChecker};

fn app(version: &str, code: u32) -> AppInfo {
    AppInfo { version: version.into(), version_code: code, release: "2025-06-15".into(), ..AppInfo::current() }
}

fn config(server: &MockServer) -> UpdateConfig {
    UpdateConfig { manifest_url: format!("{}/version.json", server.uri()), ..Default::default() }
}

#[tokio::test]
async fn single_manifest_reports_newer_release() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .and(header("user-agent", "ExchangeUnsen-Downloader/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "ExchangeUnsen",
            "version": "1.0.2",
            "release_date": "2025-07-01",
            "download_url": format!("{}/ExchangeUnsen.exe", server.uri()),
            "notes": ["Faster search"]
        })))
        .mount(&server)
        .await;

    let checker = UpdateChecker::new(&config(&server), app("1.0.1", 101)).unwrap();
    match checker.check().await.unwrap() {
        UpdateCheck::Available(r) => {
            assert_eq!(r.version, "1.0.2");
            assert_eq!(r.notes, vec!["Faster search"]);
            assert!(r.download_url.unwrap().ends_with("/ExchangeUnsen.exe"));
        }
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn listing_uses_highest_version_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"version_name": "1.0.0", "version_code": 100, "release": "2025-05-01"},
            {"version_name": "1.0.1", "version_code": 101, "release": "2025-06-15"}
        ])))
        .mount(&server)
        .await;

    let up_to_date = UpdateChecker::new(&config(&server), app("1.0.1", 101)).unwrap();
    assert!(matches!(up_to_date.check().await.unwrap(), UpdateCheck::UpToDate(r) if r.version == "1.0.1"));

    let dev = UpdateChecker::new(&config(&server), app("1.1.0", 110)).unwrap();
    assert!(matches!(dev.check().await.unwrap(), UpdateCheck::NewerLocal(_)));
}

#[tokio::test]
async fn server_errors_surface_as_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/version.json")).respond_with(ResponseTemplate::new(503)).mount(&server).await;
    let checker = UpdateChecker::new(&config(&server), app("1.0.1", 101)).unwrap();
    assert!(matches!(checker.fetch_release().await, Err(UpdateError::Status(503))));
}

#[tokio::test]
async fn download_replaces_target_and_keeps_backup() {
    let server = MockServer::start().await;
    let payload = vec![7u8; 64 * 1024];
    Mock::given(method("GET"))
        .and(path("/ExchangeUnsen.exe"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("ExchangeUnsen.exe");
    std::fs::write(&target, b"old build").unwrap();

    let client = build_client(&UpdateConfig::default(), true).unwrap();
    let mut events = Vec::new();
    let url = format!("{}/ExchangeUnsen.exe", server.uri());
    let report = download_update(&client, &url, &target, |p| events.push(p)).await.unwrap();

    assert_eq!(report.bytes, payload.len() as u64);
    assert_eq!(std::fs::read(&target).unwrap(), payload);
    let backup = backup_path_for(&target);
    assert_eq!(report.backup.as_deref(), Some(backup.as_path()));
    assert_eq!(std::fs::read(&backup).unwrap(), b"old build");
    assert!(!dir.path().join("ExchangeUnsen.exe.tmp").exists());

    let last = events.last().unwrap();
    assert_eq!(last.downloaded, payload.len() as u64);
    assert_eq!(last.percent(), Some(100.0));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}

#[tokio::test]
async fn failed_download_leaves_target_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/missing.exe")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("ExchangeUnsen.exe");
    std::fs::write(&target, b"current").unwrap();

    let client = build_client(&UpdateConfig::default(), true).unwrap();
    let url = format!("{}/missing.exe", server.uri());
    let err = download_update(&client, &url, &target, |_| {}).await.unwrap_err();

    assert!(matches!(err, UpdateError::Status(404)));
    assert_eq!(std::fs::read(&target).unwrap(), b"current");
    assert!(!backup_path_for(&target).exists());
    assert!(!dir.path().join("ExchangeUnsen.exe.tmp").exists());
}

#[tokio::test]
async fn publish_posts_release_entry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/exec"))
        .and(body_json(json!({"version_name": "1.0.1", "version_code": 101, "release": "2025-06-15", "action": "add"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"ok\"}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = build_client(&UpdateConfig::default(), false).unwrap();
    let body = publish_version(&client, &format!("{}/exec", server.uri()), &app("1.0.1", 101)).await.unwrap();
    assert!(body.contains("ok"));
}

#[tokio::test]
async fn publish_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/exec")).respond_with(ResponseTemplate::new(403)).mount(&server).await;
    let client = build_client(&UpdateConfig::default(), false).unwrap();
    let res = publish_version(&client, &format!("{}/exec", server.uri()), &app("1.0.1", 101)).await;
    assert!(matches!(res, Err(UpdateError::Status(403))));
}
