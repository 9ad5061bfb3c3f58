use exchange_unsen::config::{DatabaseConfig, Settings, UpdateConfig};
use exchange_unsen::error::ConfigError;

#[test]
fn defaults_and_validation_ok() {
    let cfg = DatabaseConfig { username: "sa".into(), password: "secret".into(), ..Default::default() };
    assert_eq!((cfg.host.as_str(), cfg.port, cfg.database.as_str()), ("localhost", 3306, "hos"));
    assert!(!cfg.auto_connect);
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.display_target(), "sa@localhost:3306/hos");
    assert!(UpdateConfig::default().validate().is_ok());
}

#[test]
fn validation_catches_issues() {
    let bad = DatabaseConfig { host: "".into(), port: 0, database: "".into(), ..Default::default() };
    let msg = format!("{}", bad.validate().unwrap_err());
    assert!(msg.contains("missing required field") || msg.contains("out of range"));

    let no_port = DatabaseConfig { username: "sa".into(), port: 0, ..Default::default() };
    assert!(matches!(no_port.validate(), Err(ConfigError::OutOfRange { field: "port", .. })));

    let ftp = UpdateConfig { manifest_url: "ftp://example.test/version.json".into(), ..Default::default() };
    assert!(ftp.validate().is_err());
}

#[test]
fn settings_round_trip_and_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf").join("settings.json");
    assert_eq!(Settings::load_from(&path).unwrap(), Settings::default());

    let mut s = Settings::default();
    s.database.host = "10.0.0.9".into();
    s.database.username = "hosxp".into();
    s.database.auto_connect = true;
    s.update.check_on_startup = false;
    s.save_to(&path).unwrap();
    assert_eq!(Settings::load_from(&path).unwrap(), s);
}

#[test]
fn partial_and_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let partial = dir.path().join("partial.json");
    std::fs::write(&partial, r#"{"database":{"host":"db.local","port":3307}}"#).unwrap();
    let s = Settings::load_from(&partial).unwrap();
    assert_eq!(s.database.host, "db.local");
    assert_eq!(s.database.port, 3307);
    assert_eq!(s.database.database, "hos");
    assert_eq!(s.update, UpdateConfig::default());

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{not json").unwrap();
    assert!(matches!(Settings::load_from(&broken), Err(ConfigError::Malformed { .. })));
}
