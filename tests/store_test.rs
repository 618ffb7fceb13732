mod common;

use std::fs;

use tempfile::TempDir;

use research_golem::store::DataStore;
use research_golem::types::{DaemonConfig, DEFAULT_EMAIL_HOUR, DEFAULT_INTERVAL_HOURS};

use common::make_record;

#[test]
fn load_config_creates_defaults_when_missing() {
    let dir = TempDir::new().expect("temp dir");
    let store = DataStore::new(dir.path());

    let config = store.load_config();
    assert_eq!(config.interval_hours, DEFAULT_INTERVAL_HOURS);
    assert_eq!(config.email_hour, DEFAULT_EMAIL_HOUR);
    assert_eq!(config.last_digest_date, None);

    // The repaired file is written back, so a second load reads it from disk.
    assert!(store.config_path().exists());
    assert_eq!(store.load_config(), config);
}

#[test]
fn load_config_preserves_existing_and_unknown_keys() {
    let dir = TempDir::new().expect("temp dir");
    let store = DataStore::new(dir.path());
    fs::write(
        store.config_path(),
        r#"{"interval_hours": 6, "favorite_color": "green"}"#,
    )
    .expect("write config");

    let config = store.load_config();
    assert_eq!(config.interval_hours, 6);
    // Missing key filled in from defaults.
    assert_eq!(config.email_hour, DEFAULT_EMAIL_HOUR);
    // Unknown key survives the default-merge rewrite.
    let on_disk = fs::read_to_string(store.config_path()).expect("read config");
    assert!(on_disk.contains("favorite_color"));
}

#[test]
fn load_config_recovers_from_malformed_json() {
    let dir = TempDir::new().expect("temp dir");
    let store = DataStore::new(dir.path());
    fs::write(store.config_path(), "{not json at all").expect("write config");

    let config = store.load_config();
    assert_eq!(config, DaemonConfig::default());

    // The corrupt file was replaced with valid defaults.
    let on_disk = fs::read_to_string(store.config_path()).expect("read config");
    let parsed: serde_json::Value = serde_json::from_str(&on_disk).expect("valid json");
    assert_eq!(parsed["interval_hours"], DEFAULT_INTERVAL_HOURS);
}

#[test]
fn write_config_round_trips_digest_date() {
    let dir = TempDir::new().expect("temp dir");
    let store = DataStore::new(dir.path());

    let mut config = store.load_config();
    config.last_digest_date = Some("2026-02-10".to_string());
    store.write_config(&config).expect("write config");

    assert_eq!(
        store.load_config().last_digest_date.as_deref(),
        Some("2026-02-10")
    );
}

#[test]
fn queue_appends_in_order_and_clears() {
    let dir = TempDir::new().expect("temp dir");
    let store = DataStore::new(dir.path());

    assert!(store.load_queue().is_empty());

    let r1 = make_record("page-1", "First", "brief one", 0.01);
    let r2 = make_record("page-2", "Second", "brief two", 0.02);
    store.append_to_queue(&r1).expect("append r1");
    store.append_to_queue(&r2).expect("append r2");

    let queue = store.load_queue();
    assert_eq!(queue, vec![r1, r2]);

    store.clear_queue().expect("clear");
    assert!(store.load_queue().is_empty());
}

#[test]
fn load_queue_recovers_from_malformed_json() {
    let dir = TempDir::new().expect("temp dir");
    let store = DataStore::new(dir.path());
    fs::write(store.queue_path(), "[{broken").expect("write queue");

    assert!(store.load_queue().is_empty());

    // A fresh append starts a new queue rather than failing.
    let record = make_record("page-1", "First", "brief", 0.01);
    store.append_to_queue(&record).expect("append");
    assert_eq!(store.load_queue(), vec![record]);
}
