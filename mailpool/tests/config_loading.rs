#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::{io::Write, path::Path};

use mailpool::Mailpool;
use mailpool_dispatch::{Purpose, SelectionMode};

#[test]
fn test_shipped_config_builds_a_pool() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../mailpool.config.ron");
    let config = Mailpool::load(&path).expect("Shipped config should parse");

    let pool = config.build_pool().expect("Shipped config should be valid");
    assert_eq!(pool.registry().accounts().len(), 13);
    assert_eq!(pool.registry().bulk().count(), 9);
    assert!(!pool.registry().fallback_enabled());

    let usable = pool.usable_pool().unwrap();
    assert_eq!(usable.mode, SelectionMode::Healthy);
    assert_eq!(usable.accounts.len(), 9);

    let admin = pool.select_for_purpose(Purpose::Admin).unwrap();
    assert_eq!(admin.address, "admin@example.org");
}

#[test]
fn test_load_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = Mailpool::load(&dir.path().join("absent.ron")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config"));
}

#[test]
fn test_load_fallback_only_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"(
            fallback: (enabled: true, address: Some("relay@gmail.example")),
            health: (enabled: false),
        )"#
    )
    .unwrap();

    let config = Mailpool::load(file.path()).unwrap();
    let pool = config.build_pool().unwrap();

    let selected = pool.select_for_bulk().unwrap();
    assert_eq!(selected.address, "relay@gmail.example");
    assert_eq!(pool.usable_pool().unwrap().mode, SelectionMode::Fallback);
}

#[test]
fn test_load_rejects_invalid_limits() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"(
            accounts: [(address: "no-reply1@example.org", purpose: bulk)],
            limits: (per_account_hourly: 0),
        )"#
    )
    .unwrap();

    let config = Mailpool::load(file.path()).unwrap();
    let err = config.build_pool().unwrap_err();
    assert!(err.is_configuration());
}
