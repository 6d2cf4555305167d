use gateway::server::{bind_addr, serve};
use gateway_core::config::{self, AppConfig};

#[tokio::test]
async fn missing_config_file_fails_before_anything_starts() {
    assert!(config::load(Some("/no/such/dir/gateway")).is_err());
}

#[tokio::test]
async fn invalid_detection_pattern_aborts_serve() {
    let mut cfg = AppConfig::default();
    cfg.vault.path = "memory".into();
    cfg.server.host = "127.0.0.1".into();
    cfg.server.port = 0;
    cfg.scanner.injection_patterns = vec!["(unterminated".into()];
    let err = serve(cfg).await.unwrap_err();
    assert!(format!("{:#}", err).contains("detection model"), "{:#}", err);
}

#[tokio::test]
async fn unopenable_vault_aborts_serve() {
    let temp = tempfile::tempdir().unwrap();
    // a directory where the database file should be
    let blocker = temp.path().join("vault.db");
    std::fs::create_dir_all(&blocker).unwrap();

    let mut cfg = AppConfig::default();
    cfg.vault.path = blocker.to_string_lossy().into_owned();
    cfg.server.host = "127.0.0.1".into();
    cfg.server.port = 0;
    let err = serve(cfg).await.unwrap_err();
    assert!(format!("{:#}", err).contains("PII vault"), "{:#}", err);
}

#[test]
fn default_listen_address() {
    let addr = bind_addr(&AppConfig::default()).unwrap();
    assert_eq!(addr.to_string(), "0.0.0.0:8000");
}

#[test]
fn hostname_is_rejected() {
    let mut cfg = AppConfig::default();
    cfg.server.host = "not a host".into();
    assert!(bind_addr(&cfg).is_err());
}
