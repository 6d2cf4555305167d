use gateway_core::config;

// Runs in its own test binary; nothing else here reads the environment.
#[test]
fn environment_overrides_file_defaults() {
    std::env::set_var("GATEWAY__UPSTREAM__MODEL", "gpt-4o-mini");
    std::env::set_var("GATEWAY__VAULT__PATH", "memory");
    let cfg = config::load(None).unwrap();
    std::env::remove_var("GATEWAY__UPSTREAM__MODEL");
    std::env::remove_var("GATEWAY__VAULT__PATH");

    assert_eq!(cfg.upstream.model.as_deref(), Some("gpt-4o-mini"));
    assert_eq!(cfg.vault.path, "memory");
    assert_eq!(cfg.server.port, 8000);
}
