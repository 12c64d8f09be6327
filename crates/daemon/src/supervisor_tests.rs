use super::*;
use serial_test::serial;

// ENVIRONMENT is process-global state; these tests must not interleave.

#[tokio::test]
#[serial]
async fn out_of_scope_environment_returns_without_touching_the_config_file() {
    std::env::set_var("ENVIRONMENT", "serve");
    let outcome = run(Path::new("/nonexistent/path/does-not-matter.toml")).await.unwrap();
    assert_eq!(outcome, RunOutcome::OutOfScope);
    std::env::remove_var("ENVIRONMENT");
}

#[tokio::test]
#[serial]
async fn unset_environment_is_treated_as_out_of_scope() {
    std::env::remove_var("ENVIRONMENT");
    let outcome = run(Path::new("/nonexistent/path/does-not-matter.toml")).await.unwrap();
    assert_eq!(outcome, RunOutcome::OutOfScope);
}

#[tokio::test]
#[serial]
async fn an_unreadable_config_file_is_a_fatal_startup_error_once_active() {
    std::env::set_var("ENVIRONMENT", ACTIVE_ENVIRONMENT);
    let err = run(Path::new("/nonexistent/path/does-not-exist.toml")).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Config(_)));
    std::env::remove_var("ENVIRONMENT");
}

#[tokio::test]
#[serial]
async fn a_malformed_config_file_is_a_fatal_startup_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trainer.toml");
    std::fs::write(&path, "not valid toml [[[").unwrap();

    std::env::set_var("ENVIRONMENT", ACTIVE_ENVIRONMENT);
    let err = run(&path).await.unwrap_err();
    assert!(matches!(err, SupervisorError::Config(_)));
    std::env::remove_var("ENVIRONMENT");
}
