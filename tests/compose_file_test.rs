use dbcopy::compose::model::{Command, RestartPolicy};
use dbcopy::compose::{database_url, lint, ComposeFile, LintOptions};
use dbcopy::config::settings::{DEFAULT_DB_IN, DEFAULT_DB_OUT};
use std::collections::HashSet;
use std::path::Path;
use tempfile::TempDir;

fn shipped_compose_file() -> ComposeFile {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("docker-compose.yml");
    ComposeFile::from_file(&path).unwrap()
}

#[test]
fn test_declares_exactly_mysql_and_postgres() {
    let file = shipped_compose_file();
    assert_eq!(file.service_names(), vec!["mysql", "postgres"]);
}

#[test]
fn test_port_mappings_are_positive_and_unique() {
    let file = shipped_compose_file();
    let mut host_ports = HashSet::new();

    for (name, service) in &file.services {
        let mappings = service.port_mappings();
        assert!(!mappings.is_empty(), "{} publishes no ports", name);

        for (text, parsed) in mappings {
            let mapping = parsed.unwrap_or_else(|e| panic!("{}: '{}': {}", name, text, e));
            let host_port = mapping.host_port.expect("host port published");
            assert!(host_port > 0);
            assert!(mapping.container_port > 0);
            assert!(host_ports.insert(host_port), "host port {} bound twice", host_port);
        }
    }
}

#[test]
fn test_required_environment_is_present() {
    let file = shipped_compose_file();

    let mysql = file.service("mysql").unwrap();
    for key in ["MYSQL_ROOT_PASSWORD", "MYSQL_DATABASE"] {
        assert!(!mysql.env(key).unwrap_or_default().is_empty(), "mysql: {}", key);
    }

    let postgres = file.service("postgres").unwrap();
    for key in ["POSTGRES_PASSWORD", "POSTGRES_DB"] {
        assert!(!postgres.env(key).unwrap_or_default().is_empty(), "postgres: {}", key);
    }
}

#[test]
fn test_lints_clean() {
    let file = shipped_compose_file();
    let report = lint(&file, &LintOptions::default());
    assert!(report.is_ok(), "{:?}", report.findings);
    assert_eq!(report.warnings().count(), 0, "{:?}", report.findings);
}

#[test]
fn test_runtime_parameters() {
    let file = shipped_compose_file();

    let mysql = file.service("mysql").unwrap();
    assert_eq!(mysql.image_family(), "mysql");
    assert_eq!(mysql.restart, Some(RestartPolicy::Always));
    assert!(matches!(mysql.command, Some(Command::Shell(_))));

    let postgres = file.service("postgres").unwrap();
    assert_eq!(postgres.image_family(), "postgres");
    assert_eq!(postgres.restart, Some(RestartPolicy::Always));
    assert!(postgres.command.is_none());
}

#[test]
fn test_derived_urls_match_copy_defaults() {
    let file = shipped_compose_file();
    assert_eq!(
        database_url(file.service("postgres").unwrap()).as_deref(),
        Some(DEFAULT_DB_IN)
    );
    assert_eq!(
        database_url(file.service("mysql").unwrap()).as_deref(),
        Some(DEFAULT_DB_OUT)
    );
}

#[test]
fn test_find_in_prefers_compose_yaml() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("docker-compose.yml"), "services: {}\n").unwrap();
    assert_eq!(
        ComposeFile::find_in(dir.path()),
        Some(dir.path().join("docker-compose.yml"))
    );

    std::fs::write(dir.path().join("compose.yaml"), "services: {}\n").unwrap();
    assert_eq!(
        ComposeFile::find_in(dir.path()),
        Some(dir.path().join("compose.yaml"))
    );

    let empty = TempDir::new().unwrap();
    assert_eq!(ComposeFile::find_in(empty.path()), None);
}

#[test]
fn test_unreadable_file_is_a_compose_error() {
    let dir = TempDir::new().unwrap();
    let err = ComposeFile::from_file(dir.path().join("missing.yml")).unwrap_err();
    assert!(matches!(err, dbcopy::CopyError::ComposeError { .. }));
}
