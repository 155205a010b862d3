mod common;

use std::fs;
use std::path::Path;

use common::{write, FakeGateway};
use kiln::config::ConfigMapping;
use kiln::harvester::{HarvestReport, Harvester, Outcome};
use serde_json::json;
use tempfile::TempDir;

fn harvest(root: &Path, gateway: &FakeGateway, config: &ConfigMapping) -> HarvestReport {
    let harvester = Harvester::new(
        gateway,
        config,
        root.join("secrets.yaml"),
        root.join(".secrets-updated"),
    );
    harvester
        .harvest(
            &root.join("rendered/secrets"),
            &root.join("templates"),
            &root.join("rendered"),
        )
        .unwrap()
}

fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("templates")).unwrap();
    fs::create_dir_all(tmp.path().join("rendered")).unwrap();
    tmp
}

fn encrypted(root: &Path, relative: &str, plaintext: &[u8]) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, FakeGateway::wrap(plaintext)).unwrap();
}

#[test_log::test]
fn test_changed_rendered_file_is_reencrypted() {
    let tmp = workspace();
    encrypted(tmp.path(), "templates/certs/svc.json.sops_enc", b"old");
    write(tmp.path(), "rendered/certs/svc.json", "new");
    let gateway = FakeGateway::new();

    let report = harvest(tmp.path(), &gateway, &ConfigMapping::default());

    assert_eq!(report.reencrypted, 1);
    assert_eq!(
        fs::read(tmp.path().join("templates/certs/svc.json.sops_enc")).unwrap(),
        b"ENC[new]"
    );
}

#[test]
fn test_unchanged_rendered_file_is_left_alone() {
    let tmp = workspace();
    encrypted(tmp.path(), "templates/svc.json.sops_enc", b"same");
    write(tmp.path(), "rendered/svc.json", "same");
    let gateway = FakeGateway::new();

    let report = harvest(tmp.path(), &gateway, &ConfigMapping::default());

    assert_eq!(report.reencrypted, 0);
    assert_eq!(report.unchanged, 1);
    assert!(gateway.encrypted.borrow().is_empty());
}

#[test]
fn test_missing_rendered_counterpart_is_skipped() {
    let tmp = workspace();
    encrypted(tmp.path(), "templates/svc.json.sops_enc", b"x");
    let gateway = FakeGateway::new();
    let config = ConfigMapping::default();
    let harvester = Harvester::new(&gateway, &config, "secrets.yaml", ".marker");

    let outcome = harvester
        .reencrypt(
            &tmp.path().join("templates/svc.json.sops_enc"),
            &tmp.path().join("rendered/svc.json"),
        )
        .unwrap();

    assert_eq!(outcome, Outcome::Skipped);
}

#[test]
fn test_generated_secret_is_folded_by_file_name() {
    let tmp = workspace();
    write(tmp.path(), "rendered/secrets/tls.key", "-----BEGIN-----\nabc\n");
    let gateway = FakeGateway::new();

    let report = harvest(tmp.path(), &gateway, &ConfigMapping::default());

    assert_eq!(report.stored, 1);
    assert_eq!(
        gateway.sets.borrow().as_slice(),
        [r#"["tls"]["key"] "-----BEGIN-----\nabc\n""#]
    );
    assert_eq!(
        *gateway.document.borrow(),
        json!({"tls": {"key": "-----BEGIN-----\nabc\n"}})
    );
}

#[test]
fn test_second_harvest_is_quiet() {
    let tmp = workspace();
    write(tmp.path(), "rendered/secrets/tls.key", "line \"one\"\nline\\two\n");
    write(tmp.path(), "rendered/secrets/db/password", "hunter2");
    write(tmp.path(), "rendered/secrets/ca.crt", "line1\r\nline2\r\n");
    let gateway = FakeGateway::new();

    harvest(tmp.path(), &gateway, &ConfigMapping::default());
    let stored = ConfigMapping::new(gateway.document.borrow().clone());
    let sets_after_first = gateway.sets.borrow().len();
    let report = harvest(tmp.path(), &gateway, &stored);

    assert_eq!(sets_after_first, 3);
    assert_eq!(gateway.sets.borrow().len(), 3);
    assert_eq!(report.stored, 0);
    assert_eq!(report.unchanged, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(stored.lookup_string("ca.crt").as_deref(), Some("line1\nline2\n"));
}

#[test]
fn test_existing_secret_is_not_rewritten() {
    let tmp = workspace();
    write(tmp.path(), "rendered/secrets/api.token", "abc123");
    let gateway = FakeGateway::new();
    let config = ConfigMapping::new(json!({"api": {"token": "abc123"}}));

    let report = harvest(tmp.path(), &gateway, &config);

    assert_eq!(report.unchanged, 1);
    assert!(gateway.sets.borrow().is_empty());
}

#[test]
fn test_excluded_extensions_are_skipped() {
    let tmp = workspace();
    write(tmp.path(), "rendered/secrets/README.md", "docs");
    write(tmp.path(), "rendered/secrets/notes.txt", "notes");
    write(tmp.path(), "rendered/secrets/bundle.tar.gz", "bin");
    let gateway = FakeGateway::new();

    let report = harvest(tmp.path(), &gateway, &ConfigMapping::default());

    assert_eq!(report.skipped, 3);
    assert!(gateway.sets.borrow().is_empty());
}

#[test]
fn test_failure_does_not_stop_the_walk() {
    let tmp = workspace();
    write(tmp.path(), "rendered/secrets/bad.token", "x");
    write(tmp.path(), "rendered/secrets/good.token", "y");
    let gateway = FakeGateway::failing_on("bad");

    let report = harvest(tmp.path(), &gateway, &ConfigMapping::default());

    assert_eq!(report.failed, 1);
    assert_eq!(report.stored, 1);
    assert_eq!(*gateway.document.borrow(), json!({"good": {"token": "y"}}));
}

#[test]
fn test_taint_marker_is_removed() {
    let tmp = workspace();
    write(tmp.path(), ".secrets-updated", "");

    harvest(tmp.path(), &FakeGateway::new(), &ConfigMapping::default());

    assert!(!tmp.path().join(".secrets-updated").exists());
}

#[test]
fn test_missing_secrets_root_is_fine() {
    let tmp = workspace();

    let report = harvest(tmp.path(), &FakeGateway::new(), &ConfigMapping::default());

    assert_eq!(report, HarvestReport::default());
}
