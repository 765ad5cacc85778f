use std::path::Path;
use std::process::Command;

use conjecture_core::database::key_for_name;
use conjecture_core::{choices_to_bytes, encode_failure, ChoiceValue, DirectoryDatabase, ExampleDatabase};
use tempfile::tempdir;

fn cli(args: &[&str]) -> (bool, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_cargo-conjecture"))
        .arg("conjecture")
        .args(args)
        .env_remove("CONJECTURE_DATABASE")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command");

    (output.status.success(), String::from_utf8(output.stdout).unwrap())
}

fn seed_database(root: &Path) {
    let db = DirectoryDatabase::new(root);
    let key = key_for_name("suite::test_sum");
    db.save(&key, &choices_to_bytes(&[ChoiceValue::Integer(1), ChoiceValue::Integer(100)]))
        .unwrap();
}

#[test]
fn test_cli_help() {
    let (ok, stdout) = cli(&["--help"]);
    assert!(ok);
    assert!(stdout.contains("test"));
    assert!(stdout.contains("db"));
    assert!(stdout.contains("blob"));
}

#[test]
fn test_cli_test_help() {
    let (ok, stdout) = cli(&["test", "--help"]);
    assert!(ok);
    assert!(stdout.contains("Run property tests"));
    assert!(stdout.contains("--seed"));
    assert!(stdout.contains("--replay"));
    assert!(stdout.contains("--release"));
    assert!(stdout.contains("--verbose"));
    assert!(stdout.contains("CONJECTURE_SEED"));
    assert!(stdout.contains("Config::from_env()"));
}

#[test]
fn test_cli_db_list_help() {
    let (ok, stdout) = cli(&["db", "list", "--help"]);
    assert!(ok);
    assert!(stdout.contains("--path"));
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("json"));
}

#[test]
fn test_cli_db_list() {
    let dir = tempdir().unwrap();
    seed_database(dir.path());
    let root = dir.path().to_str().unwrap();

    let (ok, stdout) = cli(&["db", "list", "--path", root]);
    assert!(ok);
    assert!(stdout.contains("Example database at"));
    assert!(stdout.contains("1 entries"));
    assert!(stdout.contains("Total: 1 keys"));

    let (ok, stdout) = cli(&["db", "list", "--path", root, "--format", "json"]);
    assert!(ok);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["keys"][0]["entries"], 1);
    assert_eq!(json["stray_files"], 0);
}

#[test]
fn test_cli_db_list_empty() {
    let dir = tempdir().unwrap();
    let (ok, stdout) = cli(&["db", "list", "--path", dir.path().to_str().unwrap()]);
    assert!(ok);
    assert!(stdout.contains("No stored examples"));
}

#[test]
fn test_cli_db_show_and_prune_by_test_name() {
    let dir = tempdir().unwrap();
    seed_database(dir.path());
    let root = dir.path().to_str().unwrap();

    let (ok, stdout) = cli(&["db", "show", "suite::test_sum", "--path", root]);
    assert!(ok);
    assert!(stdout.contains("100"));
    assert!(stdout.contains("CONJECTURE_REPLAY="));

    let (ok, stdout) = cli(&["db", "prune", "suite::test_sum", "--path", root]);
    assert!(ok);
    assert!(stdout.contains("Removed 1 entry"));

    let (ok, stdout) = cli(&["db", "show", "suite::test_sum", "--path", root]);
    assert!(ok);
    assert!(stdout.contains("No entries stored"));
}

#[test]
fn test_cli_blob_decode() {
    let blob = encode_failure(&[ChoiceValue::Integer(10_000), ChoiceValue::Boolean(true)]);
    let (ok, stdout) = cli(&["blob", "decode", &blob]);
    assert!(ok);
    assert!(stdout.contains("10000"));
    assert!(stdout.contains("true"));
}

#[test]
fn test_cli_blob_encode_round_trip() {
    let (ok, encoded) = cli(&["blob", "encode", "00ff10"]);
    assert!(ok);
    let (ok, stdout) = cli(&["blob", "decode", encoded.trim()]);
    assert!(ok);
    assert!(stdout.contains("3 bytes: 00ff10"));
}

#[test]
fn test_cli_rejects_damaged_blob() {
    let (ok, _) = cli(&["blob", "decode", "not a blob"]);
    assert!(!ok);
    let (ok, _) = cli(&["blob", "encode", "xyz"]);
    assert!(!ok);
}
