#![allow(deprecated)] // cargo_bin is deprecated but still functional

use assert_cmd::Command;
use predicates::str::contains;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const REPLICAS: &str = r#"
[[replicas]]
id = "ONE"
name = "ReplicaOne"
type = "bitarchive"

[[replicas]]
id = "TWO"
name = "ReplicaTwo"
type = "bitarchive"

[[replicas]]
id = "CS"
name = "ChecksumReplica"
type = "checksum"

[reconnect]
max_attempts = 2
delay_ms = 1
max_connections = 1
"#;

fn write_sqlite_config(dir: &Path) -> PathBuf {
    let db = dir.join("bitpres.db");
    let path = dir.join("bitpres.toml");
    let content = format!(
        "{REPLICAS}\n[store]\ntype = \"sqlite\"\npath = {:?}\n",
        db.display().to_string()
    );
    fs::write(&path, content).unwrap();
    path
}

fn write_file_config(dir: &Path, registry_dir: &Path) -> PathBuf {
    let path = dir.join("bitpres-file.toml");
    let content = format!(
        "{REPLICAS}\n[store]\ntype = \"file\"\ndir = {:?}\n",
        registry_dir.display().to_string()
    );
    fs::write(&path, content).unwrap();
    path
}

fn bitpres(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("bitpres").unwrap();
    cmd.env("RUST_LOG", "warn").arg("--config").arg(config);
    cmd
}

fn ingest_checksums(config: &Path, dir: &Path, replica: &str, lines: &str) {
    let job = dir.join(format!("{replica}.checksums"));
    fs::write(&job, lines).unwrap();
    bitpres(config)
        .args(["ingest-checksums", "--replica", replica])
        .arg(&job)
        .assert()
        .success();
}

#[test]
fn checksum_vote_marks_dissenting_copy_corrupt() {
    let temp = TempDir::new().unwrap();
    let config = write_sqlite_config(temp.path());

    ingest_checksums(&config, temp.path(), "ONE", "a.arc##aaa\nb.arc##bbb\n");
    ingest_checksums(&config, temp.path(), "TWO", "a.arc##aaa\nb.arc##xxx\n");
    ingest_checksums(&config, temp.path(), "CS", "a.arc##aaa\nb.arc##bbb\n");

    bitpres(&config)
        .args(["checksum", "b.arc"])
        .assert()
        .success()
        .stdout(contains("bbb"));

    bitpres(&config)
        .args(["corrupt", "--replica", "TWO"])
        .assert()
        .success()
        .stdout(contains("b.arc"));

    bitpres(&config)
        .args(["count", "--replica", "TWO"])
        .assert()
        .success()
        .stdout(contains("Files: 2"))
        .stdout(contains("Corrupt: 1"));

    bitpres(&config)
        .args(["repair-source", "b.arc", "--exclude", "TWO"])
        .assert()
        .success()
        .stdout(contains("ONE"));

    bitpres(&config)
        .args(["status", "b.arc", "--json"])
        .assert()
        .success()
        .stdout(contains("\"replica_id\": \"TWO\""))
        .stdout(contains("CORRUPT"));
}

#[test]
fn filelist_reports_missing_files() {
    let temp = TempDir::new().unwrap();
    let config = write_sqlite_config(temp.path());

    ingest_checksums(&config, temp.path(), "ONE", "a.arc##aaa\nb.arc##bbb\n");

    let listing = temp.path().join("one.filelist");
    fs::write(&listing, "a.arc\n\n").unwrap();
    bitpres(&config)
        .args(["ingest-filelist", "--replica", "ONE"])
        .arg(&listing)
        .assert()
        .success()
        .stdout(contains("Missing: 1"));

    bitpres(&config)
        .args(["missing", "--replica", "ONE"])
        .assert()
        .success()
        .stdout(contains("b.arc"));

    bitpres(&config)
        .args(["vote", "--file", "a.arc"])
        .assert()
        .success()
        .stdout(contains("unanimous aaa"));
}

#[test]
fn malformed_checksum_output_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_sqlite_config(temp.path());
    let job = temp.path().join("bad.checksums");
    fs::write(&job, "a.arc##aaa\nnot a checksum line\n").unwrap();

    bitpres(&config)
        .args(["ingest-checksums", "--replica", "ONE"])
        .arg(&job)
        .assert()
        .failure()
        .stderr(contains("malformed checksum job output"));
}

#[test]
fn unknown_replica_is_rejected() {
    let temp = TempDir::new().unwrap();
    let config = write_sqlite_config(temp.path());

    bitpres(&config)
        .args(["missing", "--replica", "NOPE"])
        .assert()
        .failure()
        .stderr(contains("NOPE"));
}

#[test]
fn file_store_refuses_relational_commands() {
    let temp = TempDir::new().unwrap();
    let registry_dir = temp.path().join("registry");
    fs::create_dir_all(&registry_dir).unwrap();
    fs::write(
        registry_dir.join("admin.data"),
        "0.4\na.arc aaa UPLOAD_COMPLETED 1000 , ONE UPLOAD_COMPLETED 1000\n",
    )
    .unwrap();
    let config = write_file_config(temp.path(), &registry_dir);

    bitpres(&config)
        .args(["missing", "--replica", "ONE"])
        .assert()
        .failure()
        .stderr(contains("needs a relational store"));

    bitpres(&config)
        .args(["checksum", "a.arc"])
        .assert()
        .success()
        .stdout(contains("aaa"));

    bitpres(&config)
        .args(["status", "a.arc"])
        .assert()
        .success()
        .stdout(contains("Aggregate: UPLOAD_COMPLETED"));
}

#[test]
fn migrate_legacy_imports_registry() {
    let temp = TempDir::new().unwrap();
    let config = write_sqlite_config(temp.path());
    let registry_dir = temp.path().join("registry");
    fs::create_dir_all(&registry_dir).unwrap();
    fs::write(
        registry_dir.join("admin.data"),
        "0.4\n\
         a.arc aaa UPLOAD_COMPLETED 1000 , ONE UPLOAD_COMPLETED 1000 , TWO UPLOAD_FAILED 1000\n\
         b.arc bbb UPLOAD_STARTED 2000 , ONE UPLOAD_STARTED 2000\n",
    )
    .unwrap();

    bitpres(&config)
        .arg("migrate-legacy")
        .arg("--dir")
        .arg(&registry_dir)
        .assert()
        .success()
        .stdout(contains("Imported 2 entries"));

    bitpres(&config)
        .args(["repair-source", "a.arc"])
        .assert()
        .success()
        .stdout(contains("ONE"));

    bitpres(&config)
        .args(["missing", "--replica", "TWO"])
        .assert()
        .success()
        .stdout(contains("a.arc"));
}

#[test]
fn missing_configuration_fails() {
    let temp = TempDir::new().unwrap();

    Command::cargo_bin("bitpres")
        .unwrap()
        .env_remove("BITPRES_CONFIG")
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .args(["count", "--replica", "ONE"])
        .assert()
        .failure()
        .stderr(contains("No configuration provided"));
}
