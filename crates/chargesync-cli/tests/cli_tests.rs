//! End-to-end tests invoking the compiled `chargesync` binary.
#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use rusqlite::{Connection, params};
use tempfile::TempDir;

/// Temporary deployment: usage database, charger installation, state
/// directory and the configuration tying them together.
struct Deployment {
    dir: TempDir,
}

impl Deployment {
    fn new(dbids: &[i64]) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let conn = Connection::open(root.join("usage.db")).unwrap();
        conn.execute_batch(
            "CREATE TABLE JobUsageRecord (
                dbid INTEGER PRIMARY KEY, ResourceType TEXT, LocalUserId TEXT,
                Charge TEXT, WallDuration TEXT, CpuUserDuration TEXT,
                CpuSystemDuration TEXT, NodeCount TEXT, Njobs TEXT, Processors TEXT,
                EndTime TEXT, MachineName TEXT, ProjectName TEXT);
             CREATE TABLE JobUsageRecord_Meta (dbid INTEGER PRIMARY KEY, ProbeName TEXT);",
        )
        .unwrap();
        for (n, dbid) in dbids.iter().enumerate() {
            conn.execute(
                "INSERT INTO JobUsageRecord VALUES
                    (?1, 'Batch', ?2, NULL, '60', '1', '1', '1', '1', '2', '2026-01-01 00:00:00', 'cluster', NULL)",
                params![dbid, format!("user{n}")],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO JobUsageRecord_Meta VALUES (?1, 'osg:atlas')",
                params![dbid],
            )
            .unwrap();
        }

        let bin = root.join("gold").join("bin");
        fs::create_dir_all(&bin).unwrap();
        let calls = root.join("calls.txt");
        for (name, verb) in [("fake-gcharge", "charge"), ("fake-grefund", "refund")] {
            let script = bin.join(name);
            fs::write(
                &script,
                format!("#!/bin/sh\necho \"{verb} $2\" >> {}\n", calls.display()),
            )
            .unwrap();
            fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        }
        fs::create_dir(root.join("state")).unwrap();

        let deployment = Self { dir };
        deployment.write_config("");
        deployment
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config_path(&self) -> PathBuf {
        self.root().join("chargesync.toml")
    }

    fn state(&self, name: &str) -> PathBuf {
        self.root().join("state").join(name)
    }

    /// Write the configuration with `extra` appended verbatim.
    fn write_config(&self, extra: &str) {
        let root = self.root().display();
        let config = format!(
            r#"
[ledger]
database = "{root}/usage.db"
scope = "atlas"

[charger]
home = "{root}/gold"
charge_command = "fake-gcharge"
refund_command = "fake-grefund"
log_file = "{root}/charger.log"

[state]
cursor = "{root}/state/cursor.toml"
journal = "{root}/state/intent.journal"
lock = "{root}/state/chargesync.lock"
{extra}
"#
        );
        fs::write(self.config_path(), config).unwrap();
    }

    fn calls(&self) -> String {
        fs::read_to_string(self.root().join("calls.txt")).unwrap_or_default()
    }

    fn cmd(&self, args: &[&str]) -> Command {
        let mut cmd = Command::cargo_bin("chargesync").expect("Failed to find chargesync binary");
        cmd.arg("--config").arg(self.config_path()).args(args);
        cmd.env_remove("RUST_LOG");
        cmd
    }
}

#[test]
fn run_charges_new_records_and_commits_cursor() {
    let deployment = Deployment::new(&[10, 11]);

    deployment
        .cmd(&["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 charged"))
        .stdout(predicate::str::contains("cursor at 12"));

    assert_eq!(deployment.calls(), "charge 10\ncharge 11\n");
    let cursor = fs::read_to_string(deployment.state("cursor.toml")).unwrap();
    assert!(cursor.contains("last_successful_id = 12"));
    assert!(!deployment.state("chargesync.lock").exists());
}

#[test]
fn run_is_the_default_command() {
    let deployment = Deployment::new(&[1]);

    deployment.cmd(&[]).assert().success();

    assert_eq!(deployment.calls(), "charge 1\n");
}

#[test]
fn rerun_charges_nothing() {
    let deployment = Deployment::new(&[1, 2]);

    deployment.cmd(&["run"]).assert().success();
    deployment
        .cmd(&["run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 charged"));

    assert_eq!(deployment.calls(), "charge 1\ncharge 2\n");
}

#[test]
fn status_reports_cursor_and_journal() {
    let deployment = Deployment::new(&[5]);
    deployment.cmd(&["run"]).assert().success();

    deployment
        .cmd(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("atlas"))
        .stdout(predicate::str::contains("6"))
        .stdout(predicate::str::contains("settled"));
}

#[test]
fn status_on_fresh_state_does_not_create_files() {
    let deployment = Deployment::new(&[]);

    deployment
        .cmd(&["status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0"));

    assert!(!deployment.state("cursor.toml").exists());
    assert!(!deployment.state("chargesync.lock").exists());
}

#[test]
fn missing_config_fails() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("chargesync")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error"));
}

#[test]
fn zero_window_is_a_configuration_error() {
    let deployment = Deployment::new(&[1]);
    deployment.write_config("[sync]\nwindow = 0\n");

    deployment
        .cmd(&["run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("sync.window"));
    assert_eq!(deployment.calls(), "");
}

#[test]
fn missing_lock_directory_exits_with_lock_status() {
    let deployment = Deployment::new(&[1]);
    fs::remove_dir_all(deployment.root().join("state")).unwrap();

    deployment.cmd(&["run"]).assert().code(2);
    assert_eq!(deployment.calls(), "");
}

#[test]
fn corrupted_journal_exits_with_integrity_status() {
    let deployment = Deployment::new(&[1]);
    fs::write(
        deployment.state("intent.journal"),
        "sha256:0000:{\"record_id\":1}\n",
    )
    .unwrap();

    deployment
        .cmd(&["run"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("integrity"));
    assert_eq!(deployment.calls(), "");
}

#[test]
fn missing_charger_home_fails_before_charging() {
    let deployment = Deployment::new(&[1]);
    fs::remove_dir_all(deployment.root().join("gold")).unwrap();

    deployment
        .cmd(&["run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}
