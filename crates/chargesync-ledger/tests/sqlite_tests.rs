use chargesync_core::LedgerSource;
use chargesync_ledger::{LedgerError, SqliteLedger};
use pretty_assertions::assert_eq;
use rstest::rstest;
use rusqlite::{Connection, params};
use tempfile::TempDir;

const SCHEMA: &str = r#"
CREATE TABLE JobUsageRecord (
    dbid INTEGER PRIMARY KEY,
    ResourceType TEXT,
    LocalUserId TEXT,
    Charge TEXT,
    WallDuration TEXT,
    CpuUserDuration TEXT,
    CpuSystemDuration TEXT,
    NodeCount TEXT,
    Njobs TEXT,
    Processors TEXT,
    EndTime TEXT,
    MachineName TEXT,
    ProjectName TEXT
);
CREATE TABLE JobUsageRecord_Meta (
    dbid INTEGER PRIMARY KEY,
    ProbeName TEXT
);
"#;

struct Job<'a> {
    dbid: i64,
    probe: &'a str,
    user: &'a str,
    wall: Option<&'a str>,
    processors: Option<&'a str>,
    end_time: &'a str,
    project: Option<&'a str>,
}

fn job(dbid: i64, probe: &'static str, user: &'static str) -> Job<'static> {
    Job {
        dbid,
        probe,
        user,
        wall: Some("100"),
        processors: Some("4"),
        end_time: "2026-03-01 10:00:00",
        project: Some("physics"),
    }
}

fn database(jobs: &[Job<'_>]) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("usage.db");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch(SCHEMA).unwrap();
    for job in jobs {
        conn.execute(
            "INSERT INTO JobUsageRecord
                (dbid, ResourceType, LocalUserId, WallDuration, CpuUserDuration,
                 CpuSystemDuration, NodeCount, Njobs, Processors, EndTime,
                 MachineName, ProjectName)
             VALUES (?1, 'Batch', ?2, ?3, 10, 5, 1, 1, ?4, ?5, 'cluster-a', ?6)",
            params![job.dbid, job.user, job.wall, job.processors, job.end_time, job.project],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO JobUsageRecord_Meta (dbid, ProbeName) VALUES (?1, ?2)",
            params![job.dbid, job.probe],
        )
        .unwrap();
    }
    (dir, path)
}

#[test]
fn bounds_cover_the_whole_ledger() {
    let (_dir, path) = database(&[job(3, "osg:atlas", "alice"), job(90, "cms", "bob")]);
    let ledger = SqliteLedger::open(&path).unwrap();

    assert_eq!(ledger.min_id().unwrap(), Some(3));
    assert_eq!(ledger.max_id().unwrap(), Some(90));
}

#[test]
fn empty_ledger_has_no_bounds() {
    let (_dir, path) = database(&[]);
    let ledger = SqliteLedger::open(&path).unwrap();

    assert_eq!(ledger.min_id().unwrap(), None);
    assert_eq!(ledger.max_id().unwrap(), None);
    assert!(ledger.fetch_window(".*", 0, 100).unwrap().is_empty());
}

#[test]
fn jobs_are_summarized_per_charging_dimension() {
    let (_dir, path) = database(&[
        job(1, "osg:atlas", "alice"),
        job(2, "osg:atlas", "alice"),
        job(3, "osg:atlas", "bob"),
        Job {
            end_time: "2026-03-02 09:00:00",
            ..job(4, "osg:atlas", "alice")
        },
    ]);
    let ledger = SqliteLedger::open(&path).unwrap();

    let records = ledger.fetch_window("atlas", 0, 100).unwrap();

    let ids: Vec<u64> = records.iter().map(|r| r.record_id).collect();
    assert_eq!(ids, vec![2, 3, 4]);

    let alice = &records[0];
    assert_eq!(alice.local_user, "alice");
    assert_eq!(alice.wall_duration, "200");
    // No explicit charge recorded; wall duration is charged
    assert_eq!(alice.charge_amount, "200");
    assert_eq!(alice.cpu_time, "30");
    assert_eq!(alice.job_count, "2");
    assert_eq!(alice.processors, "4");
    assert_eq!(alice.machine_name, "cluster-a");
    assert_eq!(alice.project_name.as_deref(), Some("physics"));
    assert_eq!(alice.scope_name, "osg:atlas");
}

#[test]
fn window_is_half_open() {
    let (_dir, path) = database(&[
        job(10, "atlas", "a"),
        job(19, "atlas", "b"),
        job(20, "atlas", "c"),
    ]);
    let ledger = SqliteLedger::open(&path).unwrap();

    let ids: Vec<u64> = ledger
        .fetch_window("atlas", 10, 10)
        .unwrap()
        .iter()
        .map(|r| r.record_id)
        .collect();

    assert_eq!(ids, vec![10, 19]);
}

#[rstest]
#[case("^osg:", vec![1])]
#[case("cms", vec![2])]
#[case(".*", vec![1, 2])]
#[case("^nothing$", vec![])]
fn scope_is_a_regular_expression(#[case] scope: &str, #[case] expected: Vec<u64>) {
    let (_dir, path) = database(&[job(1, "osg:atlas", "alice"), job(2, "cms", "bob")]);
    let ledger = SqliteLedger::open(&path).unwrap();

    let ids: Vec<u64> = ledger
        .fetch_window(scope, 0, 100)
        .unwrap()
        .iter()
        .map(|r| r.record_id)
        .collect();

    assert_eq!(ids, expected);
}

#[test]
fn malformed_numbers_are_normalized() {
    let (_dir, path) = database(&[Job {
        wall: Some("4L"),
        processors: None,
        project: None,
        ..job(1, "atlas", "alice")
    }]);
    let ledger = SqliteLedger::open(&path).unwrap();

    let record = ledger.fetch_window("atlas", 0, 10).unwrap().remove(0);

    assert_eq!(record.wall_duration, "4");
    assert_eq!(record.processors, "1");
    assert_eq!(record.project_name, None);
}

#[test]
fn missing_database_is_an_open_error() {
    let dir = TempDir::new().unwrap();
    let err = SqliteLedger::open(dir.path().join("absent.db")).unwrap_err();

    assert!(matches!(err, LedgerError::Open { .. }));
}

#[test]
fn ledger_errors_surface_as_collaborator_unavailable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("no-tables.db");
    Connection::open(&path).unwrap();
    let ledger = SqliteLedger::open(&path).unwrap();

    let err = ledger.max_id().unwrap_err();

    assert!(matches!(
        err,
        chargesync_core::Error::CollaboratorUnavailable {
            collaborator: "ledger",
            ..
        }
    ));
}
