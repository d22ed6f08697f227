use std::path::{Path, PathBuf};
use std::sync::Arc;

use chargesync_core::{LedgerSource, RawUsageRecord, UsageRecord};
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, OpenFlags, Row, params};

use crate::error::{LedgerError, Result};
use crate::query;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Usage database opened read-only
pub struct SqliteLedger {
    conn: Connection,
    path: PathBuf,
}

impl std::fmt::Debug for SqliteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLedger").field("path", &self.path).finish()
    }
}

impl SqliteLedger {
    /// Open an existing database without write access.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| LedgerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn, path)
    }

    /// Wrap an already open connection, e.g. an in-memory database.
    pub fn from_connection(conn: Connection, path: impl Into<PathBuf>) -> Result<Self> {
        register_regexp(&conn)?;
        let path = path.into();
        tracing::debug!(path = %path.display(), "Usage database opened");
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bounds(&self) -> Result<(Option<u64>, Option<u64>)> {
        let (min, max): (Option<i64>, Option<i64>) = self
            .conn
            .query_row(query::BOUNDS, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok((min.map(to_id).transpose()?, max.map(to_id).transpose()?))
    }

    fn window(&self, scope: &str, from_id: u64, window_size: u64) -> Result<Vec<UsageRecord>> {
        let from = i64::try_from(from_id).unwrap_or(i64::MAX);
        let to = i64::try_from(from_id.saturating_add(window_size)).unwrap_or(i64::MAX);

        let mut stmt = self.conn.prepare_cached(query::WINDOW)?;
        let rows = stmt.query_map(params![from, to, scope], row_to_raw)?;

        let mut records = Vec::new();
        for row in rows {
            let (dbid, mut raw) = row?;
            raw.record_id = to_id(dbid)?;
            records.push(UsageRecord::from(raw));
        }
        tracing::debug!(from = from_id, to = to, count = records.len(), "Queried usage window");
        Ok(records)
    }
}

impl LedgerSource for SqliteLedger {
    fn min_id(&self) -> chargesync_core::Result<Option<u64>> {
        Ok(self.bounds()?.0)
    }

    fn max_id(&self) -> chargesync_core::Result<Option<u64>> {
        Ok(self.bounds()?.1)
    }

    fn fetch_window(
        &self,
        scope: &str,
        from_id: u64,
        window_size: u64,
    ) -> chargesync_core::Result<Vec<UsageRecord>> {
        Ok(self.window(scope, from_id, window_size)?)
    }
}

fn to_id(dbid: i64) -> Result<u64> {
    u64::try_from(dbid).map_err(|_| LedgerError::NegativeIdentifier(dbid))
}

fn row_to_raw(row: &Row<'_>) -> rusqlite::Result<(i64, RawUsageRecord)> {
    let raw = RawUsageRecord {
        record_id: 0,
        resource_type: row.get(1)?,
        scope_name: row.get(2)?,
        local_user: row.get(3)?,
        charge_amount: row.get(4)?,
        wall_duration: row.get(5)?,
        cpu_time: row.get(6)?,
        node_count: row.get(7)?,
        job_count: row.get(8)?,
        processors: row.get(9)?,
        end_time: row.get(10)?,
        machine_name: row.get(11)?,
        project_name: row.get(12)?,
    };
    Ok((row.get(0)?, raw))
}

/// Install `regexp(pattern, text)` so that `text REGEXP pattern` works.
///
/// The compiled pattern is cached per statement; NULL text never matches.
fn register_regexp(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |value| -> std::result::Result<_, BoxError> {
                Ok(Regex::new(value.as_str()?)?)
            })?;
            let Some(text) = ctx.get::<Option<String>>(1)? else {
                return Ok(false);
            };
            Ok(pattern.is_match(&text))
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> SqliteLedger {
        SqliteLedger::from_connection(Connection::open_in_memory().unwrap(), ":memory:").unwrap()
    }

    #[test]
    fn regexp_matches_by_search() {
        let ledger = memory();
        let hit: bool = ledger
            .conn
            .query_row("SELECT 'osg-atlas' REGEXP '^osg-'", [], |row| row.get(0))
            .unwrap();
        let miss: bool = ledger
            .conn
            .query_row("SELECT 'cms' REGEXP '^osg-'", [], |row| row.get(0))
            .unwrap();
        let null: bool = ledger
            .conn
            .query_row("SELECT NULL REGEXP '.*'", [], |row| row.get(0))
            .unwrap();

        assert!(hit);
        assert!(!miss);
        assert!(!null);
    }

    #[test]
    fn negative_identifiers_are_rejected() {
        assert!(matches!(to_id(-1), Err(LedgerError::NegativeIdentifier(-1))));
        assert_eq!(to_id(7).unwrap(), 7);
    }
}
