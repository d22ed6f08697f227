use chargesync_lock::{LockManager, LockOptions, LockPlatform};

use super::{RunSummary, StatePaths, SyncOptions};
use crate::charger::{ChargeOutcome, Charger};
use crate::cursor::{Cursor, CursorStore};
use crate::error::{Error, Result};
use crate::journal::{IntentJournal, JournalWriter};
use crate::ledger::LedgerSource;
use crate::record::UsageRecord;

/// Runs one synchronization pass under the execution lock
#[derive(Debug)]
pub struct SyncEngine<P> {
    lock: LockManager<P>,
    paths: StatePaths,
    options: SyncOptions,
}

/// Records charged in one window and where the cursor goes next
#[derive(Debug, Default)]
struct WindowOutcome {
    max_charged: Option<u64>,
    last_seen: Option<u64>,
}

impl<P: LockPlatform> SyncEngine<P> {
    pub fn new(platform: P, lock_options: LockOptions, paths: StatePaths, options: SyncOptions) -> Self {
        Self {
            lock: LockManager::new(platform, lock_options),
            paths,
            options,
        }
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Run to the end of the ledger as it stood when the run started.
    ///
    /// The lock is released on every path. Charge failures are contained and
    /// counted in the summary; lock, journal, cursor and collaborator errors
    /// abort the run without committing the window in progress.
    pub fn run<L, C>(&self, ledger: &L, charger: &mut C) -> Result<RunSummary>
    where
        L: LedgerSource + ?Sized,
        C: Charger + ?Sized,
    {
        let span = tracing::info_span!("sync", scope = %self.options.scope);
        let _enter = span.enter();

        let guard = self.lock.acquire(&self.paths.lock)?;
        tracing::debug!(path = %guard.path().display(), "Execution lock held");

        let outcome = self.run_locked(ledger, charger);
        let released = guard.release();

        match (outcome, released) {
            (Ok(summary), Ok(())) => Ok(summary),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(release_error)) => {
                tracing::warn!(error = %release_error, "Failed to release execution lock");
                Err(e)
            }
        }
    }

    fn run_locked<L, C>(&self, ledger: &L, charger: &mut C) -> Result<RunSummary>
    where
        L: LedgerSource + ?Sized,
        C: Charger + ?Sized,
    {
        let mut summary = RunSummary::default();

        charger.prepare()?;

        let (mut writer, report) = IntentJournal::new(&self.paths.journal).reconcile(charger)?;
        summary.refunds_issued = report.issued();
        summary.refund_failures = report.refund_failures;

        let store = CursorStore::new(&self.paths.cursor);
        let mut cursor = self.load_cursor(&store)?;
        summary.final_cursor = cursor.last_successful_id;

        let (Some(min_id), Some(max_id)) = (ledger.min_id()?, ledger.max_id()?) else {
            tracing::info!("Ledger is empty; nothing to charge");
            return Ok(summary);
        };
        if cursor.advance(min_id) {
            tracing::debug!(min_id, "Cursor behind the ledger; starting at its first record");
        }

        let window = self.options.window.max(1);
        let mut streak = 0usize;

        while cursor.last_successful_id <= max_id {
            let from = cursor.last_successful_id;
            let to = from.saturating_add(window);
            let window_span = tracing::debug_span!("window", from, to);
            let _window = window_span.enter();

            let records = self.fetch(ledger, from, to)?;
            summary.windows += 1;
            tracing::debug!(count = records.len(), "Fetched window");

            let outcome = self.drain(&records, &mut writer, charger, &mut summary, &mut streak)?;
            let next = match outcome {
                WindowOutcome {
                    max_charged: Some(id),
                    ..
                } => id.saturating_add(1),
                WindowOutcome {
                    last_seen: Some(id),
                    ..
                } => id.saturating_add(1),
                _ => to,
            };

            if !cursor.advance(next) {
                tracing::warn!(from, next, "Cursor cannot move further");
                break;
            }
            store.save(&cursor)?;
            writer.settle()?;
            summary.final_cursor = cursor.last_successful_id;
        }

        tracing::info!(
            charged = summary.records_charged,
            failed = summary.charge_failures,
            refunds = summary.refunds_issued,
            windows = summary.windows,
            cursor = summary.final_cursor,
            "Synchronization finished"
        );
        if summary.longest_failure_streak > 1 {
            tracing::warn!(
                streak = summary.longest_failure_streak,
                "Consecutive charge failures"
            );
        }
        Ok(summary)
    }

    fn load_cursor(&self, store: &CursorStore) -> Result<Cursor> {
        let mut cursor = store.load()?;
        if cursor.scope_name != self.options.scope {
            if !cursor.scope_name.is_empty() {
                tracing::warn!(
                    previous = %cursor.scope_name,
                    position = cursor.last_successful_id,
                    "Scope changed; keeping cursor position"
                );
            }
            cursor.scope_name = self.options.scope.clone();
        }
        Ok(cursor)
    }

    /// Fetch `[from, to)` in ascending order, dropping anything outside it.
    fn fetch<L>(&self, ledger: &L, from: u64, to: u64) -> Result<Vec<UsageRecord>>
    where
        L: LedgerSource + ?Sized,
    {
        let mut records = ledger.fetch_window(&self.options.scope, from, to - from)?;
        records.sort_by_key(|r| r.record_id);
        records.dedup_by_key(|r| r.record_id);
        records.retain(|r| {
            let inside = (from..to).contains(&r.record_id);
            if !inside {
                tracing::warn!(record_id = r.record_id, "Ledger returned a record outside the window");
            }
            inside
        });
        Ok(records)
    }

    fn drain<C>(
        &self,
        records: &[UsageRecord],
        writer: &mut JournalWriter,
        charger: &mut C,
        summary: &mut RunSummary,
        streak: &mut usize,
    ) -> Result<WindowOutcome>
    where
        C: Charger + ?Sized,
    {
        let mut outcome = WindowOutcome::default();

        for record in records {
            outcome.last_seen = Some(record.record_id);
            let intent = writer.append(record)?;

            match charger.charge(record)? {
                ChargeOutcome::Succeeded => {
                    writer.confirm(intent);
                    outcome.max_charged = Some(record.record_id);
                    summary.records_charged += 1;
                    *streak = 0;
                    tracing::debug!(record_id = record.record_id, "Charged");
                }
                ChargeOutcome::Failed { reason } => {
                    let failure = Error::ChargeFailure {
                        record_id: record.record_id,
                        reason,
                    };
                    tracing::error!(error = %failure, "Charge failed; leaving intent for refund");
                    summary.charge_failures += 1;
                    *streak += 1;
                    summary.longest_failure_streak = summary.longest_failure_streak.max(*streak);
                }
            }
        }
        Ok(outcome)
    }
}
