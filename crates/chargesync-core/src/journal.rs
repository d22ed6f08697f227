//! Append-only intent journal with compensating-refund replay
//!
//! Before a record is charged, its serialized form is appended to the journal
//! as a `<checksum>:<payload>` line and flushed to disk. If the process dies
//! before the window containing that record is committed, the next run finds
//! the line and refunds it.
//!
//! Refunds issued during reconciliation are tracked by appending the same
//! line to a confirmation log (`<journal>.refund`). Only the number of lines
//! in the confirmation log matters: a reconciliation interrupted halfway
//! resumes after the last confirmed line instead of refunding from the top.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use chargesync_fs::{checksum, io};

use crate::charger::{ChargeOutcome, Charger};
use crate::error::{Error, Result};
use crate::record::UsageRecord;

/// Suffix of the confirmation log next to the journal
const CONFIRMATION_SUFFIX: &str = "refund";

/// Counts from one reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Lines already refunded by an earlier, interrupted pass
    pub already_confirmed: usize,
    /// Refunds the charger reported as successful
    pub refunded: usize,
    /// Refunds the charger reported as failed (still confirmed)
    pub refund_failures: usize,
}

impl ReconcileReport {
    /// Refund calls issued during this pass
    pub fn issued(&self) -> usize {
        self.refunded + self.refund_failures
    }
}

/// Location of the journal and its confirmation log
#[derive(Debug, Clone)]
pub struct IntentJournal {
    journal_path: PathBuf,
    confirmation_path: PathBuf,
}

impl IntentJournal {
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        let journal_path = journal_path.into();
        let mut confirmation = journal_path.clone().into_os_string();
        confirmation.push(".");
        confirmation.push(CONFIRMATION_SUFFIX);

        Self {
            journal_path,
            confirmation_path: PathBuf::from(confirmation),
        }
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn confirmation_path(&self) -> &Path {
        &self.confirmation_path
    }

    /// Number of journal lines not yet covered by the confirmation log.
    pub fn pending_count(&self) -> Result<usize> {
        let journaled = io::count_lines(&self.journal_path)?;
        let confirmed = io::count_lines(&self.confirmation_path)?;
        Ok(journaled.saturating_sub(confirmed))
    }

    /// Refund every unconfirmed intent left by a previous run, then start a
    /// fresh journal.
    ///
    /// Each refund is confirmed whether or not the charger reports success;
    /// a duplicate refund is preferred over a charge nobody reverses.
    ///
    /// # Errors
    ///
    /// [`Error::Integrity`] if a line does not verify against its checksum or
    /// does not decode. Errors from the charger abort reconciliation before
    /// the affected line is confirmed.
    pub fn reconcile<C>(&self, charger: &mut C) -> Result<(JournalWriter, ReconcileReport)>
    where
        C: Charger + ?Sized,
    {
        let mut report = ReconcileReport::default();

        let journal = match File::open(&self.journal_path) {
            Ok(file) => file,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) => {
                tracing::debug!(
                    path = %self.journal_path.display(),
                    "No readable journal; nothing to reconcile"
                );
                // A crash between the two removals below leaves a stale log
                io::remove_if_exists(&self.confirmation_path)?;
                return Ok((JournalWriter::create(&self.journal_path)?, report));
            }
            Err(e) => return Err(Error::io(&self.journal_path, e)),
        };

        report.already_confirmed = io::count_lines(&self.confirmation_path)?;
        if report.already_confirmed > 0 {
            tracing::info!(
                confirmed = report.already_confirmed,
                "Resuming interrupted reconciliation"
            );
        }

        let mut confirmations = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.confirmation_path)
            .map_err(|e| Error::io(&self.confirmation_path, e))?;

        for (index, bytes) in BufReader::new(journal).split(b'\n').enumerate() {
            let bytes = bytes.map_err(|e| Error::io(&self.journal_path, e))?;
            let line_number = index + 1;
            if line_number <= report.already_confirmed {
                continue;
            }

            let line = self.line_text(bytes, line_number)?;
            let record = self.decode_line(&line, line_number)?;
            match charger.refund(record.record_id)? {
                ChargeOutcome::Succeeded => {
                    tracing::info!(record_id = record.record_id, "Refunded unsettled charge");
                    report.refunded += 1;
                }
                ChargeOutcome::Failed { reason } => {
                    tracing::error!(record_id = record.record_id, %reason, "Refund failed");
                    report.refund_failures += 1;
                }
            }

            io::append_line_durable(&mut confirmations, &self.confirmation_path, &line)?;
        }
        drop(confirmations);

        // Everything is compensated; the intents are no longer needed
        io::remove_if_exists(&self.journal_path)?;
        io::remove_if_exists(&self.confirmation_path)?;

        if report.issued() > 0 {
            tracing::info!(
                refunded = report.refunded,
                failed = report.refund_failures,
                "Journal reconciled"
            );
        }
        Ok((JournalWriter::create(&self.journal_path)?, report))
    }

    /// Text of a raw journal line; corruption can leave bytes that are not
    /// UTF-8, which is an integrity failure like any other.
    fn line_text(&self, mut bytes: Vec<u8>, line_number: usize) -> Result<String> {
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8(bytes).map_err(|e| Error::Integrity {
            path: self.journal_path.clone(),
            line: line_number,
            reason: format!("not valid UTF-8: {}", e.utf8_error()),
        })
    }

    fn decode_line(&self, line: &str, line_number: usize) -> Result<UsageRecord> {
        let integrity = |reason: String| Error::Integrity {
            path: self.journal_path.clone(),
            line: line_number,
            reason,
        };

        let (expected, payload) = checksum::split_line(line)
            .ok_or_else(|| integrity(format!("not a checksummed entry: {line}")))?;

        let actual = checksum::compute_content_checksum(payload);
        if actual != expected {
            return Err(integrity(format!(
                "checksum mismatch ({expected} != {actual}): {line}"
            )));
        }

        UsageRecord::from_payload(payload)
            .map_err(|e| integrity(format!("payload does not decode: {e}")))
    }
}

/// Position of an intent within the current journal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentId(usize);

#[derive(Debug)]
struct PendingIntent {
    record_id: u64,
    line: String,
    charged: bool,
}

/// Handle for appending intents during a run.
///
/// Mirrors the journal file in memory so that a commit can compact the file
/// down to the intents whose charge did not succeed.
#[derive(Debug)]
pub struct JournalWriter {
    file: File,
    path: PathBuf,
    intents: Vec<PendingIntent>,
}

impl JournalWriter {
    /// Open an empty journal, truncating whatever is at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::io(path, e))?;
        file.sync_all().map_err(|e| Error::io(path, e))?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            intents: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Intents currently in the journal file
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// Durably record the intent to charge `record`.
    ///
    /// Returns only after the line is on disk; the caller may then charge.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRecord`] if the record does not serialize to a single
    /// line.
    pub fn append(&mut self, record: &UsageRecord) -> Result<IntentId> {
        let invalid = |reason: String| Error::InvalidRecord {
            record_id: record.record_id,
            reason,
        };

        let payload = record
            .to_payload()
            .map_err(|e| invalid(format!("serialization failed: {e}")))?;
        if payload.contains('\n') || payload.contains('\r') {
            return Err(invalid("serialized form spans multiple lines".into()));
        }

        let line = checksum::frame_line(&payload);
        io::append_line_durable(&mut self.file, &self.path, &line)?;

        self.intents.push(PendingIntent {
            record_id: record.record_id,
            line,
            charged: false,
        });
        Ok(IntentId(self.intents.len() - 1))
    }

    /// Mark an intent as successfully charged.
    ///
    /// Earlier intents for the same record (failed attempts retried in a
    /// later window) are settled along with it, since a refund for any of
    /// them would reverse this charge. Lines stay in the journal until the
    /// next [`settle`](Self::settle).
    pub fn confirm(&mut self, id: IntentId) {
        let Some(record_id) = self.intents.get(id.0).map(|i| i.record_id) else {
            return;
        };
        for intent in self.intents[..=id.0]
            .iter_mut()
            .filter(|i| i.record_id == record_id)
        {
            intent.charged = true;
        }
    }

    /// Drop confirmed intents from the journal file.
    ///
    /// Only call this once the cursor covering those records has been saved;
    /// intents whose charge failed are kept for the next reconciliation.
    /// Returns the number of intents left in the journal.
    pub fn settle(&mut self) -> Result<usize> {
        if self.intents.iter().all(|i| !i.charged) {
            return Ok(self.intents.len());
        }

        self.intents.retain(|i| !i.charged);
        let mut content = String::new();
        for intent in &self.intents {
            content.push_str(&intent.line);
            content.push('\n');
        }

        io::write_atomic(&self.path, content.as_bytes())?;
        // The rename replaced the inode behind the old handle
        self.file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::io(&self.path, e))?;

        tracing::debug!(retained = self.intents.len(), "Journal settled");
        Ok(self.intents.len())
    }
}
