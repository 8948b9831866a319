//! Recovery of unfinished transactions after a coordinator restart.
//!
//! Every archive records the epoch of the instance that created it. An archive is left alone
//! while the live instance of its application still runs in that epoch (or an older one); once
//! the directory reports a newer epoch, the creating instance is gone and the archive is handed
//! to the recovery callback. Archives flagged with `error` are always recovered.

use crate::{
    archive::TransactionArchive,
    codec::{DocumentCodec, fields},
    collection::{Document, DocumentCollection, Filter},
    error::{DecodingError, LogError, Result},
    store::VersionSource,
};
use tracing::{debug, error, info, warn};

/// Error type a [`RecoveryCallback`] may fail with.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Receives the archives a recovery pass decides to recover.
pub trait RecoveryCallback {
    fn on_recovered(&mut self, archive: TransactionArchive) -> Result<(), CallbackError>;
}

impl<F> RecoveryCallback for F
where
    F: FnMut(TransactionArchive),
{
    fn on_recovered(&mut self, archive: TransactionArchive) -> Result<(), CallbackError> {
        self(archive);
        Ok(())
    }
}

/// Counts of one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Archives handed to the callback, which accepted them.
    pub recovered: usize,
    /// Archives still owned by a live instance.
    pub skipped: usize,
    /// Archives that could not be decoded, or that the callback rejected.
    pub failed: usize,
}

/// Whether an archive stored in `stored` epoch is still owned by the live instance, which runs
/// in epoch `live` (0 if unknown).
pub fn is_fenced(error: bool, live: u64, stored: u64) -> bool {
    !error && live > 0 && live <= stored
}

enum Verdict {
    Fenced { live: u64, stored: u64 },
    Recover(TransactionArchive),
}

pub struct RecoveryScanner<'a, C: ?Sized> {
    collection: &'a C,
    codec: DocumentCodec<'a>,
    versions: &'a (dyn VersionSource + Send + Sync),
    application: &'a str,
}

impl<'a, C: DocumentCollection + ?Sized> RecoveryScanner<'a, C> {
    pub fn new(
        collection: &'a C,
        codec: DocumentCodec<'a>,
        versions: &'a (dyn VersionSource + Send + Sync),
        application: &'a str,
    ) -> Self {
        Self {
            collection,
            codec,
            versions,
            application,
        }
    }

    /// Scans the coordinator archives of this application.
    ///
    /// A record that cannot be decoded, or that `callback` rejects, is logged, counted as
    /// failed, and the scan moves on. A failure of the scan itself ends the pass with an error.
    pub fn recover(&self, callback: &mut dyn RecoveryCallback) -> Result<RecoverySummary> {
        let filter = Filter::new()
            .eq(fields::SYSTEM, self.application)
            .eq(fields::COORDINATOR, true);
        let cursor = self.collection.find(&filter).inspect_err(|err| {
            error!(application = self.application, error = %err, "cannot scan archives");
        })?;

        let mut summary = RecoverySummary::default();
        for document in cursor {
            let document = document.inspect_err(|err| {
                error!(
                    application = self.application,
                    error = %err,
                    ?summary,
                    "archive scan aborted"
                );
            })?;
            let gxid = document
                .get(fields::GLOBAL)
                .and_then(|value| value.as_str())
                .unwrap_or("<missing>");

            match self.examine(&document) {
                Ok(Verdict::Fenced { live, stored }) => {
                    debug!(gxid, live, stored, "archive owned by a live instance");
                    summary.skipped += 1;
                }
                Ok(Verdict::Recover(archive)) => match callback.on_recovered(archive) {
                    Ok(()) => summary.recovered += 1,
                    Err(err) => {
                        warn!(gxid, error = %err, "recovery callback failed");
                        summary.failed += 1;
                    }
                },
                Err(err) => {
                    warn!(gxid, error = %err, "cannot decode archive, skipping it");
                    summary.failed += 1;
                }
            }
        }

        info!(
            application = self.application,
            recovered = summary.recovered,
            skipped = summary.skipped,
            failed = summary.failed,
            "recovery pass finished"
        );
        Ok(summary)
    }

    fn examine(&self, document: &Document) -> Result<Verdict, LogError> {
        let error = flag(document, fields::ERROR)?;
        let stored = document
            .get(fields::VERSION)
            .ok_or(DecodingError::MissingField(fields::VERSION))?
            .as_u64()
            .ok_or(DecodingError::FieldType {
                field: fields::VERSION,
                expected: "unsigned integer",
            })?;
        let application = document
            .get(fields::SYSTEM)
            .and_then(|value| value.as_str())
            .unwrap_or(self.application);

        let live = self.versions.current_epoch(application);
        if is_fenced(error, live, stored) {
            return Ok(Verdict::Fenced { live, stored });
        }
        Ok(Verdict::Recover(self.codec.decode(document)?))
    }
}

fn flag(document: &Document, field: &'static str) -> Result<bool, DecodingError> {
    document
        .get(field)
        .ok_or(DecodingError::MissingField(field))?
        .as_bool()
        .ok_or(DecodingError::FieldType {
            field,
            expected: "bool",
        })
}
