//! The transaction log proper.
//!
//! Every operation is a single command against one archive document, addressed by its global
//! key and owning application. Branch writes target one dotted path (`participants.<key>` or
//! `compensables.<key>`) so that writes to different branches of one archive never overwrite
//! each other.
//!
//! Write faults are returned to the caller and, since the durable log may now disagree with the
//! in-memory transaction, also reported to the [`TransactionManagerControl`] so that the
//! transaction can be forced towards rollback. Deleting a finished transaction is the one
//! exception: a leftover archive is picked up by recovery later, so faults there are only
//! logged.

use crate::{
    archive::{CompensableRecord, ParticipantRecord, TransactionArchive},
    codec::{DocumentCodec, compensable_path, fields, participant_path},
    collection::{DocumentCollection, Filter, Update},
    config::{Endpoint, LogStoreConfig},
    error::{EncodingError, LogError, Result},
    index::IndexManager,
    recovery::{RecoveryCallback, RecoveryScanner, RecoverySummary},
    registry::{MethodRegistry, ResourceDescriptorRegistry},
    xid::Xid,
};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The external instance-version directory.
pub trait VersionSource {
    /// The epoch of the live instance of `application`, or 0 when none is known.
    fn current_epoch(&self, application: &str) -> u64;
}

/// The transaction manager on whose behalf the log is written.
pub trait TransactionManagerControl {
    /// Forces the transaction that caused `fault` towards rollback.
    ///
    /// The fault's [`kind`](LogError::kind) is passed along so the manager can choose a policy
    /// per kind.
    fn mark_rollback_only(&self, fault: &LogError);
}

/// Everything a [`TransactionLogStore`] talks to besides its collection.
#[derive(Clone)]
pub struct Collaborators {
    pub versions: Arc<dyn VersionSource + Send + Sync>,
    pub control: Arc<dyn TransactionManagerControl + Send + Sync>,
    pub descriptors: Arc<dyn ResourceDescriptorRegistry + Send + Sync>,
    pub methods: Arc<dyn MethodRegistry + Send + Sync>,
}

pub struct TransactionLogStore<C> {
    collection: C,
    config: LogStoreConfig,
    collaborators: Collaborators,
}

impl<C: DocumentCollection> TransactionLogStore<C> {
    pub fn new(collection: C, config: LogStoreConfig, collaborators: Collaborators) -> Self {
        Self {
            collection,
            config,
            collaborators,
        }
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn config(&self) -> &LogStoreConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.config.endpoint
    }

    /// The application this store writes and recovers archives for.
    pub fn application(&self) -> &str {
        self.config.endpoint.application()
    }

    fn codec(&self) -> DocumentCodec<'_> {
        DocumentCodec::new(
            &*self.collaborators.descriptors,
            &*self.collaborators.methods,
        )
    }

    fn filter(&self, xid: &Xid) -> Filter {
        Filter::new()
            .eq(fields::GLOBAL, xid.global_key())
            .eq(fields::SYSTEM, self.application())
    }

    /// Startup hook: ensures the indexes unless disabled in the configuration.
    pub fn initialize(&self) -> Result<()> {
        let namespace = self.config.namespace();
        if self.config.initialize_enabled {
            debug!(%namespace, "checking indexes");
            self.ensure_indexes()
        } else {
            debug!(%namespace, "index initialization disabled");
            Ok(())
        }
    }

    pub fn ensure_indexes(&self) -> Result<()> {
        IndexManager::new(&self.collection).ensure_indexes()
    }

    /// Stores a new archive, stamped with this endpoint and the current epoch of this
    /// application.
    ///
    /// A second archive for the same global transaction and application is rejected by the
    /// unique index with [`LogError::DuplicateKey`].
    pub fn create_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        let result = self.try_create_transaction(archive);
        self.escalate("create_transaction", &archive.xid, result)
    }

    fn try_create_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        let application = self.application();
        let epoch = self.collaborators.versions.current_epoch(application);
        if epoch == 0 {
            return Err(LogError::EpochUnavailable(application.to_string()));
        }

        let mut stamped = self.stamped(archive);
        stamped.epoch = epoch;
        stamped.error = false;
        stamped.created_by = Some(self.endpoint().to_string());

        let document = self.codec().encode(&stamped)?;
        self.collection.insert_one(document)?;
        debug!(gxid = %archive.xid.global_key(), application, epoch, "created transaction");
        Ok(())
    }

    /// Rewrites the mutable fields of a stored archive, branches included.
    pub fn update_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        let result = self.try_update_transaction(archive);
        self.escalate("update_transaction", &archive.xid, result)
    }

    fn try_update_transaction(&self, archive: &TransactionArchive) -> Result<()> {
        let document = self.codec().encode_update(&self.stamped(archive))?;
        let outcome = self
            .collection
            .update_one(&self.filter(&archive.xid), &Update::set_all(document))?;
        expect_one("update_transaction", outcome.matched)?;
        debug!(gxid = %archive.xid.global_key(), "updated transaction");
        Ok(())
    }

    /// Removes a finished archive. Faults are logged and never returned.
    pub fn delete_transaction(&self, archive: &TransactionArchive) {
        let gxid = archive.xid.global_key();
        match self.collection.delete_one(&self.filter(&archive.xid)) {
            Ok(outcome) if outcome.deleted == 1 => debug!(%gxid, "deleted transaction"),
            Ok(outcome) => warn!(
                %gxid,
                matched = outcome.deleted,
                "delete_transaction matched no archive"
            ),
            Err(err) => warn!(%gxid, error = %err, "delete_transaction failed"),
        }
    }

    pub fn create_participant(&self, record: &ParticipantRecord) -> Result<()> {
        let result = self.put_participant(record);
        self.escalate("create_participant", &record.xid, result)
    }

    pub fn update_participant(&self, record: &ParticipantRecord) -> Result<()> {
        let result = self.put_participant(record);
        self.escalate("update_participant", &record.xid, result)
    }

    fn put_participant(&self, record: &ParticipantRecord) -> Result<()> {
        let key = branch_key(&record.xid, "participant")?;
        let stamped = ParticipantRecord {
            modified_by: Some(self.endpoint().to_string()),
            ..record.clone()
        };
        let entry = self.codec().encode_participant(&stamped, self.application())?;
        let update = Update::new().set(participant_path(&key), entry);
        let outcome = self.collection.update_one(&self.filter(&record.xid), &update)?;
        expect_one("put_participant", outcome.matched)?;
        debug!(gxid = %record.xid.global_key(), bxid = %key, "stored participant");
        Ok(())
    }

    /// Removes one participant branch, leaving the rest of the archive alone.
    pub fn delete_participant(&self, xid: &Xid) -> Result<()> {
        let result = self.try_delete_participant(xid);
        self.escalate("delete_participant", xid, result)
    }

    fn try_delete_participant(&self, xid: &Xid) -> Result<()> {
        let key = branch_key(xid, "participant")?;
        let update = Update::new().unset(participant_path(&key));
        let outcome = self.collection.update_one(&self.filter(xid), &update)?;
        expect_one("delete_participant", outcome.matched)?;
        debug!(gxid = %xid.global_key(), bxid = %key, "deleted participant");
        Ok(())
    }

    pub fn create_compensable(&self, record: &CompensableRecord) -> Result<()> {
        let result = self.put_compensable(record);
        self.escalate("create_compensable", &record.xid, result)
    }

    pub fn update_compensable(&self, record: &CompensableRecord) -> Result<()> {
        let result = self.put_compensable(record);
        self.escalate("update_compensable", &record.xid, result)
    }

    fn put_compensable(&self, record: &CompensableRecord) -> Result<()> {
        let key = branch_key(&record.xid, "compensable")?;
        let endpoint = self.endpoint().to_string();
        let stamped = CompensableRecord {
            created_by: record.created_by.clone().or_else(|| Some(endpoint.clone())),
            modified_by: Some(endpoint),
            ..record.clone()
        };
        let entry = self.codec().encode_compensable(&stamped, self.application())?;
        let update = Update::new().set(compensable_path(&key), entry);
        let outcome = self.collection.update_one(&self.filter(&record.xid), &update)?;
        expect_one("put_compensable", outcome.matched)?;
        debug!(gxid = %record.xid.global_key(), bxid = %key, "stored compensable");
        Ok(())
    }

    /// Hands every archive of this application that is not fenced by a live epoch to
    /// `callback`. See [`RecoveryScanner`].
    pub fn recover(&self, callback: &mut dyn RecoveryCallback) -> Result<RecoverySummary> {
        RecoveryScanner::new(
            &self.collection,
            self.codec(),
            &*self.collaborators.versions,
            self.application(),
        )
        .recover(callback)
    }

    /// `archive` as written by this endpoint.
    fn stamped(&self, archive: &TransactionArchive) -> TransactionArchive {
        let endpoint = self.endpoint().to_string();
        let mut stamped = archive.clone();
        stamped.application = self.application().to_string();
        stamped.modified_by = Some(endpoint.clone());
        for branch in stamped.participants.values_mut() {
            branch.modified_by = Some(endpoint.clone());
        }
        for branch in stamped.compensables.values_mut() {
            branch.created_by.get_or_insert_with(|| endpoint.clone());
            branch.modified_by = Some(endpoint.clone());
        }
        stamped
    }

    fn escalate<T>(&self, operation: &'static str, xid: &Xid, result: Result<T>) -> Result<T> {
        result.inspect_err(|err| {
            error!(
                operation,
                gxid = %xid.global_key(),
                bxid = xid.branch_key().as_deref(),
                kind = ?err.kind(),
                error = %err,
                "transaction log write failed, marking transaction rollback-only"
            );
            self.collaborators.control.mark_rollback_only(err);
        })
    }
}

fn expect_one(operation: &'static str, matched: u64) -> Result<()> {
    if matched == 1 {
        Ok(())
    } else {
        Err(LogError::Consistency { operation, matched })
    }
}

fn branch_key(xid: &Xid, what: &'static str) -> Result<String> {
    xid.branch_id()
        .filter(|branch| !branch.is_empty())
        .map(crate::xid::encode)
        .ok_or_else(|| EncodingError::EmptyBranch(what).into())
}
