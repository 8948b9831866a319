//! In-memory form of a persisted global transaction.
//!
//! A [`TransactionArchive`] is what the TCC engine hands to the log and what recovery hands
//! back. Branch records live in [`BranchMap`]s keyed by branch identifier, which is the shape
//! they have in storage as well: one entry per branch, each entry independently replaceable.

use crate::{timestamp::Timestamp, value::Value, xid::Xid};
use std::collections::BTreeMap;

/// Branch records of one category, keyed by branch identifier.
///
/// Iteration order is the byte order of the branch identifiers.
#[derive(Clone, PartialEq)]
pub struct BranchMap<R>(BTreeMap<Vec<u8>, R>);

impl<R> Default for BranchMap<R> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<R> BranchMap<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, branch: &[u8]) -> Option<&R> {
        self.0.get(branch)
    }

    pub fn remove(&mut self, branch: &[u8]) -> Option<R> {
        self.0.remove(branch)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &R)> {
        self.0.iter().map(|(k, v)| (k.as_slice(), v))
    }

    pub fn values(&self) -> impl Iterator<Item = &R> {
        self.0.values()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut R> {
        self.0.values_mut()
    }
}

impl<R: Branch> BranchMap<R> {
    /// Inserts `record` under its own branch identifier, returning the record it replaced.
    ///
    /// A record without a branch identifier lands under the empty key, which the codec
    /// refuses to encode.
    pub fn insert(&mut self, record: R) -> Option<R> {
        let branch = record.xid().branch_id().unwrap_or_default().to_vec();
        self.0.insert(branch, record)
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for BranchMap<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(k, v)| (crate::xid::encode(k), v)))
            .finish()
    }
}

/// A record owned by one branch of a global transaction.
pub trait Branch {
    fn xid(&self) -> &Xid;
}

/// The persisted state of one global transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionArchive {
    pub xid: Xid,
    /// Owning application. Stamped by the log on every write.
    pub application: String,
    pub status: i32,
    pub compensable: bool,
    pub coordinator: bool,
    pub propagated: bool,
    pub propagated_by: Option<String>,
    pub variables: BTreeMap<String, Value>,
    pub recovered_at: Option<Timestamp>,
    pub recovered_times: i32,
    pub participants: BranchMap<ParticipantRecord>,
    pub compensables: BranchMap<CompensableRecord>,
    /// Instance version of the creator. Written once, when the archive is first stored.
    pub epoch: u64,
    pub error: bool,
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
}

impl TransactionArchive {
    /// An empty archive for the global transaction `xid`.
    pub fn new(xid: Xid) -> Self {
        Self {
            xid: xid.to_global(),
            application: String::new(),
            status: 0,
            compensable: false,
            coordinator: false,
            propagated: false,
            propagated_by: None,
            variables: BTreeMap::new(),
            recovered_at: None,
            recovered_times: 0,
            participants: BranchMap::new(),
            compensables: BranchMap::new(),
            epoch: 0,
            error: false,
            created_by: None,
            modified_by: None,
        }
    }

    /// Adds or replaces a participant, keyed by its branch identifier.
    ///
    /// Records without a branch identifier are not branches and are ignored.
    pub fn put_participant(&mut self, record: ParticipantRecord) {
        if record.xid.branch_id().is_some() {
            self.participants.insert(record);
        }
    }

    /// Adds or replaces a compensable record, keyed by its branch identifier.
    ///
    /// Records without a branch identifier are not branches and are ignored.
    pub fn put_compensable(&mut self, record: CompensableRecord) {
        if record.xid.branch_id().is_some() {
            self.compensables.insert(record);
        }
    }
}

/// Identifies a remote resource well enough to re-attach to it after a restart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Type tag of the descriptor implementation.
    pub type_name: String,
    pub identifier: String,
}

/// One remote, XA-style resource branch.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantRecord {
    pub xid: Xid,
    pub descriptor: ResourceDescriptor,
    pub vote: i32,
    pub committed: bool,
    pub rolledback: bool,
    pub readonly: bool,
    pub completed: bool,
    pub heuristic: bool,
    pub modified_by: Option<String>,
}

impl ParticipantRecord {
    pub fn new(xid: Xid, descriptor: ResourceDescriptor) -> Self {
        Self {
            xid,
            descriptor,
            vote: 0,
            committed: false,
            rolledback: false,
            readonly: false,
            completed: false,
            heuristic: false,
            modified_by: None,
        }
    }
}

impl Branch for ParticipantRecord {
    fn xid(&self) -> &Xid {
        &self.xid
    }
}

/// A stable, registry-resolvable reference to a compensable service method.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub interface: String,
    pub signature: String,
}

impl MethodRef {
    pub fn new(interface: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            signature: signature.into(),
        }
    }
}

/// The call a compensable branch made, and how to confirm or cancel it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensableInvocation {
    pub service_id: String,
    pub method: MethodRef,
    pub args: Vec<Value>,
    pub confirmable_key: Option<String>,
    pub cancellable_key: Option<String>,
    pub simplified: bool,
}

/// One compensable service branch.
#[derive(Debug, Clone, PartialEq)]
pub struct CompensableRecord {
    pub xid: Xid,
    pub invocation: CompensableInvocation,
    pub transaction_key: Option<String>,
    pub compensable_key: Option<String>,
    /// The local transaction branch the try phase ran in.
    pub transaction_xid: Option<Xid>,
    /// The branch of the confirm or cancel phase.
    pub compensable_xid: Option<Xid>,
    pub coordinator: bool,
    pub tried: bool,
    pub confirmed: bool,
    pub cancelled: bool,
    pub created_by: Option<String>,
    pub modified_by: Option<String>,
}

impl CompensableRecord {
    pub fn new(xid: Xid, invocation: CompensableInvocation) -> Self {
        Self {
            xid,
            invocation,
            transaction_key: None,
            compensable_key: None,
            transaction_xid: None,
            compensable_xid: None,
            coordinator: false,
            tried: false,
            confirmed: false,
            cancelled: false,
            created_by: None,
            modified_by: None,
        }
    }
}

impl Branch for CompensableRecord {
    fn xid(&self) -> &Xid {
        &self.xid
    }
}
