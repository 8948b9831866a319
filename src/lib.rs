//! # tcclog: a durable transaction log for TCC coordinators
//!
//! A Try-Confirm-Cancel coordinator has to remember every global transaction it has started
//! until that transaction is fully confirmed or cancelled, so that a restarted coordinator can
//! finish what a crashed one left behind. This crate is that memory. It stores one
//! [`TransactionArchive`] per global transaction and owning application as a document in a
//! document store, and keeps the participant and compensable branches of the transaction in
//! maps keyed by branch identifier inside that document.
//!
//! ## Writing
//!
//! All writes go through a [`TransactionLogStore`]. Whole archives are created and updated in
//! one command each; individual branches are written through a single dotted path
//! (`participants.<branch>` / `compensables.<branch>`), so concurrent writes to different
//! branches of one transaction never overwrite each other. Every mutation of an existing
//! archive must match exactly one document.
//!
//! A write that fails is returned as a [`LogError`] and also reported to the
//! [`TransactionManagerControl`], which should force the transaction towards rollback. The
//! error's [`FaultKind`] tells the manager what went wrong.
//!
//! ## Recovery and epochs
//!
//! Each archive records the epoch of the coordinator instance that created it, as handed out
//! by an external instance-version directory ([`VersionSource`]). On restart,
//! [`TransactionLogStore::recover`] walks the coordinator archives of its application and
//! recovers exactly those whose creating instance is provably gone: the directory reports a
//! newer epoch, or none at all. Archives flagged with `error` are always recovered.
//!
//! ## Storage
//!
//! The store is generic over a [`DocumentCollection`], the thin seam to an actual document
//! store driver. With the default `memory` feature the crate ships [`MemoryCollection`], an
//! in-process collection with the same command semantics.
//!
//! ```
//! use std::sync::Arc;
//! use tcclog::{
//!     Collaborators, LogError, LogStoreConfig, MemoryCollection, StaticDescriptorRegistry,
//!     StaticMethodRegistry, TransactionArchive, TransactionLogStore, TransactionManagerControl,
//!     VersionSource, Xid,
//! };
//!
//! struct Directory;
//! impl VersionSource for Directory {
//!     fn current_epoch(&self, _application: &str) -> u64 {
//!         3
//!     }
//! }
//!
//! struct Manager;
//! impl TransactionManagerControl for Manager {
//!     fn mark_rollback_only(&self, fault: &LogError) {
//!         eprintln!("rollback-only: {fault}");
//!     }
//! }
//!
//! let store = TransactionLogStore::new(
//!     MemoryCollection::new(),
//!     LogStoreConfig::new("10.0.0.1:orderSvc:8080".parse()?),
//!     Collaborators {
//!         versions: Arc::new(Directory),
//!         control: Arc::new(Manager),
//!         descriptors: Arc::new(StaticDescriptorRegistry::new()),
//!         methods: Arc::new(StaticMethodRegistry::new()),
//!     },
//! );
//! store.initialize()?;
//!
//! let archive = TransactionArchive {
//!     coordinator: true,
//!     ..TransactionArchive::new(Xid::generate())
//! };
//! store.create_transaction(&archive)?;
//!
//! // still owned by the live instance in epoch 3
//! let summary = store.recover(&mut |_: TransactionArchive| {})?;
//! assert_eq!(summary.skipped, 1);
//! # Ok::<(), LogError>(())
//! ```

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod archive;
pub use archive::{
    Branch, BranchMap, CompensableInvocation, CompensableRecord, MethodRef, ParticipantRecord,
    ResourceDescriptor, TransactionArchive,
};
#[cfg(any(test, feature = "arbitrary"))]
mod arbitrary;
pub mod codec;
pub use codec::DocumentCodec;
pub mod collection;
#[cfg(feature = "memory")]
pub use collection::memory::MemoryCollection;
pub use collection::{Document, DocumentCollection, Filter, IndexSpec, Update};
pub mod config;
pub use config::{Endpoint, LogStoreConfig};
pub mod error;
pub use error::{FaultKind, LogError, Result};
pub mod index;
pub use index::IndexManager;
pub mod recovery;
pub use recovery::{CallbackError, RecoveryCallback, RecoveryScanner, RecoverySummary};
pub mod registry;
pub use registry::{
    MethodRegistry, ResourceDescriptorRegistry, StaticDescriptorRegistry, StaticMethodRegistry,
};
pub mod store;
pub use store::{Collaborators, TransactionLogStore, TransactionManagerControl, VersionSource};
pub mod timestamp;
pub use timestamp::Timestamp;
pub mod value;
pub use value::Value;
pub mod xid;
pub use xid::Xid;

#[cfg(test)]
mod test_util;
