//! Fakes of the collaborators around the log store.
#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tcclog::{
    Collaborators, CompensableInvocation, CompensableRecord, FaultKind, LogError, LogStoreConfig,
    MemoryCollection, MethodRef, ParticipantRecord, ResourceDescriptor, StaticDescriptorRegistry,
    StaticMethodRegistry, TransactionArchive, TransactionLogStore, TransactionManagerControl,
    Value, VersionSource, Xid,
};

pub const ENDPOINT: &str = "10.0.0.1:orderSvc:8080";
pub const APPLICATION: &str = "orderSvc";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An instance-version directory whose epochs the test moves by hand.
#[derive(Debug, Default)]
pub struct Directory(Mutex<HashMap<String, u64>>);

impl Directory {
    pub fn set(&self, application: &str, epoch: u64) {
        self.0.lock().unwrap().insert(application.to_string(), epoch);
    }
}

impl VersionSource for Directory {
    fn current_epoch(&self, application: &str) -> u64 {
        self.0.lock().unwrap().get(application).copied().unwrap_or(0)
    }
}

/// Records every rollback-only signal.
#[derive(Debug, Default)]
pub struct Manager(Mutex<Vec<FaultKind>>);

impl Manager {
    pub fn signals(&self) -> Vec<FaultKind> {
        self.0.lock().unwrap().clone()
    }
}

impl TransactionManagerControl for Manager {
    fn mark_rollback_only(&self, fault: &LogError) {
        self.0.lock().unwrap().push(fault.kind());
    }
}

pub fn stock_descriptor() -> ResourceDescriptor {
    ResourceDescriptor {
        type_name: "remote".into(),
        identifier: "10.0.0.2:stockSvc:8080".into(),
    }
}

pub fn debit_method() -> MethodRef {
    MethodRef::new("com.example.AccountService", "debit(String,long)")
}

pub fn participant(global: &Xid, branch: &[u8], vote: i32) -> ParticipantRecord {
    ParticipantRecord {
        vote,
        ..ParticipantRecord::new(global.with_branch(branch), stock_descriptor())
    }
}

pub fn compensable(global: &Xid, branch: &[u8]) -> CompensableRecord {
    CompensableRecord {
        tried: true,
        transaction_xid: Some(global.with_branch([0x10u8])),
        ..CompensableRecord::new(
            global.with_branch(branch),
            CompensableInvocation {
                service_id: "accountService".into(),
                method: debit_method(),
                args: vec![Value::from("acct-7"), Value::from(250i64)],
                confirmable_key: None,
                cancellable_key: None,
                simplified: true,
            },
        )
    }
}

/// A coordinator archive of `orderSvc` without branches.
pub fn archive(global: &[u8]) -> TransactionArchive {
    TransactionArchive {
        coordinator: true,
        compensable: true,
        status: 1,
        ..TransactionArchive::new(Xid::global(global))
    }
}

pub struct Harness {
    pub store: TransactionLogStore<Arc<MemoryCollection>>,
    pub collection: Arc<MemoryCollection>,
    pub directory: Arc<Directory>,
    pub manager: Arc<Manager>,
}

impl Harness {
    /// A store for `orderSvc` whose live instance runs in `epoch`.
    pub fn new(epoch: u64) -> Self {
        init_tracing();
        let collection = Arc::new(MemoryCollection::new());
        let directory = Arc::new(Directory::default());
        directory.set(APPLICATION, epoch);
        let manager = Arc::new(Manager::default());
        let store = TransactionLogStore::new(
            collection.clone(),
            LogStoreConfig::new(ENDPOINT.parse().unwrap()),
            collaborators(&directory, &manager),
        );
        store.initialize().unwrap();
        Self {
            store,
            collection,
            directory,
            manager,
        }
    }

    /// Another coordinator instance sharing this one's collection and directory.
    pub fn peer(&self, endpoint: &str) -> TransactionLogStore<Arc<MemoryCollection>> {
        TransactionLogStore::new(
            self.collection.clone(),
            LogStoreConfig::new(endpoint.parse().unwrap()),
            collaborators(&self.directory, &self.manager),
        )
    }
}

fn collaborators(directory: &Arc<Directory>, manager: &Arc<Manager>) -> Collaborators {
    let mut descriptors = StaticDescriptorRegistry::new();
    descriptors.register(stock_descriptor());
    let mut methods = StaticMethodRegistry::new();
    let method = debit_method();
    methods.register(method.interface, method.signature);
    Collaborators {
        versions: directory.clone(),
        control: manager.clone(),
        descriptors: Arc::new(descriptors),
        methods: Arc::new(methods),
    }
}
