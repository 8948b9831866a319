//! Fixtures shared by the unit tests.

use crate::{
    archive::{
        CompensableInvocation, CompensableRecord, MethodRef, ParticipantRecord,
        ResourceDescriptor, TransactionArchive,
    },
    error::{FaultKind, LogError},
    registry::{StaticDescriptorRegistry, StaticMethodRegistry},
    store::{TransactionManagerControl, VersionSource},
    timestamp::Timestamp,
    value::Value,
    xid::Xid,
};
use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

pub const ENDPOINT: &str = "10.0.0.1:orderSvc:8080";

/// Global transaction `[1, 2]` of `orderSvc`, created in epoch 7, with two participants and
/// one compensable branch.
pub fn sample_archive() -> TransactionArchive {
    let global = Xid::global([1u8, 2]);
    let mut archive = TransactionArchive {
        application: "orderSvc".into(),
        status: 1,
        compensable: true,
        coordinator: true,
        epoch: 7,
        created_by: Some(ENDPOINT.into()),
        modified_by: Some(ENDPOINT.into()),
        recovered_at: Some(Timestamp::from_millis(1_700_000_000_123).unwrap()),
        recovered_times: 2,
        ..TransactionArchive::new(global.clone())
    };
    archive
        .variables
        .insert("amount".into(), Value::from(250u32));
    archive
        .variables
        .insert("currency".into(), Value::from("EUR"));

    archive.put_participant(ParticipantRecord {
        vote: 1,
        modified_by: Some(ENDPOINT.into()),
        ..ParticipantRecord::new(
            global.with_branch([0xAAu8]),
            ResourceDescriptor {
                type_name: "remote".into(),
                identifier: "10.0.0.2:stockSvc:8080".into(),
            },
        )
    });
    archive.put_participant(ParticipantRecord::new(
        global.with_branch([0xBBu8, 0x01]),
        ResourceDescriptor {
            type_name: "remote".into(),
            identifier: "10.0.0.3:paymentSvc:8080".into(),
        },
    ));

    archive.put_compensable(CompensableRecord {
        transaction_key: Some("tx-1".into()),
        transaction_xid: Some(global.with_branch([0x10u8])),
        compensable_xid: Some(Xid::global([9u8, 9])),
        coordinator: true,
        tried: true,
        created_by: Some(ENDPOINT.into()),
        ..CompensableRecord::new(
            global.with_branch([0xCCu8]),
            CompensableInvocation {
                service_id: "accountService".into(),
                method: MethodRef::new("com.example.AccountService", "debit(String,long)"),
                args: vec![Value::from("acct-7"), Value::from(250i64)],
                confirmable_key: Some("accountConfirm".into()),
                cancellable_key: Some("accountCancel".into()),
                simplified: false,
            },
        )
    });
    archive
}

/// Registries that know every descriptor and method `archive` references.
pub fn registries_for(
    archive: &TransactionArchive,
) -> (StaticDescriptorRegistry, StaticMethodRegistry) {
    let mut descriptors = StaticDescriptorRegistry::new();
    for record in archive.participants.values() {
        descriptors.register(record.descriptor.clone());
    }
    let mut methods = StaticMethodRegistry::new();
    for record in archive.compensables.values() {
        let method = &record.invocation.method;
        methods.register(method.interface.clone(), method.signature.clone());
    }
    (descriptors, methods)
}

/// Reports the same epoch for every application.
#[derive(Debug, Default)]
pub struct FixedEpoch(AtomicU64);

impl FixedEpoch {
    pub fn new(epoch: u64) -> Self {
        Self(AtomicU64::new(epoch))
    }

    pub fn set(&self, epoch: u64) {
        self.0.store(epoch, Ordering::SeqCst);
    }
}

impl VersionSource for FixedEpoch {
    fn current_epoch(&self, _application: &str) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Remembers every rollback-only signal.
#[derive(Debug, Default)]
pub struct RecordingControl(Mutex<Vec<FaultKind>>);

impl RecordingControl {
    pub fn signals(&self) -> Vec<FaultKind> {
        self.0.lock().unwrap().clone()
    }
}

impl TransactionManagerControl for RecordingControl {
    fn mark_rollback_only(&self, fault: &LogError) {
        self.0.lock().unwrap().push(fault.kind());
    }
}
