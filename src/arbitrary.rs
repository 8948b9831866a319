//! Implementation of the quickcheck::Arbitrary trait for the archive types.
//!
//! Generated archives are always internally consistent: branch records carry the archive's
//! global identifier and are keyed by their own, non-empty, branch identifier.

use crate::{
    archive::{
        CompensableInvocation, CompensableRecord, MethodRef, ParticipantRecord,
        ResourceDescriptor, TransactionArchive,
    },
    timestamp::Timestamp,
    value::Value,
    xid::Xid,
};
use quickcheck::{Arbitrary, Gen};
use std::collections::BTreeMap;

const MAX_VALUE_DEPTH: usize = 2;

fn small_len(g: &mut Gen, max: usize) -> usize {
    usize::arbitrary(g) % (max + 1)
}

fn non_empty_bytes(g: &mut Gen) -> Vec<u8> {
    let mut bytes = Vec::<u8>::arbitrary(g);
    bytes.truncate(16);
    if bytes.is_empty() {
        bytes.push(u8::arbitrary(g));
    }
    bytes
}

impl Arbitrary for Timestamp {
    fn arbitrary(g: &mut Gen) -> Self {
        // whole seconds between 1970 and 2106 are always representable
        Timestamp::from_millis(i64::from(u32::arbitrary(g)) * 1000)
            .unwrap_or_else(|_| Timestamp::now())
    }
}

fn arbitrary_value(g: &mut Gen, depth: usize) -> Value {
    let choices: &[&str] = if depth >= MAX_VALUE_DEPTH {
        &["null", "bytes", "string", "double", "u64", "i64", "bool", "ts", "ulid"]
    } else {
        &[
            "null", "bytes", "string", "double", "u64", "i64", "bool", "ts", "ulid", "list", "map",
        ]
    };
    match *g.choose(choices).unwrap_or(&"null") {
        "bytes" => Value::Bytes(Arbitrary::arbitrary(g)),
        "string" => Value::String(Arbitrary::arbitrary(g)),
        "double" => {
            let v = f64::arbitrary(g);
            Value::Double(if v.is_finite() { v } else { 0.5 })
        }
        "u64" => Value::U64(Arbitrary::arbitrary(g)),
        "i64" => Value::I64(Arbitrary::arbitrary(g)),
        "bool" => Value::Bool(Arbitrary::arbitrary(g)),
        "ts" => Value::Timestamp(Arbitrary::arbitrary(g)),
        "ulid" => Value::Ulid(ulid::Ulid(u128::arbitrary(g))),
        "list" => Value::List(
            (0..small_len(g, 3))
                .map(|_| arbitrary_value(g, depth + 1))
                .collect(),
        ),
        "map" => Value::Map(
            (0..small_len(g, 3))
                .map(|_| (String::arbitrary(g), arbitrary_value(g, depth + 1)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

impl Arbitrary for Value {
    fn arbitrary(g: &mut Gen) -> Self {
        arbitrary_value(g, 0)
    }
}

impl Arbitrary for Xid {
    fn arbitrary(g: &mut Gen) -> Self {
        let global = non_empty_bytes(g);
        if bool::arbitrary(g) {
            Xid::branch(global, non_empty_bytes(g))
        } else {
            Xid::global(global)
        }
    }
}

impl Arbitrary for ResourceDescriptor {
    fn arbitrary(g: &mut Gen) -> Self {
        let kind = *g.choose(&["remote", "local", "xa"]).unwrap_or(&"remote");
        Self {
            type_name: kind.to_string(),
            // the identifier names the type, so equal identifiers never disagree on it
            identifier: format!("{kind}@10.0.{}.{}:svc:8080", u8::arbitrary(g), u8::arbitrary(g)),
        }
    }
}

impl Arbitrary for MethodRef {
    fn arbitrary(g: &mut Gen) -> Self {
        MethodRef::new(String::arbitrary(g), String::arbitrary(g))
    }
}

impl Arbitrary for CompensableInvocation {
    fn arbitrary(g: &mut Gen) -> Self {
        Self {
            service_id: Arbitrary::arbitrary(g),
            method: Arbitrary::arbitrary(g),
            args: (0..small_len(g, 4)).map(|_| Value::arbitrary(g)).collect(),
            confirmable_key: Arbitrary::arbitrary(g),
            cancellable_key: Arbitrary::arbitrary(g),
            simplified: Arbitrary::arbitrary(g),
        }
    }
}

fn arbitrary_participant(g: &mut Gen, xid: Xid) -> ParticipantRecord {
    ParticipantRecord {
        xid,
        descriptor: Arbitrary::arbitrary(g),
        vote: Arbitrary::arbitrary(g),
        committed: Arbitrary::arbitrary(g),
        rolledback: Arbitrary::arbitrary(g),
        readonly: Arbitrary::arbitrary(g),
        completed: Arbitrary::arbitrary(g),
        heuristic: Arbitrary::arbitrary(g),
        modified_by: Arbitrary::arbitrary(g),
    }
}

fn arbitrary_compensable(g: &mut Gen, xid: Xid) -> CompensableRecord {
    CompensableRecord {
        xid,
        invocation: Arbitrary::arbitrary(g),
        transaction_key: Arbitrary::arbitrary(g),
        compensable_key: Arbitrary::arbitrary(g),
        transaction_xid: Arbitrary::arbitrary(g),
        compensable_xid: Arbitrary::arbitrary(g),
        coordinator: Arbitrary::arbitrary(g),
        tried: Arbitrary::arbitrary(g),
        confirmed: Arbitrary::arbitrary(g),
        cancelled: Arbitrary::arbitrary(g),
        created_by: Arbitrary::arbitrary(g),
        modified_by: Arbitrary::arbitrary(g),
    }
}

impl Arbitrary for TransactionArchive {
    fn arbitrary(g: &mut Gen) -> Self {
        let global = Xid::global(non_empty_bytes(g));
        let mut archive = TransactionArchive::new(global.clone());
        archive.application = Arbitrary::arbitrary(g);
        archive.status = Arbitrary::arbitrary(g);
        archive.compensable = Arbitrary::arbitrary(g);
        archive.coordinator = Arbitrary::arbitrary(g);
        archive.propagated = Arbitrary::arbitrary(g);
        archive.propagated_by = Arbitrary::arbitrary(g);
        archive.variables = (0..small_len(g, 4))
            .map(|_| (String::arbitrary(g), Value::arbitrary(g)))
            .collect::<BTreeMap<_, _>>();
        archive.recovered_at = Arbitrary::arbitrary(g);
        archive.recovered_times = Arbitrary::arbitrary(g);
        archive.epoch = Arbitrary::arbitrary(g);
        archive.error = Arbitrary::arbitrary(g);
        archive.created_by = Arbitrary::arbitrary(g);
        archive.modified_by = Arbitrary::arbitrary(g);

        for _ in 0..small_len(g, 3) {
            let xid = global.with_branch(non_empty_bytes(g));
            archive.put_participant(arbitrary_participant(g, xid));
        }
        for _ in 0..small_len(g, 3) {
            let xid = global.with_branch(non_empty_bytes(g));
            archive.put_compensable(arbitrary_compensable(g, xid));
        }
        archive
    }
}
