//! Mapping between [`TransactionArchive`]s and stored documents.
//!
//! # Layout
//!
//! ```json
//! {
//!   "gxid": "AQI",
//!   "system": "orderSvc",
//!   "status": 0,
//!   "version": 7,
//!   "error": false,
//!   "vars": "{\"amount\":250}",
//!   "variables": "<blob>",
//!   "participants": {
//!     "qg": { "gxid": "AQI", "bxid": "qg", "type": "remote", "vote": 0, ... }
//!   },
//!   "compensables": {
//!     "AA": { "gxid": "AQI", "bxid": "AA", "interface": "...", "args": "<blob>", ... }
//!   },
//!   ...
//! }
//! ```
//!
//! Branch records are stored as objects keyed by the encoded branch identifier rather than as
//! arrays, so one branch can be written or removed with a single dotted-path update
//! (`participants.qg`) that never touches its siblings.
//!
//! Variables and call arguments are stored as blobs: postcard bytes in base64 text. Variables
//! are also rendered as JSON text under `vars` for operators; that copy is never read back.

use crate::{
    archive::{
        Branch, BranchMap, CompensableInvocation, CompensableRecord, ParticipantRecord,
        ResourceDescriptor, TransactionArchive,
    },
    collection::{Document, path},
    error::{DecodingError, EncodingError},
    registry::{MethodRegistry, ResourceDescriptorRegistry},
    timestamp::Timestamp,
    value::Value,
    xid::{self, Xid},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Field names of stored documents.
pub mod fields {
    pub const GLOBAL: &str = "gxid";
    pub const BRANCH: &str = "bxid";
    pub const SYSTEM: &str = "system";
    pub const STATUS: &str = "status";
    pub const CREATED: &str = "created";
    pub const MODIFIED: &str = "modified";
    pub const PROPAGATED: &str = "propagated";
    pub const PROPAGATED_BY: &str = "propagated_by";
    pub const COMPENSABLE: &str = "compensable";
    pub const COORDINATOR: &str = "coordinator";
    pub const LOCK: &str = "lock";
    pub const LOCKED_BY: &str = "locked_by";
    pub const ERROR: &str = "error";
    pub const VERSION: &str = "version";
    pub const VARS: &str = "vars";
    pub const VARIABLES: &str = "variables";
    pub const RECOVERED_AT: &str = "recovered_at";
    pub const RECOVERED_TIMES: &str = "recovered_times";
    pub const PARTICIPANTS: &str = "participants";
    pub const COMPENSABLES: &str = "compensables";

    pub const TYPE: &str = "type";
    pub const RESOURCE: &str = "resource";
    pub const VOTE: &str = "vote";
    pub const COMMITTED: &str = "committed";
    pub const ROLLEDBACK: &str = "rolledback";
    pub const READONLY: &str = "readonly";
    pub const COMPLETED: &str = "completed";
    pub const HEURISTIC: &str = "heuristic";

    pub const TRANSACTION_KEY: &str = "transaction_key";
    pub const COMPENSABLE_KEY: &str = "compensable_key";
    pub const TRANSACTION_XID: &str = "transaction_xid";
    pub const COMPENSABLE_XID: &str = "compensable_xid";
    pub const TRIED: &str = "tried";
    pub const CONFIRMED: &str = "confirmed";
    pub const CANCELLED: &str = "cancelled";
    pub const SERVICE_ID: &str = "serviceId";
    pub const SIMPLIFIED: &str = "simplified";
    pub const CONFIRMABLE_KEY: &str = "confirmable_key";
    pub const CANCELLABLE_KEY: &str = "cancellable_key";
    pub const ARGS: &str = "args";
    pub const INTERFACE: &str = "interface";
    pub const METHOD: &str = "method";
}

/// Dotted path of one participant entry.
pub fn participant_path(branch_key: &str) -> String {
    path(&[fields::PARTICIPANTS, branch_key])
}

/// Dotted path of one compensable entry.
pub fn compensable_path(branch_key: &str) -> String {
    path(&[fields::COMPENSABLES, branch_key])
}

fn encode_blob<T: Serialize + ?Sized>(what: &'static str, value: &T) -> Result<String, EncodingError> {
    let bytes =
        postcard::to_allocvec(value).map_err(|source| EncodingError::Blob { what, source })?;
    Ok(STANDARD.encode(bytes))
}

fn decode_blob<T: DeserializeOwned>(field: &'static str, text: &str) -> Result<T, DecodingError> {
    let bytes = STANDARD
        .decode(text)
        .map_err(|err| DecodingError::Blob {
            field,
            source: Box::new(err),
        })?;
    postcard::from_bytes(&bytes).map_err(|err| DecodingError::Blob {
        field,
        source: Box::new(err),
    })
}

fn branch_key_of(record_xid: &Xid, what: &'static str) -> Result<String, EncodingError> {
    match record_xid.branch_id() {
        Some(branch) if !branch.is_empty() => Ok(xid::encode(branch)),
        _ => Err(EncodingError::EmptyBranch(what)),
    }
}

/// The storage key of a branch entry of `archive`, checking that the record really is the
/// branch it is filed under.
fn filed_branch_key(
    archive: &TransactionArchive,
    key: &[u8],
    record: &impl Branch,
    what: &'static str,
) -> Result<String, EncodingError> {
    let xid = record.xid();
    let encoded = branch_key_of(xid, what)?;
    if xid.global_id() != archive.xid.global_id() {
        return Err(EncodingError::ForeignBranch {
            what,
            branch: xid.to_string(),
            global: archive.xid.global_key(),
        });
    }
    if xid.branch_id() != Some(key) {
        return Err(EncodingError::MisfiledBranch {
            what,
            branch: xid.to_string(),
            key: xid::encode(key),
        });
    }
    Ok(encoded)
}

fn encode_linked_xid(linked: Option<&Xid>) -> JsonValue {
    let Some(linked) = linked else {
        return JsonValue::Null;
    };
    let mut document = Document::new();
    document.insert(fields::GLOBAL.into(), linked.global_key().into());
    document.insert(fields::BRANCH.into(), linked.branch_key().into());
    document.into()
}

/// Converts archives to documents and back.
///
/// Encoding is self-contained. Decoding re-attaches stored descriptor and method references
/// to the registries this process was started with, and fails for records those registries
/// cannot vouch for.
#[derive(Clone, Copy)]
pub struct DocumentCodec<'r> {
    descriptors: &'r dyn ResourceDescriptorRegistry,
    methods: &'r dyn MethodRegistry,
}

impl<'r> DocumentCodec<'r> {
    pub fn new(
        descriptors: &'r dyn ResourceDescriptorRegistry,
        methods: &'r dyn MethodRegistry,
    ) -> Self {
        Self {
            descriptors,
            methods,
        }
    }

    /// The complete document of `archive`, as inserted when the transaction is created.
    pub fn encode(&self, archive: &TransactionArchive) -> Result<Document, EncodingError> {
        let mut document = Document::new();
        document.insert(fields::GLOBAL.into(), archive.xid.global_key().into());
        document.insert(fields::SYSTEM.into(), archive.application.clone().into());
        document.insert(fields::CREATED.into(), archive.created_by.clone().into());
        document.insert(fields::PROPAGATED.into(), archive.propagated.into());
        document.insert(fields::PROPAGATED_BY.into(), archive.propagated_by.clone().into());
        document.insert(fields::COMPENSABLE.into(), archive.compensable.into());
        document.insert(fields::COORDINATOR.into(), archive.coordinator.into());
        document.insert(fields::LOCK.into(), 0.into());
        document.insert(fields::LOCKED_BY.into(), archive.created_by.clone().into());
        document.insert(fields::ERROR.into(), archive.error.into());
        document.insert(fields::VERSION.into(), archive.epoch.into());
        document.extend(self.encode_update(archive)?);
        Ok(document)
    }

    /// The fields of `archive` that may change after creation.
    ///
    /// Every branch record must belong to `archive` and be filed under its own branch
    /// identifier. Creation-only fields (epoch, creator, flags) are left out, so `$set`ting this document
    /// can never move an archive to another epoch.
    pub fn encode_update(&self, archive: &TransactionArchive) -> Result<Document, EncodingError> {
        let rendered: serde_json::Map<String, JsonValue> = archive
            .variables
            .iter()
            .map(|(name, value)| (name.clone(), value.clone().into()))
            .collect();

        let mut participants = Document::new();
        for (key, record) in archive.participants.iter() {
            let key = filed_branch_key(archive, key, record, "participant")?;
            let encoded = self.encode_participant(record, &archive.application)?;
            participants.insert(key, encoded.into());
        }
        let mut compensables = Document::new();
        for (key, record) in archive.compensables.iter() {
            let key = filed_branch_key(archive, key, record, "compensable")?;
            let encoded = self.encode_compensable(record, &archive.application)?;
            compensables.insert(key, encoded.into());
        }

        let mut document = Document::new();
        document.insert(fields::MODIFIED.into(), archive.modified_by.clone().into());
        document.insert(fields::STATUS.into(), archive.status.into());
        document.insert(
            fields::VARS.into(),
            serde_json::to_string(&rendered)?.into(),
        );
        document.insert(
            fields::VARIABLES.into(),
            encode_blob("variables", &archive.variables)?.into(),
        );
        document.insert(
            fields::RECOVERED_AT.into(),
            archive.recovered_at.map_or(JsonValue::Null, Into::into),
        );
        document.insert(fields::RECOVERED_TIMES.into(), archive.recovered_times.into());
        document.insert(fields::PARTICIPANTS.into(), participants.into());
        document.insert(fields::COMPENSABLES.into(), compensables.into());
        Ok(document)
    }

    /// The entry of one participant, as stored under `participants.<branch key>`.
    pub fn encode_participant(
        &self,
        record: &ParticipantRecord,
        application: &str,
    ) -> Result<Document, EncodingError> {
        let branch_key = branch_key_of(&record.xid, "participant")?;
        let mut document = Document::new();
        document.insert(fields::GLOBAL.into(), record.xid.global_key().into());
        document.insert(fields::BRANCH.into(), branch_key.into());
        document.insert(fields::SYSTEM.into(), application.into());
        document.insert(fields::TYPE.into(), record.descriptor.type_name.clone().into());
        document.insert(
            fields::RESOURCE.into(),
            record.descriptor.identifier.clone().into(),
        );
        document.insert(fields::VOTE.into(), record.vote.into());
        document.insert(fields::COMMITTED.into(), record.committed.into());
        document.insert(fields::ROLLEDBACK.into(), record.rolledback.into());
        document.insert(fields::READONLY.into(), record.readonly.into());
        document.insert(fields::COMPLETED.into(), record.completed.into());
        document.insert(fields::HEURISTIC.into(), record.heuristic.into());
        document.insert(fields::MODIFIED.into(), record.modified_by.clone().into());
        Ok(document)
    }

    /// The entry of one compensable branch, as stored under `compensables.<branch key>`.
    pub fn encode_compensable(
        &self,
        record: &CompensableRecord,
        application: &str,
    ) -> Result<Document, EncodingError> {
        let branch_key = branch_key_of(&record.xid, "compensable")?;
        let invocation = &record.invocation;
        let mut document = Document::new();
        document.insert(fields::GLOBAL.into(), record.xid.global_key().into());
        document.insert(fields::BRANCH.into(), branch_key.into());
        document.insert(fields::SYSTEM.into(), application.into());
        document.insert(fields::CREATED.into(), record.created_by.clone().into());
        document.insert(fields::MODIFIED.into(), record.modified_by.clone().into());
        document.insert(
            fields::TRANSACTION_KEY.into(),
            record.transaction_key.clone().into(),
        );
        document.insert(
            fields::COMPENSABLE_KEY.into(),
            record.compensable_key.clone().into(),
        );
        document.insert(
            fields::TRANSACTION_XID.into(),
            encode_linked_xid(record.transaction_xid.as_ref()),
        );
        document.insert(
            fields::COMPENSABLE_XID.into(),
            encode_linked_xid(record.compensable_xid.as_ref()),
        );
        document.insert(fields::COORDINATOR.into(), record.coordinator.into());
        document.insert(fields::TRIED.into(), record.tried.into());
        document.insert(fields::CONFIRMED.into(), record.confirmed.into());
        document.insert(fields::CANCELLED.into(), record.cancelled.into());
        document.insert(fields::SERVICE_ID.into(), invocation.service_id.clone().into());
        document.insert(fields::SIMPLIFIED.into(), invocation.simplified.into());
        document.insert(
            fields::CONFIRMABLE_KEY.into(),
            invocation.confirmable_key.clone().into(),
        );
        document.insert(
            fields::CANCELLABLE_KEY.into(),
            invocation.cancellable_key.clone().into(),
        );
        document.insert(
            fields::ARGS.into(),
            encode_blob("args", &invocation.args)?.into(),
        );
        document.insert(
            fields::INTERFACE.into(),
            invocation.method.interface.clone().into(),
        );
        document.insert(fields::METHOD.into(), invocation.method.signature.clone().into());
        Ok(document)
    }

    /// Rebuilds the archive stored in `document`.
    pub fn decode(&self, document: &Document) -> Result<TransactionArchive, DecodingError> {
        let doc = Fields(document);
        let global = doc.xid_key(fields::GLOBAL)?;
        let mut archive = TransactionArchive::new(Xid::global(global.clone()));

        archive.application = doc.string(fields::SYSTEM)?;
        archive.status = doc.i32(fields::STATUS)?;
        archive.compensable = doc.bool(fields::COMPENSABLE)?;
        archive.coordinator = doc.bool(fields::COORDINATOR)?;
        archive.propagated = doc.bool(fields::PROPAGATED)?;
        archive.propagated_by = doc.opt_string(fields::PROPAGATED_BY)?;
        archive.variables =
            decode_blob::<BTreeMap<String, Value>>(fields::VARIABLES, &doc.str(fields::VARIABLES)?)?;
        archive.recovered_at = doc
            .opt_string(fields::RECOVERED_AT)?
            .map(|text| text.parse::<Timestamp>())
            .transpose()
            .map_err(|source| DecodingError::Timestamp {
                field: fields::RECOVERED_AT,
                source,
            })?;
        archive.recovered_times = doc.opt_i32(fields::RECOVERED_TIMES)?.unwrap_or(0);
        archive.epoch = doc.u64(fields::VERSION)?;
        archive.error = doc.bool(fields::ERROR)?;
        archive.created_by = doc.opt_string(fields::CREATED)?;
        archive.modified_by = doc.opt_string(fields::MODIFIED)?;

        archive.participants = self.decode_branches(
            &global,
            doc.opt_object(fields::PARTICIPANTS)?,
            |xid, entry| self.decode_participant(xid, entry),
        )?;
        archive.compensables = self.decode_branches(
            &global,
            doc.opt_object(fields::COMPENSABLES)?,
            |xid, entry| self.decode_compensable(xid, entry),
        )?;
        Ok(archive)
    }

    fn decode_branches<R: Branch>(
        &self,
        global: &[u8],
        entries: Option<&Document>,
        decode: impl Fn(Xid, Fields<'_>) -> Result<R, DecodingError>,
    ) -> Result<BranchMap<R>, DecodingError> {
        let mut branches = BranchMap::new();
        for (key, entry) in entries.into_iter().flatten() {
            let branch = xid::decode(key).map_err(|source| DecodingError::Xid {
                field: fields::BRANCH,
                source,
            })?;
            let entry = entry.as_object().ok_or(DecodingError::FieldType {
                field: fields::BRANCH,
                expected: "object",
            })?;
            branches.insert(decode(Xid::branch(global, branch), Fields(entry))?);
        }
        Ok(branches)
    }

    fn decode_participant(
        &self,
        xid: Xid,
        entry: Fields<'_>,
    ) -> Result<ParticipantRecord, DecodingError> {
        let descriptor = ResourceDescriptor {
            type_name: entry.string(fields::TYPE)?,
            identifier: entry.string(fields::RESOURCE)?,
        };
        if let Some(live) = self.descriptors.resolve(&descriptor.identifier) {
            if live.type_name != descriptor.type_name {
                return Err(DecodingError::DescriptorMismatch {
                    identifier: descriptor.identifier,
                    stored: descriptor.type_name,
                    resolved: live.type_name,
                });
            }
        }

        Ok(ParticipantRecord {
            xid,
            descriptor,
            vote: entry.i32(fields::VOTE)?,
            committed: entry.bool(fields::COMMITTED)?,
            rolledback: entry.bool(fields::ROLLEDBACK)?,
            readonly: entry.bool(fields::READONLY)?,
            completed: entry.bool(fields::COMPLETED)?,
            heuristic: entry.bool(fields::HEURISTIC)?,
            modified_by: entry.opt_string(fields::MODIFIED)?,
        })
    }

    fn decode_compensable(
        &self,
        xid: Xid,
        entry: Fields<'_>,
    ) -> Result<CompensableRecord, DecodingError> {
        let interface = entry.str(fields::INTERFACE)?;
        let signature = entry.str(fields::METHOD)?;
        let method = self.methods.resolve(interface, signature).ok_or_else(|| {
            DecodingError::UnresolvedMethod {
                interface: interface.to_string(),
                signature: signature.to_string(),
            }
        })?;
        let invocation = CompensableInvocation {
            service_id: entry.string(fields::SERVICE_ID)?,
            method,
            args: decode_blob(fields::ARGS, entry.str(fields::ARGS)?)?,
            confirmable_key: entry.opt_string(fields::CONFIRMABLE_KEY)?,
            cancellable_key: entry.opt_string(fields::CANCELLABLE_KEY)?,
            simplified: entry.bool(fields::SIMPLIFIED)?,
        };

        Ok(CompensableRecord {
            xid,
            invocation,
            transaction_key: entry.opt_string(fields::TRANSACTION_KEY)?,
            compensable_key: entry.opt_string(fields::COMPENSABLE_KEY)?,
            transaction_xid: entry.linked_xid(fields::TRANSACTION_XID)?,
            compensable_xid: entry.linked_xid(fields::COMPENSABLE_XID)?,
            coordinator: entry.bool(fields::COORDINATOR)?,
            tried: entry.bool(fields::TRIED)?,
            confirmed: entry.bool(fields::CONFIRMED)?,
            cancelled: entry.bool(fields::CANCELLED)?,
            created_by: entry.opt_string(fields::CREATED)?,
            modified_by: entry.opt_string(fields::MODIFIED)?,
        })
    }
}

/// Typed accessors over one stored (sub-)document.
#[derive(Clone, Copy)]
struct Fields<'d>(&'d Document);

impl<'d> Fields<'d> {
    fn get(&self, field: &'static str) -> Result<&'d JsonValue, DecodingError> {
        self.0.get(field).ok_or(DecodingError::MissingField(field))
    }

    fn present(&self, field: &'static str) -> Option<&'d JsonValue> {
        self.0.get(field).filter(|value| !value.is_null())
    }

    fn str(&self, field: &'static str) -> Result<&'d str, DecodingError> {
        self.get(field)?.as_str().ok_or(DecodingError::FieldType {
            field,
            expected: "string",
        })
    }

    fn string(&self, field: &'static str) -> Result<String, DecodingError> {
        self.str(field).map(str::to_string)
    }

    fn opt_string(&self, field: &'static str) -> Result<Option<String>, DecodingError> {
        self.present(field)
            .map(|value| {
                value.as_str().map(str::to_string).ok_or(DecodingError::FieldType {
                    field,
                    expected: "string",
                })
            })
            .transpose()
    }

    fn bool(&self, field: &'static str) -> Result<bool, DecodingError> {
        self.get(field)?.as_bool().ok_or(DecodingError::FieldType {
            field,
            expected: "bool",
        })
    }

    fn u64(&self, field: &'static str) -> Result<u64, DecodingError> {
        self.get(field)?.as_u64().ok_or(DecodingError::FieldType {
            field,
            expected: "unsigned integer",
        })
    }

    fn i32(&self, field: &'static str) -> Result<i32, DecodingError> {
        self.opt_i32(field)?
            .ok_or(DecodingError::MissingField(field))
    }

    fn opt_i32(&self, field: &'static str) -> Result<Option<i32>, DecodingError> {
        self.present(field)
            .map(|value| {
                value
                    .as_i64()
                    .and_then(|v| i32::try_from(v).ok())
                    .ok_or(DecodingError::FieldType {
                        field,
                        expected: "32-bit integer",
                    })
            })
            .transpose()
    }

    fn opt_object(&self, field: &'static str) -> Result<Option<&'d Document>, DecodingError> {
        self.present(field)
            .map(|value| {
                value.as_object().ok_or(DecodingError::FieldType {
                    field,
                    expected: "object",
                })
            })
            .transpose()
    }

    fn xid_key(&self, field: &'static str) -> Result<Vec<u8>, DecodingError> {
        xid::decode(self.str(field)?).map_err(|source| DecodingError::Xid { field, source })
    }

    fn linked_xid(&self, field: &'static str) -> Result<Option<Xid>, DecodingError> {
        let Some(linked) = self.opt_object(field)? else {
            return Ok(None);
        };
        let linked = Fields(linked);
        let global = linked.xid_key(fields::GLOBAL)?;
        match linked.present(fields::BRANCH) {
            None => Ok(Some(Xid::global(global))),
            Some(_) => Ok(Some(Xid::branch(global, linked.xid_key(fields::BRANCH)?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        archive::MethodRef,
        registry::{StaticDescriptorRegistry, StaticMethodRegistry},
        test_util::{registries_for, sample_archive},
    };
    use serde_json::json;

    #[test]
    fn roundtrip_without_branches() {
        let archive = TransactionArchive {
            application: "orderSvc".into(),
            epoch: 7,
            ..TransactionArchive::new(Xid::global([1u8, 2]))
        };
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        assert_eq!(document[fields::PARTICIPANTS], json!({}));
        assert_eq!(codec.decode(&document).unwrap(), archive);
    }

    #[test]
    fn roundtrip_with_branches() {
        let archive = sample_archive();
        assert!(archive.participants.len() > 1);
        assert!(!archive.compensables.is_empty());
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        assert_eq!(codec.decode(&document).unwrap(), archive);
    }

    #[quickcheck]
    fn qc_roundtrip(archive: TransactionArchive) -> bool {
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        codec.decode(&document).unwrap() == archive
    }

    #[test]
    fn update_payload_leaves_creation_fields_alone() {
        let archive = sample_archive();
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        let update = codec.encode_update(&archive).unwrap();
        for field in [
            fields::VERSION,
            fields::CREATED,
            fields::ERROR,
            fields::LOCK,
            fields::COORDINATOR,
            fields::GLOBAL,
            fields::SYSTEM,
        ] {
            assert!(!update.contains_key(field), "{field} must not be updated");
        }
    }

    #[test]
    fn participant_layout() {
        let record = ParticipantRecord {
            vote: 0,
            readonly: true,
            modified_by: Some("10.0.0.1:orderSvc:8080".into()),
            ..ParticipantRecord::new(
                Xid::branch([1u8, 2], [0xAAu8]),
                ResourceDescriptor {
                    type_name: "remote".into(),
                    identifier: "10.0.0.2:stockSvc:8080".into(),
                },
            )
        };
        let (descriptors, methods) = (StaticDescriptorRegistry::new(), StaticMethodRegistry::new());
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode_participant(&record, "orderSvc").unwrap();
        insta::assert_json_snapshot!(document, @r#"
        {
          "bxid": "qg",
          "committed": false,
          "completed": false,
          "gxid": "AQI",
          "heuristic": false,
          "modified": "10.0.0.1:orderSvc:8080",
          "readonly": true,
          "resource": "10.0.0.2:stockSvc:8080",
          "rolledback": false,
          "system": "orderSvc",
          "type": "remote",
          "vote": 0
        }
        "#);
    }

    #[test]
    fn variables_are_rendered_for_operators() {
        let mut archive = TransactionArchive::new(Xid::global([3u8]));
        archive.variables.insert("amount".into(), Value::from(250u32));
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        assert_eq!(document[fields::VARS], json!("{\"amount\":250}"));

        // the rendered copy is not authoritative
        let mut tampered = document.clone();
        tampered.insert(fields::VARS.into(), json!("{}"));
        assert_eq!(codec.decode(&tampered).unwrap().variables, archive.variables);
    }

    #[test]
    fn empty_branch_identifier_cannot_be_encoded() {
        let mut archive = TransactionArchive::new(Xid::global([3u8]));
        archive.participants.insert(ParticipantRecord::new(
            Xid::branch([3u8], Vec::new()),
            ResourceDescriptor {
                type_name: "remote".into(),
                identifier: "x".into(),
            },
        ));
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        assert!(matches!(
            codec.encode(&archive),
            Err(EncodingError::EmptyBranch("participant"))
        ));
    }

    #[test]
    fn renamed_branch_cannot_be_encoded() {
        let mut archive = sample_archive();
        let renamed = archive.xid.with_branch([0x55u8]);
        archive.participants.values_mut().next().unwrap().xid = renamed;
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        assert!(matches!(
            codec.encode(&archive),
            Err(EncodingError::MisfiledBranch {
                what: "participant",
                ..
            })
        ));
    }

    #[test]
    fn branch_of_another_transaction_cannot_be_encoded() {
        let mut archive = sample_archive();
        let record = archive.participants.values().next().unwrap().clone();
        archive.put_participant(ParticipantRecord {
            xid: Xid::branch([9u8, 9], [0x77u8]),
            ..record
        });
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        assert!(matches!(
            codec.encode(&archive),
            Err(EncodingError::ForeignBranch {
                what: "participant",
                ..
            })
        ));
        assert!(codec.encode_update(&archive).is_err());
    }

    #[test]
    fn unresolvable_method_fails_decoding() {
        let archive = sample_archive();
        let (descriptors, _) = registries_for(&archive);
        let methods = StaticMethodRegistry::new();
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        assert!(matches!(
            codec.decode(&document),
            Err(DecodingError::UnresolvedMethod { .. })
        ));
    }

    #[test]
    fn descriptor_type_mismatch_fails_decoding() {
        let archive = sample_archive();
        let (_, methods) = registries_for(&archive);
        let record = archive.participants.values().next().unwrap();
        let mut descriptors = StaticDescriptorRegistry::new();
        descriptors.register(ResourceDescriptor {
            type_name: "local".into(),
            identifier: record.descriptor.identifier.clone(),
        });
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        assert!(matches!(
            codec.decode(&document),
            Err(DecodingError::DescriptorMismatch { .. })
        ));
    }

    #[test]
    fn unknown_descriptor_is_accepted() {
        let archive = sample_archive();
        let (_, methods) = registries_for(&archive);
        let descriptors = StaticDescriptorRegistry::new();
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode(&archive).unwrap();
        assert_eq!(codec.decode(&document).unwrap(), archive);
    }

    #[test]
    fn corrupt_blob_fails_decoding() {
        let archive = sample_archive();
        let (descriptors, methods) = registries_for(&archive);
        let codec = DocumentCodec::new(&descriptors, &methods);
        let mut document = codec.encode(&archive).unwrap();
        document.insert(fields::VARIABLES.into(), json!("not a blob!"));
        assert!(matches!(
            codec.decode(&document),
            Err(DecodingError::Blob {
                field: fields::VARIABLES,
                ..
            })
        ));

        let mut document = codec.encode(&archive).unwrap();
        document.insert(fields::VARIABLES.into(), json!(STANDARD.encode([0xFF, 0xFF])));
        assert!(codec.decode(&document).is_err());
    }

    #[test]
    fn linked_identifiers_keep_their_shape() {
        let archive = sample_archive();
        let record = archive.compensables.values().next().unwrap();
        assert!(record.transaction_xid.as_ref().unwrap().branch_id().is_some());
        assert!(record.compensable_xid.as_ref().unwrap().branch_id().is_none());

        let mut methods = StaticMethodRegistry::new();
        let MethodRef {
            interface,
            signature,
        } = record.invocation.method.clone();
        methods.register(interface, signature);
        let descriptors = StaticDescriptorRegistry::new();
        let codec = DocumentCodec::new(&descriptors, &methods);
        let document = codec.encode_compensable(record, "orderSvc").unwrap();
        assert_eq!(document[fields::COMPENSABLE_XID][fields::BRANCH], JsonValue::Null);
    }
}
