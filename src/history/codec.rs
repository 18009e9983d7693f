//! Entity snapshot codec
//!
//! Turns any [`Entity`] into a [`Snapshot`]: a canonical JSON body plus a
//! SHA-256 digest of its canonical text. Two logically equal entity states
//! always produce equal snapshots, so digests can be compared directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::core::entity::Entity;
use crate::core::identity::EntityId;
use crate::history::error::EncodingError;

/// Deepest nesting accepted in a snapshot body
///
/// Checked on the `serde_json::Value` after the entity is serialized, so a
/// pathologically deep entity is fully converted before it is rejected.
pub const MAX_DEPTH: usize = 64;

/// Point-in-time capture of an entity's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    entity_id: EntityId,
    entity_type: String,
    body: Value,
    digest: String,
}

impl Snapshot {
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    /// Hex SHA-256 of the canonical body
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Canonical JSON text of the body (sorted keys, no whitespace)
    pub fn canonical_json(&self) -> String {
        let mut out = String::new();
        write_canonical(&self.body, &mut out);
        out
    }

    /// Rebuild a snapshot read back from storage, checking its digest
    pub fn from_stored(
        entity_id: EntityId,
        entity_type: impl Into<String>,
        body: Value,
        digest: impl Into<String>,
    ) -> Result<Self, EncodingError> {
        let recorded = digest.into();
        let mut canonical = String::new();
        write_canonical(&body, &mut canonical);
        let computed = digest_of(&canonical);
        if computed != recorded {
            return Err(EncodingError::DigestMismatch { recorded, computed });
        }
        Ok(Self {
            entity_id,
            entity_type: entity_type.into(),
            body,
            digest: computed,
        })
    }
}

/// Encode an entity into a snapshot
pub fn encode<E: Entity>(entity: &E) -> Result<Snapshot, EncodingError> {
    let entity_type = E::PREFIX.type_name();
    let body = serde_json::to_value(entity).map_err(|e| EncodingError::Serialize {
        entity_type,
        message: e.to_string(),
    })?;

    if !body.is_object() {
        return Err(EncodingError::NotAnObject { entity_type });
    }
    check_depth(&body, 0)?;

    let mut canonical = String::new();
    write_canonical(&body, &mut canonical);

    Ok(Snapshot {
        entity_id: entity.id().clone(),
        entity_type: entity_type.to_string(),
        digest: digest_of(&canonical),
        body,
    })
}

/// Decode a snapshot back into the entity it was taken from
pub fn decode<E: Entity>(snapshot: &Snapshot) -> Result<E, EncodingError> {
    let expected = E::PREFIX.type_name();
    if snapshot.entity_type != expected {
        return Err(EncodingError::TypeMismatch {
            expected: expected.to_string(),
            found: snapshot.entity_type.clone(),
        });
    }
    serde_json::from_value(snapshot.body.clone())
        .map_err(|e| EncodingError::Deserialize(e.to_string()))
}

fn check_depth(value: &Value, depth: usize) -> Result<(), EncodingError> {
    if depth > MAX_DEPTH {
        return Err(EncodingError::TooDeep { limit: MAX_DEPTH });
    }
    match value {
        Value::Array(items) => items.iter().try_for_each(|v| check_depth(v, depth + 1)),
        Value::Object(map) => map.values().try_for_each(|v| check_depth(v, depth + 1)),
        _ => Ok(()),
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

fn digest_of(canonical: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::{BugStatus, Priority};
    use crate::core::identity::EntityPrefix;
    use crate::entities::{Bug, Project};
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn project() -> Project {
        Project::new(EntityId::new(EntityPrefix::Proj), "Apollo", "alice", Utc::now())
    }

    #[test]
    fn test_equal_states_give_equal_snapshots() {
        let p = project();
        let a = encode(&p).unwrap();
        let b = encode(&p.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.digest().len(), 64);
    }

    #[test]
    fn test_changed_field_changes_digest() {
        let p = project();
        let mut q = p.clone();
        q.deadline = NaiveDate::from_ymd_opt(2023, 12, 25);
        assert_ne!(encode(&p).unwrap().digest(), encode(&q).unwrap().digest());
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let body = json!({"zeta": 1, "alpha": {"y": [1, 2], "b": null}});
        let mut out = String::new();
        write_canonical(&body, &mut out);
        assert_eq!(out, r#"{"alpha":{"b":null,"y":[1,2]},"zeta":1}"#);
    }

    #[test]
    fn test_decode_restores_entity() {
        let project_id = EntityId::new(EntityPrefix::Proj);
        let mut bug = Bug::new(
            EntityId::new(EntityPrefix::Bug),
            project_id,
            "Crash on save",
            "bob",
            Utc::now(),
        );
        bug.priority = Priority::High;
        bug.status = BugStatus::InProgress;

        let snap = encode(&bug).unwrap();
        let back: Bug = decode(&snap).unwrap();
        assert_eq!(encode(&back).unwrap(), snap);
        assert_eq!(back.status, BugStatus::InProgress);
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        let snap = encode(&project()).unwrap();
        let err = decode::<Bug>(&snap).unwrap_err();
        assert!(matches!(err, EncodingError::TypeMismatch { .. }));
    }

    #[test]
    fn test_from_stored_detects_tampering() {
        let snap = encode(&project()).unwrap();
        let mut body = snap.body().clone();
        body["name"] = json!("Tampered");
        let err = Snapshot::from_stored(
            snap.entity_id().clone(),
            snap.entity_type(),
            body,
            snap.digest(),
        )
        .unwrap_err();
        assert!(matches!(err, EncodingError::DigestMismatch { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let mut deep = json!(1);
        for _ in 0..(MAX_DEPTH + 2) {
            deep = json!([deep]);
        }
        assert!(matches!(
            check_depth(&deep, 0),
            Err(EncodingError::TooDeep { .. })
        ));
        assert!(check_depth(&json!({"a": [1]}), 0).is_ok());
    }
}
