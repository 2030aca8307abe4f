use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{deserialize_id, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }
}

/// Set of change kinds a channel is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventKinds {
    insert: bool,
    update: bool,
    delete: bool,
}

impl Default for EventKinds {
    fn default() -> Self {
        Self::all()
    }
}

impl EventKinds {
    pub const fn all() -> Self {
        Self {
            insert: true,
            update: true,
            delete: true,
        }
    }

    pub fn only(kinds: &[ChangeKind]) -> Self {
        let mut set = Self {
            insert: false,
            update: false,
            delete: false,
        };
        for kind in kinds {
            match kind {
                ChangeKind::Insert => set.insert = true,
                ChangeKind::Update => set.update = true,
                ChangeKind::Delete => set.delete = true,
            }
        }
        set
    }

    pub fn contains(&self, kind: ChangeKind) -> bool {
        match kind {
            ChangeKind::Insert => self.insert,
            ChangeKind::Update => self.update,
            ChangeKind::Delete => self.delete,
        }
    }
}

/// Change payload exactly as the backend pushes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawChange {
    pub event_type: ChangeKind,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl RawChange {
    pub fn insert<T: Serialize>(record: &T) -> Result<Self> {
        Ok(Self {
            event_type: ChangeKind::Insert,
            new: Some(serde_json::to_value(record)?),
            old: None,
        })
    }

    pub fn update<T: Serialize>(record: &T, previous: Option<&T>) -> Result<Self> {
        Ok(Self {
            event_type: ChangeKind::Update,
            new: Some(serde_json::to_value(record)?),
            old: previous.map(serde_json::to_value).transpose()?,
        })
    }

    pub fn delete<T: Serialize>(previous: &T) -> Result<Self> {
        Ok(Self {
            event_type: ChangeKind::Delete,
            new: None,
            old: Some(serde_json::to_value(previous)?),
        })
    }

    /// Delete payload carrying only the primary key, as sent by tables
    /// without full replica identity.
    pub fn delete_key(id: &str) -> Self {
        Self {
            event_type: ChangeKind::Delete,
            new: None,
            old: Some(serde_json::json!({ "id": id })),
        }
    }

    fn old_record(&self) -> Option<&Value> {
        self.old.as_ref().filter(|value| !is_blank(value))
    }
}

/// Typed view of a [`RawChange`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent<T> {
    Insert {
        record: T,
    },
    /// `previous` is `None` when the backend only sent the primary key.
    Update {
        record: T,
        previous: Option<T>,
    },
    Delete {
        id: String,
        previous: Option<T>,
    },
}

impl<T: Row> ChangeEvent<T> {
    pub fn decode(raw: &RawChange) -> Result<Self> {
        match raw.event_type {
            ChangeKind::Insert => Ok(ChangeEvent::Insert {
                record: decode_new(raw)?,
            }),
            ChangeKind::Update => Ok(ChangeEvent::Update {
                record: decode_new(raw)?,
                previous: decode_old(raw),
            }),
            ChangeKind::Delete => {
                let old = raw
                    .old_record()
                    .ok_or_else(|| anyhow!("delete on {} carried no old record", T::TABLE))?;
                Ok(ChangeEvent::Delete {
                    id: primary_key(old)
                        .ok_or_else(|| anyhow!("delete on {} carried no id", T::TABLE))?,
                    previous: decode_old(raw),
                })
            }
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Insert,
            ChangeEvent::Update { .. } => ChangeKind::Update,
            ChangeEvent::Delete { .. } => ChangeKind::Delete,
        }
    }
}

fn decode_new<T: Row>(raw: &RawChange) -> Result<T> {
    let value = raw
        .new
        .clone()
        .filter(|value| !is_blank(value))
        .ok_or_else(|| anyhow!("{} change carried no new record", T::TABLE))?;
    serde_json::from_value(value)
        .with_context(|| format!("failed to decode {} record", T::TABLE))
}

fn decode_old<T: Row>(raw: &RawChange) -> Option<T> {
    raw.old_record()
        .and_then(|value| serde_json::from_value(value.clone()).ok())
}

fn primary_key(value: &Value) -> Option<String> {
    deserialize_id(value.get("id")?).ok()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::House;
    use serde_json::json;

    #[test]
    fn test_decode_update_with_key_only_old() {
        let raw: RawChange = serde_json::from_value(json!({
            "eventType": "UPDATE",
            "new": { "id": "h1", "name": "Red", "total_points": 12 },
            "old": { "id": "h1" }
        }))
        .unwrap();

        match ChangeEvent::<House>::decode(&raw).unwrap() {
            ChangeEvent::Update { record, previous } => {
                assert_eq!(record.total_points, 12);
                assert!(previous.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_insert_ignores_empty_old() {
        let raw: RawChange = serde_json::from_value(json!({
            "eventType": "INSERT",
            "new": { "id": "h2", "name": "Blue", "total_points": 0 },
            "old": {}
        }))
        .unwrap();

        let event = ChangeEvent::<House>::decode(&raw).unwrap();
        assert_eq!(event.kind(), ChangeKind::Insert);
    }

    #[test]
    fn test_decode_delete_numeric_key() {
        let raw: RawChange = serde_json::from_value(json!({
            "eventType": "DELETE",
            "new": null,
            "old": { "id": 7 }
        }))
        .unwrap();

        match ChangeEvent::<House>::decode(&raw).unwrap() {
            ChangeEvent::Delete { id, previous } => {
                assert_eq!(id, "7");
                assert!(previous.is_none());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_numeric_keys_agree_across_kinds() {
        let insert: RawChange = serde_json::from_value(json!({
            "eventType": "INSERT",
            "new": { "id": 7, "name": "Red", "total_points": 3 },
            "old": {}
        }))
        .unwrap();
        let update: RawChange = serde_json::from_value(json!({
            "eventType": "UPDATE",
            "new": { "id": 7, "name": "Red", "total_points": 5 },
            "old": { "id": 7, "name": "Red", "total_points": 3 }
        }))
        .unwrap();

        let inserted = match ChangeEvent::<House>::decode(&insert).unwrap() {
            ChangeEvent::Insert { record } => record,
            other => panic!("unexpected event {other:?}"),
        };
        assert_eq!(inserted.id, "7");

        match ChangeEvent::<House>::decode(&update).unwrap() {
            ChangeEvent::Update { record, previous } => {
                assert_eq!(record.id, "7");
                assert_eq!(previous.map(|house| house.total_points), Some(3));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_missing_new() {
        let raw = RawChange {
            event_type: ChangeKind::Insert,
            new: None,
            old: None,
        };
        assert!(ChangeEvent::<House>::decode(&raw).is_err());
    }

    #[test]
    fn test_event_kinds_only() {
        let kinds = EventKinds::only(&[ChangeKind::Update]);
        assert!(kinds.contains(ChangeKind::Update));
        assert!(!kinds.contains(ChangeKind::Insert));
        assert!(EventKinds::all().contains(ChangeKind::Delete));
    }
}
