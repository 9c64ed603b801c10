//! Activity log entries for audited mutations.
//!
//! Entries are produced by diffing the serialized form of an entity before
//! and after a mutation. The log is append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::store::RegistryError;

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Create,
    Update,
    Delete,
}

/// Old and new value of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// One audited mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    /// Unique entry ID
    pub id: String,
    /// What happened
    pub action: ActivityAction,
    /// Who did it
    pub actor: String,
    /// Business area of the object
    pub business_area: String,
    /// Entity kind, e.g. `individual`
    pub object_type: String,
    /// Entity identifier
    pub object_id: String,
    /// Changed top-level fields
    pub changes: BTreeMap<String, FieldChange>,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl ActivityLogEntry {
    /// Build an update entry comparing `old` and `new`.
    pub fn update<T: Serialize>(
        actor: &str,
        business_area: &str,
        object_type: &str,
        object_id: &str,
        old: &T,
        new: &T,
    ) -> Result<Self, RegistryError> {
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            action: ActivityAction::Update,
            actor: actor.to_string(),
            business_area: business_area.to_string(),
            object_type: object_type.to_string(),
            object_id: object_id.to_string(),
            changes: compare(old, new)?,
            timestamp: Utc::now(),
        })
    }
}

/// Diff the top-level fields of two serializable values.
///
/// Non-object values are reported under the empty field name.
pub fn compare<T: Serialize>(
    old: &T,
    new: &T,
) -> Result<BTreeMap<String, FieldChange>, RegistryError> {
    let old = serde_json::to_value(old)?;
    let new = serde_json::to_value(new)?;
    let mut changes = BTreeMap::new();

    match (old, new) {
        (serde_json::Value::Object(old), serde_json::Value::Object(mut new)) => {
            for (field, from) in old {
                let to = new.remove(&field).unwrap_or(serde_json::Value::Null);
                if from != to {
                    changes.insert(field, FieldChange { from, to });
                }
            }
            for (field, to) in new {
                changes.insert(
                    field,
                    FieldChange {
                        from: serde_json::Value::Null,
                        to,
                    },
                );
            }
        }
        (from, to) => {
            if from != to {
                changes.insert(String::new(), FieldChange { from, to });
            }
        }
    }

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::individual::Individual;

    #[test]
    fn test_compare_reports_changed_fields_only() {
        let old = Individual::new("ind-1", "Amina Yusuf", "afghanistan");
        let mut new = old.clone();
        new.is_duplicate = true;
        new.full_name = "Amina Y.".to_string();

        let changes = compare(&old, &new).unwrap();

        assert_eq!(changes.len(), 2);
        assert_eq!(changes["is_duplicate"].from, serde_json::json!(false));
        assert_eq!(changes["is_duplicate"].to, serde_json::json!(true));
        assert!(changes.contains_key("full_name"));
    }

    #[test]
    fn test_update_entry() {
        let old = Individual::new("ind-1", "Amina Yusuf", "afghanistan");
        let entry = ActivityLogEntry::update("operator", "afghanistan", "individual", "ind-1", &old, &old)
            .unwrap();

        assert_eq!(entry.action, ActivityAction::Update);
        assert!(entry.changes.is_empty());
    }
}
