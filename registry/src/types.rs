//! Identifiers and shared enums for the registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Generate a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a registered individual.
    IndividualId
);
string_id!(
    /// Identifier of a household.
    HouseholdId
);
string_id!(
    /// Identifier of a grievance ticket.
    TicketId
);
string_id!(
    /// Identifier of an identity document.
    DocumentId
);
string_id!(
    /// Identifier of a household role assignment.
    RoleId
);

/// Results key holding confirmed duplicates.
pub const DUPLICATES_KEY: &str = "duplicates";

/// Results key holding possible duplicates awaiting adjudication.
pub const POSSIBLE_DUPLICATES_KEY: &str = "possible_duplicates";

/// Deduplication status against the whole population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoldenRecordStatus {
    /// No match above threshold
    Unique,
    /// Confirmed duplicate of another record
    Duplicate,
    /// Match found, waiting for an operator decision
    NeedsAdjudication,
    /// Not deduplicated yet
    #[default]
    NotProcessed,
    /// Deduplication postponed
    Postpone,
}

/// Deduplication status within the current import batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    /// Unique within the batch
    UniqueInBatch,
    /// Duplicate of another batch record
    DuplicateInBatch,
    /// Similar to another batch record
    SimilarInBatch,
    /// Not deduplicated yet
    #[default]
    NotProcessed,
}

/// One match produced by the similarity producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchHit {
    /// Matched individual
    pub hit_id: IndividualId,
    /// Similarity score
    pub score: f64,
    /// Display name of the matched individual, when the producer supplies it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl MatchHit {
    /// Create a hit without a display name.
    pub fn new(hit_id: impl Into<IndividualId>, score: f64) -> Self {
        Self {
            hit_id: hit_id.into(),
            score,
            full_name: None,
        }
    }
}

/// Match sets keyed by results key.
pub type MatchResults = BTreeMap<String, Vec<MatchHit>>;

/// Household role held by an individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Primary collector
    Primary,
    /// Alternate collector
    Alternate,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Alternate => "ALTERNATE",
        }
    }
}

/// Validation status of an identity document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    #[default]
    Pending,
    Valid,
    NeedInvestigation,
    Invalid,
}
