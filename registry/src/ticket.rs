//! Needs-adjudication grievance tickets.
//!
//! A ticket records one open adjudication decision over a set of candidate
//! individuals. Two structurally different shapes exist:
//!
//! - **Legacy**: one golden record against one possible duplicate, with at
//!   most one individual selected for removal.
//! - **Multiple**: one golden record against an ordered set of possible
//!   duplicates, with any subset selected for removal.
//!
//! Tickets are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::types::{HouseholdId, IndividualId, MatchHit, TicketId};

/// Ticket workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[default]
    New = 1,
    Assigned = 2,
    InProgress = 3,
    OnHold = 4,
    ForApproval = 5,
    Closed = 6,
}

/// What kind of similarity raised the ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationIssue {
    /// Document numbers or other unique identifiers collide
    UniqueIdentifiersSimilarity,
    /// Names and biographic fields are similar
    #[default]
    BiographicalDataSimilarity,
    /// Face or fingerprint vectors are similar
    BiometricsSimilarity,
}

/// Which role a reassignment entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleKind {
    Head,
    Primary,
    Alternate,
}

/// Operator instruction for moving one role away from a removed individual.
///
/// Legacy tickets name the replacement in `individual`; multiple-duplicate
/// tickets name the current holder in `individual` and the replacement in
/// `new_individual`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleReassignment {
    pub role: RoleKind,
    pub household: HouseholdId,
    pub individual: IndividualId,
    #[serde(default)]
    pub new_individual: Option<IndividualId>,
}

/// Candidate individuals and the operator's selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version", rename_all = "snake_case")]
pub enum AdjudicationCandidates {
    /// Single possible duplicate.
    Legacy {
        golden: IndividualId,
        duplicate: IndividualId,
        #[serde(default)]
        selected: Option<IndividualId>,
    },
    /// Any number of possible duplicates.
    Multiple {
        golden: IndividualId,
        duplicates: Vec<IndividualId>,
        #[serde(default)]
        selected: BTreeSet<IndividualId>,
    },
}

impl AdjudicationCandidates {
    /// The anchor record.
    pub fn golden(&self) -> &IndividualId {
        match self {
            Self::Legacy { golden, .. } | Self::Multiple { golden, .. } => golden,
        }
    }

    /// Possible duplicates of the anchor, in ticket order.
    pub fn possible_duplicates(&self) -> Vec<&IndividualId> {
        match self {
            Self::Legacy { duplicate, .. } => vec![duplicate],
            Self::Multiple { duplicates, .. } => duplicates.iter().collect(),
        }
    }

    /// Golden record followed by the possible duplicates.
    pub fn all(&self) -> Vec<&IndividualId> {
        let mut all = vec![self.golden()];
        for duplicate in self.possible_duplicates() {
            if !all.contains(&duplicate) {
                all.push(duplicate);
            }
        }
        all
    }

    /// Individuals currently selected as duplicates.
    pub fn selected(&self) -> Vec<&IndividualId> {
        match self {
            Self::Legacy { selected, .. } => selected.iter().collect(),
            Self::Multiple { selected, .. } => selected.iter().collect(),
        }
    }

    pub fn involves(&self, individual: &IndividualId) -> bool {
        self.golden() == individual || self.possible_duplicates().contains(&individual)
    }

    /// Whether this ticket already pairs two members of `individuals`: its
    /// golden record and at least one of its duplicates are both in the set.
    pub fn links_any_pair(&self, individuals: &BTreeSet<IndividualId>) -> bool {
        individuals.contains(self.golden())
            && self
                .possible_duplicates()
                .into_iter()
                .any(|duplicate| individuals.contains(duplicate))
    }

    pub fn is_multiple_duplicates_version(&self) -> bool {
        matches!(self, Self::Multiple { .. })
    }
}

/// Raw score payload captured when the ticket was created.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtraData {
    /// Golden-record matches of the anchor
    pub golden_records: Vec<MatchHit>,
    /// Golden-record matches of the legacy possible duplicate
    pub possible_duplicate: Vec<MatchHit>,
}

/// Adjudication details attached to a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedsAdjudicationDetails {
    pub candidates: AdjudicationCandidates,
    pub extra_data: ExtraData,
    pub score_min: f64,
    pub score_max: f64,
    /// Candidates live in more than one admin area
    #[serde(default)]
    pub is_cross_area: bool,
    #[serde(default)]
    pub role_reassign_data: BTreeMap<String, RoleReassignment>,
}

/// A grievance ticket of the needs-adjudication category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrievanceTicket {
    /// Unique identifier
    pub id: TicketId,
    /// Human-facing number, e.g. `GRV-0000042`
    pub unicef_id: String,
    /// Similarity that raised the ticket
    pub issue_type: AdjudicationIssue,
    /// Workflow status
    pub status: TicketStatus,
    /// Owning business area
    pub business_area: String,
    /// Owning programme
    #[serde(default)]
    pub program_id: Option<String>,
    /// Import batch that triggered the ticket
    #[serde(default)]
    pub registration_data_import: Option<String>,
    /// Admin area of the golden record's household
    #[serde(default)]
    pub admin_area: Option<String>,
    /// Village of the golden record's household
    #[serde(default)]
    pub area: String,
    /// Tickets covering overlapping candidate clusters
    #[serde(default)]
    pub linked_tickets: BTreeSet<TicketId>,
    /// Who closed the ticket
    #[serde(default)]
    pub closed_by: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Adjudication details; absent on malformed legacy rows
    #[serde(default)]
    pub details: Option<NeedsAdjudicationDetails>,
}

impl GrievanceTicket {
    pub fn is_closed(&self) -> bool {
        self.status == TicketStatus::Closed
    }

    /// Whether the individual is either side of this ticket's match.
    pub fn involves(&self, individual: &IndividualId) -> bool {
        self.details
            .as_ref()
            .map(|details| details.candidates.involves(individual))
            .unwrap_or(false)
    }

    /// Format a ticket number from a sequence value.
    pub fn format_unicef_id(sequence: u64) -> String {
        format!("GRV-{:07}", sequence)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> BTreeSet<IndividualId> {
        values.iter().map(|v| IndividualId::from(*v)).collect()
    }

    fn multiple(golden: &str, duplicates: &[&str]) -> AdjudicationCandidates {
        AdjudicationCandidates::Multiple {
            golden: golden.into(),
            duplicates: duplicates.iter().map(|d| IndividualId::from(*d)).collect(),
            selected: BTreeSet::new(),
        }
    }

    #[test]
    fn test_links_any_pair() {
        let candidates = multiple("a", &["b", "c"]);

        assert!(candidates.links_any_pair(&ids(&["a", "c"])));
        assert!(candidates.links_any_pair(&ids(&["c", "a", "z"])));
        // golden missing from the set
        assert!(!candidates.links_any_pair(&ids(&["b", "c"])));
        // no duplicate in the set
        assert!(!candidates.links_any_pair(&ids(&["a", "z"])));
    }

    #[test]
    fn test_all_candidates_keep_order() {
        let candidates = multiple("g", &["s1", "s2", "s3"]);
        let all: Vec<&str> = candidates.all().into_iter().map(|id| id.as_str()).collect();
        assert_eq!(all, vec!["g", "s1", "s2", "s3"]);
    }

    #[test]
    fn test_legacy_shape() {
        let candidates = AdjudicationCandidates::Legacy {
            golden: "a".into(),
            duplicate: "b".into(),
            selected: None,
        };
        assert!(!candidates.is_multiple_duplicates_version());
        assert!(candidates.involves(&"b".into()));
        assert!(candidates.selected().is_empty());
    }

    #[test]
    fn test_format_unicef_id() {
        assert_eq!(GrievanceTicket::format_unicef_id(42), "GRV-0000042");
    }
}
