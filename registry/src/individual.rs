//! Individual records and their deduplication metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    BatchStatus, GoldenRecordStatus, HouseholdId, IndividualId, MatchHit, MatchResults,
    DUPLICATES_KEY, POSSIBLE_DUPLICATES_KEY,
};

/// A registered person.
///
/// Individuals are never deleted. A record found to be a duplicate is
/// soft-marked with [`Individual::mark_as_duplicate`] and keeps its household
/// reference so the household it was removed from stays traceable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    /// Unique identifier
    pub id: IndividualId,
    /// Human-facing identifier shared across programmes
    #[serde(default)]
    pub unicef_id: Option<String>,
    /// Full name
    pub full_name: String,
    /// Household the individual belongs to
    #[serde(default)]
    pub household_id: Option<HouseholdId>,
    /// Owning business area (tenant)
    pub business_area: String,
    /// Programme the record was registered for
    #[serde(default)]
    pub program_id: Option<String>,
    /// Import batch that created the record
    #[serde(default)]
    pub registration_data_import: Option<String>,
    /// Status against the whole population
    #[serde(default)]
    pub deduplication_golden_record_status: GoldenRecordStatus,
    /// Status within the import batch
    #[serde(default)]
    pub deduplication_batch_status: BatchStatus,
    /// Population-wide match sets
    #[serde(default)]
    pub deduplication_golden_record_results: MatchResults,
    /// Batch-scoped match sets
    #[serde(default)]
    pub deduplication_batch_results: MatchResults,
    /// Whether the record was adjudicated as a duplicate
    #[serde(default)]
    pub is_duplicate: bool,
    /// Surviving record this one duplicates
    #[serde(default)]
    pub duplicate_of: Option<IndividualId>,
    /// When the record was marked duplicate
    #[serde(default)]
    pub duplicate_at: Option<DateTime<Utc>>,
    /// Withdrawn from assistance
    #[serde(default)]
    pub withdrawn: bool,
    /// Confirmed match on a sanction list
    #[serde(default)]
    pub sanction_list_confirmed_match: bool,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Individual {
    /// Create a not-yet-deduplicated individual.
    pub fn new(
        id: impl Into<IndividualId>,
        full_name: impl Into<String>,
        business_area: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            unicef_id: None,
            full_name: full_name.into(),
            household_id: None,
            business_area: business_area.into(),
            program_id: None,
            registration_data_import: None,
            deduplication_golden_record_status: GoldenRecordStatus::NotProcessed,
            deduplication_batch_status: BatchStatus::NotProcessed,
            deduplication_golden_record_results: MatchResults::new(),
            deduplication_batch_results: MatchResults::new(),
            is_duplicate: false,
            duplicate_of: None,
            duplicate_at: None,
            withdrawn: false,
            sanction_list_confirmed_match: false,
            updated_at: Utc::now(),
        }
    }

    /// Place the individual in a household.
    pub fn with_household(mut self, household_id: impl Into<HouseholdId>) -> Self {
        self.household_id = Some(household_id.into());
        self
    }

    /// Record population-wide matches and flag the record for adjudication.
    pub fn with_possible_duplicates(mut self, hits: Vec<MatchHit>) -> Self {
        self.deduplication_golden_record_status = GoldenRecordStatus::NeedsAdjudication;
        self.deduplication_golden_record_results
            .insert(POSSIBLE_DUPLICATES_KEY.to_string(), hits);
        self
    }

    /// The golden-record match list for the current status.
    ///
    /// Confirmed duplicates read the `duplicates` set, everything else reads
    /// `possible_duplicates`.
    pub fn golden_record_matches(&self) -> &[MatchHit] {
        let key = if self.deduplication_golden_record_status == GoldenRecordStatus::Duplicate {
            DUPLICATES_KEY
        } else {
            POSSIBLE_DUPLICATES_KEY
        };
        self.deduplication_golden_record_results
            .get(key)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Reset deduplication to "unique" and drop all match sets.
    pub fn clear_deduplication(&mut self) {
        self.deduplication_golden_record_status = GoldenRecordStatus::Unique;
        self.deduplication_batch_status = BatchStatus::UniqueInBatch;
        self.deduplication_golden_record_results.clear();
        self.deduplication_batch_results.clear();
        self.updated_at = Utc::now();
    }

    /// Soft-mark this record as a duplicate of `original`.
    pub fn mark_as_duplicate(&mut self, original: &Individual) {
        if original.unicef_id.is_some() {
            self.unicef_id = original.unicef_id.clone();
        }
        let now = Utc::now();
        self.is_duplicate = true;
        self.duplicate_of = Some(original.id.clone());
        self.duplicate_at = Some(now);
        self.deduplication_golden_record_status = GoldenRecordStatus::Duplicate;
        self.updated_at = now;
    }

    /// Counts towards its household's active members.
    pub fn is_active(&self) -> bool {
        !self.is_duplicate && !self.withdrawn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_golden_record_matches_follow_status() {
        let mut individual = Individual::new("ind-1", "Amina Yusuf", "afghanistan")
            .with_possible_duplicates(vec![MatchHit::new("ind-2", 0.4)]);
        individual
            .deduplication_golden_record_results
            .insert(DUPLICATES_KEY.to_string(), vec![MatchHit::new("ind-3", 0.9)]);

        assert_eq!(individual.golden_record_matches()[0].hit_id.as_str(), "ind-2");

        individual.deduplication_golden_record_status = GoldenRecordStatus::Duplicate;
        assert_eq!(individual.golden_record_matches()[0].hit_id.as_str(), "ind-3");
    }

    #[test]
    fn test_golden_record_matches_empty_without_key() {
        let individual = Individual::new("ind-1", "Amina Yusuf", "afghanistan");
        assert!(individual.golden_record_matches().is_empty());
    }

    #[test]
    fn test_clear_deduplication() {
        let mut individual = Individual::new("ind-1", "Amina Yusuf", "afghanistan")
            .with_possible_duplicates(vec![MatchHit::new("ind-2", 0.4)]);
        individual.deduplication_batch_status = BatchStatus::SimilarInBatch;
        individual
            .deduplication_batch_results
            .insert("duplicates".to_string(), vec![MatchHit::new("ind-5", 0.7)]);

        individual.clear_deduplication();

        assert_eq!(
            individual.deduplication_golden_record_status,
            GoldenRecordStatus::Unique
        );
        assert_eq!(individual.deduplication_batch_status, BatchStatus::UniqueInBatch);
        assert!(individual.deduplication_golden_record_results.is_empty());
        assert!(individual.deduplication_batch_results.is_empty());
    }

    #[test]
    fn test_mark_as_duplicate() {
        let mut original = Individual::new("ind-1", "Amina Yusuf", "afghanistan");
        original.unicef_id = Some("IND-001".to_string());
        let mut copy = Individual::new("ind-2", "Amina Yusef", "afghanistan");

        copy.mark_as_duplicate(&original);

        assert!(copy.is_duplicate);
        assert!(!copy.is_active());
        assert_eq!(copy.duplicate_of, Some(original.id.clone()));
        assert_eq!(copy.unicef_id.as_deref(), Some("IND-001"));
        assert!(copy.duplicate_at.is_some());
    }
}
