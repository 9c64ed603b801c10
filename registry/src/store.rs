//! Transactional in-memory registry store.
//!
//! All mutations go through [`Registry::atomic`]. The closure receives a
//! [`Transaction`] that stages every touched entity in a [`ChangeSet`]; the
//! change set is applied to the state in one bulk write only when the closure
//! returns `Ok`. An `Err` drops the change set, so a failed operation leaves
//! no partial mutation behind.
//!
//! The write lock is held for the whole transaction. Read-then-write checks
//! made inside a transaction therefore cannot race with another transaction
//! of the same process.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::activity::ActivityLogEntry;
use crate::document::Document;
use crate::household::{Household, RoleAssignment};
use crate::individual::Individual;
use crate::ticket::GrievanceTicket;
use crate::types::{DocumentId, HouseholdId, IndividualId, RoleId, TicketId};

/// Error types for registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Entity lookup failed
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Snapshot or payload (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Snapshot file could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Read access shared by the committed state and open transactions.
pub trait RegistryRead {
    fn individual(&self, id: &IndividualId) -> Option<&Individual>;

    fn household(&self, id: &HouseholdId) -> Option<&Household>;

    fn ticket(&self, id: &TicketId) -> Option<&GrievanceTicket>;

    fn individuals(&self) -> Box<dyn Iterator<Item = &Individual> + '_>;

    fn households(&self) -> Box<dyn Iterator<Item = &Household> + '_>;

    fn roles(&self) -> Box<dyn Iterator<Item = &RoleAssignment> + '_>;

    fn documents(&self) -> Box<dyn Iterator<Item = &Document> + '_>;

    fn tickets(&self) -> Box<dyn Iterator<Item = &GrievanceTicket> + '_>;

    /// Individuals whose household reference points at `household`.
    fn household_members(&self, household: &HouseholdId) -> Vec<&Individual> {
        self.individuals()
            .filter(|i| i.household_id.as_ref() == Some(household))
            .collect()
    }

    /// Members that are neither duplicates nor withdrawn.
    fn active_individual_count(&self, household: &HouseholdId) -> usize {
        self.household_members(household)
            .into_iter()
            .filter(|i| i.is_active())
            .count()
    }

    /// Roles held by an individual across households.
    fn roles_of(&self, individual: &IndividualId) -> Vec<&RoleAssignment> {
        self.roles()
            .filter(|r| &r.individual_id == individual)
            .collect()
    }

    /// Roles held in a household.
    fn roles_in(&self, household: &HouseholdId) -> Vec<&RoleAssignment> {
        self.roles()
            .filter(|r| &r.household_id == household)
            .collect()
    }

    fn documents_of(&self, individual: &IndividualId) -> Vec<&Document> {
        self.documents()
            .filter(|d| &d.individual_id == individual)
            .collect()
    }

    /// Tickets that are not closed.
    fn open_tickets(&self) -> Box<dyn Iterator<Item = &GrievanceTicket> + '_> {
        Box::new(self.tickets().filter(|t| !t.is_closed()))
    }
}

/// All registry tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryState {
    #[serde(default)]
    individuals: BTreeMap<IndividualId, Individual>,
    #[serde(default)]
    households: BTreeMap<HouseholdId, Household>,
    #[serde(default)]
    roles: BTreeMap<RoleId, RoleAssignment>,
    #[serde(default)]
    documents: BTreeMap<DocumentId, Document>,
    #[serde(default)]
    tickets: BTreeMap<TicketId, GrievanceTicket>,
    #[serde(default)]
    activity_log: Vec<ActivityLogEntry>,
    #[serde(default)]
    ticket_sequence: u64,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_individual(&mut self, individual: Individual) {
        self.individuals.insert(individual.id.clone(), individual);
    }

    pub fn insert_household(&mut self, household: Household) {
        self.households.insert(household.id.clone(), household);
    }

    pub fn insert_role(&mut self, role: RoleAssignment) {
        self.roles.insert(role.id.clone(), role);
    }

    pub fn insert_document(&mut self, document: Document) {
        self.documents.insert(document.id.clone(), document);
    }

    pub fn insert_ticket(&mut self, ticket: GrievanceTicket) {
        self.tickets.insert(ticket.id.clone(), ticket);
    }

    /// Direct access for seeding and imports; bypasses transactions.
    pub fn individual_mut(&mut self, id: &IndividualId) -> Option<&mut Individual> {
        self.individuals.get_mut(id)
    }

    pub fn household_mut(&mut self, id: &HouseholdId) -> Option<&mut Household> {
        self.households.get_mut(id)
    }

    /// Audited mutations, oldest first.
    pub fn activity_log(&self) -> &[ActivityLogEntry] {
        &self.activity_log
    }

    /// Load a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, RegistryError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a snapshot file.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write a snapshot file.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Apply a committed change set in one write.
    fn apply(&mut self, changes: ChangeSet) {
        self.individuals.extend(changes.individuals);
        self.households.extend(changes.households);
        self.documents.extend(changes.documents);
        self.tickets.extend(changes.tickets);
        for (id, role) in changes.roles {
            match role {
                Some(role) => {
                    self.roles.insert(id, role);
                }
                None => {
                    self.roles.remove(&id);
                }
            }
        }
        self.activity_log.extend(changes.activity);
        if let Some(sequence) = changes.ticket_sequence {
            self.ticket_sequence = sequence;
        }
    }
}

impl RegistryRead for RegistryState {
    fn individual(&self, id: &IndividualId) -> Option<&Individual> {
        self.individuals.get(id)
    }

    fn household(&self, id: &HouseholdId) -> Option<&Household> {
        self.households.get(id)
    }

    fn ticket(&self, id: &TicketId) -> Option<&GrievanceTicket> {
        self.tickets.get(id)
    }

    fn individuals(&self) -> Box<dyn Iterator<Item = &Individual> + '_> {
        Box::new(self.individuals.values())
    }

    fn households(&self) -> Box<dyn Iterator<Item = &Household> + '_> {
        Box::new(self.households.values())
    }

    fn roles(&self) -> Box<dyn Iterator<Item = &RoleAssignment> + '_> {
        Box::new(self.roles.values())
    }

    fn documents(&self) -> Box<dyn Iterator<Item = &Document> + '_> {
        Box::new(self.documents.values())
    }

    fn tickets(&self) -> Box<dyn Iterator<Item = &GrievanceTicket> + '_> {
        Box::new(self.tickets.values())
    }
}

/// Entities staged by a transaction.
///
/// A `None` role marks a deleted assignment.
#[derive(Debug, Default)]
pub struct ChangeSet {
    individuals: BTreeMap<IndividualId, Individual>,
    households: BTreeMap<HouseholdId, Household>,
    roles: BTreeMap<RoleId, Option<RoleAssignment>>,
    documents: BTreeMap<DocumentId, Document>,
    tickets: BTreeMap<TicketId, GrievanceTicket>,
    activity: Vec<ActivityLogEntry>,
    ticket_sequence: Option<u64>,
}

impl ChangeSet {
    /// Number of staged writes.
    pub fn len(&self) -> usize {
        self.individuals.len()
            + self.households.len()
            + self.roles.len()
            + self.documents.len()
            + self.tickets.len()
            + self.activity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0 && self.ticket_sequence.is_none()
    }
}

/// Copy-on-write view over the committed state.
pub struct Transaction<'a> {
    base: &'a RegistryState,
    changes: ChangeSet,
}

impl<'a> Transaction<'a> {
    fn new(base: &'a RegistryState) -> Self {
        Self {
            base,
            changes: ChangeSet::default(),
        }
    }

    fn into_changes(self) -> ChangeSet {
        self.changes
    }

    pub fn individual_mut(&mut self, id: &IndividualId) -> Result<&mut Individual, RegistryError> {
        if !self.changes.individuals.contains_key(id) {
            let current = self
                .base
                .individuals
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::not_found("Individual", id))?;
            self.changes.individuals.insert(id.clone(), current);
        }
        self.changes
            .individuals
            .get_mut(id)
            .ok_or_else(|| RegistryError::not_found("Individual", id))
    }

    pub fn household_mut(&mut self, id: &HouseholdId) -> Result<&mut Household, RegistryError> {
        if !self.changes.households.contains_key(id) {
            let current = self
                .base
                .households
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::not_found("Household", id))?;
            self.changes.households.insert(id.clone(), current);
        }
        self.changes
            .households
            .get_mut(id)
            .ok_or_else(|| RegistryError::not_found("Household", id))
    }

    pub fn document_mut(&mut self, id: &DocumentId) -> Result<&mut Document, RegistryError> {
        if !self.changes.documents.contains_key(id) {
            let current = self
                .base
                .documents
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::not_found("Document", id))?;
            self.changes.documents.insert(id.clone(), current);
        }
        self.changes
            .documents
            .get_mut(id)
            .ok_or_else(|| RegistryError::not_found("Document", id))
    }

    pub fn ticket_mut(&mut self, id: &TicketId) -> Result<&mut GrievanceTicket, RegistryError> {
        if !self.changes.tickets.contains_key(id) {
            let current = self
                .base
                .tickets
                .get(id)
                .cloned()
                .ok_or_else(|| RegistryError::not_found("Ticket", id))?;
            self.changes.tickets.insert(id.clone(), current);
        }
        self.changes
            .tickets
            .get_mut(id)
            .ok_or_else(|| RegistryError::not_found("Ticket", id))
    }

    /// Stage a new or replaced ticket.
    pub fn put_ticket(&mut self, ticket: GrievanceTicket) {
        self.changes.tickets.insert(ticket.id.clone(), ticket);
    }

    /// Stage a new or replaced role assignment.
    pub fn put_role(&mut self, role: RoleAssignment) {
        self.changes.roles.insert(role.id.clone(), Some(role));
    }

    /// Stage removal of a role assignment.
    pub fn remove_role(&mut self, id: &RoleId) {
        self.changes.roles.insert(id.clone(), None);
    }

    pub fn append_activity(&mut self, entry: ActivityLogEntry) {
        self.changes.activity.push(entry);
    }

    /// Allocate the next ticket sequence value.
    pub fn next_ticket_sequence(&mut self) -> u64 {
        let next = self
            .changes
            .ticket_sequence
            .unwrap_or(self.base.ticket_sequence)
            + 1;
        self.changes.ticket_sequence = Some(next);
        next
    }
}

impl RegistryRead for Transaction<'_> {
    fn individual(&self, id: &IndividualId) -> Option<&Individual> {
        self.changes
            .individuals
            .get(id)
            .or_else(|| self.base.individuals.get(id))
    }

    fn household(&self, id: &HouseholdId) -> Option<&Household> {
        self.changes
            .households
            .get(id)
            .or_else(|| self.base.households.get(id))
    }

    fn ticket(&self, id: &TicketId) -> Option<&GrievanceTicket> {
        self.changes
            .tickets
            .get(id)
            .or_else(|| self.base.tickets.get(id))
    }

    fn individuals(&self) -> Box<dyn Iterator<Item = &Individual> + '_> {
        Box::new(
            self.base
                .individuals
                .values()
                .filter(|i| !self.changes.individuals.contains_key(&i.id))
                .chain(self.changes.individuals.values()),
        )
    }

    fn households(&self) -> Box<dyn Iterator<Item = &Household> + '_> {
        Box::new(
            self.base
                .households
                .values()
                .filter(|h| !self.changes.households.contains_key(&h.id))
                .chain(self.changes.households.values()),
        )
    }

    fn roles(&self) -> Box<dyn Iterator<Item = &RoleAssignment> + '_> {
        Box::new(
            self.base
                .roles
                .values()
                .filter(|r| !self.changes.roles.contains_key(&r.id))
                .chain(self.changes.roles.values().filter_map(Option::as_ref)),
        )
    }

    fn documents(&self) -> Box<dyn Iterator<Item = &Document> + '_> {
        Box::new(
            self.base
                .documents
                .values()
                .filter(|d| !self.changes.documents.contains_key(&d.id))
                .chain(self.changes.documents.values()),
        )
    }

    fn tickets(&self) -> Box<dyn Iterator<Item = &GrievanceTicket> + '_> {
        Box::new(
            self.base
                .tickets
                .values()
                .filter(|t| !self.changes.tickets.contains_key(&t.id))
                .chain(self.changes.tickets.values()),
        )
    }
}

/// Shared handle to the registry state.
#[derive(Clone, Default)]
pub struct Registry {
    state: Arc<RwLock<RegistryState>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing state.
    pub fn from_state(state: RegistryState) -> Self {
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Run `operation` as one all-or-nothing transaction.
    pub async fn atomic<T, E, F>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<T, E>,
    {
        let mut state = self.state.write().await;
        let (value, changes) = {
            let mut tx = Transaction::new(&state);
            let value = operation(&mut tx)?;
            (value, tx.into_changes())
        };

        if changes.is_empty() {
            return Ok(value);
        }
        debug!(writes = changes.len(), "Committing registry transaction");
        state.apply(changes);
        Ok(value)
    }

    /// Run a read-only closure against the committed state.
    pub async fn read<T>(&self, reader: impl FnOnce(&RegistryState) -> T) -> T {
        let state = self.state.read().await;
        reader(&state)
    }

    /// Clone the committed state.
    pub async fn snapshot(&self) -> RegistryState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn seeded() -> RegistryState {
        let mut state = RegistryState::new();
        state.insert_household(Household::new("hh-1", "afghanistan"));
        state.insert_individual(Individual::new("ind-1", "Amina Yusuf", "afghanistan").with_household("hh-1"));
        state.insert_individual(Individual::new("ind-2", "Omar Yusuf", "afghanistan").with_household("hh-1"));
        state
    }

    #[tokio::test]
    async fn test_commit_applies_staged_changes() {
        let registry = Registry::from_state(seeded());

        registry
            .atomic(|tx| -> Result<(), RegistryError> {
                tx.individual_mut(&"ind-1".into())?.is_duplicate = true;
                assert!(tx.individual(&"ind-1".into()).unwrap().is_duplicate);
                assert_eq!(tx.active_individual_count(&"hh-1".into()), 1);
                Ok(())
            })
            .await
            .unwrap();

        registry
            .read(|state| {
                assert!(state.individual(&"ind-1".into()).unwrap().is_duplicate);
            })
            .await;
    }

    #[tokio::test]
    async fn test_error_rolls_back() {
        let registry = Registry::from_state(seeded());

        let result = registry
            .atomic(|tx| -> Result<(), RegistryError> {
                tx.individual_mut(&"ind-1".into())?.is_duplicate = true;
                tx.individual_mut(&"missing".into())?;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RegistryError::NotFound { kind: "Individual", .. })));
        let state = registry.snapshot().await;
        assert!(!state.individual(&"ind-1".into()).unwrap().is_duplicate);
    }

    #[test]
    fn test_role_removal_hidden_in_transaction() {
        let mut state = seeded();
        let role = RoleAssignment::new("ind-1", "hh-1", Role::Primary);
        let role_id = role.id.clone();
        state.insert_role(role);

        let registry = Registry::from_state(state);
        tokio_test::block_on(async {
            registry
                .atomic(|tx| -> Result<(), RegistryError> {
                    assert_eq!(tx.roles_of(&"ind-1".into()).len(), 1);
                    tx.remove_role(&role_id);
                    assert!(tx.roles_of(&"ind-1".into()).is_empty());
                    Ok(())
                })
                .await
                .unwrap();

            assert!(registry.snapshot().await.roles_in(&"hh-1".into()).is_empty());
        });
    }

    #[test]
    fn test_ticket_sequence_only_advances_on_commit() {
        let registry = Registry::from_state(seeded());
        tokio_test::block_on(async {
            let _ = registry
                .atomic(|tx| -> Result<(), RegistryError> {
                    assert_eq!(tx.next_ticket_sequence(), 1);
                    Err(RegistryError::not_found("Ticket", "abort"))
                })
                .await;

            let sequence = registry
                .atomic(|tx| -> Result<u64, RegistryError> { Ok(tx.next_ticket_sequence()) })
                .await
                .unwrap();
            assert_eq!(sequence, 1);
        });
    }

    #[test]
    fn test_snapshot_json_roundtrip_keeps_tables() {
        let state = seeded();
        let json = state.to_json().unwrap();
        let parsed = RegistryState::from_json(&json).unwrap();
        assert_eq!(parsed.household_members(&"hh-1".into()).len(), 2);
    }

    #[test]
    fn test_snapshot_file_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("registry.json");

        seeded().save(&path).unwrap();
        let loaded = RegistryState::load(&path).unwrap();
        assert!(loaded.individual(&"ind-2".into()).is_some());

        let missing = RegistryState::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(RegistryError::Io(_))));
    }
}
