//! Registry fixtures shared by unit tests.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;

use registry::{
    AdjudicationCandidates, AdjudicationIssue, Document, DocumentStatus, ExtraData,
    GrievanceTicket, Household, Individual, IndividualId, MatchHit, NeedsAdjudicationDetails,
    Registry, RegistryState, Role, RoleAssignment, RoleReassignment, TicketId, TicketStatus,
};

pub const BUSINESS_AREA: &str = "afghanistan";

pub fn id(value: &str) -> IndividualId {
    IndividualId::from(value)
}

/// Builds a seeded [`RegistryState`].
#[derive(Default)]
pub struct StateBuilder {
    state: RegistryState,
    tickets: usize,
}

impl StateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn household(mut self, household: &str, admin_area: &str) -> Self {
        self.state.insert_household(
            Household::new(household, BUSINESS_AREA)
                .with_location(admin_area, format!("village-{}", household)),
        );
        self
    }

    pub fn member(mut self, name: &str, household: &str) -> Self {
        self.state
            .insert_individual(person(name).with_household(household));
        self
    }

    /// An individual without a household.
    pub fn loner(mut self, name: &str) -> Self {
        self.state.insert_individual(person(name));
        self
    }

    /// A member that heads its household.
    pub fn head(self, name: &str, household: &str) -> Self {
        let mut builder = self.member(name, household);
        if let Some(h) = builder.state.household_mut(&household.into()) {
            h.head_of_household = Some(id(name));
        }
        builder
    }

    pub fn role(mut self, name: &str, household: &str, role: Role) -> Self {
        self.state
            .insert_role(RoleAssignment::new(name, household, role));
        self
    }

    /// Golden-record hits flagging `name` for adjudication.
    pub fn hits(mut self, name: &str, hits: &[(&str, f64)]) -> Self {
        let hits = hits
            .iter()
            .map(|(hit, score)| MatchHit::new(*hit, *score))
            .collect();
        if let Some(individual) = self.state.individual_mut(&id(name)) {
            *individual = individual.clone().with_possible_duplicates(hits);
        }
        self
    }

    pub fn sanctioned(mut self, name: &str) -> Self {
        if let Some(individual) = self.state.individual_mut(&id(name)) {
            individual.sanction_list_confirmed_match = true;
        }
        self
    }

    pub fn document(mut self, name: &str, document_type: &str, number: &str, status: DocumentStatus) -> Self {
        let mut document = Document::new(name, document_type, number);
        document.status = status;
        self.state.insert_document(document);
        self
    }

    pub fn legacy_ticket(
        &mut self,
        golden: &str,
        duplicate: &str,
        selected: Option<&str>,
        role_reassign_data: BTreeMap<String, RoleReassignment>,
    ) -> TicketId {
        let candidates = AdjudicationCandidates::Legacy {
            golden: id(golden),
            duplicate: id(duplicate),
            selected: selected.map(id),
        };
        self.ticket(Some(details(candidates, role_reassign_data)))
    }

    pub fn multiple_ticket(
        &mut self,
        golden: &str,
        duplicates: &[&str],
        selected: BTreeSet<IndividualId>,
        role_reassign_data: BTreeMap<String, RoleReassignment>,
    ) -> TicketId {
        let candidates = AdjudicationCandidates::Multiple {
            golden: id(golden),
            duplicates: duplicates.iter().map(|d| id(d)).collect(),
            selected,
        };
        self.ticket(Some(details(candidates, role_reassign_data)))
    }

    /// A ticket without adjudication details.
    pub fn bare_ticket(&mut self) -> TicketId {
        self.ticket(None)
    }

    pub fn state(self) -> RegistryState {
        self.state
    }

    pub fn registry(self) -> Registry {
        Registry::from_state(self.state)
    }

    fn ticket(&mut self, details: Option<NeedsAdjudicationDetails>) -> TicketId {
        self.tickets += 1;
        let now = Utc::now();
        let ticket = GrievanceTicket {
            id: TicketId::from(format!("ticket-{}", self.tickets)),
            unicef_id: format!("GRV-SEED-{}", self.tickets),
            issue_type: AdjudicationIssue::BiographicalDataSimilarity,
            status: TicketStatus::New,
            business_area: BUSINESS_AREA.to_string(),
            program_id: None,
            registration_data_import: None,
            admin_area: None,
            area: String::new(),
            linked_tickets: BTreeSet::new(),
            closed_by: None,
            created_at: now,
            updated_at: now,
            details,
        };
        let ticket_id = ticket.id.clone();
        self.state.insert_ticket(ticket);
        ticket_id
    }
}

fn person(name: &str) -> Individual {
    Individual::new(name, format!("Person {}", name), BUSINESS_AREA)
}

fn details(
    candidates: AdjudicationCandidates,
    role_reassign_data: BTreeMap<String, RoleReassignment>,
) -> NeedsAdjudicationDetails {
    NeedsAdjudicationDetails {
        candidates,
        extra_data: ExtraData::default(),
        score_min: 0.0,
        score_max: 0.0,
        is_cross_area: false,
        role_reassign_data,
    }
}
