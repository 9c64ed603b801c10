//! Core types for the adjudication engine.

use serde::{Deserialize, Serialize};

use registry::{AdjudicationIssue, HouseholdId, IndividualId, RegistryError, TicketId};

/// Tenant scope stamped on created tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketScope {
    /// Business area (tenant)
    pub business_area: String,
    /// Programme, when the tickets belong to one
    #[serde(default)]
    pub program_id: Option<String>,
}

impl TicketScope {
    pub fn business_area(business_area: impl Into<String>) -> Self {
        Self {
            business_area: business_area.into(),
            program_id: None,
        }
    }

    pub fn with_program(mut self, program_id: impl Into<String>) -> Self {
        self.program_id = Some(program_id.into());
        self
    }
}

/// Parameters of one materialization batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterializeRequest {
    /// Key of the golden-record match set to read hits from
    pub results_key: String,
    /// Scope for created tickets
    pub scope: TicketScope,
    /// Import batch to stamp on tickets
    #[serde(default)]
    pub import_batch: Option<String>,
    /// Issue type; falls back to the configured default
    #[serde(default)]
    pub issue_type: Option<AdjudicationIssue>,
}

impl MaterializeRequest {
    pub fn new(results_key: impl Into<String>, scope: TicketScope) -> Self {
        Self {
            results_key: results_key.into(),
            scope,
            import_batch: None,
            issue_type: None,
        }
    }

    pub fn with_import_batch(mut self, import_batch: impl Into<String>) -> Self {
        self.import_batch = Some(import_batch.into());
        self
    }

    pub fn with_issue_type(mut self, issue_type: AdjudicationIssue) -> Self {
        self.issue_type = Some(issue_type);
        self
    }
}

/// Input of [`crate::materializer::create_ticket_with_details`].
#[derive(Debug, Clone)]
pub struct NewTicket {
    /// Golden record the ticket is anchored on
    pub main: IndividualId,
    /// Legacy single duplicate; also feeds `extra_data.possible_duplicate`
    pub possible_duplicate: IndividualId,
    /// Resolved possible duplicates used by the multiple-duplicates shape
    pub possible_duplicates: Vec<IndividualId>,
    /// Select the multiple-duplicates shape
    pub is_multiple_duplicates_version: bool,
    pub scope: TicketScope,
    pub import_batch: Option<String>,
    pub issue_type: AdjudicationIssue,
}

impl NewTicket {
    /// A legacy ticket pairing two individuals.
    pub fn legacy(
        main: impl Into<IndividualId>,
        possible_duplicate: impl Into<IndividualId>,
        scope: TicketScope,
    ) -> Self {
        let possible_duplicate = possible_duplicate.into();
        Self {
            main: main.into(),
            possible_duplicates: vec![possible_duplicate.clone()],
            possible_duplicate,
            is_multiple_duplicates_version: false,
            scope,
            import_batch: None,
            issue_type: AdjudicationIssue::default(),
        }
    }

    /// A multiple-duplicates ticket anchored on `main`.
    pub fn multiple(
        main: impl Into<IndividualId>,
        possible_duplicates: Vec<IndividualId>,
        scope: TicketScope,
    ) -> Self {
        let main = main.into();
        Self {
            possible_duplicate: main.clone(),
            main,
            possible_duplicates,
            is_multiple_duplicates_version: true,
            scope,
            import_batch: None,
            issue_type: AdjudicationIssue::default(),
        }
    }
}

/// What a ticket close changed.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub ticket_id: TicketId,
    /// Individual the duplicates were merged into
    pub survivor: Option<IndividualId>,
    /// Individuals marked duplicate
    pub duplicates: Vec<IndividualId>,
    /// Individuals whose deduplication metadata was cleared
    pub cleared: Vec<IndividualId>,
    /// Households withdrawn because no active member remained
    pub withdrawn_households: Vec<HouseholdId>,
    /// Sibling tickets whose selection was updated
    pub updated_siblings: Vec<TicketId>,
}

impl CloseOutcome {
    pub fn new(ticket_id: TicketId) -> Self {
        Self {
            ticket_id,
            survivor: None,
            duplicates: Vec::new(),
            cleared: Vec::new(),
            withdrawn_households: Vec::new(),
            updated_siblings: Vec::new(),
        }
    }
}

/// Error types for the adjudication engine.
#[derive(Debug, thiserror::Error)]
pub enum AdjudicationError {
    /// Underlying store failure
    #[error("Registry error: {0}")]
    RegistryError(#[from] RegistryError),

    /// Ticket lookup failed
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Ticket is closed and can no longer change
    #[error("Ticket {0} is already closed")]
    TicketAlreadyClosed(TicketId),

    /// A removed individual still holds a primary collector role
    #[error("Ticket cannot be closed, primary collector role has to be reassigned")]
    PrimaryCollectorNotReassigned {
        individual: IndividualId,
        household: HouseholdId,
    },

    /// A removed individual still heads a household with active members
    #[error("Ticket cannot be closed, head of household has to be reassigned")]
    HeadOfHouseholdNotReassigned {
        individual: IndividualId,
        household: HouseholdId,
    },

    /// Role reassignment data is unusable
    #[error("Invalid role reassignment: {0}")]
    InvalidRoleReassignment(String),

    /// Operator selection is unusable
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// Status change not allowed
    #[error("Invalid status transition: {0}")]
    InvalidStatusTransition(String),

    /// Unknown targeting flag name
    #[error("Unknown targeting flag: {0}")]
    UnknownTargetingFlag(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, AdjudicationError>;
