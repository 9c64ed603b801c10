//! Beneficiary Registry
//!
//! Data model and transactional store for the adjudication engine:
//!
//! - **Individuals**: person records carrying deduplication status and match sets
//! - **Households**: member groups with head of household and collector roles
//! - **Documents**: identity documents used for hard deduplication
//! - **Tickets**: needs-adjudication grievance tickets
//! - **Activity log**: append-only audit of individual mutations
//!
//! # Key Components
//!
//! - [`Registry`]: shared handle running all-or-nothing transactions
//! - [`Transaction`]: copy-on-write overlay staging a [`ChangeSet`]
//! - [`RegistryRead`]: read seam over committed state and open transactions
//!
//! # Example
//!
//! ```ignore
//! use registry::{Registry, RegistryRead, RegistryState};
//!
//! let registry = Registry::from_state(RegistryState::load(path)?);
//! registry
//!     .atomic(|tx| {
//!         tx.individual_mut(&id)?.clear_deduplication();
//!         Ok::<_, registry::RegistryError>(())
//!     })
//!     .await?;
//! ```

pub mod activity;
pub mod document;
pub mod household;
pub mod individual;
pub mod store;
pub mod ticket;
pub mod types;

// Re-export main types
pub use activity::{ActivityAction, ActivityLogEntry, FieldChange};
pub use document::Document;
pub use household::{Household, RoleAssignment};
pub use individual::Individual;
pub use store::{ChangeSet, Registry, RegistryError, RegistryRead, RegistryState, Transaction};
pub use ticket::{
    AdjudicationCandidates, AdjudicationIssue, ExtraData, GrievanceTicket,
    NeedsAdjudicationDetails, RoleKind, RoleReassignment, TicketStatus,
};
pub use types::*;
