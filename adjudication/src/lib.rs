//! Needs-Adjudication Engine
//!
//! Decides which near-duplicate registry records are the same person and
//! reconciles the registry once an operator has picked a winner:
//!
//! - **Materializer**: turns match results into tickets, one open ticket per pair
//! - **Resolution**: closes tickets, reassigns roles, marks duplicates, withdraws
//!   emptied households
//! - **Targeting**: household predicates excluding active adjudications and
//!   sanction list matches
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                  AdjudicationService                       │
//! │                                                           │
//! │  ┌──────────────┐  ┌────────────┐  ┌──────────────┐      │
//! │  │ Materializer │  │ Resolution │  │  Targeting   │      │
//! │  └──────┬───────┘  └─────┬──────┘  └──────┬───────┘      │
//! │         │                │                │               │
//! │  ┌──────▼────────────────▼────────────────▼───────┐      │
//! │  │        Registry::atomic / RegistryRead         │      │
//! │  └────────────────────────────────────────────────┘      │
//! │                          │                                │
//! │                  ┌───────▼────────┐                       │
//! │                  │ NotificationHub │                      │
//! │                  └────────────────┘                       │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod documents;
pub mod materializer;
pub mod notification;
pub mod resolution;
pub mod roles;
pub mod scores;
pub mod selection;
pub mod service;
pub mod targeting;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types
pub use config::{AdjudicationConfig, ScoreSource};
pub use notification::{NotificationHub, NotificationSink, TicketEvent};
pub use service::AdjudicationService;
pub use targeting::{HouseholdFilter, TargetingFlag};
pub use types::*;
