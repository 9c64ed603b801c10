//! Adjudication service.
//!
//! Owns the registry handle, the configuration and the notification hub.
//! Every operation runs as one registry transaction; notifications go out
//! only after it commits.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use registry::{
    GrievanceTicket, HouseholdId, IndividualId, Registry, RegistryRead, RoleReassignment,
    TicketId, TicketStatus,
};

use crate::config::AdjudicationConfig;
use crate::materializer;
use crate::notification::{NotificationHub, TicketEvent};
use crate::resolution;
use crate::selection;
use crate::targeting::{filter_households, HouseholdFilter};
use crate::types::{AdjudicationError, CloseOutcome, MaterializeRequest, NewTicket, Result};

/// Entry point for the adjudication engine.
#[derive(Clone)]
pub struct AdjudicationService {
    registry: Registry,
    config: AdjudicationConfig,
    notifications: Arc<NotificationHub>,
}

impl AdjudicationService {
    /// Create a service logging its notifications.
    pub fn new(registry: Registry, config: AdjudicationConfig) -> Self {
        Self::with_notifications(registry, config, Arc::new(NotificationHub::with_logging()))
    }

    pub fn with_notifications(
        registry: Registry,
        config: AdjudicationConfig,
        notifications: Arc<NotificationHub>,
    ) -> Self {
        Self {
            registry,
            config,
            notifications,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &AdjudicationConfig {
        &self.config
    }

    pub fn notifications(&self) -> &Arc<NotificationHub> {
        &self.notifications
    }

    /// Materialize tickets for a batch of candidates.
    pub async fn create_needs_adjudication_tickets(
        &self,
        candidates: &[IndividualId],
        request: &MaterializeRequest,
    ) -> Result<Option<Vec<GrievanceTicket>>> {
        let config = &self.config.materializer;
        let tickets = self
            .registry
            .atomic(|tx| materializer::create_needs_adjudication_tickets(tx, config, candidates, request))
            .await?;

        if let Some(tickets) = &tickets {
            let events: Vec<_> = tickets.iter().map(TicketEvent::created).collect();
            self.notify(&events).await;
        }
        Ok(tickets)
    }

    /// Create one ticket.
    pub async fn create_ticket_with_details(&self, new: NewTicket) -> Result<Option<GrievanceTicket>> {
        let config = &self.config.materializer;
        let ticket = self
            .registry
            .atomic(|tx| materializer::create_ticket_with_details(tx, config, new))
            .await?;

        if let Some(ticket) = &ticket {
            self.notify(&[TicketEvent::created(ticket)]).await;
        }
        Ok(ticket)
    }

    pub async fn select_individuals(
        &self,
        ticket_id: &TicketId,
        individuals: &[IndividualId],
    ) -> Result<GrievanceTicket> {
        self.registry
            .atomic(|tx| selection::select_individuals(tx, ticket_id, individuals))
            .await
    }

    pub async fn set_role_reassign_data(
        &self,
        ticket_id: &TicketId,
        data: BTreeMap<String, RoleReassignment>,
    ) -> Result<GrievanceTicket> {
        self.registry
            .atomic(|tx| selection::set_role_reassign_data(tx, ticket_id, data))
            .await
    }

    pub async fn update_status(&self, ticket_id: &TicketId, status: TicketStatus) -> Result<GrievanceTicket> {
        self.registry
            .atomic(|tx| selection::update_status(tx, ticket_id, status))
            .await
    }

    /// Close a ticket and apply the operator's decision.
    pub async fn close_ticket(&self, ticket_id: &TicketId, actor: &str) -> Result<Option<CloseOutcome>> {
        let config = &self.config.resolution;
        let outcome = self
            .registry
            .atomic(|tx| {
                let outcome = resolution::close_needs_adjudication_ticket(tx, config, ticket_id, actor)?;
                let closed = match &outcome {
                    Some(_) => tx.ticket(ticket_id).map(|ticket| TicketEvent::closed(ticket, actor)),
                    None => None,
                };
                Ok::<_, AdjudicationError>((outcome, closed))
            })
            .await?;

        let (outcome, event) = outcome;
        if let Some(event) = event {
            self.notify(&[event]).await;
        }
        Ok(outcome)
    }

    /// Non-withdrawn households passing `filter`.
    pub async fn eligible_households(&self, filter: &HouseholdFilter) -> Vec<HouseholdId> {
        self.registry
            .read(|state| {
                filter_households(state, filter)
                    .into_iter()
                    .map(|household| household.id.clone())
                    .collect()
            })
            .await
    }

    async fn notify(&self, events: &[TicketEvent]) {
        if !self.config.notifications.enabled || events.is_empty() {
            return;
        }
        let report = self.notifications.dispatch(events).await;
        debug!(delivered = report.delivered, failed = report.failed, "Notifications dispatched");
    }
}
