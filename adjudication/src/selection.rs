//! Operator-facing ticket edits: selection, role reassignment data, status.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use registry::{
    AdjudicationCandidates, GrievanceTicket, IndividualId, NeedsAdjudicationDetails,
    RegistryRead, RoleReassignment, TicketId, TicketStatus, Transaction,
};

use crate::types::{AdjudicationError, Result};

/// Record which individuals the operator marks as duplicates.
///
/// Legacy tickets accept at most one individual. An empty selection clears
/// the current one.
pub fn select_individuals(
    tx: &mut Transaction<'_>,
    ticket_id: &TicketId,
    individuals: &[IndividualId],
) -> Result<GrievanceTicket> {
    let ticket = open_ticket_mut(tx, ticket_id)?;
    let details = details_mut(ticket)?;

    if let Some(stranger) = individuals
        .iter()
        .find(|individual| !details.candidates.involves(individual))
    {
        return Err(AdjudicationError::InvalidSelection(format!(
            "{} is not a candidate of ticket {}",
            stranger, ticket_id
        )));
    }

    match &mut details.candidates {
        AdjudicationCandidates::Legacy { selected, .. } => {
            if individuals.len() > 1 {
                return Err(AdjudicationError::InvalidSelection(
                    "a single-duplicate ticket accepts at most one individual".to_string(),
                ));
            }
            *selected = individuals.first().cloned();
        }
        AdjudicationCandidates::Multiple { selected, .. } => {
            *selected = individuals.iter().cloned().collect::<BTreeSet<_>>();
        }
    }

    ticket.touch();
    debug!(ticket_id = %ticket_id, selected = individuals.len(), "Selection updated");
    Ok(ticket.clone())
}

/// Replace the ticket's role reassignment data.
pub fn set_role_reassign_data(
    tx: &mut Transaction<'_>,
    ticket_id: &TicketId,
    data: BTreeMap<String, RoleReassignment>,
) -> Result<GrievanceTicket> {
    for (key, entry) in &data {
        if tx.household(&entry.household).is_none() {
            return Err(AdjudicationError::InvalidRoleReassignment(format!(
                "entry {} names unknown household {}",
                key, entry.household
            )));
        }
    }

    let ticket = open_ticket_mut(tx, ticket_id)?;
    details_mut(ticket)?.role_reassign_data = data;
    ticket.touch();
    Ok(ticket.clone())
}

/// Move an open ticket through its workflow. Closing is not a status edit.
pub fn update_status(
    tx: &mut Transaction<'_>,
    ticket_id: &TicketId,
    status: TicketStatus,
) -> Result<GrievanceTicket> {
    if status == TicketStatus::Closed {
        return Err(AdjudicationError::InvalidStatusTransition(
            "tickets are closed through the close operation".to_string(),
        ));
    }

    let ticket = open_ticket_mut(tx, ticket_id)?;
    let from = ticket.status;
    ticket.status = status;
    ticket.touch();
    debug!(ticket_id = %ticket_id, from = ?from, to = ?status, "Ticket status updated");
    Ok(ticket.clone())
}

fn open_ticket_mut<'t>(
    tx: &'t mut Transaction<'_>,
    ticket_id: &TicketId,
) -> Result<&'t mut GrievanceTicket> {
    match tx.ticket(ticket_id) {
        None => return Err(AdjudicationError::TicketNotFound(ticket_id.clone())),
        Some(ticket) if ticket.is_closed() => {
            return Err(AdjudicationError::TicketAlreadyClosed(ticket_id.clone()))
        }
        Some(_) => {}
    }
    Ok(tx.ticket_mut(ticket_id)?)
}

fn details_mut(ticket: &mut GrievanceTicket) -> Result<&mut NeedsAdjudicationDetails> {
    let id = ticket.id.clone();
    ticket.details.as_mut().ok_or_else(|| {
        AdjudicationError::InvalidSelection(format!("ticket {} has no adjudication details", id))
    })
}
