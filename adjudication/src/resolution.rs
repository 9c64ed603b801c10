//! Resolution engine.
//!
//! Applies an operator's decision on a needs-adjudication ticket. Selected
//! individuals are removed: their roles move to replacements, they are marked
//! duplicate of the survivor, and their household is withdrawn when no active
//! member remains. Every surviving candidate has its deduplication metadata
//! cleared. Candidates an earlier ticket already removed are left as they are. The whole close runs inside the caller's transaction, so any
//! validation error leaves the registry untouched.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use registry::{
    ActivityLogEntry, AdjudicationCandidates, DocumentStatus, HouseholdId, IndividualId,
    RegistryError, RegistryRead, RoleReassignment, TicketId, TicketStatus, Transaction,
};

use crate::config::ResolutionConfig;
use crate::documents::deduplicate_documents;
use crate::roles::{reassign_roles, RoleMoveMode};
use crate::types::{AdjudicationError, CloseOutcome, Result};

/// Close a needs-adjudication ticket.
///
/// Returns `None` and leaves the ticket untouched when it carries no
/// adjudication details.
pub fn close_needs_adjudication_ticket(
    tx: &mut Transaction<'_>,
    config: &ResolutionConfig,
    ticket_id: &TicketId,
    actor: &str,
) -> Result<Option<CloseOutcome>> {
    let ticket = tx
        .ticket(ticket_id)
        .ok_or_else(|| AdjudicationError::TicketNotFound(ticket_id.clone()))?;
    if ticket.is_closed() {
        return Err(AdjudicationError::TicketAlreadyClosed(ticket_id.clone()));
    }
    let Some(details) = ticket.details.clone() else {
        debug!(ticket_id = %ticket_id, "Ticket has no adjudication details, nothing to close");
        return Ok(None);
    };

    let outcome = match details.candidates {
        AdjudicationCandidates::Legacy {
            golden,
            duplicate,
            selected,
        } => close_legacy(
            tx,
            config,
            ticket_id,
            &golden,
            &duplicate,
            selected.as_ref(),
            &details.role_reassign_data,
            actor,
        )?,
        AdjudicationCandidates::Multiple {
            golden,
            duplicates,
            selected,
        } => {
            let mut candidates = vec![golden];
            for duplicate in duplicates {
                if !candidates.contains(&duplicate) {
                    candidates.push(duplicate);
                }
            }
            close_multiple(
                tx,
                config,
                ticket_id,
                &candidates,
                &selected,
                &details.role_reassign_data,
                actor,
            )?
        }
    };

    let ticket = tx.ticket_mut(ticket_id)?;
    ticket.status = TicketStatus::Closed;
    ticket.closed_by = Some(actor.to_string());
    ticket.touch();

    info!(
        ticket_id = %ticket_id,
        unicef_id = %ticket.unicef_id,
        closed_by = %actor,
        duplicates = outcome.duplicates.len(),
        cleared = outcome.cleared.len(),
        "Needs adjudication ticket closed"
    );

    Ok(Some(outcome))
}

#[allow(clippy::too_many_arguments)]
fn close_legacy(
    tx: &mut Transaction<'_>,
    config: &ResolutionConfig,
    ticket_id: &TicketId,
    golden: &IndividualId,
    duplicate: &IndividualId,
    selected: Option<&IndividualId>,
    role_data: &BTreeMap<String, RoleReassignment>,
    actor: &str,
) -> Result<CloseOutcome> {
    let mut outcome = CloseOutcome::new(ticket_id.clone());

    let Some(removed) = selected else {
        let both = [golden.clone(), duplicate.clone()];
        outcome.cleared = clear_deduplication_metadata(tx, config, &both)?;
        return Ok(outcome);
    };

    let survivor = if removed == golden {
        duplicate
    } else if removed == duplicate {
        golden
    } else {
        return Err(AdjudicationError::InvalidSelection(format!(
            "{} is not a candidate of ticket {}",
            removed, ticket_id
        )));
    };

    if already_duplicate(&*tx, removed)? {
        outcome.cleared = clear_deduplication_metadata(tx, config, &[survivor.clone()])?;
        outcome.survivor = Some(survivor.clone());
        return Ok(outcome);
    }

    let removing: BTreeSet<IndividualId> = [removed.clone()].into_iter().collect();
    reassign_roles(
        tx,
        role_data,
        removed,
        &removing,
        RoleMoveMode::Legacy,
        config.require_head_of_household_reassignment,
    )?;
    if let Some(household) = mark_as_duplicate_and_withdraw(tx, removed, survivor, actor)? {
        outcome.withdrawn_households.push(household);
    }
    outcome.duplicates.push(removed.clone());
    outcome.cleared = clear_deduplication_metadata(tx, config, &[survivor.clone()])?;
    outcome.survivor = Some(survivor.clone());
    Ok(outcome)
}

fn close_multiple(
    tx: &mut Transaction<'_>,
    config: &ResolutionConfig,
    ticket_id: &TicketId,
    candidates: &[IndividualId],
    selected: &BTreeSet<IndividualId>,
    role_data: &BTreeMap<String, RoleReassignment>,
    actor: &str,
) -> Result<CloseOutcome> {
    let mut outcome = CloseOutcome::new(ticket_id.clone());

    if let Some(stranger) = selected.iter().find(|id| !candidates.contains(id)) {
        return Err(AdjudicationError::InvalidSelection(format!(
            "{} is not a candidate of ticket {}",
            stranger, ticket_id
        )));
    }

    outcome.updated_siblings = propagate_selection_to_siblings(tx, ticket_id, selected)?;

    if selected.is_empty() {
        outcome.cleared = clear_deduplication_metadata(tx, config, candidates)?;
        return Ok(outcome);
    }

    let mut survivor = None;
    for id in candidates.iter().filter(|id| !selected.contains(*id)) {
        if !already_duplicate(&*tx, id)? {
            survivor = Some(id.clone());
            break;
        }
    }
    let survivor = survivor.ok_or_else(|| {
        AdjudicationError::InvalidSelection(format!(
            "ticket {} has no unselected active candidate",
            ticket_id
        ))
    })?;

    for removed in candidates.iter().filter(|id| selected.contains(*id)) {
        if already_duplicate(&*tx, removed)? {
            continue;
        }
        reassign_roles(
            tx,
            role_data,
            removed,
            selected,
            RoleMoveMode::NewIndividual,
            config.require_head_of_household_reassignment,
        )?;
        if let Some(household) = mark_as_duplicate_and_withdraw(tx, removed, &survivor, actor)? {
            outcome.withdrawn_households.push(household);
        }
        outcome.duplicates.push(removed.clone());
    }

    let remaining: Vec<IndividualId> = candidates
        .iter()
        .filter(|id| !selected.contains(*id))
        .cloned()
        .collect();
    outcome.cleared = clear_deduplication_metadata(tx, config, &remaining)?;
    outcome.survivor = Some(survivor);
    Ok(outcome)
}

/// Copy a selection onto other open tickets that share a selected individual.
///
/// Multiple-duplicate siblings gain every selected individual among their own
/// candidates. Legacy siblings take the first such individual, only while
/// they have no selection of their own.
pub fn propagate_selection_to_siblings(
    tx: &mut Transaction<'_>,
    ticket_id: &TicketId,
    selected: &BTreeSet<IndividualId>,
) -> Result<Vec<TicketId>> {
    if selected.is_empty() {
        return Ok(Vec::new());
    }

    let siblings: Vec<TicketId> = tx
        .open_tickets()
        .filter(|ticket| &ticket.id != ticket_id)
        .filter(|ticket| selected.iter().any(|id| ticket.involves(id)))
        .map(|ticket| ticket.id.clone())
        .collect();

    let mut updated = Vec::new();
    for sibling_id in siblings {
        let sibling = tx.ticket_mut(&sibling_id)?;
        let Some(details) = sibling.details.as_mut() else {
            continue;
        };

        let shared: Vec<IndividualId> = selected
            .iter()
            .filter(|id| details.candidates.involves(id))
            .cloned()
            .collect();

        let changed = match &mut details.candidates {
            AdjudicationCandidates::Multiple {
                selected: sibling_selected,
                ..
            } => {
                let before = sibling_selected.len();
                sibling_selected.extend(shared);
                sibling_selected.len() != before
            }
            AdjudicationCandidates::Legacy {
                selected: sibling_selected,
                ..
            } => match (sibling_selected.is_none(), shared.into_iter().next()) {
                (true, Some(first)) => {
                    *sibling_selected = Some(first);
                    true
                }
                _ => false,
            },
        };

        if changed {
            sibling.touch();
            debug!(ticket_id = %ticket_id, sibling_id = %sibling_id, "Selection propagated");
            updated.push(sibling_id);
        }
    }

    Ok(updated)
}

/// Mark `duplicate` as a duplicate of `survivor` and record it.
///
/// Returns the household withdrawn because it lost its last active member.
pub fn mark_as_duplicate_and_withdraw(
    tx: &mut Transaction<'_>,
    duplicate: &IndividualId,
    survivor: &IndividualId,
    actor: &str,
) -> Result<Option<HouseholdId>> {
    let original = tx
        .individual(survivor)
        .cloned()
        .ok_or_else(|| RegistryError::not_found("Individual", survivor))?;
    let before = tx
        .individual(duplicate)
        .cloned()
        .ok_or_else(|| RegistryError::not_found("Individual", duplicate))?;
    if before.is_duplicate {
        debug!(
            individual_id = %duplicate,
            duplicate_of = ?before.duplicate_of,
            "Individual already marked as duplicate"
        );
        return Ok(None);
    }
    if !original.is_active() {
        return Err(AdjudicationError::InvalidSelection(format!(
            "{} is a duplicate or withdrawn and cannot be kept as the original of {}",
            survivor, duplicate
        )));
    }

    let individual = tx.individual_mut(duplicate)?;
    individual.mark_as_duplicate(&original);
    let after = individual.clone();

    let documents: Vec<_> = tx
        .documents_of(duplicate)
        .into_iter()
        .filter(|document| document.status != DocumentStatus::Invalid)
        .map(|document| document.id.clone())
        .collect();
    for document in documents {
        tx.document_mut(&document)?.status = DocumentStatus::Invalid;
    }

    tx.append_activity(ActivityLogEntry::update(
        actor,
        &after.business_area,
        "individual",
        after.id.as_str(),
        &before,
        &after,
    )?);
    debug!(individual_id = %duplicate, duplicate_of = %survivor, "Individual marked as duplicate");

    let Some(household_id) = after.household_id else {
        return Ok(None);
    };
    let withdrawable = tx
        .household(&household_id)
        .map(|household| !household.withdrawn)
        .unwrap_or(false);
    if withdrawable && tx.active_individual_count(&household_id) == 0 {
        tx.household_mut(&household_id)?.withdraw();
        info!(household_id = %household_id, "Household withdrawn, no active individuals left");
        return Ok(Some(household_id));
    }
    Ok(None)
}

/// Reset each individual to unique and recompute their documents.
///
/// Individuals already marked as duplicates keep their metadata and are left
/// out of the returned list.
pub fn clear_deduplication_metadata(
    tx: &mut Transaction<'_>,
    config: &ResolutionConfig,
    individuals: &[IndividualId],
) -> Result<Vec<IndividualId>> {
    let mut cleared = Vec::new();
    for id in individuals {
        if already_duplicate(&*tx, id)? {
            debug!(individual_id = %id, "Skipping duplicate, metadata kept");
            continue;
        }
        tx.individual_mut(id)?.clear_deduplication();
        cleared.push(id.clone());
    }
    if config.rerun_document_deduplication && !cleared.is_empty() {
        deduplicate_documents(tx, &cleared)?;
    }
    Ok(cleared)
}

/// Whether an earlier decision already removed `id`.
fn already_duplicate(view: &impl RegistryRead, id: &IndividualId) -> Result<bool> {
    view.individual(id)
        .map(|individual| individual.is_duplicate)
        .ok_or_else(|| RegistryError::not_found("Individual", id).into())
}
