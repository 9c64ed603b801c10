//! Ticket materializer.
//!
//! Turns raw match results into needs-adjudication tickets. At most one
//! non-closed ticket may pair any two individuals; a candidate set already
//! covered by an open ticket produces no new ticket. Tickets created in the
//! same batch are linked to each other so operators can move between
//! overlapping candidate clusters.

use std::collections::BTreeSet;

use chrono::Utc;
use tracing::{debug, info, warn};

use registry::{
    AdjudicationCandidates, ExtraData, GrievanceTicket, IndividualId, NeedsAdjudicationDetails,
    RegistryError, RegistryRead, TicketId, TicketStatus, Transaction,
};

use crate::config::MaterializerConfig;
use crate::scores::{score_bounds, score_hits};
use crate::types::{MaterializeRequest, NewTicket, Result};

/// Create one ticket with its adjudication details.
///
/// Returns `None` when there are no possible duplicates, or when an open
/// ticket already pairs two members of `{main} ∪ possible_duplicates`.
pub fn create_ticket_with_details(
    tx: &mut Transaction<'_>,
    config: &MaterializerConfig,
    new: NewTicket,
) -> Result<Option<GrievanceTicket>> {
    let mut duplicates = if new.is_multiple_duplicates_version {
        unique(new.possible_duplicates)
    } else {
        vec![new.possible_duplicate.clone()]
    };
    duplicates.retain(|duplicate| duplicate != &new.main);

    if duplicates.is_empty() {
        debug!(individual_id = %new.main, "No possible duplicates, skipping ticket");
        return Ok(None);
    }

    let mut involved: BTreeSet<IndividualId> = duplicates.iter().cloned().collect();
    involved.insert(new.main.clone());
    if let Some(existing) = tx.open_tickets().find(|ticket| {
        ticket
            .details
            .as_ref()
            .map(|details| details.candidates.links_any_pair(&involved))
            .unwrap_or(false)
    }) {
        debug!(
            individual_id = %new.main,
            existing_ticket = %existing.id,
            "Open ticket already covers candidates"
        );
        return Ok(None);
    }

    let (admin_area, area, extra_data, bounds, is_cross_area) = {
        let main = tx
            .individual(&new.main)
            .ok_or_else(|| RegistryError::not_found("Individual", &new.main))?;
        let possible_duplicate = tx
            .individual(&new.possible_duplicate)
            .ok_or_else(|| RegistryError::not_found("Individual", &new.possible_duplicate))?;

        let household = main.household_id.as_ref().and_then(|id| tx.household(id));
        let extra_data = ExtraData {
            golden_records: main.golden_record_matches().to_vec(),
            possible_duplicate: possible_duplicate.golden_record_matches().to_vec(),
        };
        let bounds = score_bounds(&score_hits(main, &duplicates, config.score_source));

        (
            household.and_then(|h| h.admin_area.clone()),
            household.map(|h| h.village.clone()).unwrap_or_default(),
            extra_data,
            bounds,
            spans_admin_areas(&*tx, &involved),
        )
    };

    let candidates = if new.is_multiple_duplicates_version {
        AdjudicationCandidates::Multiple {
            golden: new.main.clone(),
            duplicates,
            selected: BTreeSet::new(),
        }
    } else {
        AdjudicationCandidates::Legacy {
            golden: new.main.clone(),
            duplicate: new.possible_duplicate.clone(),
            selected: None,
        }
    };

    let sequence = tx.next_ticket_sequence();
    let now = Utc::now();
    let ticket = GrievanceTicket {
        id: TicketId::generate(),
        unicef_id: GrievanceTicket::format_unicef_id(sequence),
        issue_type: new.issue_type,
        status: TicketStatus::New,
        business_area: new.scope.business_area,
        program_id: new.scope.program_id,
        registration_data_import: new.import_batch,
        admin_area,
        area,
        linked_tickets: BTreeSet::new(),
        closed_by: None,
        created_at: now,
        updated_at: now,
        details: Some(NeedsAdjudicationDetails {
            candidates,
            extra_data,
            score_min: bounds.min,
            score_max: bounds.max,
            is_cross_area,
            role_reassign_data: Default::default(),
        }),
    };

    info!(
        ticket_id = %ticket.id,
        unicef_id = %ticket.unicef_id,
        golden_record = %new.main,
        score_min = bounds.min,
        score_max = bounds.max,
        "Needs adjudication ticket created"
    );

    tx.put_ticket(ticket.clone());
    Ok(Some(ticket))
}

/// Materialize tickets for individuals flagged with possible duplicates.
///
/// Returns `None` when `candidates` is empty and `Some` with the created
/// tickets (possibly none) otherwise.
pub fn create_needs_adjudication_tickets(
    tx: &mut Transaction<'_>,
    config: &MaterializerConfig,
    candidates: &[IndividualId],
    request: &MaterializeRequest,
) -> Result<Option<Vec<GrievanceTicket>>> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let issue_type = request.issue_type.unwrap_or(config.default_issue_type);
    let mut created: Vec<TicketId> = Vec::new();

    for candidate_id in candidates {
        let Some(candidate) = tx.individual(candidate_id) else {
            warn!(individual_id = %candidate_id, "Candidate individual not found, skipping");
            continue;
        };

        let hits = candidate
            .deduplication_golden_record_results
            .get(&request.results_key)
            .map(Vec::as_slice)
            .unwrap_or(&[]);

        let mut seen = BTreeSet::new();
        let possible_duplicates: Vec<IndividualId> = hits
            .iter()
            .filter(|hit| hit.hit_id != candidate.id)
            .filter(|hit| tx.individual(&hit.hit_id).is_some())
            .filter(|hit| seen.insert(hit.hit_id.clone()))
            .map(|hit| hit.hit_id.clone())
            .collect();

        if possible_duplicates.len() < hits.len() {
            debug!(
                individual_id = %candidate_id,
                hits = hits.len(),
                resolved = possible_duplicates.len(),
                "Skipped unresolved hits"
            );
        }

        let new = NewTicket {
            main: candidate_id.clone(),
            possible_duplicate: candidate_id.clone(),
            possible_duplicates,
            is_multiple_duplicates_version: true,
            scope: request.scope.clone(),
            import_batch: request.import_batch.clone(),
            issue_type,
        };

        if let Some(ticket) = create_ticket_with_details(tx, config, new)? {
            created.push(ticket.id);
        }
    }

    if config.link_batch_tickets {
        link_tickets(tx, &created)?;
    }

    info!(
        candidates = candidates.len(),
        created = created.len(),
        results_key = %request.results_key,
        "Needs adjudication batch materialized"
    );

    let tickets = created
        .iter()
        .map(|id| {
            tx.ticket(id)
                .cloned()
                .ok_or_else(|| RegistryError::not_found("Ticket", id).into())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(tickets))
}

/// Link every ticket in `ids` to every other one.
fn link_tickets(tx: &mut Transaction<'_>, ids: &[TicketId]) -> Result<()> {
    if ids.len() < 2 {
        return Ok(());
    }
    for id in ids {
        let ticket = tx.ticket_mut(id)?;
        ticket
            .linked_tickets
            .extend(ids.iter().filter(|other| *other != id).cloned());
    }
    Ok(())
}

/// Candidate households sit in more than one admin area.
fn spans_admin_areas(view: &impl RegistryRead, individuals: &BTreeSet<IndividualId>) -> bool {
    let areas: BTreeSet<&str> = individuals
        .iter()
        .filter_map(|id| view.individual(id))
        .filter_map(|individual| individual.household_id.as_ref())
        .filter_map(|household| view.household(household))
        .filter_map(|household| household.admin_area.as_deref())
        .collect();
    areas.len() > 1
}

fn unique(ids: Vec<IndividualId>) -> Vec<IndividualId> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
