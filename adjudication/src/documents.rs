//! Hard document deduplication.

use std::collections::BTreeSet;

use tracing::debug;

use registry::{DocumentId, DocumentStatus, IndividualId, RegistryRead, Transaction};

use crate::types::Result;

type DocumentKey = (String, String, Option<String>);

/// Statuses assigned by one deduplication run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentReport {
    pub valid: Vec<DocumentId>,
    pub need_investigation: Vec<DocumentId>,
}

/// Recompute the status of every non-invalid document of `individuals`.
///
/// A document collides when a `Valid` document outside the run with the same
/// `(type, number, country)` belongs to another active individual, or when an
/// earlier document of the run already claimed the key.
pub fn deduplicate_documents(
    tx: &mut Transaction<'_>,
    individuals: &[IndividualId],
) -> Result<DocumentReport> {
    let owners: BTreeSet<&IndividualId> = individuals.iter().collect();

    let mut targets: Vec<(DocumentId, DocumentKey, DocumentStatus)> = Vec::new();
    for individual in individuals {
        let mut documents = tx.documents_of(individual);
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        targets.extend(
            documents
                .into_iter()
                .filter(|document| document.status != DocumentStatus::Invalid)
                .map(|document| (document.id.clone(), owned_key(document.dedup_key()), document.status)),
        );
    }
    if targets.is_empty() {
        return Ok(DocumentReport::default());
    }

    let target_ids: BTreeSet<&DocumentId> = targets.iter().map(|(id, _, _)| id).collect();
    let taken: BTreeSet<DocumentKey> = tx
        .documents()
        .filter(|document| document.status == DocumentStatus::Valid)
        .filter(|document| !target_ids.contains(&document.id))
        .filter(|document| !owners.contains(&document.individual_id))
        .filter(|document| {
            tx.individual(&document.individual_id)
                .map(|owner| owner.is_active())
                .unwrap_or(false)
        })
        .map(|document| owned_key(document.dedup_key()))
        .collect();

    let mut report = DocumentReport::default();
    let mut claimed: BTreeSet<DocumentKey> = BTreeSet::new();
    let mut updates = Vec::with_capacity(targets.len());
    for (id, key, current) in targets {
        let status = if taken.contains(&key) || !claimed.insert(key) {
            report.need_investigation.push(id.clone());
            DocumentStatus::NeedInvestigation
        } else {
            report.valid.push(id.clone());
            DocumentStatus::Valid
        };
        if status != current {
            updates.push((id, status));
        }
    }

    for (id, status) in updates {
        debug!(document_id = %id, status = ?status, "Document status recomputed");
        tx.document_mut(&id)?.status = status;
    }

    Ok(report)
}

fn owned_key((document_type, number, country): (&str, &str, Option<&str>)) -> DocumentKey {
    (
        document_type.to_string(),
        number.to_string(),
        country.map(str::to_string),
    )
}
