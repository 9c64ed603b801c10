//! Role reassignment away from removed individuals.
//!
//! Each entry of a ticket's `role_reassign_data` moves one role (head of
//! household, primary or alternate collector) from a removed individual to a
//! replacement. After the entries are applied:
//!
//! - a primary collector role still held by the removed individual aborts the
//!   close;
//! - an alternate collector role still held is dropped;
//! - a head of household position still held aborts the close when the
//!   household keeps active members outside the removal set.
//!
//! An alternate role cannot move onto the household's primary collector.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use registry::{
    HouseholdId, IndividualId, RegistryError, RegistryRead, Role, RoleId, RoleKind,
    RoleReassignment, Transaction,
};

use crate::types::{AdjudicationError, Result};

/// How a reassignment entry names the replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleMoveMode {
    /// `individual` is the replacement; every entry concerns the removed individual
    Legacy,
    /// `individual` is the current holder, `new_individual` the replacement
    NewIndividual,
}

/// What a reassignment run changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReassignmentReport {
    /// `(role, household, new holder)` for every moved role
    pub moved: Vec<(RoleKind, HouseholdId, IndividualId)>,
    /// Alternate collector roles dropped for lack of a replacement
    pub dropped: Vec<RoleId>,
}

/// Move every role `removed` holds according to `data`.
///
/// `removing` is the full set of individuals removed by the current close;
/// none of them may receive a role.
pub fn reassign_roles(
    tx: &mut Transaction<'_>,
    data: &BTreeMap<String, RoleReassignment>,
    removed: &IndividualId,
    removing: &BTreeSet<IndividualId>,
    mode: RoleMoveMode,
    require_head: bool,
) -> Result<ReassignmentReport> {
    let mut report = ReassignmentReport::default();

    for (key, entry) in data {
        let replacement = match mode {
            RoleMoveMode::Legacy => entry.individual.clone(),
            RoleMoveMode::NewIndividual => {
                if &entry.individual != removed {
                    continue;
                }
                entry.new_individual.clone().ok_or_else(|| {
                    AdjudicationError::InvalidRoleReassignment(format!(
                        "entry {} has no new individual",
                        key
                    ))
                })?
            }
        };

        let moved = match entry.role {
            RoleKind::Head => move_head(tx, entry, removed, &replacement, removing)?,
            RoleKind::Primary => move_collector(tx, entry, Role::Primary, removed, &replacement, removing)?,
            RoleKind::Alternate => {
                move_collector(tx, entry, Role::Alternate, removed, &replacement, removing)?
            }
        };

        if moved {
            debug!(
                role = ?entry.role,
                household_id = %entry.household,
                from = %removed,
                to = %replacement,
                "Role reassigned"
            );
            report
                .moved
                .push((entry.role, entry.household.clone(), replacement));
        }
    }

    let leftover: Vec<_> = tx.roles_of(removed).into_iter().cloned().collect();
    if let Some(primary) = leftover.iter().find(|role| role.role == Role::Primary) {
        return Err(AdjudicationError::PrimaryCollectorNotReassigned {
            individual: removed.clone(),
            household: primary.household_id.clone(),
        });
    }
    for alternate in leftover {
        debug!(
            role_id = %alternate.id,
            household_id = %alternate.household_id,
            individual_id = %removed,
            "Dropping alternate collector role"
        );
        tx.remove_role(&alternate.id);
        report.dropped.push(alternate.id);
    }

    if require_head {
        let headed: Vec<HouseholdId> = tx
            .households()
            .filter(|household| household.head_of_household.as_ref() == Some(removed))
            .map(|household| household.id.clone())
            .collect();
        for household in headed {
            let keeps_members = tx
                .household_members(&household)
                .into_iter()
                .any(|member| member.is_active() && !removing.contains(&member.id));
            if keeps_members {
                return Err(AdjudicationError::HeadOfHouseholdNotReassigned {
                    individual: removed.clone(),
                    household,
                });
            }
        }
    }

    Ok(report)
}

fn move_head(
    tx: &mut Transaction<'_>,
    entry: &RoleReassignment,
    removed: &IndividualId,
    replacement: &IndividualId,
    removing: &BTreeSet<IndividualId>,
) -> Result<bool> {
    let household = tx
        .household(&entry.household)
        .ok_or_else(|| RegistryError::not_found("Household", &entry.household))?;
    if household.head_of_household.as_ref() != Some(removed) {
        return Ok(false);
    }

    validate_replacement(&*tx, removed, replacement, removing)?;
    let is_member = tx
        .individual(replacement)
        .map(|individual| individual.household_id.as_ref() == Some(&entry.household))
        .unwrap_or(false);
    if !is_member {
        return Err(AdjudicationError::InvalidRoleReassignment(format!(
            "{} is not a member of household {}",
            replacement, entry.household
        )));
    }

    let household = tx.household_mut(&entry.household)?;
    household.head_of_household = Some(replacement.clone());
    household.updated_at = chrono::Utc::now();
    Ok(true)
}

fn move_collector(
    tx: &mut Transaction<'_>,
    entry: &RoleReassignment,
    role: Role,
    removed: &IndividualId,
    replacement: &IndividualId,
    removing: &BTreeSet<IndividualId>,
) -> Result<bool> {
    let Some(held) = tx
        .roles_of(removed)
        .into_iter()
        .find(|held| held.household_id == entry.household && held.role == role)
        .cloned()
    else {
        return Ok(false);
    };

    validate_replacement(&*tx, removed, replacement, removing)?;

    // one role per individual and household; the primary role is never displaced
    let existing: Vec<(RoleId, Role)> = tx
        .roles_in(&entry.household)
        .into_iter()
        .filter(|other| &other.individual_id == replacement)
        .map(|other| (other.id.clone(), other.role))
        .collect();
    if role == Role::Alternate && existing.iter().any(|(_, kind)| *kind == Role::Primary) {
        return Err(AdjudicationError::InvalidRoleReassignment(format!(
            "{} already holds the primary collector role in household {}",
            replacement, entry.household
        )));
    }
    for (id, kind) in existing {
        debug!(
            role_id = %id,
            role = kind.as_str(),
            individual_id = %replacement,
            "Replacing role held by the replacement"
        );
        tx.remove_role(&id);
    }

    let mut moved = held;
    moved.individual_id = replacement.clone();
    tx.put_role(moved);
    Ok(true)
}

fn validate_replacement(
    view: &impl RegistryRead,
    removed: &IndividualId,
    replacement: &IndividualId,
    removing: &BTreeSet<IndividualId>,
) -> Result<()> {
    if replacement == removed || removing.contains(replacement) {
        return Err(AdjudicationError::InvalidRoleReassignment(format!(
            "{} is being removed and cannot take over roles",
            replacement
        )));
    }
    match view.individual(replacement) {
        None => Err(AdjudicationError::InvalidRoleReassignment(format!(
            "replacement {} does not exist",
            replacement
        ))),
        Some(individual) if !individual.is_active() => {
            Err(AdjudicationError::InvalidRoleReassignment(format!(
                "replacement {} is a duplicate or withdrawn",
                replacement
            )))
        }
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{id, StateBuilder};
    use registry::Registry;

    fn entry(role: RoleKind, household: &str, individual: &str, new: Option<&str>) -> RoleReassignment {
        RoleReassignment {
            role,
            household: household.into(),
            individual: individual.into(),
            new_individual: new.map(IndividualId::from),
        }
    }

    fn data(entries: Vec<RoleReassignment>) -> BTreeMap<String, RoleReassignment> {
        entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| (format!("role-{}", i), e))
            .collect()
    }

    fn household_registry() -> Registry {
        StateBuilder::new()
            .household("hh-1", "AF01")
            .head("s", "hh-1")
            .member("t", "hh-1")
            .member("u", "hh-1")
            .role("s", "hh-1", Role::Primary)
            .role("s", "hh-1", Role::Alternate)
            .registry()
    }

    async fn run(
        registry: &Registry,
        data: BTreeMap<String, RoleReassignment>,
        mode: RoleMoveMode,
    ) -> Result<ReassignmentReport> {
        let removing: BTreeSet<IndividualId> = [id("s")].into_iter().collect();
        registry
            .atomic(|tx| reassign_roles(tx, &data, &id("s"), &removing, mode, true))
            .await
    }

    #[tokio::test]
    async fn test_legacy_moves_all_roles() {
        let registry = household_registry();
        let report = run(
            &registry,
            data(vec![
                entry(RoleKind::Head, "hh-1", "t", None),
                entry(RoleKind::Primary, "hh-1", "t", None),
                entry(RoleKind::Alternate, "hh-1", "u", None),
            ]),
            RoleMoveMode::Legacy,
        )
        .await
        .unwrap();

        assert_eq!(report.moved.len(), 3);
        let state = registry.snapshot().await;
        assert!(state.roles_of(&id("s")).is_empty());
        assert_eq!(state.roles_of(&id("t"))[0].role, Role::Primary);
        assert_eq!(state.roles_of(&id("u"))[0].role, Role::Alternate);
        assert_eq!(
            state.household(&"hh-1".into()).unwrap().head_of_household,
            Some(id("t"))
        );
    }

    #[tokio::test]
    async fn test_missing_primary_replacement_fails() {
        let registry = household_registry();
        let result = run(
            &registry,
            data(vec![entry(RoleKind::Head, "hh-1", "t", None)]),
            RoleMoveMode::Legacy,
        )
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AdjudicationError::PrimaryCollectorNotReassigned { .. }));
        assert_eq!(
            err.to_string(),
            "Ticket cannot be closed, primary collector role has to be reassigned"
        );
        // rolled back
        let state = registry.snapshot().await;
        assert_eq!(state.roles_of(&id("s")).len(), 2);
        assert_eq!(
            state.household(&"hh-1".into()).unwrap().head_of_household,
            Some(id("s"))
        );
    }

    #[tokio::test]
    async fn test_alternate_without_replacement_is_dropped() {
        let registry = household_registry();
        let report = run(
            &registry,
            data(vec![
                entry(RoleKind::Head, "hh-1", "t", None),
                entry(RoleKind::Primary, "hh-1", "t", None),
            ]),
            RoleMoveMode::Legacy,
        )
        .await
        .unwrap();

        assert_eq!(report.dropped.len(), 1);
        assert!(registry.snapshot().await.roles_of(&id("s")).is_empty());
    }

    #[tokio::test]
    async fn test_head_left_on_populated_household_fails() {
        let registry = household_registry();
        let result = run(
            &registry,
            data(vec![entry(RoleKind::Primary, "hh-1", "t", None)]),
            RoleMoveMode::Legacy,
        )
        .await;

        assert!(matches!(
            result,
            Err(AdjudicationError::HeadOfHouseholdNotReassigned { .. })
        ));
    }

    #[tokio::test]
    async fn test_new_individual_mode_reads_new_individual() {
        let registry = household_registry();
        let report = run(
            &registry,
            data(vec![
                entry(RoleKind::Head, "hh-1", "s", Some("u")),
                entry(RoleKind::Primary, "hh-1", "s", Some("t")),
                // belongs to another removed individual
                entry(RoleKind::Alternate, "hh-1", "other", Some("u")),
            ]),
            RoleMoveMode::NewIndividual,
        )
        .await
        .unwrap();

        assert_eq!(report.moved.len(), 2);
        assert_eq!(report.dropped.len(), 1);
        let state = registry.snapshot().await;
        assert_eq!(
            state.household(&"hh-1".into()).unwrap().head_of_household,
            Some(id("u"))
        );
    }

    #[tokio::test]
    async fn test_new_individual_mode_requires_replacement() {
        let registry = household_registry();
        let result = run(
            &registry,
            data(vec![entry(RoleKind::Primary, "hh-1", "s", None)]),
            RoleMoveMode::NewIndividual,
        )
        .await;

        assert!(matches!(result, Err(AdjudicationError::InvalidRoleReassignment(_))));
    }

    #[tokio::test]
    async fn test_replacement_being_removed_is_rejected() {
        let registry = household_registry();
        let result = run(
            &registry,
            data(vec![entry(RoleKind::Primary, "hh-1", "s", None)]),
            RoleMoveMode::Legacy,
        )
        .await;

        assert!(matches!(result, Err(AdjudicationError::InvalidRoleReassignment(_))));
    }

    #[tokio::test]
    async fn test_alternate_cannot_move_onto_primary_collector() {
        let registry = StateBuilder::new()
            .household("hh-1", "AF01")
            .member("s", "hh-1")
            .member("t", "hh-1")
            .role("t", "hh-1", Role::Primary)
            .role("s", "hh-1", Role::Alternate)
            .registry();

        let result = run(
            &registry,
            data(vec![entry(RoleKind::Alternate, "hh-1", "t", None)]),
            RoleMoveMode::Legacy,
        )
        .await;

        assert!(matches!(result, Err(AdjudicationError::InvalidRoleReassignment(_))));
        let state = registry.snapshot().await;
        let primary: Vec<_> = state
            .roles_in(&"hh-1".into())
            .into_iter()
            .filter(|role| role.role == Role::Primary)
            .map(|role| role.individual_id.clone())
            .collect();
        assert_eq!(primary, vec![id("t")]);
        assert_eq!(state.roles_of(&id("s"))[0].role, Role::Alternate);
    }

    #[tokio::test]
    async fn test_replacement_replaces_its_own_role() {
        let registry = StateBuilder::new()
            .household("hh-1", "AF01")
            .member("s", "hh-1")
            .member("t", "hh-1")
            .role("s", "hh-1", Role::Primary)
            .role("t", "hh-1", Role::Alternate)
            .registry();

        run(
            &registry,
            data(vec![entry(RoleKind::Primary, "hh-1", "t", None)]),
            RoleMoveMode::Legacy,
        )
        .await
        .unwrap();

        let state = registry.snapshot().await;
        let roles = state.roles_in(&"hh-1".into());
        assert_eq!(roles.len(), 1);
        assert_eq!(roles[0].individual_id, id("t"));
        assert_eq!(roles[0].role, Role::Primary);
    }
}
