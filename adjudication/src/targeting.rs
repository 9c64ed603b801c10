//! Targeting-criteria flag evaluator.
//!
//! Builds composable household predicates used to exclude households from a
//! target population. A household is affected through its members and its
//! representatives (role holders, who need not be members). Evaluation never
//! mutates the registry.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use registry::{Household, IndividualId, RegistryRead};

use crate::types::AdjudicationError;

pub const FLAG_EXCLUDE_IF_ACTIVE_ADJUDICATION_TICKET: &str =
    "flag_exclude_if_active_adjudication_ticket";
pub const FLAG_EXCLUDE_IF_ON_SANCTION_LIST: &str = "flag_exclude_if_on_sanction_list";

/// Named exclusion flags of a targeting criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetingFlag {
    ExcludeIfActiveAdjudicationTicket,
    ExcludeIfOnSanctionList,
}

impl TargetingFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExcludeIfActiveAdjudicationTicket => FLAG_EXCLUDE_IF_ACTIVE_ADJUDICATION_TICKET,
            Self::ExcludeIfOnSanctionList => FLAG_EXCLUDE_IF_ON_SANCTION_LIST,
        }
    }

    /// Predicate matching the households the flag excludes.
    pub fn excluded(&self) -> HouseholdFilter {
        match self {
            Self::ExcludeIfActiveAdjudicationTicket => HouseholdFilter::HasActiveAdjudicationTicket,
            Self::ExcludeIfOnSanctionList => HouseholdFilter::HasSanctionListMatch,
        }
    }
}

impl fmt::Display for TargetingFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetingFlag {
    type Err = AdjudicationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            FLAG_EXCLUDE_IF_ACTIVE_ADJUDICATION_TICKET => Ok(Self::ExcludeIfActiveAdjudicationTicket),
            FLAG_EXCLUDE_IF_ON_SANCTION_LIST => Ok(Self::ExcludeIfOnSanctionList),
            other => Err(AdjudicationError::UnknownTargetingFlag(other.to_string())),
        }
    }
}

/// Composable household predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdFilter {
    /// Matches every household
    All,
    /// A member or representative is on either side of a non-closed ticket
    HasActiveAdjudicationTicket,
    /// A member or representative is a confirmed sanction list match
    HasSanctionListMatch,
    Not(Box<HouseholdFilter>),
    And(Vec<HouseholdFilter>),
    Or(Vec<HouseholdFilter>),
}

impl HouseholdFilter {
    pub fn and(self, other: HouseholdFilter) -> Self {
        match self {
            Self::All => other,
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            filter => Self::And(vec![filter, other]),
        }
    }

    pub fn or(self, other: HouseholdFilter) -> Self {
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            filter => Self::Or(vec![filter, other]),
        }
    }

    /// Evaluate against one household.
    pub fn matches<R: RegistryRead + ?Sized>(&self, view: &R, household: &Household) -> bool {
        match self {
            Self::All => true,
            Self::HasActiveAdjudicationTicket => {
                let people = people_of(view, household);
                view.open_tickets()
                    .any(|ticket| people.iter().any(|person| ticket.involves(person)))
            }
            Self::HasSanctionListMatch => people_of(view, household).iter().any(|person| {
                view.individual(person)
                    .map(|individual| individual.sanction_list_confirmed_match)
                    .unwrap_or(false)
            }),
            Self::Not(inner) => !inner.matches(view, household),
            Self::And(filters) => filters.iter().all(|filter| filter.matches(view, household)),
            Self::Or(filters) => filters.iter().any(|filter| filter.matches(view, household)),
        }
    }
}

impl std::ops::Not for HouseholdFilter {
    type Output = HouseholdFilter;

    fn not(self) -> Self::Output {
        match self {
            Self::Not(inner) => *inner,
            filter => Self::Not(Box::new(filter)),
        }
    }
}

/// Filter for a flag of a targeting criteria.
///
/// An enabled flag excludes the households its predicate matches; a disabled
/// flag lets every household through.
pub fn flag_filter(name: &str, enabled: bool) -> Result<HouseholdFilter, AdjudicationError> {
    let flag: TargetingFlag = name.parse()?;
    Ok(if enabled { !flag.excluded() } else { HouseholdFilter::All })
}

/// Non-withdrawn households passing `filter`.
pub fn filter_households<'v, R: RegistryRead + ?Sized>(
    view: &'v R,
    filter: &HouseholdFilter,
) -> Vec<&'v Household> {
    view.households()
        .filter(|household| !household.withdrawn)
        .filter(|household| filter.matches(view, household))
        .collect()
}

fn people_of<R: RegistryRead + ?Sized>(view: &R, household: &Household) -> BTreeSet<IndividualId> {
    let mut people: BTreeSet<IndividualId> = view
        .household_members(&household.id)
        .into_iter()
        .map(|member| member.id.clone())
        .collect();
    people.extend(
        view.roles_in(&household.id)
            .into_iter()
            .map(|role| role.individual_id.clone()),
    );
    people
}
