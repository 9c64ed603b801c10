//! Households and the collector roles held in them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{HouseholdId, IndividualId, Role, RoleId};

/// A group of individuals registered together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    /// Unique identifier
    pub id: HouseholdId,
    /// Human-facing identifier
    #[serde(default)]
    pub unicef_id: Option<String>,
    /// Owning business area
    pub business_area: String,
    /// Head of household
    #[serde(default)]
    pub head_of_household: Option<IndividualId>,
    /// Administrative area, level 2
    #[serde(default)]
    pub admin_area: Option<String>,
    /// Village or settlement name
    #[serde(default)]
    pub village: String,
    /// No active individuals remain
    #[serde(default)]
    pub withdrawn: bool,
    /// When the household was withdrawn
    #[serde(default)]
    pub withdrawn_at: Option<DateTime<Utc>>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Household {
    pub fn new(id: impl Into<HouseholdId>, business_area: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            unicef_id: None,
            business_area: business_area.into(),
            head_of_household: None,
            admin_area: None,
            village: String::new(),
            withdrawn: false,
            withdrawn_at: None,
            updated_at: Utc::now(),
        }
    }

    /// Set the head of household.
    pub fn with_head(mut self, head: impl Into<IndividualId>) -> Self {
        self.head_of_household = Some(head.into());
        self
    }

    /// Set the admin area and village.
    pub fn with_location(mut self, admin_area: impl Into<String>, village: impl Into<String>) -> Self {
        self.admin_area = Some(admin_area.into());
        self.village = village.into();
        self
    }

    /// Mark the household withdrawn. Idempotent.
    pub fn withdraw(&mut self) {
        if self.withdrawn {
            return;
        }
        let now = Utc::now();
        self.withdrawn = true;
        self.withdrawn_at = Some(now);
        self.updated_at = now;
    }
}

/// A collector role held by an individual in a household.
///
/// Collectors need not be household members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub id: RoleId,
    pub individual_id: IndividualId,
    pub household_id: HouseholdId,
    pub role: Role,
}

impl RoleAssignment {
    pub fn new(
        individual_id: impl Into<IndividualId>,
        household_id: impl Into<HouseholdId>,
        role: Role,
    ) -> Self {
        Self {
            id: RoleId::generate(),
            individual_id: individual_id.into(),
            household_id: household_id.into(),
            role,
        }
    }
}
