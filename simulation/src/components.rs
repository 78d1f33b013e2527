//! ECS components and stable identifiers
//!
//! Agents are hecs entities carrying the components below. Households,
//! dwellings, firms and administrative units live in keyed arenas and are
//! referenced only through the newtype ids defined here.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Identity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HouseholdId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DwellingId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FirmId(pub u64);

/// Administrative unit key (municipality code).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub String);

/// Parent region key (province or region code).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl GroupId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Agent Components
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: AgentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Age {
    pub years: u32,
}

/// Age above which an agent counts as an adult when households are formed.
pub const ADULT_AGE: u32 = 21;

impl Age {
    pub fn is_adult(&self) -> bool {
        self.years > ADULT_AGE
    }
}

/// Years of schooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qualification {
    pub years: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub money: f64,
}

/// Calendar month (1-12) on which the agent ages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthMonth(pub u8);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub household: Option<HouseholdId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Employment {
    pub firm: Option<FirmId>,
    /// Gross wage of the last paid month, if any.
    pub last_wage: Option<f64>,
}

/// Plain view of all components of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub gender: Gender,
    pub age: u32,
    pub qualification: u8,
    pub money: f64,
    pub birth_month: u8,
    pub household: Option<HouseholdId>,
    pub firm: Option<FirmId>,
    pub last_wage: Option<f64>,
}

/// Traits drawn for a new agent before it receives an id.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentTraits {
    pub gender: Gender,
    pub age: u32,
    pub qualification: u8,
    pub money: f64,
    pub birth_month: u8,
}

impl AgentRecord {
    pub fn traits(&self) -> AgentTraits {
        AgentTraits {
            gender: self.gender,
            age: self.age,
            qualification: self.qualification,
            money: self.money,
            birth_month: self.birth_month,
        }
    }
}
