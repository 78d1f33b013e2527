//! Households, dwellings and firms
//!
//! These live in keyed arenas owned by `Population`; cross references are ids.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::components::{AgentId, DwellingId, FirmId, HouseholdId, UnitId};
use crate::geometry::Point;

/// What an economic actor may do in the housing and labor markets.
pub trait Capabilities {
    fn is_construction(&self) -> bool;
    fn can_own_dwelling(&self) -> bool;
    fn can_employ(&self) -> bool;
}

// ============================================================================
// Household
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Household {
    pub id: HouseholdId,
    pub members: BTreeSet<AgentId>,
    pub owned: BTreeSet<DwellingId>,
    pub residence: Option<DwellingId>,
    pub cash: f64,
    pub savings: f64,
    pub debt: f64,
    /// Monthly rent while living in a dwelling owned by someone else.
    pub rent: Option<f64>,
    /// Months of rent still covered by a subsidy voucher.
    pub rent_voucher: u32,
    /// Unit in which a household without a home keeps looking for one.
    pub seeking: Option<UnitId>,
}

impl Household {
    pub fn new(id: HouseholdId) -> Self {
        Self {
            id,
            members: BTreeSet::new(),
            owned: BTreeSet::new(),
            residence: None,
            cash: 0.0,
            savings: 0.0,
            debt: 0.0,
            rent: None,
            rent_voucher: 0,
            seeking: None,
        }
    }

    pub fn is_owner(&self) -> bool {
        !self.owned.is_empty()
    }

    pub fn is_renting(&self) -> bool {
        self.rent.is_some()
    }

    pub fn wealth(&self) -> f64 {
        self.cash + self.savings - self.debt
    }
}

impl Capabilities for Household {
    fn is_construction(&self) -> bool {
        false
    }
    fn can_own_dwelling(&self) -> bool {
        true
    }
    fn can_employ(&self) -> bool {
        false
    }
}

// ============================================================================
// Dwelling
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Owner {
    Household(HouseholdId),
    Firm(FirmId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dwelling {
    pub id: DwellingId,
    pub location: Point,
    pub size: u32,
    /// Quality tier, 1 to 4.
    pub quality: u8,
    pub price: f64,
    pub unit: UnitId,
    pub owner: Owner,
    pub occupant: Option<HouseholdId>,
    /// Months listed for sale; `None` when not on the market.
    pub on_market: Option<u32>,
}

impl Dwelling {
    pub fn is_vacant(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Floor area drawn for a new dwelling, generated or built.
pub const DWELLING_SIZE: std::ops::Range<u32> = 20..120;
/// Quality grade drawn for a new dwelling.
pub const DWELLING_QUALITY: std::ops::RangeInclusive<u8> = 1..=4;

/// Market value of a dwelling from its attributes and the unit index.
pub fn valuation(size: u32, quality: u8, index: f64) -> f64 {
    f64::from(size) * f64::from(quality) * index
}

// ============================================================================
// Firm
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Production {
    pub inventory: f64,
    pub price: f64,
    pub produced: f64,
    pub sold: f64,
    pub revenue: f64,
    pub wages_paid: f64,
    pub profit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub size: u32,
    pub quality: u8,
    pub months_left: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionBook {
    /// Finished dwellings owned by the firm and offered for sale.
    pub listed: BTreeSet<DwellingId>,
    pub project: Option<Project>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FirmKind {
    Producer,
    Construction(ConstructionBook),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Firm {
    pub id: FirmId,
    pub location: Point,
    pub unit: UnitId,
    pub cash: f64,
    pub kind: FirmKind,
    pub employees: BTreeSet<AgentId>,
    pub production: Production,
}

/// Starting price of a freshly created product.
pub const INITIAL_PRICE: f64 = 1.0;

impl Firm {
    pub fn new(id: FirmId, location: Point, unit: UnitId, cash: f64, construction: bool) -> Self {
        let kind = if construction {
            FirmKind::Construction(ConstructionBook::default())
        } else {
            FirmKind::Producer
        };
        Self {
            id,
            location,
            unit,
            cash,
            kind,
            employees: BTreeSet::new(),
            production: Production {
                price: INITIAL_PRICE,
                ..Production::default()
            },
        }
    }

    pub fn book(&self) -> Option<&ConstructionBook> {
        match &self.kind {
            FirmKind::Construction(book) => Some(book),
            FirmKind::Producer => None,
        }
    }

    pub fn book_mut(&mut self) -> Option<&mut ConstructionBook> {
        match &mut self.kind {
            FirmKind::Construction(book) => Some(book),
            FirmKind::Producer => None,
        }
    }
}

impl Capabilities for Firm {
    fn is_construction(&self) -> bool {
        matches!(self.kind, FirmKind::Construction(_))
    }
    fn can_own_dwelling(&self) -> bool {
        self.is_construction()
    }
    fn can_employ(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_follow_kind() {
        let producer = Firm::new(FirmId(1), Point::default(), UnitId::new("a"), 0.0, false);
        let builder = Firm::new(FirmId(2), Point::default(), UnitId::new("a"), 0.0, true);
        assert!(!producer.is_construction() && !producer.can_own_dwelling());
        assert!(builder.is_construction() && builder.can_own_dwelling());
        assert!(producer.can_employ() && builder.can_employ());
        assert!(builder.book().is_some() && producer.book().is_none());
        let household = Household::new(HouseholdId(1));
        assert!(household.can_own_dwelling() && !household.can_employ());
    }

    #[test]
    fn test_valuation_scales_with_index() {
        assert_eq!(valuation(50, 3, 1.0), 150.0);
        assert_eq!(valuation(50, 3, 0.5), 75.0);
    }
}
