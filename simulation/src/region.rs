//! Administrative units and their fiscal ledgers

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::components::{GroupId, HouseholdId, UnitId};
use crate::geometry::MultiPolygon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxCategory {
    Consumption,
    Labor,
    Firm,
    Property,
    Transaction,
}

/// Amounts per tax category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxLedger {
    pub consumption: f64,
    pub labor: f64,
    pub firm: f64,
    pub property: f64,
    pub transaction: f64,
}

impl TaxLedger {
    pub fn get(&self, category: TaxCategory) -> f64 {
        match category {
            TaxCategory::Consumption => self.consumption,
            TaxCategory::Labor => self.labor,
            TaxCategory::Firm => self.firm,
            TaxCategory::Property => self.property,
            TaxCategory::Transaction => self.transaction,
        }
    }

    pub fn add(&mut self, category: TaxCategory, amount: f64) {
        let slot = match category {
            TaxCategory::Consumption => &mut self.consumption,
            TaxCategory::Labor => &mut self.labor,
            TaxCategory::Firm => &mut self.firm,
            TaxCategory::Property => &mut self.property,
            TaxCategory::Transaction => &mut self.transaction,
        };
        *slot += amount;
    }

    pub fn merge(&mut self, other: &TaxLedger) {
        self.consumption += other.consumption;
        self.labor += other.labor;
        self.firm += other.firm;
        self.property += other.property;
        self.transaction += other.transaction;
    }

    pub fn total(&self) -> f64 {
        self.consumption + self.labor + self.firm + self.property + self.transaction
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AllocationRule {
    Equal,
    Local,
    Transfer,
}

/// Money applied to a unit, per allocation rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedLedger {
    pub equally: f64,
    pub locally: f64,
    pub transfer: f64,
}

impl AppliedLedger {
    pub fn get(&self, rule: AllocationRule) -> f64 {
        match rule {
            AllocationRule::Equal => self.equally,
            AllocationRule::Local => self.locally,
            AllocationRule::Transfer => self.transfer,
        }
    }

    pub fn add(&mut self, rule: AllocationRule, amount: f64) {
        match rule {
            AllocationRule::Equal => self.equally += amount,
            AllocationRule::Local => self.locally += amount,
            AllocationRule::Transfer => self.transfer += amount,
        }
    }

    pub fn total(&self) -> f64 {
        self.equally + self.locally + self.transfer
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrativeUnit {
    pub id: UnitId,
    pub group: GroupId,
    pub name: String,
    pub polygon: MultiPolygon,
    pub urban: Option<MultiPolygon>,
    /// Quality-of-life index; scales dwelling prices.
    pub index: f64,
    pub population: u64,
    pub gdp: f64,
    pub licenses: u32,
    /// Taxes collected in the current period.
    pub treasure: TaxLedger,
    pub cumulative_treasure: TaxLedger,
    pub applied_treasure: AppliedLedger,
    /// Money earmarked by the policy coefficient and not yet spent.
    pub welfare_fund: f64,
    /// Households found below the income threshold, by registration date.
    pub registry: BTreeMap<NaiveDate, Vec<HouseholdId>>,
}

impl AdministrativeUnit {
    pub fn new(
        id: UnitId,
        group: GroupId,
        name: String,
        polygon: MultiPolygon,
        urban: Option<MultiPolygon>,
        index: f64,
    ) -> Self {
        Self {
            id,
            group,
            name,
            polygon,
            urban,
            index,
            population: 0,
            gdp: 0.0,
            licenses: 0,
            treasure: TaxLedger::default(),
            cumulative_treasure: TaxLedger::default(),
            applied_treasure: AppliedLedger::default(),
            welfare_fund: 0.0,
            registry: BTreeMap::new(),
        }
    }

    pub fn collect_tax(&mut self, category: TaxCategory, amount: f64) {
        self.treasure.add(category, amount);
    }

    /// Hands over the current-period ledger, folding it into the cumulative
    /// ledger and resetting it.
    pub fn transfer_treasure(&mut self) -> TaxLedger {
        let period = std::mem::take(&mut self.treasure);
        self.cumulative_treasure.merge(&period);
        period
    }

    /// Applies `amount` under `rule`: the `coefficient` share goes to the
    /// welfare fund, the rest improves the index. Returns `(applied, earmarked)`.
    pub fn apply(
        &mut self,
        rule: AllocationRule,
        amount: f64,
        coefficient: f64,
        efficiency: f64,
    ) -> (f64, f64) {
        let earmarked = amount * coefficient;
        self.welfare_fund += earmarked;
        let applied = amount - earmarked;
        self.index += applied * efficiency;
        self.applied_treasure.add(rule, applied);
        (applied, earmarked)
    }
}
