//! Run configuration
//!
//! Loaded from a JSON file; every field has a default so a config file only
//! needs to name what it changes.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::components::UnitId;
use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub start_date: NaiveDate,
    /// Number of simulated days.
    pub total_days: u32,
    /// Master seed. A fresh seed is drawn (and logged) when absent.
    pub seed: Option<u64>,
    /// Fraction of the real population that is synthesised.
    pub sampling_percentage: f64,
    pub units: UnitSelection,
    /// Extra dwellings per household at generation.
    pub household_vacancy: f64,
    /// Household size used when no prediction exists for a group and year.
    pub members_per_household: f64,
    /// Share of generated dwellings that are not owner-occupied.
    pub rental_share: f64,
    pub construction_firm_share: f64,
    /// Monthly probability that an agent is considered for a union.
    pub union_check_probability: f64,
    pub taxes: TaxRates,
    pub redistribution: RedistributionConfig,
    pub policy: PolicyConfig,
    pub labor: LaborConfig,
    pub housing: HousingConfig,
    pub economy: EconomyConfig,
    pub licenses: LicensePolicy,
    pub snapshots: SnapshotCadence,
    /// Population snapshot reused across runs instead of resynthesising.
    pub population_cache: Option<PathBuf>,
    pub force_new_population: bool,
    pub output_dir: Option<PathBuf>,
    /// Abort on broken referential invariants instead of logging them.
    pub strict_invariants: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or_default(),
            total_days: 365,
            seed: None,
            sampling_percentage: 0.1,
            units: UnitSelection::All,
            household_vacancy: 0.1,
            members_per_household: 2.5,
            rental_share: 0.3,
            construction_firm_share: 0.03,
            union_check_probability: 0.034,
            taxes: TaxRates::default(),
            redistribution: RedistributionConfig::default(),
            policy: PolicyConfig::default(),
            labor: LaborConfig::default(),
            housing: HousingConfig::default(),
            economy: EconomyConfig::default(),
            licenses: LicensePolicy::Random,
            snapshots: SnapshotCadence::Never,
            population_cache: None,
            force_new_population: false,
            output_dir: None,
            strict_invariants: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSelection {
    All,
    Only(Vec<UnitId>),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxRates {
    pub consumption: f64,
    pub labor: f64,
    pub firm: f64,
    pub property: f64,
    pub transaction: f64,
}

impl Default for TaxRates {
    fn default() -> Self {
        Self {
            consumption: 0.3,
            labor: 0.15,
            firm: 0.15,
            property: 0.005,
            transaction: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RedistributionConfig {
    /// Part of consumption tax that joins the equal-split pool when the
    /// local split is active.
    pub consumption_equal: f64,
    /// Part of labor and firm taxes distributed by historical transfers.
    pub transfer_share: f64,
    pub local_split: bool,
    pub transfer_table: bool,
    /// Index gain per unit of money applied to a unit.
    pub management_efficiency: f64,
}

impl Default for RedistributionConfig {
    fn default() -> Self {
        Self {
            consumption_equal: 0.1875,
            transfer_share: 0.235,
            local_split: true,
            transfer_table: true,
            management_efficiency: 0.0001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    #[serde(rename = "none")]
    NoPolicy,
    DirectTransfer,
    RentSubsidy,
    BuyAndGift,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub kind: PolicyKind,
    /// Fraction of every allocation earmarked for the welfare fund.
    pub coefficient: f64,
    /// Income quantile below which households become eligible.
    pub quantile: f64,
    /// Days a registry entry stays valid.
    pub window_days: u32,
    pub rent_voucher_months: u32,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kind: PolicyKind::NoPolicy,
            coefficient: 0.2,
            quantile: 0.2,
            window_days: 360,
            rent_voucher_months: 24,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LaborConfig {
    /// Monthly probability that a firm opens a position.
    pub hiring_probability: f64,
    /// Bootstrap hiring stops once unemployment is at or below this rate.
    pub target_unemployment: f64,
    pub max_bootstrap_rounds: u32,
    pub min_working_age: u32,
    pub max_working_age: u32,
    /// Job seekers interviewed per opening.
    pub hiring_sample_size: usize,
    /// Monthly probability that a loss-making firm lays someone off.
    pub firing_probability: f64,
}

impl Default for LaborConfig {
    fn default() -> Self {
        Self {
            hiring_probability: 0.75,
            target_unemployment: 0.086,
            max_bootstrap_rounds: 200,
            min_working_age: 16,
            max_working_age: 70,
            hiring_sample_size: 20,
            firing_probability: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HousingConfig {
    /// Monthly rent as a fraction of the dwelling price.
    pub rent_to_price: f64,
    /// Monthly probability that a household able to pay looks for a purchase.
    pub purchase_probability: f64,
    /// Relative price change per month a listing stays unsold.
    pub on_market_decay: f64,
    /// Lowest listing price as a fraction of the dwelling's valuation.
    pub max_offer_discount: f64,
}

impl Default for HousingConfig {
    fn default() -> Self {
        Self {
            rent_to_price: 0.0028,
            purchase_probability: 0.05,
            on_market_decay: -0.01,
            max_offer_discount: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub productivity_exponent: f64,
    pub productivity_divisor: f64,
    pub markup: f64,
    /// Probability that a firm keeps its price this month.
    pub sticky_prices: f64,
    /// Share of household cash spent on goods each month.
    pub consumption_propensity: f64,
    /// Producers compared by a household before buying.
    pub market_sample: usize,
    pub construction_months: u32,
    /// Land cost as a fraction of the valuation of a planned dwelling.
    pub lot_cost: f64,
    /// Monthly return on household savings.
    pub savings_interest: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            productivity_exponent: 0.6,
            productivity_divisor: 12.0,
            markup: 0.15,
            sticky_prices: 0.5,
            consumption_propensity: 0.5,
            market_sample: 10,
            construction_months: 6,
            lot_cost: 0.15,
            savings_interest: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicensePolicy {
    /// Each unit gains one license with probability one half per month.
    Random,
    Fixed(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotCadence {
    Never,
    Quarterly,
    Yearly,
}

impl SimulationConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Policy coefficient actually applied: zero when no policy is active.
    pub fn effective_policy_coefficient(&self) -> f64 {
        match self.policy.kind {
            PolicyKind::NoPolicy => 0.0,
            _ => self.policy.coefficient,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_days == 0 {
            return Err(invalid("total_days", "must be positive"));
        }
        if !(self.sampling_percentage > 0.0 && self.sampling_percentage <= 1.0) {
            return Err(invalid("sampling_percentage", "must lie in (0, 1]"));
        }
        if !(self.members_per_household > 0.0) {
            return Err(invalid("members_per_household", "must be positive"));
        }
        if self.economy.productivity_divisor <= 0.0 {
            return Err(invalid("economy.productivity_divisor", "must be positive"));
        }
        if self.labor.min_working_age > self.labor.max_working_age {
            return Err(invalid("labor.min_working_age", "exceeds max_working_age"));
        }
        let fractions: [(&'static str, f64); 18] = [
            ("household_vacancy", self.household_vacancy),
            ("rental_share", self.rental_share),
            ("construction_firm_share", self.construction_firm_share),
            ("union_check_probability", self.union_check_probability),
            ("taxes.consumption", self.taxes.consumption),
            ("taxes.labor", self.taxes.labor),
            ("taxes.firm", self.taxes.firm),
            ("taxes.property", self.taxes.property),
            ("taxes.transaction", self.taxes.transaction),
            ("redistribution.consumption_equal", self.redistribution.consumption_equal),
            ("redistribution.transfer_share", self.redistribution.transfer_share),
            ("policy.coefficient", self.policy.coefficient),
            ("policy.quantile", self.policy.quantile),
            ("labor.hiring_probability", self.labor.hiring_probability),
            ("labor.target_unemployment", self.labor.target_unemployment),
            ("labor.firing_probability", self.labor.firing_probability),
            ("housing.purchase_probability", self.housing.purchase_probability),
            ("economy.sticky_prices", self.economy.sticky_prices),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(name, &format!("{value} is outside [0, 1]")));
            }
        }
        Ok(())
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2014, 1, 1).unwrap());
        assert_eq!(config.labor.target_unemployment, 0.086);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{
            "total_days": 730,
            "units": {"only": ["01001"]},
            "policy": {"kind": "buy_and_gift"},
            "licenses": {"fixed": 2}
        }"#;
        let config: SimulationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.total_days, 730);
        assert_eq!(config.units, UnitSelection::Only(vec![UnitId::new("01001")]));
        assert_eq!(config.policy.kind, PolicyKind::BuyAndGift);
        assert_eq!(config.policy.coefficient, 0.2);
        assert_eq!(config.licenses, LicensePolicy::Fixed(2));
        assert_eq!(config.taxes.consumption, 0.3);
    }

    #[test]
    fn test_no_policy_zeroes_coefficient() {
        let mut config = SimulationConfig::default();
        assert_eq!(config.effective_policy_coefficient(), 0.0);
        config.policy.kind = PolicyKind::DirectTransfer;
        assert_eq!(config.effective_policy_coefficient(), 0.2);
    }

    #[test]
    fn test_out_of_range_rate_is_rejected() {
        let mut config = SimulationConfig::default();
        config.taxes.labor = 1.5;
        match config.validate() {
            Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, "taxes.labor"),
            other => panic!("expected invalid parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_firing_probability_is_a_fraction() {
        let mut config = SimulationConfig::default();
        config.labor.firing_probability = 1.5;
        match config.validate() {
            Err(ConfigError::Invalid { name, .. }) => assert_eq!(name, "labor.firing_probability"),
            other => panic!("expected invalid parameter, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = SimulationConfig::from_file("/nonexistent/run.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.json"));
    }
}
