//! Monthly systems - each one transforms the population in place

pub mod aging;
pub mod birth;
pub mod death;
pub mod demography;
pub mod economy;
pub mod housing;
pub mod immigration;
pub mod matchmaking;

pub use aging::aging_system;
pub use birth::birth_system;
pub use death::{death_system, DeathReport};
pub use demography::{demography_system, DemographyReport, GroupRates, RateCache};
pub use economy::{
    accounts_system, consumption_system, construction_system, firm_growth_system, gdp_system,
    license_system, production_system, AccountsReport, ConstructionReport, ConsumptionReport,
};
pub use housing::{investment_system, property_tax_system, rehousing_system, rent_system, RentReport};
pub use immigration::{immigration_system, monthly_migrants, ImmigrationReport, ImmigrationSettings};
pub use matchmaking::{matchmaking_system, UnionReport};
