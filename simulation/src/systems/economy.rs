//! Economy Systems
//!
//! Monthly firm life cycle: licenses, new firms, production, consumption,
//! accounts (wages, taxes, prices), construction and GDP. Money moves
//! between wallets, household cash and firm cash; every tax is collected
//! in the unit where it arises.

use rand::seq::index::sample;
use rand::Rng;
use rand_distr::Beta;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::components::{FirmId, HouseholdId, UnitId};
use crate::config::{EconomyConfig, LicensePolicy};
use crate::data::FirmGrowthStatistics;
use crate::entities::{valuation, Capabilities, Owner, Project, DWELLING_QUALITY, DWELLING_SIZE};
use crate::error::PopulationError;
use crate::generator::draw_firm_cash;
use crate::population::Population;
use crate::region::{AdministrativeUnit, TaxCategory};
use crate::rng::SimRng;
use crate::shapes::ShapeProvider;

/// Output of one worker per month.
pub fn productivity(qualification: u8, config: &EconomyConfig) -> f64 {
    f64::from(qualification).powf(config.productivity_exponent) / config.productivity_divisor
}

// ============================================================================
// Licenses and firm growth
// ============================================================================

/// Building licenses granted to the units this month.
pub fn license_system(
    units: &mut BTreeMap<UnitId, AdministrativeUnit>,
    policy: LicensePolicy,
    rng: &mut SimRng,
) -> u32 {
    let mut granted = 0;
    for unit in units.values_mut() {
        let n = match policy {
            LicensePolicy::Random => u32::from(rng.gen_bool(0.5)),
            LicensePolicy::Fixed(n) => n,
        };
        unit.licenses += n;
        granted += n;
    }
    granted
}

/// Opens the firms each unit gains per month on its historical trend.
pub fn firm_growth_system(
    population: &mut Population,
    units: &BTreeMap<UnitId, AdministrativeUnit>,
    growth: &FirmGrowthStatistics,
    sampling_percentage: f64,
    shapes: &ShapeProvider,
    cash: &Beta<f64>,
    rng: &mut SimRng,
) -> usize {
    let mut opened = 0;
    for (id, unit) in units {
        let n = (growth.average_monthly_growth(id) * sampling_percentage).round();
        if n <= 0.0 {
            continue;
        }
        for _ in 0..n as usize {
            let location = shapes
                .get_random_point_in_polygon(id, true, rng)
                .unwrap_or_else(|| unit.polygon.centroid());
            let money = draw_firm_cash(cash, rng);
            population.spawn_firm(location, id.clone(), money, false);
            opened += 1;
        }
    }
    opened
}

// ============================================================================
// Production and consumption
// ============================================================================

/// Producers turn their employees' work into stock.
pub fn production_system(population: &mut Population, config: &EconomyConfig) -> f64 {
    let output: Vec<(FirmId, f64)> = population
        .firms()
        .filter(|f| !f.is_construction())
        .map(|f| {
            let produced = f
                .employees
                .iter()
                .filter_map(|a| population.agent(*a))
                .map(|a| productivity(a.qualification, config))
                .sum();
            (f.id, produced)
        })
        .collect();

    let mut total = 0.0;
    for (id, produced) in output {
        if let Some(f) = population.firm_mut(id) {
            f.production.produced = produced;
            f.production.sold = 0.0;
            f.production.inventory += produced;
            total += produced;
        }
    }
    total
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConsumptionReport {
    pub spent: f64,
    pub tax: f64,
}

/// Households pool their members' wallets and spend part of their cash at
/// the cheapest of a sample of producers, preferring their own unit.
pub fn consumption_system(
    population: &mut Population,
    units: &mut BTreeMap<UnitId, AdministrativeUnit>,
    config: &EconomyConfig,
    tax_rate: f64,
    rng: &mut SimRng,
) -> Result<ConsumptionReport, PopulationError> {
    let producers: Vec<(FirmId, UnitId)> = population
        .firms()
        .filter(|f| !f.is_construction())
        .map(|f| (f.id, f.unit.clone()))
        .collect();
    let mut report = ConsumptionReport::default();
    if producers.is_empty() {
        return Ok(report);
    }

    for h in population.household_ids() {
        population.pool_member_money(h)?;
        let Some(cash) = population.household(h).map(|hh| hh.cash) else {
            continue;
        };
        let budget = cash.max(0.0) * config.consumption_propensity;
        if budget <= 0.0 {
            continue;
        }
        let home = population.household_unit(h).cloned();
        let k = config.market_sample.max(1).min(producers.len());
        let seller = sample(rng, producers.len(), k)
            .into_iter()
            .filter_map(|i| {
                let (id, unit) = &producers[i];
                let f = population.firm(*id)?;
                (f.production.inventory > 0.0).then(|| (*id, unit, f.production.price))
            })
            .min_by(|a, b| {
                let local = |u: &UnitId| Some(u) != home.as_ref();
                local(a.1)
                    .cmp(&local(b.1))
                    .then(a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal))
                    .then(a.0.cmp(&b.0))
            })
            .map(|(id, unit, price)| (id, unit.clone(), price));
        let Some((firm, unit, price)) = seller else {
            continue;
        };
        let (spent, tax) = buy(population, h, firm, price, budget, tax_rate);
        if let Some(u) = units.get_mut(&unit) {
            u.collect_tax(TaxCategory::Consumption, tax);
        }
        report.spent += spent;
        report.tax += tax;
    }
    debug!("Consumption: {:.2} spent, {:.2} tax", report.spent, report.tax);
    Ok(report)
}

/// Buys as much as `budget` allows, tax included. Returns (net spent, tax).
fn buy(population: &mut Population, household: HouseholdId, firm: FirmId, price: f64, budget: f64, tax_rate: f64) -> (f64, f64) {
    let Some(stock) = population.firm(firm).map(|f| f.production.inventory) else {
        return (0.0, 0.0);
    };
    if price <= 0.0 {
        return (0.0, 0.0);
    }
    let quantity = (budget / (price * (1.0 + tax_rate))).min(stock);
    let spent = quantity * price;
    let tax = spent * tax_rate;
    if let Some(f) = population.firm_mut(firm) {
        f.production.inventory -= quantity;
        f.production.sold += quantity;
        f.production.revenue += spent;
        f.cash += spent;
    }
    if let Some(h) = population.household_mut(household) {
        h.cash -= spent + tax;
    }
    (spent, tax)
}

// ============================================================================
// Firm accounts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AccountsReport {
    pub wages: f64,
    pub labor_tax: f64,
    pub firm_tax: f64,
}

/// Pays wages (labor tax withheld), books profit, pays profit tax and
/// revises prices. Wages are cut pro rata when a firm lacks the cash.
pub fn accounts_system(
    population: &mut Population,
    units: &mut BTreeMap<UnitId, AdministrativeUnit>,
    config: &EconomyConfig,
    labor_rate: f64,
    firm_rate: f64,
    rng: &mut SimRng,
) -> Result<AccountsReport, PopulationError> {
    let mut report = AccountsReport::default();
    for id in population.firm_ids() {
        let Some(f) = population.firm(id) else {
            continue;
        };
        let unit = f.unit.clone();
        let payroll: Vec<_> = f
            .employees
            .iter()
            .filter_map(|a| population.agent(*a))
            .map(|a| (a.id, productivity(a.qualification, config)))
            .collect();
        let due: f64 = payroll.iter().map(|(_, w)| w).sum();
        let scale = if due > f.cash.max(0.0) && due > 0.0 {
            f.cash.max(0.0) / due
        } else {
            1.0
        };

        let mut paid = 0.0;
        let mut withheld = 0.0;
        for (agent, wage) in payroll {
            let gross = wage * scale;
            let tax = gross * labor_rate;
            population.add_money(agent, gross - tax)?;
            population.set_last_wage(agent, Some(gross - tax))?;
            paid += gross;
            withheld += tax;
        }

        let keep_price = rng.gen_bool(config.sticky_prices);
        let Some(f) = population.firm_mut(id) else {
            continue;
        };
        f.cash -= paid;
        let p = &mut f.production;
        p.wages_paid = paid;
        p.profit = p.revenue - paid;
        p.revenue = 0.0;
        let profit_tax = p.profit.max(0.0) * firm_rate;
        if !keep_price && p.produced > 0.0 {
            p.price = paid / p.produced * (1.0 + config.markup);
        }
        f.cash -= profit_tax;

        if let Some(u) = units.get_mut(&unit) {
            u.collect_tax(TaxCategory::Labor, withheld);
            u.collect_tax(TaxCategory::Firm, profit_tax);
        }
        report.wages += paid;
        report.labor_tax += withheld;
        report.firm_tax += profit_tax;
    }
    Ok(report)
}

// ============================================================================
// Construction
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConstructionReport {
    pub started: usize,
    pub completed: usize,
}

/// Advances building projects. Finished dwellings are owned and listed by
/// their firm; idle firms holding a unit license and the lot cost start a
/// new project.
pub fn construction_system(
    population: &mut Population,
    units: &mut BTreeMap<UnitId, AdministrativeUnit>,
    config: &EconomyConfig,
    shapes: &ShapeProvider,
    rng: &mut SimRng,
) -> Result<ConstructionReport, PopulationError> {
    let mut report = ConstructionReport::default();
    let builders: Vec<FirmId> = population
        .firms()
        .filter(|f| f.is_construction())
        .map(|f| f.id)
        .collect();

    for id in builders {
        let Some((unit_id, project)) = population
            .firm(id)
            .and_then(|f| f.book().map(|b| (f.unit.clone(), b.project)))
        else {
            continue;
        };
        let Some(unit) = units.get_mut(&unit_id) else {
            continue;
        };

        match project {
            Some(p) if p.months_left > 1 => {
                if let Some(book) = population.firm_mut(id).and_then(|f| f.book_mut()) {
                    book.project = Some(Project {
                        months_left: p.months_left - 1,
                        ..p
                    });
                }
            }
            Some(p) => {
                let location = shapes
                    .get_random_point_in_polygon(&unit_id, true, rng)
                    .unwrap_or_else(|| unit.polygon.centroid());
                let price = valuation(p.size, p.quality, unit.index) * (1.0 + config.markup);
                population.add_dwelling(location, p.size, p.quality, price, unit_id.clone(), Owner::Firm(id))?;
                if let Some(book) = population.firm_mut(id).and_then(|f| f.book_mut()) {
                    book.project = None;
                }
                report.completed += 1;
            }
            None if unit.licenses > 0 => {
                let size = rng.gen_range(DWELLING_SIZE);
                let quality = rng.gen_range(DWELLING_QUALITY);
                let lot = valuation(size, quality, unit.index) * config.lot_cost;
                let Some(f) = population.firm_mut(id) else {
                    continue;
                };
                if f.cash < lot {
                    continue;
                }
                f.cash -= lot;
                if let Some(book) = f.book_mut() {
                    book.project = Some(Project {
                        size,
                        quality,
                        months_left: config.construction_months.max(1),
                    });
                }
                unit.licenses -= 1;
                report.started += 1;
            }
            None => {}
        }
    }
    Ok(report)
}

/// Value added per unit this month: wages plus profit of its firms.
pub fn gdp_system(population: &Population, units: &mut BTreeMap<UnitId, AdministrativeUnit>) {
    let mut gdp: BTreeMap<&UnitId, f64> = BTreeMap::new();
    for f in population.firms() {
        *gdp.entry(&f.unit).or_default() += f.production.wages_paid + f.production.profit;
    }
    for (id, unit) in units.iter_mut() {
        unit.gdp = gdp.get(id).copied().unwrap_or(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentTraits, Gender, GroupId};
    use crate::geometry::{MultiPolygon, Point};
    use rand::SeedableRng;

    fn units(id: &str) -> BTreeMap<UnitId, AdministrativeUnit> {
        let u = AdministrativeUnit::new(
            UnitId::new(id),
            GroupId::new("g"),
            id.into(),
            MultiPolygon::from_rings(&[vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]),
            None,
            1.0,
        );
        [(u.id.clone(), u)].into_iter().collect()
    }

    fn worker(pop: &mut Population, firm: FirmId, qualification: u8) -> crate::components::AgentId {
        let h = pop.create_household();
        let a = pop.spawn_agent(AgentTraits {
            gender: Gender::Male,
            age: 35,
            qualification,
            money: 0.0,
            birth_month: 1,
        });
        pop.add_member(h, a).unwrap();
        pop.hire(firm, a).unwrap();
        a
    }

    #[test]
    fn test_fixed_licenses() {
        let mut u = units("a");
        let mut rng = SimRng::seed_from_u64(1);
        assert_eq!(license_system(&mut u, LicensePolicy::Fixed(2), &mut rng), 2);
        assert_eq!(u[&UnitId::new("a")].licenses, 2);
    }

    #[test]
    fn test_wages_and_taxes_flow_to_unit() {
        let config = EconomyConfig::default();
        let mut pop = Population::new();
        let mut u = units("a");
        let firm = pop.spawn_firm(Point::default(), UnitId::new("a"), 1000.0, false);
        let a = worker(&mut pop, firm, 12);

        production_system(&mut pop, &config);
        let expected = productivity(12, &config);
        assert!((pop.firm(firm).unwrap().production.inventory - expected).abs() < 1e-12);

        let mut rng = SimRng::seed_from_u64(3);
        let report = accounts_system(&mut pop, &mut u, &config, 0.15, 0.15, &mut rng).unwrap();
        assert!((report.wages - expected).abs() < 1e-12);
        let net = pop.agent(a).unwrap().money;
        assert!((net - expected * 0.85).abs() < 1e-12);
        assert_eq!(pop.agent(a).unwrap().last_wage, Some(net));
        assert!((u[&UnitId::new("a")].treasure.labor - expected * 0.15).abs() < 1e-12);
        assert!(pop.firm(firm).unwrap().production.profit < 0.0);
        assert_eq!(report.firm_tax, 0.0);
    }

    #[test]
    fn test_consumption_collects_tax_in_seller_unit() {
        let config = EconomyConfig::default();
        let mut pop = Population::new();
        let mut u = units("a");
        let firm = pop.spawn_firm(Point::default(), UnitId::new("a"), 0.0, false);
        pop.firm_mut(firm).unwrap().production.inventory = 1000.0;
        let buyer = pop.create_household();
        let a = pop.spawn_agent(AgentTraits {
            gender: Gender::Female,
            age: 40,
            qualification: 9,
            money: 26.0,
            birth_month: 1,
        });
        pop.add_member(buyer, a).unwrap();

        let mut rng = SimRng::seed_from_u64(5);
        let report = consumption_system(&mut pop, &mut u, &config, 0.3, &mut rng).unwrap();
        // half of 26 is spent, tax included
        assert!((report.spent + report.tax - 13.0).abs() < 1e-9);
        assert!((report.tax - report.spent * 0.3).abs() < 1e-9);
        assert!((pop.household(buyer).unwrap().cash - 13.0).abs() < 1e-9);
        assert_eq!(pop.agent(a).unwrap().money, 0.0);
        assert!((u[&UnitId::new("a")].treasure.consumption - report.tax).abs() < 1e-12);
        assert!((pop.firm(firm).unwrap().cash - report.spent).abs() < 1e-12);
    }

    #[test]
    fn test_project_completes_into_listed_dwelling() {
        let config = EconomyConfig {
            construction_months: 2,
            ..EconomyConfig::default()
        };
        let mut pop = Population::new();
        let mut u = units("a");
        u.get_mut(&UnitId::new("a")).unwrap().licenses = 1;
        let builder = pop.spawn_firm(Point::default(), UnitId::new("a"), 1e6, true);
        let shapes = ShapeProvider::default();
        let mut rng = SimRng::seed_from_u64(8);

        let started = construction_system(&mut pop, &mut u, &config, &shapes, &mut rng).unwrap();
        assert_eq!(started.started, 1);
        assert_eq!(u[&UnitId::new("a")].licenses, 0);
        construction_system(&mut pop, &mut u, &config, &shapes, &mut rng).unwrap();
        let done = construction_system(&mut pop, &mut u, &config, &shapes, &mut rng).unwrap();
        assert_eq!(done.completed, 1);

        let listed = &pop.firm(builder).unwrap().book().unwrap().listed;
        assert_eq!(listed.len(), 1);
        let d = pop.dwelling(*listed.iter().next().unwrap()).unwrap();
        assert_eq!(d.owner, Owner::Firm(builder));
        assert_eq!(d.on_market, Some(0));
        assert!(DWELLING_SIZE.contains(&d.size) && DWELLING_QUALITY.contains(&d.quality));
        assert!(pop.check_invariants().is_empty());
    }
}
