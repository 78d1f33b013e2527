//! Labor and housing markets
//!
//! The engines talk to the markets through two traits. `BasicLaborMarket`
//! and `BasicHousingMarket` are simple clearing rules that keep a run
//! self-contained; richer implementations can be plugged in.

use rand::seq::index::sample;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use crate::components::{AgentId, DwellingId, FirmId, HouseholdId, UnitId};
use crate::config::{HousingConfig, LaborConfig};
use crate::entities::{valuation, Owner};
use crate::error::PopulationError;
use crate::population::Population;
use crate::region::{AdministrativeUnit, TaxCategory};
use crate::rng::SimRng;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LaborReport {
    pub hired: usize,
    pub fired: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SalesReport {
    pub sold: usize,
    pub volume: f64,
}

pub trait LaborMarket {
    /// One matching round. During bootstrap every firm opens a position and
    /// nobody is laid off.
    fn match_jobs(&mut self, population: &mut Population, bootstrap: bool, rng: &mut SimRng) -> LaborReport;

    /// Share of the labor force without a job.
    fn unemployment(&self, population: &Population) -> f64;
}

pub trait HousingMarket {
    /// A vacant dwelling in `unit` for a household able to spend `budget`,
    /// with its monthly rent.
    fn find_rental(
        &mut self,
        population: &Population,
        unit: &UnitId,
        budget: f64,
        rng: &mut SimRng,
    ) -> Option<(DwellingId, f64)>;

    /// Sells listed dwellings to households.
    fn clear_sales(
        &mut self,
        population: &mut Population,
        units: &mut BTreeMap<UnitId, AdministrativeUnit>,
        rng: &mut SimRng,
    ) -> SalesReport;
}

/// Houses a household in `unit`: in a vacant dwelling it owns there, else
/// through the rental market. Returns whether it found a home.
pub fn house_household(
    population: &mut Population,
    housing: &mut dyn HousingMarket,
    household: HouseholdId,
    unit: &UnitId,
    rng: &mut SimRng,
) -> bool {
    let Some(h) = population.household(household) else {
        return false;
    };
    let budget = h.wealth().max(0.0);
    let own = h
        .owned
        .iter()
        .copied()
        .find(|d| population.dwelling(*d).map_or(false, |d| d.is_vacant() && &d.unit == unit));
    if let Some(d) = own {
        return population.move_in(household, d, None).is_ok();
    }
    match housing.find_rental(population, unit, budget, rng) {
        Some((d, rent)) => population.move_in(household, d, Some(rent)).is_ok(),
        None => false,
    }
}

/// Completes a sale of `dwelling` to `buyer` at `price`: the transaction tax
/// is collected in the dwelling's unit, a selling firm receives the net
/// price and the buyer moves in unless it already lives in a home it owns.
/// Paying the price is up to the caller. Returns the tax collected.
pub fn settle_sale(
    population: &mut Population,
    units: &mut BTreeMap<UnitId, AdministrativeUnit>,
    dwelling: DwellingId,
    buyer: HouseholdId,
    price: f64,
    tax_rate: f64,
) -> Result<f64, PopulationError> {
    let d = population
        .dwelling(dwelling)
        .ok_or(PopulationError::UnknownDwelling(dwelling))?;
    let (seller, unit) = (d.owner, d.unit.clone());
    let tax = price * tax_rate;
    if let Some(u) = units.get_mut(&unit) {
        u.collect_tax(TaxCategory::Transaction, tax);
    }
    match seller {
        Owner::Firm(f) => {
            if let Some(firm) = population.firm_mut(f) {
                firm.cash += price - tax;
                firm.production.revenue += price - tax;
            }
        }
        Owner::Household(h) => {
            if let Some(h) = population.household_mut(h) {
                h.cash += price - tax;
            }
        }
    }
    population.set_owner(dwelling, Owner::Household(buyer))?;
    let owner_occupier = population.household(buyer).map_or(false, |h| {
        h.residence
            .map_or(false, |r| r != dwelling && h.owned.contains(&r))
    });
    if !owner_occupier {
        population.move_in(buyer, dwelling, None)?;
    }
    if let Some(d) = population.dwelling_mut(dwelling) {
        d.price = price;
    }
    Ok(tax)
}

// ============================================================================
// Basic labor market
// ============================================================================

#[derive(Debug, Clone)]
pub struct BasicLaborMarket {
    config: LaborConfig,
}

struct Seeker {
    id: AgentId,
    qualification: u8,
    unit: Option<UnitId>,
}

impl BasicLaborMarket {
    pub fn new(config: LaborConfig) -> Self {
        Self { config }
    }

    fn in_labor_force(&self, age: u32) -> bool {
        (self.config.min_working_age..=self.config.max_working_age).contains(&age)
    }

    fn seekers(&self, population: &Population) -> Vec<Seeker> {
        population
            .agents()
            .filter(|a| a.firm.is_none() && a.household.is_some() && self.in_labor_force(a.age))
            .map(|a| Seeker {
                id: a.id,
                qualification: a.qualification,
                unit: population.agent_unit(a.id).cloned(),
            })
            .collect()
    }
}

impl LaborMarket for BasicLaborMarket {
    fn match_jobs(&mut self, population: &mut Population, bootstrap: bool, rng: &mut SimRng) -> LaborReport {
        let mut report = LaborReport::default();

        if !bootstrap {
            let layoffs: Vec<AgentId> = population
                .firms()
                .filter(|f| f.production.profit < 0.0 && !f.employees.is_empty())
                .filter_map(|f| {
                    if !rng.gen_bool(self.config.firing_probability) {
                        return None;
                    }
                    f.employees
                        .iter()
                        .filter_map(|a| population.agent(*a))
                        .min_by_key(|a| (a.qualification, a.id))
                        .map(|a| a.id)
                })
                .collect();
            for agent in layoffs {
                if population.fire(agent).is_ok() {
                    report.fired += 1;
                }
            }
        }

        let mut seekers = self.seekers(population);
        let firms: Vec<(FirmId, UnitId)> =
            population.firms().map(|f| (f.id, f.unit.clone())).collect();
        for (firm, unit) in firms {
            if seekers.is_empty() {
                break;
            }
            if !bootstrap && !rng.gen_bool(self.config.hiring_probability) {
                continue;
            }
            let k = self.config.hiring_sample_size.max(1).min(seekers.len());
            let best = sample(rng, seekers.len(), k)
                .into_iter()
                .max_by(|a, b| {
                    let (sa, sb) = (&seekers[*a], &seekers[*b]);
                    let local = |s: &Seeker| s.unit.as_ref() == Some(&unit);
                    local(sa)
                        .cmp(&local(sb))
                        .then(sa.qualification.cmp(&sb.qualification))
                        .then(sb.id.cmp(&sa.id))
                });
            if let Some(idx) = best {
                let seeker = seekers.swap_remove(idx);
                if population.hire(firm, seeker.id).is_ok() {
                    report.hired += 1;
                }
            }
        }
        debug!("Labor market: {} hired, {} fired", report.hired, report.fired);
        report
    }

    fn unemployment(&self, population: &Population) -> f64 {
        let (mut force, mut idle) = (0usize, 0usize);
        for a in population.agents() {
            if a.household.is_some() && self.in_labor_force(a.age) {
                force += 1;
                if a.firm.is_none() {
                    idle += 1;
                }
            }
        }
        if force == 0 {
            0.0
        } else {
            idle as f64 / force as f64
        }
    }
}

// ============================================================================
// Basic housing market
// ============================================================================

#[derive(Debug, Clone)]
pub struct BasicHousingMarket {
    config: HousingConfig,
    transaction_tax: f64,
}

impl BasicHousingMarket {
    pub fn new(config: HousingConfig, transaction_tax: f64) -> Self {
        Self {
            config,
            transaction_tax,
        }
    }

    pub fn rent_for(&self, price: f64) -> f64 {
        price * self.config.rent_to_price
    }

    /// Ages listings and lowers unsold prices down to the discount floor.
    fn age_listings(&self, population: &mut Population, units: &BTreeMap<UnitId, AdministrativeUnit>) {
        for d in population.dwellings_mut() {
            if let Some(months) = d.on_market {
                d.on_market = Some(months + 1);
                let index = units.get(&d.unit).map_or(1.0, |u| u.index);
                let floor = valuation(d.size, d.quality, index) * self.config.max_offer_discount;
                d.price = (d.price * (1.0 + self.config.on_market_decay)).max(floor);
            }
        }
    }
}

impl HousingMarket for BasicHousingMarket {
    fn find_rental(
        &mut self,
        population: &Population,
        unit: &UnitId,
        budget: f64,
        _rng: &mut SimRng,
    ) -> Option<(DwellingId, f64)> {
        let mut candidates: Vec<(DwellingId, u8, f64)> = population
            .dwellings()
            .filter(|d| &d.unit == unit && d.is_vacant() && d.on_market.is_none())
            .map(|d| (d.id, d.quality, self.rent_for(d.price)))
            .collect();
        candidates.sort_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
        let affordable = candidates
            .iter()
            .filter(|(_, _, rent)| *rent <= budget)
            .max_by(|a, b| a.1.cmp(&b.1).then(b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal)));
        affordable
            .or_else(|| candidates.first())
            .map(|(id, _, rent)| (*id, *rent))
    }

    fn clear_sales(
        &mut self,
        population: &mut Population,
        units: &mut BTreeMap<UnitId, AdministrativeUnit>,
        rng: &mut SimRng,
    ) -> SalesReport {
        self.age_listings(population, units);

        let mut buyers: Vec<(HouseholdId, f64)> = population
            .household_ids()
            .into_iter()
            .filter(|_| rng.gen_bool(self.config.purchase_probability))
            .filter_map(|h| population.household(h).map(|hh| (h, hh.cash.max(0.0) + hh.savings)))
            .collect();
        buyers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

        let mut report = SalesReport::default();
        for (buyer, funds) in buyers {
            let Some(unit) = population.household_unit(buyer).cloned() else {
                continue;
            };
            let offer = population
                .dwellings()
                .filter(|d| {
                    d.unit == unit
                        && d.is_vacant()
                        && d.on_market.is_some()
                        && matches!(d.owner, Owner::Firm(_))
                        && d.price <= funds
                })
                .min_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal).then(a.id.cmp(&b.id)))
                .map(|d| (d.id, d.price));
            let Some((dwelling, price)) = offer else {
                continue;
            };
            if let Some(h) = population.household_mut(buyer) {
                let from_cash = price.min(h.cash.max(0.0));
                h.cash -= from_cash;
                h.savings -= price - from_cash;
            }
            if settle_sale(population, units, dwelling, buyer, price, self.transaction_tax).is_ok() {
                report.sold += 1;
                report.volume += price;
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentTraits, Gender, GroupId};
    use crate::geometry::{MultiPolygon, Point};
    use rand::SeedableRng;

    fn unit_map(id: &str) -> BTreeMap<UnitId, AdministrativeUnit> {
        let u = AdministrativeUnit::new(UnitId::new(id), GroupId::new("g"), id.into(), MultiPolygon::default(), None, 1.0);
        [(u.id.clone(), u)].into_iter().collect()
    }

    fn person(age: u32, qualification: u8) -> AgentTraits {
        AgentTraits {
            gender: Gender::Male,
            age,
            qualification,
            money: 0.0,
            birth_month: 1,
        }
    }

    #[test]
    fn test_rental_prefers_best_affordable_quality() {
        let mut pop = Population::new();
        let owner = pop.create_household();
        let a = UnitId::new("a");
        let cheap = pop.add_dwelling(Point::default(), 50, 1, 100.0, a.clone(), Owner::Household(owner)).unwrap();
        let good = pop.add_dwelling(Point::default(), 50, 3, 300.0, a.clone(), Owner::Household(owner)).unwrap();
        let lux = pop.add_dwelling(Point::default(), 50, 4, 10_000.0, a.clone(), Owner::Household(owner)).unwrap();
        let mut market = BasicHousingMarket::new(HousingConfig::default(), 0.005);
        let mut rng = SimRng::seed_from_u64(1);

        let budget = market.rent_for(300.0);
        assert_eq!(market.find_rental(&pop, &a, budget, &mut rng).map(|r| r.0), Some(good));
        assert_eq!(market.find_rental(&pop, &a, 0.0, &mut rng).map(|r| r.0), Some(cheap));
        assert!(market.find_rental(&pop, &UnitId::new("b"), 1e9, &mut rng).is_none());
        let _ = lux;
    }

    #[test]
    fn test_household_moves_into_own_vacant_dwelling_first() {
        let mut pop = Population::new();
        let h = pop.create_household();
        let a = UnitId::new("a");
        let mine = pop.add_dwelling(Point::default(), 50, 1, 100.0, a.clone(), Owner::Household(h)).unwrap();
        let mut market = BasicHousingMarket::new(HousingConfig::default(), 0.005);
        let mut rng = SimRng::seed_from_u64(1);
        assert!(house_household(&mut pop, &mut market, h, &a, &mut rng));
        assert_eq!(pop.household(h).unwrap().residence, Some(mine));
        assert_eq!(pop.household(h).unwrap().rent, None);
    }

    #[test]
    fn test_sale_pays_seller_net_of_tax() {
        let mut pop = Population::new();
        let mut units = unit_map("a");
        let a = UnitId::new("a");
        let builder = pop.spawn_firm(Point::default(), a.clone(), 0.0, true);
        let listed = pop.add_dwelling(Point::default(), 50, 2, 1000.0, a.clone(), Owner::Firm(builder)).unwrap();
        let buyer = pop.create_household();
        let member = pop.spawn_agent(person(30, 9));
        pop.add_member(buyer, member).unwrap();

        let tax = settle_sale(&mut pop, &mut units, listed, buyer, 1000.0, 0.005).unwrap();
        assert_eq!(tax, 5.0);
        assert_eq!(units[&a].treasure.transaction, 5.0);
        assert_eq!(pop.firm(builder).unwrap().cash, 995.0);
        assert_eq!(pop.household(buyer).unwrap().residence, Some(listed));
        assert!(pop.check_invariants().is_empty());
    }

    #[test]
    fn test_bootstrap_hires_best_local_candidate() {
        let mut pop = Population::new();
        let a = UnitId::new("a");
        let h = pop.create_household();
        let low = pop.spawn_agent(person(30, 4));
        let high = pop.spawn_agent(person(30, 15));
        let child = pop.spawn_agent(person(10, 1));
        for agent in [low, high, child] {
            pop.add_member(h, agent).unwrap();
        }
        let home = pop.add_dwelling(Point::default(), 50, 2, 100.0, a.clone(), Owner::Household(h)).unwrap();
        pop.move_in(h, home, None).unwrap();
        let firm = pop.spawn_firm(Point::default(), a, 100.0, false);

        let mut market = BasicLaborMarket::new(LaborConfig::default());
        let mut rng = SimRng::seed_from_u64(2);
        assert_eq!(market.unemployment(&pop), 1.0);
        let report = market.match_jobs(&mut pop, true, &mut rng);
        assert_eq!(report.hired, 1);
        assert_eq!(pop.agent(high).unwrap().firm, Some(firm));
        assert_eq!(market.unemployment(&pop), 0.5);
    }
}
