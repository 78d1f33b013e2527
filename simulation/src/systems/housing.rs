//! Housing Systems - rehousing, rent, property tax and household investment

use std::collections::BTreeMap;
use tracing::debug;

use crate::components::UnitId;
use crate::entities::Owner;
use crate::markets::{house_household, HousingMarket};
use crate::population::Population;
use crate::region::{AdministrativeUnit, TaxCategory};
use crate::rng::SimRng;

/// Offers every household still looking for a home a rental in its unit.
/// Returns how many moved in.
pub fn rehousing_system(population: &mut Population, housing: &mut dyn HousingMarket, rng: &mut SimRng) -> usize {
    let seekers: Vec<_> = population
        .households()
        .filter(|h| h.residence.is_none())
        .filter_map(|h| h.seeking.clone().map(|unit| (h.id, unit)))
        .collect();
    let mut housed = 0;
    for (h, unit) in &seekers {
        if house_household(population, housing, *h, unit, rng) {
            housed += 1;
        }
    }
    if !seekers.is_empty() {
        debug!("Rehousing: {} of {} households found a home", housed, seekers.len());
    }
    housed
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RentReport {
    pub paid: f64,
    pub covered_by_voucher: usize,
}

/// Tenants pay their landlord. A month covered by a voucher costs the
/// tenant nothing; the landlord was paid when the voucher was issued.
pub fn rent_system(population: &mut Population) -> RentReport {
    let mut report = RentReport::default();
    for id in population.household_ids() {
        let Some(h) = population.household(id) else {
            continue;
        };
        let (Some(rent), Some(home)) = (h.rent, h.residence) else {
            continue;
        };
        if h.rent_voucher > 0 {
            if let Some(h) = population.household_mut(id) {
                h.rent_voucher -= 1;
            }
            report.covered_by_voucher += 1;
            continue;
        }
        let Some(landlord) = population.dwelling(home).map(|d| d.owner) else {
            continue;
        };
        if let Some(h) = population.household_mut(id) {
            h.cash -= rent;
        }
        match landlord {
            Owner::Household(l) => {
                if let Some(l) = population.household_mut(l) {
                    l.cash += rent;
                }
            }
            Owner::Firm(f) => {
                if let Some(f) = population.firm_mut(f) {
                    f.cash += rent;
                }
            }
        }
        report.paid += rent;
    }
    report
}

/// Owners pay a twelfth of the annual property tax on every dwelling.
pub fn property_tax_system(
    population: &mut Population,
    units: &mut BTreeMap<UnitId, AdministrativeUnit>,
    rate: f64,
) -> f64 {
    let bills: Vec<(Owner, UnitId, f64)> = population
        .dwellings()
        .map(|d| (d.owner, d.unit.clone(), d.price * rate / 12.0))
        .collect();
    let mut total = 0.0;
    for (owner, unit, tax) in bills {
        match owner {
            Owner::Household(h) => {
                if let Some(h) = population.household_mut(h) {
                    h.cash -= tax;
                }
            }
            Owner::Firm(f) => {
                if let Some(f) = population.firm_mut(f) {
                    f.cash -= tax;
                }
            }
        }
        if let Some(u) = units.get_mut(&unit) {
            u.collect_tax(TaxCategory::Property, tax);
        }
        total += tax;
    }
    total
}

/// Overdrafts become debt, debt is repaid from cash, and cash beyond one
/// month of income is saved at `interest` per month.
pub fn investment_system(population: &mut Population, interest: f64) {
    for id in population.household_ids() {
        let income = population.household_income(id);
        let Some(h) = population.household_mut(id) else {
            continue;
        };
        h.savings *= 1.0 + interest;
        if h.cash < 0.0 {
            let covered = h.savings.min(-h.cash);
            h.savings -= covered;
            h.cash += covered;
            h.debt -= h.cash.min(0.0);
            h.cash = h.cash.max(0.0);
        }
        if h.debt > 0.0 && h.cash > 0.0 {
            let repaid = h.cash.min(h.debt);
            h.debt -= repaid;
            h.cash -= repaid;
        }
        let surplus = h.cash - income;
        if surplus > 0.0 {
            h.cash -= surplus;
            h.savings += surplus;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentTraits, Gender, GroupId};
    use crate::config::HousingConfig;
    use crate::geometry::{MultiPolygon, Point};
    use crate::markets::BasicHousingMarket;
    use crate::rng;

    #[test]
    fn test_households_without_a_home_rent_once_one_is_free() {
        let mut pop = Population::new();
        let landlord = pop.create_household();
        let family = pop.create_household();
        pop.household_mut(family).unwrap().seeking = Some(UnitId::new("a"));
        let mut housing = BasicHousingMarket::new(HousingConfig::default(), 0.005);
        let (mut rng, _) = rng::master(Some(1));

        assert_eq!(rehousing_system(&mut pop, &mut housing, &mut rng), 0);
        assert_eq!(pop.household(family).unwrap().seeking, Some(UnitId::new("a")));

        let elsewhere = pop
            .add_dwelling(Point::default(), 40, 2, 500.0, UnitId::new("b"), Owner::Household(landlord))
            .unwrap();
        assert_eq!(rehousing_system(&mut pop, &mut housing, &mut rng), 0);

        let flat = pop
            .add_dwelling(Point::default(), 40, 2, 500.0, UnitId::new("a"), Owner::Household(landlord))
            .unwrap();
        assert_eq!(rehousing_system(&mut pop, &mut housing, &mut rng), 1);
        let h = pop.household(family).unwrap();
        assert_eq!(h.residence, Some(flat));
        assert_eq!(h.seeking, None);
        assert!(h.is_renting());
        assert!(pop.dwelling(elsewhere).unwrap().is_vacant());
        assert_eq!(rehousing_system(&mut pop, &mut housing, &mut rng), 0);
    }

    #[test]
    fn test_rent_goes_to_landlord_unless_vouchered() {
        let mut pop = Population::new();
        let landlord = pop.create_household();
        let tenant = pop.create_household();
        let flat = pop
            .add_dwelling(Point::default(), 40, 2, 500.0, UnitId::new("a"), Owner::Household(landlord))
            .unwrap();
        pop.move_in(tenant, flat, Some(7.0)).unwrap();

        let report = rent_system(&mut pop);
        assert_eq!(report.paid, 7.0);
        assert_eq!(pop.household(landlord).unwrap().cash, 7.0);
        assert_eq!(pop.household(tenant).unwrap().cash, -7.0);

        pop.household_mut(tenant).unwrap().rent_voucher = 1;
        let report = rent_system(&mut pop);
        assert_eq!(report.covered_by_voucher, 1);
        assert_eq!(pop.household(tenant).unwrap().rent_voucher, 0);
        assert_eq!(pop.household(landlord).unwrap().cash, 7.0);
    }

    #[test]
    fn test_property_tax_is_monthly_share() {
        let mut pop = Population::new();
        let owner = pop.create_household();
        pop.add_dwelling(Point::default(), 40, 2, 1200.0, UnitId::new("a"), Owner::Household(owner))
            .unwrap();
        let u = AdministrativeUnit::new(UnitId::new("a"), GroupId::new("g"), "a".into(), MultiPolygon::default(), None, 1.0);
        let mut units: BTreeMap<UnitId, AdministrativeUnit> = [(u.id.clone(), u)].into_iter().collect();
        let total = property_tax_system(&mut pop, &mut units, 0.005);
        assert!((total - 0.5).abs() < 1e-12);
        assert!((units[&UnitId::new("a")].treasure.property - 0.5).abs() < 1e-12);
        assert!((pop.household(owner).unwrap().cash + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_investment_turns_overdraft_into_debt_and_saves_surplus() {
        let mut pop = Population::new();
        let poor = pop.create_household();
        pop.household_mut(poor).unwrap().cash = -30.0;
        pop.household_mut(poor).unwrap().savings = 10.0;

        let rich = pop.create_household();
        let earner = pop.spawn_agent(AgentTraits {
            gender: Gender::Male,
            age: 40,
            qualification: 12,
            money: 0.0,
            birth_month: 2,
        });
        pop.add_member(rich, earner).unwrap();
        pop.set_last_wage(earner, Some(20.0)).unwrap();
        pop.household_mut(rich).unwrap().cash = 100.0;

        investment_system(&mut pop, 0.0);
        let p = pop.household(poor).unwrap();
        assert_eq!((p.cash, p.savings, p.debt), (0.0, 0.0, 20.0));
        let r = pop.household(rich).unwrap();
        assert_eq!((r.cash, r.savings), (20.0, 80.0));
    }
}
