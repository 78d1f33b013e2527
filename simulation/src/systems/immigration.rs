//! Immigration System
//!
//! Closes a twelfth of the gap between each unit's scaled population
//! estimate and its simulated population every month. Immigrants are clones
//! of existing agents, grouped into households that must find a rental in
//! the unit or are turned away.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::components::{AgentId, UnitId};
use crate::data::InputData;
use crate::error::PopulationError;
use crate::generator::{allocate_to_households, create_random_agents, discard_household, household_size};
use crate::markets::{house_household, HousingMarket};
use crate::population::Population;
use crate::region::AdministrativeUnit;
use crate::rng::SimRng;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImmigrationReport {
    pub arrived: usize,
    pub households: usize,
    pub turned_away: usize,
}

/// Immigrants this month for a scaled `target` and `current` population.
pub fn monthly_migrants(target: f64, current: f64) -> usize {
    ((target - current).max(0.0) / 12.0).ceil() as usize
}

pub struct ImmigrationSettings {
    pub sampling_percentage: f64,
    pub members_per_household: f64,
}

pub fn immigration_system(
    population: &mut Population,
    units: &BTreeMap<UnitId, AdministrativeUnit>,
    data: &InputData,
    housing: &mut dyn HousingMarket,
    settings: &ImmigrationSettings,
    year: i32,
    rng: &mut SimRng,
) -> Result<ImmigrationReport, PopulationError> {
    let current = population.unit_populations();
    let mut report = ImmigrationReport::default();

    for (id, unit) in units {
        let Some(estimate) = data.estimates.estimate(id, year).value() else {
            continue;
        };
        let target = estimate * settings.sampling_percentage;
        let here = current.get(id).copied().unwrap_or(0) as f64;
        let n = monthly_migrants(target, here);
        if n == 0 {
            continue;
        }
        let newcomers = create_random_agents(population, n, rng);
        if newcomers.is_empty() {
            continue;
        }

        let size = household_size(data, &unit.group, year, settings.members_per_household);
        let n_households = ((newcomers.len() as f64 / size).ceil() as usize).max(1);
        let ages: Vec<u32> = newcomers.iter().map(|a| a.age).collect();
        for members in allocate_to_households(&ages, n_households, rng) {
            if members.is_empty() {
                continue;
            }
            let h = population.create_household();
            for m in &members {
                let agent: AgentId = population.spawn_agent(newcomers[*m]);
                population.add_member(h, agent)?;
            }
            population.pool_member_money(h)?;
            if house_household(population, housing, h, id, rng) {
                report.arrived += members.len();
                report.households += 1;
            } else {
                discard_household(population, h, rng)?;
                report.turned_away += 1;
            }
        }
        debug!("Unit {}: {} immigrants planned", id, n);
    }
    if report.arrived > 0 || report.turned_away > 0 {
        info!(
            "Immigration: {} agents in {} households, {} households found no home",
            report.arrived, report.households, report.turned_away
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentRecord, AgentTraits, Gender, GroupId};
    use crate::config::HousingConfig;
    use crate::data::{KeyedSeries, PopulationEstimates};
    use crate::entities::Owner;
    use crate::geometry::{MultiPolygon, Point};
    use crate::markets::BasicHousingMarket;
    use crate::rng;

    const SETTINGS: ImmigrationSettings = ImmigrationSettings {
        sampling_percentage: 0.1,
        members_per_household: 2.0,
    };

    /// One unit holding a single household of 24 adults that owns its home
    /// plus `vacant` empty dwellings.
    fn town(vacant: usize) -> (Population, BTreeMap<UnitId, AdministrativeUnit>) {
        let id = UnitId::new("a");
        let mut pop = Population::new();
        let h = pop.create_household();
        for i in 0..24 {
            let agent = pop.spawn_agent(AgentTraits {
                gender: if i % 2 == 0 { Gender::Male } else { Gender::Female },
                age: 30,
                qualification: 12,
                money: 10.0,
                birth_month: 6,
            });
            pop.add_member(h, agent).unwrap();
        }
        let home = pop
            .add_dwelling(Point::default(), 90, 3, 2000.0, id.clone(), Owner::Household(h))
            .unwrap();
        pop.move_in(h, home, None).unwrap();
        for _ in 0..vacant {
            pop.add_dwelling(Point::default(), 40, 2, 800.0, id.clone(), Owner::Household(h))
                .unwrap();
        }
        let unit = AdministrativeUnit::new(id.clone(), GroupId::new("g"), "A".into(), MultiPolygon::default(), None, 1.0);
        (pop, [(id, unit)].into_iter().collect())
    }

    fn estimate(value: f64) -> InputData {
        InputData {
            estimates: PopulationEstimates::new(KeyedSeries(
                [(UnitId::new("a"), [(2014, value)].into_iter().collect())].into_iter().collect(),
            )),
            ..InputData::default()
        }
    }

    fn run(pop: &mut Population, units: &BTreeMap<UnitId, AdministrativeUnit>, data: &InputData) -> ImmigrationReport {
        let mut housing = BasicHousingMarket::new(HousingConfig::default(), 0.005);
        let (mut rng, _) = rng::master(Some(3));
        immigration_system(pop, units, data, &mut housing, &SETTINGS, 2014, &mut rng).unwrap()
    }

    #[test]
    fn test_immigrants_settle_in_vacant_homes() {
        let (mut pop, units) = town(2);
        let natives = pop.agent_ids();

        // Target 600 * 0.1 = 60 against 24 residents: ceil(36 / 12) = 3
        // immigrants in ceil(3 / 2) = 2 households.
        let report = run(&mut pop, &units, &estimate(600.0));
        assert_eq!(
            report,
            ImmigrationReport {
                arrived: 3,
                households: 2,
                turned_away: 0
            }
        );
        assert_eq!(pop.agent_count(), 27);
        assert_eq!(pop.household_count(), 3);
        assert_eq!(pop.unit_populations()[&UnitId::new("a")], 27);

        let newcomers: Vec<AgentRecord> = pop.agents().filter(|a| !natives.contains(&a.id)).collect();
        assert_eq!(newcomers.len(), 3);
        for agent in &newcomers {
            assert!(agent.id > *natives.last().unwrap());
            assert_eq!(agent.age, 30);
            assert_eq!(pop.agent_unit(agent.id), Some(&UnitId::new("a")));
        }
        assert!(pop.check_invariants().is_empty());
    }

    #[test]
    fn test_immigrants_without_a_home_are_turned_away() {
        let (mut pop, units) = town(0);
        let report = run(&mut pop, &units, &estimate(600.0));
        assert_eq!(report.arrived, 0);
        assert_eq!(report.turned_away, 2);
        assert_eq!(pop.agent_count(), 24);
        assert_eq!(pop.household_count(), 1);
        assert!(pop.check_invariants().is_empty());
    }

    #[test]
    fn test_no_immigration_once_the_target_is_met() {
        let (mut pop, units) = town(2);
        let report = run(&mut pop, &units, &estimate(200.0));
        assert_eq!(report, ImmigrationReport::default());
        assert_eq!(pop.agent_count(), 24);
        assert_eq!(pop.household_count(), 1);
    }

    #[test]
    fn test_monthly_migrants() {
        assert_eq!(monthly_migrants(1000.0, 940.0), 5);
        assert_eq!(monthly_migrants(1000.0, 1000.0), 0);
        assert_eq!(monthly_migrants(1000.0, 1200.0), 0);
        assert_eq!(monthly_migrants(1000.0, 999.0), 1);
    }
}
