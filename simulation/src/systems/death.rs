//! Death System
//!
//! Mortality draws for the birthday cohort of a group. The dead leave their
//! household, their employer and the population; a household left empty is
//! dissolved and its estate passes to an heir.

use rand::Rng;
use tracing::debug;

use crate::components::AgentId;
use crate::error::PopulationError;
use crate::population::Population;
use crate::rng::SimRng;
use crate::systems::demography::GroupRates;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeathReport {
    pub deaths: usize,
    pub dissolved: usize,
    pub demolished: usize,
}

pub fn death_system(
    population: &mut Population,
    cohort: &[AgentId],
    rates: &GroupRates,
    rng: &mut SimRng,
) -> Result<DeathReport, PopulationError> {
    let mut deaths = Vec::new();
    for id in cohort {
        let Some(agent) = population.agent(*id) else {
            continue;
        };
        let rate = rates.mortality(agent.gender).map_or(0.0, |r| r.rate(agent.age));
        if rate > 0.0 && rng.gen::<f64>() < rate {
            deaths.push(*id);
        }
    }

    let mut report = DeathReport::default();
    for id in deaths {
        report.deaths += 1;
        if let Some(household) = population.remove_agent(id)? {
            let outcome = population.dissolve_household(household, rng)?;
            report.dissolved += 1;
            report.demolished += outcome.demolished;
        }
    }
    if report.deaths > 0 {
        debug!("{} deaths, {} households dissolved", report.deaths, report.dissolved);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentTraits, Gender, UnitId};
    use crate::data::AgeRates;
    use crate::entities::Owner;
    use crate::geometry::Point;
    use rand::SeedableRng;

    fn certain_death() -> GroupRates {
        let always = AgeRates([(0, 1.0)].into_iter().collect());
        GroupRates {
            mortality_male: Some(always.clone()),
            mortality_female: Some(always),
            ..GroupRates::default()
        }
    }

    #[test]
    fn test_no_rates_means_no_deaths() {
        let mut pop = Population::new();
        let a = pop.spawn_agent(AgentTraits {
            gender: Gender::Female,
            age: 99,
            qualification: 3,
            money: 0.0,
            birth_month: 1,
        });
        let mut rng = SimRng::seed_from_u64(1);
        let report = death_system(&mut pop, &[a], &GroupRates::default(), &mut rng).unwrap();
        assert_eq!(report.deaths, 0);
        assert_eq!(pop.agent_count(), 1);
    }

    #[test]
    fn test_dead_agents_leave_no_empty_household() {
        let mut pop = Population::new();
        let traits = AgentTraits {
            gender: Gender::Male,
            age: 70,
            qualification: 3,
            money: 0.0,
            birth_month: 1,
        };
        let alone = pop.create_household();
        let old = pop.spawn_agent(traits);
        pop.add_member(alone, old).unwrap();
        let home = pop
            .add_dwelling(Point::default(), 50, 2, 100.0, UnitId::new("a"), Owner::Household(alone))
            .unwrap();
        pop.move_in(alone, home, None).unwrap();

        let family = pop.create_household();
        let young = pop.spawn_agent(AgentTraits { age: 30, ..traits });
        pop.add_member(family, young).unwrap();
        let flat = pop
            .add_dwelling(Point::default(), 50, 2, 100.0, UnitId::new("a"), Owner::Household(family))
            .unwrap();
        pop.move_in(family, flat, None).unwrap();

        let mut rng = SimRng::seed_from_u64(1);
        let report = death_system(&mut pop, &[old], &certain_death(), &mut rng).unwrap();
        assert_eq!(report.deaths, 1);
        assert_eq!(report.dissolved, 1);
        assert!(pop.household(alone).is_none());
        assert_eq!(pop.dwelling(home).unwrap().owner, Owner::Household(family));
        assert!(pop.check_invariants().is_empty());
    }
}
