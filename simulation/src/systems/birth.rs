//! Birth System
//!
//! Fertility draws for the surviving women of a birthday cohort. Newborns
//! join their mother's household.

use rand::Rng;

use crate::components::{AgentId, AgentTraits, Gender};
use crate::data::tables::draw_qualification;
use crate::error::PopulationError;
use crate::population::Population;
use crate::rng::SimRng;
use crate::systems::demography::GroupRates;

/// Returns the number of births.
pub fn birth_system(
    population: &mut Population,
    cohort: &[AgentId],
    rates: &GroupRates,
    month: u8,
    rng: &mut SimRng,
) -> Result<usize, PopulationError> {
    let Some(fertility) = rates.fertility.as_ref() else {
        return Ok(0);
    };
    let mut mothers = Vec::new();
    for id in cohort {
        let Some(agent) = population.agent(*id) else {
            continue;
        };
        if agent.gender != Gender::Female {
            continue;
        }
        let Some(household) = agent.household else {
            continue;
        };
        let rate = fertility.rate(agent.age);
        if rate > 0.0 && rng.gen::<f64>() < rate {
            mothers.push(household);
        }
    }

    for household in &mothers {
        let gender = if rng.gen::<bool>() { Gender::Male } else { Gender::Female };
        let child = population.spawn_agent(AgentTraits {
            gender,
            age: 0,
            qualification: draw_qualification(rates.education.as_ref(), rng),
            money: 0.0,
            birth_month: month,
        });
        population.add_member(*household, child)?;
    }
    Ok(mothers.len())
}
