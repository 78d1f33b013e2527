//! Aging System - birthdays of the month

use crate::components::AgentId;
use crate::error::PopulationError;
use crate::population::Population;

/// Adds a year to every agent of the cohort. Returns how many aged.
pub fn aging_system(population: &mut Population, cohort: &[AgentId]) -> Result<usize, PopulationError> {
    let mut aged = 0;
    for id in cohort {
        let Some(agent) = population.agent(*id) else {
            continue;
        };
        population.set_age(*id, agent.age + 1)?;
        aged += 1;
    }
    Ok(aged)
}
