//! Matchmaking System
//!
//! Forms unions between agents of different households. Candidates are
//! drawn by the union check probability and their age and gender rate, then
//! shuffled and paired in order.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::components::{AgentId, HouseholdId};
use crate::data::UnionRates;
use crate::error::PopulationError;
use crate::markets::{house_household, HousingMarket};
use crate::population::Population;
use crate::rng::SimRng;

/// Age from which a member counts as an adult able to leave home.
const LEAVING_AGE: u32 = 21;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnionReport {
    pub unions: usize,
    pub new_households: usize,
    pub moved: usize,
    pub merged: usize,
    /// Couples that could not find a rental and stayed apart.
    pub failed: usize,
}

pub fn matchmaking_system(
    population: &mut Population,
    rates: Option<&UnionRates>,
    check_probability: f64,
    housing: &mut dyn HousingMarket,
    rng: &mut SimRng,
) -> Result<UnionReport, PopulationError> {
    let mut report = UnionReport::default();
    let Some(rates) = rates else {
        return Ok(report);
    };

    let mut candidates: Vec<AgentId> = Vec::new();
    for agent in population.agents().collect::<Vec<_>>() {
        if rng.gen::<f64>() < check_probability && rng.gen::<f64>() < rates.rate(agent.gender, agent.age) {
            candidates.push(agent.id);
        }
    }
    candidates.shuffle(rng);

    for pair in candidates.chunks_exact(2) {
        let (a, b) = (pair[0], pair[1]);
        let (Some(ha), Some(hb)) = (household_of(population, a), household_of(population, b)) else {
            continue;
        };
        if ha == hb {
            continue;
        }
        let a_can_leave = population.members_aged(ha, LEAVING_AGE) >= 2;
        let b_can_leave = population.members_aged(hb, LEAVING_AGE) >= 2;

        if a_can_leave && b_can_leave {
            let Some(unit) = population.household_unit(ha).cloned() else {
                continue;
            };
            let couple = population.create_household();
            population.move_agent(a, couple)?;
            population.move_agent(b, couple)?;
            if house_household(population, housing, couple, &unit, rng) {
                report.new_households += 1;
            } else {
                population.move_agent(a, ha)?;
                population.move_agent(b, hb)?;
                population.dissolve_household(couple, rng)?;
                report.failed += 1;
                continue;
            }
        } else if b_can_leave {
            population.move_agent(b, ha)?;
            report.moved += 1;
        } else if a_can_leave {
            population.move_agent(a, hb)?;
            report.moved += 1;
        } else {
            population.merge_households(ha, hb)?;
            report.merged += 1;
        }
        report.unions += 1;
    }
    if report.unions > 0 {
        debug!(
            "{} unions: {} new households, {} moves, {} merges",
            report.unions, report.new_households, report.moved, report.merged
        );
    }
    Ok(report)
}

fn household_of(population: &Population, agent: AgentId) -> Option<HouseholdId> {
    population.agent(agent)?.household
}
