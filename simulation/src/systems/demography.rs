//! Demographic transitions
//!
//! Runs once a month per parent group: the agents whose birth month is the
//! current month age, face mortality, and surviving women face fertility.
//! Rates are resolved once per group and year and cached.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::components::{AgentId, Gender, GroupId, UnitId};
use crate::data::{AgeRates, EducationCdf, InputData, Lookup};
use crate::error::PopulationError;
use crate::population::Population;
use crate::region::AdministrativeUnit;
use crate::rng::SimRng;
use crate::systems::{aging_system, birth_system, death_system};

/// Rates of one group for one year.
#[derive(Debug, Clone, Default)]
pub struct GroupRates {
    pub mortality_male: Option<AgeRates>,
    pub mortality_female: Option<AgeRates>,
    pub fertility: Option<AgeRates>,
    pub education: Option<EducationCdf>,
}

impl GroupRates {
    pub fn resolve(data: &InputData, group: &GroupId, year: i32) -> Self {
        let resolve = |what: &str, lookup: Lookup<&AgeRates>| match lookup {
            Lookup::Found(r) => Some(r.clone()),
            Lookup::FallbackUsed(r, why) => {
                info!("{} rates of group {} for {}: using {}", what, group, year, why);
                Some(r.clone())
            }
            Lookup::Missing => {
                warn!("No {} rates for group {}", what.to_lowercase(), group);
                None
            }
        };
        let education = match data.education.distribution(group, year) {
            Lookup::Found(cdf) | Lookup::FallbackUsed(cdf, _) => Some(cdf),
            Lookup::Missing => None,
        };
        Self {
            mortality_male: resolve("Male mortality", data.mortality.rates(group, Gender::Male, year)),
            mortality_female: resolve("Female mortality", data.mortality.rates(group, Gender::Female, year)),
            fertility: resolve("Fertility", data.fertility.rates(group, year)),
            education,
        }
    }

    pub fn mortality(&self, gender: Gender) -> Option<&AgeRates> {
        match gender {
            Gender::Male => self.mortality_male.as_ref(),
            Gender::Female => self.mortality_female.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RateCache {
    entries: BTreeMap<(GroupId, i32), GroupRates>,
}

impl RateCache {
    pub fn get(&mut self, data: &InputData, group: &GroupId, year: i32) -> &GroupRates {
        self.entries
            .entry((group.clone(), year))
            .or_insert_with(|| GroupRates::resolve(data, group, year))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemographyReport {
    pub aged: usize,
    pub deaths: usize,
    pub births: usize,
    pub dissolved: usize,
    pub demolished: usize,
}

/// Birthday cohorts of the month, grouped by the parent group of each
/// agent's unit.
fn cohorts(
    population: &Population,
    units: &BTreeMap<UnitId, AdministrativeUnit>,
    month: u8,
) -> BTreeMap<GroupId, Vec<AgentId>> {
    let mut cohorts: BTreeMap<GroupId, Vec<AgentId>> = BTreeMap::new();
    for id in population.agents_born_in(month) {
        let group = population
            .agent_unit(id)
            .and_then(|u| units.get(u))
            .map(|u| u.group.clone());
        if let Some(group) = group {
            cohorts.entry(group).or_default().push(id);
        }
    }
    cohorts
}

pub fn demography_system(
    population: &mut Population,
    units: &BTreeMap<UnitId, AdministrativeUnit>,
    data: &InputData,
    cache: &mut RateCache,
    date: NaiveDate,
    rng: &mut SimRng,
) -> Result<DemographyReport, PopulationError> {
    let month = date.month() as u8;
    let year = date.year();
    let mut report = DemographyReport::default();

    for (group, cohort) in cohorts(population, units, month) {
        let rates = cache.get(data, &group, year);
        report.aged += aging_system(population, &cohort)?;
        let deaths = death_system(population, &cohort, rates, rng)?;
        report.deaths += deaths.deaths;
        report.dissolved += deaths.dissolved;
        report.demolished += deaths.demolished;
        let survivors: Vec<AgentId> = cohort
            .into_iter()
            .filter(|id| population.agent(*id).is_some())
            .collect();
        report.births += birth_system(population, &survivors, rates, month, rng)?;
    }
    Ok(report)
}
