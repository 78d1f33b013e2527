//! Population generator
//!
//! Turns aggregate census tables into agents, households, dwellings and
//! firms placed inside their administrative units. Units are synthesised in
//! parallel, each with a child seed drawn from the master generator in unit
//! order, and merged back in unit order so ids and draws are reproducible.

use chrono::Datelike;
use rand::seq::index::sample;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Beta, Distribution};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::components::*;
use crate::config::SimulationConfig;
use crate::data::{EducationCdf, GenderCounts, InputData, Lookup};
use crate::data::tables::{draw_qualification, urban_probability};
use crate::entities::{valuation, Owner, DWELLING_QUALITY, DWELLING_SIZE};
use crate::error::{GenerationError, PopulationError};
use crate::geography::Geography;
use crate::geometry::Point;
use crate::markets::{house_household, HousingMarket};
use crate::population::Population;
use crate::region::AdministrativeUnit;
use crate::rng::{self, SimRng};
use crate::shapes::ShapeProvider;

/// Urban share used when a unit has no urbanisation data.
const DEFAULT_URBAN_PROBABILITY: f64 = 0.5;

/// Initial agent cash is drawn uniformly from this range.
const AGENT_MONEY: std::ops::Range<u32> = 1..34;

/// Shape parameters and scale of initial firm cash.
const FIRM_CASH_ALPHA: f64 = 1.5;
const FIRM_CASH_BETA: f64 = 10.0;
const FIRM_CASH_SCALE: f64 = 10_000.0;

/// Distribution of initial firm cash, before scaling.
pub fn firm_cash_distribution() -> Result<Beta<f64>, GenerationError> {
    Beta::new(FIRM_CASH_ALPHA, FIRM_CASH_BETA).map_err(|e| GenerationError::Distribution(e.to_string()))
}

/// Draws the starting cash of a new firm.
pub fn draw_firm_cash<R: Rng + ?Sized>(distribution: &Beta<f64>, rng: &mut R) -> f64 {
    distribution.sample(rng) * FIRM_CASH_SCALE
}

/// One administrative unit per shaped unit of the geography, with its
/// quality index seeded from the development index of `year` (1 when absent).
pub fn create_regions(data: &InputData, geography: &Geography, year: i32) -> BTreeMap<UnitId, AdministrativeUnit> {
    let mut regions = BTreeMap::new();
    let mut neutral = 0usize;
    for info in geography.units() {
        let Some(shape) = data.shapes.get(&info.id) else {
            continue;
        };
        let index = match data.hdi.exact(&info.id, year) {
            Lookup::Found(v) | Lookup::FallbackUsed(v, _) => v,
            Lookup::Missing => {
                neutral += 1;
                1.0
            }
        };
        let unit = AdministrativeUnit::new(
            info.id.clone(),
            info.group.clone(),
            info.name.clone(),
            shape.polygon(),
            shape.urban(),
            index,
        );
        regions.insert(info.id.clone(), unit);
    }
    if neutral > 0 {
        warn!("{} unit(s) without a development index for {}, using 1.0", neutral, year);
    }
    regions
}

/// Number of agents synthesised for a real head count: nearest integer of
/// the scaled count, except that a fractional count of at most one yields
/// a single agent.
pub fn scaled_count(count: f64, sampling: f64) -> usize {
    let n = count * sampling;
    let rounded = n.round();
    if rounded == 0.0 && n.ceil() == 1.0 {
        1
    } else {
        rounded.max(0.0) as usize
    }
}

/// Households needed for `agents` people at `size` people per household.
pub fn household_count(agents: usize, size: f64) -> usize {
    if agents == 0 {
        return 0;
    }
    ((agents as f64 / size).round() as usize).max(1)
}

/// Average household size of a group, from the prediction table when it
/// covers the year, else `default`.
pub fn household_size(data: &InputData, group: &GroupId, year: i32, default: f64) -> f64 {
    match data.household_size.exact(group, year) {
        Lookup::Found(size) if size > 0.0 => size,
        _ => default,
    }
}

/// Splits agents into `households` groups: adults (older than 21) in
/// shuffled order round-robin, children to uniformly random households.
/// Returns member indices per household; a household may stay empty when
/// adults are fewer than households.
pub fn allocate_to_households<R: Rng + ?Sized>(ages: &[u32], households: usize, rng: &mut R) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); households];
    if households == 0 {
        return groups;
    }
    let mut order: Vec<usize> = (0..ages.len()).collect();
    order.shuffle(rng);
    let (adults, children): (Vec<usize>, Vec<usize>) =
        order.into_iter().partition(|i| Age { years: ages[*i] }.is_adult());
    for (i, agent) in adults.into_iter().enumerate() {
        groups[i % households].push(agent);
    }
    for agent in children {
        groups[rng.gen_range(0..households)].push(agent);
    }
    groups
}

/// Dwelling owner and resident by household index. The first
/// `(1 - rental_share) * dwellings` dwellings (in shuffled order) are owned
/// and occupied by the first households; the rest go to random households.
pub fn assign_ownership<R: Rng + ?Sized>(
    households: usize,
    dwellings: usize,
    rental_share: f64,
    rng: &mut R,
) -> Vec<(Option<usize>, Option<usize>)> {
    let mut slots = vec![(None, None); dwellings];
    if households == 0 {
        return slots;
    }
    let mut order: Vec<usize> = (0..dwellings).collect();
    order.shuffle(rng);
    let owners = (((1.0 - rental_share) * dwellings as f64) as usize).min(households);
    for (k, d) in order.iter().enumerate() {
        slots[*d] = if k < owners {
            (Some(k), Some(k))
        } else {
            (Some(rng.gen_range(0..households)), None)
        };
    }
    slots
}

/// Clones `n` existing agents (gender, age, qualification, birth month) with
/// fresh cash. Sampled without replacement while the population allows it.
pub fn create_random_agents(population: &Population, n: usize, rng: &mut SimRng) -> Vec<AgentTraits> {
    let ids = population.agent_ids();
    if ids.is_empty() || n == 0 {
        return Vec::new();
    }
    let picks: Vec<usize> = if n <= ids.len() {
        sample(rng, ids.len(), n).into_vec()
    } else {
        (0..n).map(|_| rng.gen_range(0..ids.len())).collect()
    };
    picks
        .into_iter()
        .filter_map(|i| population.agent(ids[i]))
        .map(|a| AgentTraits {
            money: f64::from(rng.gen_range(AGENT_MONEY)),
            ..a.traits()
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationSummary {
    pub agents: usize,
    pub households: usize,
    pub dwellings: usize,
    pub firms: usize,
    pub renting: usize,
    /// Households left without a home; the rental market houses them later.
    pub unhoused: usize,
}

/// Inputs of one unit, resolved before the parallel phase.
struct UnitPlan<'a> {
    unit: &'a AdministrativeUnit,
    counts: Option<&'a GenderCounts>,
    education: Option<&'a EducationCdf>,
    household_size: f64,
    urban_probability: f64,
    firms: usize,
    seed: u64,
}

struct DwellingDraft {
    location: Point,
    size: u32,
    quality: u8,
    price: f64,
    owner: Option<usize>,
    resident: Option<usize>,
}

struct FirmDraft {
    location: Point,
    cash: f64,
    construction: bool,
}

struct UnitDraft {
    unit: UnitId,
    agents: Vec<AgentTraits>,
    households: Vec<Vec<usize>>,
    dwellings: Vec<DwellingDraft>,
    firms: Vec<FirmDraft>,
}

pub struct Generator<'a> {
    config: &'a SimulationConfig,
    data: &'a InputData,
    shapes: &'a ShapeProvider,
    firm_cash: Beta<f64>,
}

impl<'a> Generator<'a> {
    pub fn new(config: &'a SimulationConfig, data: &'a InputData, shapes: &'a ShapeProvider) -> Result<Self, GenerationError> {
        let firm_cash = firm_cash_distribution()?;
        Ok(Self {
            config,
            data,
            shapes,
            firm_cash,
        })
    }

    fn year(&self) -> i32 {
        self.config.start_date.year()
    }

    pub fn household_size(&self, group: &GroupId) -> f64 {
        household_size(self.data, group, self.year(), self.config.members_per_household)
    }

    /// Synthesises every unit and merges the result into `population`.
    pub fn create_all(
        &self,
        units: &BTreeMap<UnitId, AdministrativeUnit>,
        population: &mut Population,
        housing: &mut dyn HousingMarket,
        rng: &mut SimRng,
    ) -> Result<GenerationSummary, GenerationError> {
        let groups: BTreeSet<&GroupId> = units.values().map(|u| &u.group).collect();
        let education: BTreeMap<GroupId, Option<EducationCdf>> = groups
            .iter()
            .map(|g| ((*g).clone(), self.education(g)))
            .collect();
        let sizes: BTreeMap<GroupId, f64> = groups
            .iter()
            .map(|g| ((*g).clone(), self.household_size(g)))
            .collect();

        let plans = self.plan(units, &education, &sizes, rng);
        let drafts: Vec<UnitDraft> = plans
            .into_par_iter()
            .map(|plan| self.synthesize(plan))
            .collect();

        let mut summary = GenerationSummary::default();
        for draft in drafts {
            self.merge(draft, population, housing, rng, &mut summary)?;
        }
        info!(
            "Generated {} agents, {} households, {} dwellings, {} firms ({} renting, {} still looking for a home)",
            summary.agents,
            summary.households,
            summary.dwellings,
            summary.firms,
            summary.renting,
            summary.unhoused
        );
        Ok(summary)
    }

    fn education(&self, group: &GroupId) -> Option<EducationCdf> {
        match self.data.education.distribution(group, self.year()) {
            Lookup::Found(cdf) => Some(cdf),
            Lookup::FallbackUsed(cdf, why) => {
                info!("Education for group {}: using {}", group, why);
                Some(cdf)
            }
            Lookup::Missing => {
                warn!("No education data for group {}, qualification defaults apply", group);
                None
            }
        }
    }

    fn plan<'p>(
        &'p self,
        units: &'p BTreeMap<UnitId, AdministrativeUnit>,
        education: &'p BTreeMap<GroupId, Option<EducationCdf>>,
        sizes: &BTreeMap<GroupId, f64>,
        rng: &mut SimRng,
    ) -> Vec<UnitPlan<'p>> {
        let year = self.year();
        let seeds = rng::child_seeds(rng, units.len());
        units
            .values()
            .zip(seeds)
            .map(|(unit, seed)| {
                let counts = match self.data.population.for_unit(&unit.id, year) {
                    Lookup::Found(c) => Some(c),
                    Lookup::FallbackUsed(c, why) => {
                        info!("Population of unit {}: using {}", unit.id, why);
                        Some(c)
                    }
                    Lookup::Missing => {
                        warn!("No population counts for unit {}", unit.id);
                        None
                    }
                };
                let urban = urban_probability(&self.data.urban, &unit.id, year)
                    .or_logged(format_args!("Urban share of unit {}", unit.id), DEFAULT_URBAN_PROBABILITY);
                let firms = match self.data.firms.employees_t0(&unit.id) {
                    Lookup::Found(n) | Lookup::FallbackUsed(n, _) => {
                        (n * self.config.sampling_percentage).max(0.0) as usize
                    }
                    Lookup::Missing => 0,
                };
                UnitPlan {
                    unit,
                    counts,
                    education: education.get(&unit.group).and_then(Option::as_ref),
                    household_size: sizes
                        .get(&unit.group)
                        .copied()
                        .unwrap_or(self.config.members_per_household),
                    urban_probability: urban,
                    firms,
                    seed,
                }
            })
            .collect()
    }

    fn synthesize(&self, plan: UnitPlan<'_>) -> UnitDraft {
        let mut rng = rng::child(plan.seed);
        let unit = plan.unit;

        let agents = match plan.counts {
            Some(counts) => self.create_agents(counts, plan.education, &mut rng),
            None => Vec::new(),
        };

        let n_households = household_count(agents.len(), plan.household_size);
        let ages: Vec<u32> = agents.iter().map(|a| a.age).collect();
        let households: Vec<Vec<usize>> = allocate_to_households(&ages, n_households, &mut rng)
            .into_iter()
            .filter(|members| !members.is_empty())
            .collect();

        let n_dwellings = (households.len() as f64 * (1.0 + self.config.household_vacancy)) as usize;
        let mut dwellings: Vec<DwellingDraft> = (0..n_dwellings)
            .map(|_| {
                let location = self.address(unit, Some(plan.urban_probability), &mut rng);
                let size = rng.gen_range(DWELLING_SIZE);
                let quality = rng.gen_range(DWELLING_QUALITY);
                DwellingDraft {
                    location,
                    size,
                    quality,
                    price: valuation(size, quality, unit.index),
                    owner: None,
                    resident: None,
                }
            })
            .collect();

        let construction = (plan.firms as f64 * self.config.construction_firm_share).ceil() as usize;
        let firms = (0..plan.firms)
            .map(|i| FirmDraft {
                location: self.address(unit, None, &mut rng),
                cash: draw_firm_cash(&self.firm_cash, &mut rng),
                construction: i < construction,
            })
            .collect();

        let slots = assign_ownership(households.len(), dwellings.len(), self.config.rental_share, &mut rng);
        for (draft, (owner, resident)) in dwellings.iter_mut().zip(slots) {
            draft.owner = owner;
            draft.resident = resident;
        }

        UnitDraft {
            unit: unit.id.clone(),
            agents,
            households,
            dwellings,
            firms,
        }
    }

    fn create_agents(&self, counts: &GenderCounts, education: Option<&EducationCdf>, rng: &mut SimRng) -> Vec<AgentTraits> {
        let mut agents = Vec::new();
        for (b, bracket) in self.data.population.brackets.iter().enumerate() {
            for gender in [Gender::Male, Gender::Female] {
                let count = counts.for_gender(gender).get(b).copied().unwrap_or(0.0);
                for _ in 0..scaled_count(count, self.config.sampling_percentage) {
                    let qualification = draw_qualification(education, rng);
                    let age = rng.gen_range(bracket.min..=bracket.max.max(bracket.min));
                    let money = f64::from(rng.gen_range(AGENT_MONEY));
                    let birth_month = rng.gen_range(1..=12);
                    agents.push(AgentTraits {
                        gender,
                        age,
                        qualification,
                        money,
                        birth_month,
                    });
                }
            }
        }
        agents
    }

    /// Address in the unit: urban with the given probability, or always in
    /// the urban area when `None`.
    fn address(&self, unit: &AdministrativeUnit, urban_probability: Option<f64>, rng: &mut SimRng) -> Point {
        let point = match urban_probability {
            Some(p) => self.shapes.random_address(&unit.id, p, rng),
            None => self.shapes.get_random_point_in_polygon(&unit.id, true, rng),
        };
        point.unwrap_or_else(|| unit.polygon.centroid())
    }

    fn merge(
        &self,
        draft: UnitDraft,
        population: &mut Population,
        housing: &mut dyn HousingMarket,
        rng: &mut SimRng,
        summary: &mut GenerationSummary,
    ) -> Result<(), GenerationError> {
        let agent_ids: Vec<AgentId> = draft.agents.iter().map(|t| population.spawn_agent(*t)).collect();
        let mut household_ids = Vec::with_capacity(draft.households.len());
        for members in &draft.households {
            let h = population.create_household();
            for m in members {
                population.add_member(h, agent_ids[*m])?;
            }
            household_ids.push(h);
        }

        for (index, d) in draft.dwellings.iter().enumerate() {
            let Some(owner) = d.owner else {
                return Err(GenerationError::OwnerlessDwelling {
                    unit: draft.unit.clone(),
                    index,
                });
            };
            let id = population.add_dwelling(
                d.location,
                d.size,
                d.quality,
                d.price,
                draft.unit.clone(),
                Owner::Household(household_ids[owner]),
            )?;
            if let Some(resident) = d.resident {
                population.move_in(household_ids[resident], id, None)?;
            }
        }

        for f in &draft.firms {
            population.spawn_firm(f.location, draft.unit.clone(), f.cash, f.construction);
        }

        for h in &household_ids {
            let housed = population.household(*h).map_or(false, |hh| hh.residence.is_some());
            if housed {
                continue;
            }
            if house_household(population, housing, *h, &draft.unit, rng) {
                summary.renting += 1;
            } else if let Some(hh) = population.household_mut(*h) {
                hh.seeking = Some(draft.unit.clone());
                summary.unhoused += 1;
            }
        }

        summary.agents += agent_ids.len();
        summary.households += household_ids.len();
        summary.dwellings += draft.dwellings.len();
        summary.firms += draft.firms.len();
        Ok(())
    }
}

/// Removes a household together with its members; its property passes on
/// as on any dissolution.
pub fn discard_household(population: &mut Population, household: HouseholdId, rng: &mut SimRng) -> Result<(), PopulationError> {
    let members: Vec<AgentId> = population
        .household(household)
        .map(|h| h.members.iter().copied().collect())
        .unwrap_or_default();
    for agent in members {
        population.remove_agent(agent)?;
    }
    population.dissolve_household(household, rng)?;
    Ok(())
}
