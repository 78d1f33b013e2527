//! Population arena
//!
//! Agents are hecs entities indexed by `AgentId`; households, dwellings and
//! firms sit in ordered maps keyed by their ids. Every structural change
//! (membership, ownership, occupancy, employment) goes through this type so
//! both sides of each relation stay in step.

use hecs::{Entity, World};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::components::*;
use crate::entities::{Capabilities, Dwelling, Firm, Household, Owner};
use crate::error::{InvariantViolation, PopulationError};
use crate::geometry::Point;

type Result<T> = std::result::Result<T, PopulationError>;

/// Next free id of each arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct IdCounters {
    pub agent: u64,
    pub household: u64,
    pub dwelling: u64,
    pub firm: u64,
}

impl Default for IdCounters {
    fn default() -> Self {
        Self {
            agent: 1,
            household: 1,
            dwelling: 1,
            firm: 1,
        }
    }
}

/// Outcome of removing an emptied household.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dissolution {
    pub heir: Option<Owner>,
    pub inherited: usize,
    pub demolished: usize,
}

pub struct Population {
    world: World,
    agents: BTreeMap<AgentId, Entity>,
    households: BTreeMap<HouseholdId, Household>,
    dwellings: BTreeMap<DwellingId, Dwelling>,
    firms: BTreeMap<FirmId, Firm>,
    next: IdCounters,
}

impl Population {
    pub fn new() -> Self {
        Self {
            world: World::new(),
            agents: BTreeMap::new(),
            households: BTreeMap::new(),
            dwellings: BTreeMap::new(),
            firms: BTreeMap::new(),
            next: IdCounters::default(),
        }
    }

    pub fn id_counters(&self) -> IdCounters {
        self.next
    }

    pub(crate) fn set_id_counters(&mut self, next: IdCounters) {
        self.next = next;
    }

    // ========================================================================
    // Agents
    // ========================================================================

    pub fn spawn_agent(&mut self, traits: AgentTraits) -> AgentId {
        let id = AgentId(self.next.agent);
        self.next.agent += 1;
        self.insert_agent(id, traits, Membership::default(), Employment::default());
        id
    }

    fn insert_agent(&mut self, id: AgentId, t: AgentTraits, membership: Membership, employment: Employment) {
        let entity = self.world.spawn((
            Person { id },
            t.gender,
            Age { years: t.age },
            Qualification { years: t.qualification },
            Wallet { money: t.money },
            BirthMonth(t.birth_month),
            membership,
            employment,
        ));
        self.agents.insert(id, entity);
    }

    /// Re-creates an agent with all of its links; both sides of the links
    /// must be restored by the caller.
    pub(crate) fn restore_agent(&mut self, record: &AgentRecord) {
        self.insert_agent(
            record.id,
            record.traits(),
            Membership {
                household: record.household,
            },
            Employment {
                firm: record.firm,
                last_wage: record.last_wage,
            },
        );
    }

    pub fn agent(&self, id: AgentId) -> Option<AgentRecord> {
        let entity = *self.agents.get(&id)?;
        let mut query = self
            .world
            .query_one::<(&Gender, &Age, &Qualification, &Wallet, &BirthMonth, &Membership, &Employment)>(entity)
            .ok()?;
        let (gender, age, qualification, wallet, month, membership, employment) = query.get()?;
        Some(AgentRecord {
            id,
            gender: *gender,
            age: age.years,
            qualification: qualification.years,
            money: wallet.money,
            birth_month: month.0,
            household: membership.household,
            firm: employment.firm,
            last_wage: employment.last_wage,
        })
    }

    /// All agents in id order.
    pub fn agents(&self) -> impl Iterator<Item = AgentRecord> + '_ {
        self.agents.keys().filter_map(move |id| self.agent(*id))
    }

    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Ids of agents whose birth month is `month`, in id order.
    pub fn agents_born_in(&self, month: u8) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self
            .world
            .query::<(&Person, &BirthMonth)>()
            .iter()
            .filter(|(_, (_, m))| m.0 == month)
            .map(|(_, (p, _))| p.id)
            .collect();
        ids.sort();
        ids
    }

    fn component_mut<T: hecs::Component>(&self, id: AgentId) -> Result<hecs::RefMut<'_, T>> {
        let entity = self.agents.get(&id).ok_or(PopulationError::UnknownAgent(id))?;
        self.world
            .get::<&mut T>(*entity)
            .map_err(|_| PopulationError::UnknownAgent(id))
    }

    pub fn set_age(&mut self, id: AgentId, years: u32) -> Result<()> {
        self.component_mut::<Age>(id)?.years = years;
        Ok(())
    }

    pub fn add_money(&mut self, id: AgentId, amount: f64) -> Result<()> {
        self.component_mut::<Wallet>(id)?.money += amount;
        Ok(())
    }

    /// Empties the agent's wallet and returns its content.
    pub fn take_money(&mut self, id: AgentId) -> Result<f64> {
        let mut wallet = self.component_mut::<Wallet>(id)?;
        Ok(std::mem::take(&mut wallet.money))
    }

    pub fn set_last_wage(&mut self, id: AgentId, wage: Option<f64>) -> Result<()> {
        self.component_mut::<Employment>(id)?.last_wage = wage;
        Ok(())
    }

    /// Removes an agent from its household, its employer and the world.
    /// Returns the household if it was left empty.
    pub fn remove_agent(&mut self, id: AgentId) -> Result<Option<HouseholdId>> {
        let record = self.agent(id).ok_or(PopulationError::UnknownAgent(id))?;
        if let Some(firm) = record.firm.and_then(|f| self.firms.get_mut(&f)) {
            firm.employees.remove(&id);
        }
        let mut emptied = None;
        if let Some(h) = record.household.and_then(|h| self.households.get_mut(&h)) {
            h.members.remove(&id);
            if h.members.is_empty() {
                emptied = Some(h.id);
            }
        }
        if let Some(entity) = self.agents.remove(&id) {
            if let Err(e) = self.world.despawn(entity) {
                warn!("Agent {} had no live entity to despawn: {}", id.0, e);
            }
        }
        Ok(emptied)
    }

    // ========================================================================
    // Households
    // ========================================================================

    pub fn create_household(&mut self) -> HouseholdId {
        let id = HouseholdId(self.next.household);
        self.next.household += 1;
        self.households.insert(id, Household::new(id));
        id
    }

    pub(crate) fn restore_household(&mut self, household: Household) {
        self.households.insert(household.id, household);
    }

    pub fn household(&self, id: HouseholdId) -> Option<&Household> {
        self.households.get(&id)
    }

    pub fn household_mut(&mut self, id: HouseholdId) -> Option<&mut Household> {
        self.households.get_mut(&id)
    }

    pub fn households(&self) -> impl Iterator<Item = &Household> {
        self.households.values()
    }

    pub fn household_ids(&self) -> Vec<HouseholdId> {
        self.households.keys().copied().collect()
    }

    pub fn household_count(&self) -> usize {
        self.households.len()
    }

    pub fn add_member(&mut self, household: HouseholdId, agent: AgentId) -> Result<()> {
        if !self.households.contains_key(&household) {
            return Err(PopulationError::UnknownHousehold(household));
        }
        {
            let mut membership = self.component_mut::<Membership>(agent)?;
            if let Some(current) = membership.household {
                return Err(PopulationError::AlreadyInHousehold {
                    agent,
                    household: current,
                });
            }
            membership.household = Some(household);
        }
        if let Some(h) = self.households.get_mut(&household) {
            h.members.insert(agent);
        }
        Ok(())
    }

    /// Detaches an agent from its household. Returns the household if it
    /// was left empty.
    pub fn detach_member(&mut self, agent: AgentId) -> Result<Option<HouseholdId>> {
        let previous = self.component_mut::<Membership>(agent)?.household.take();
        Ok(previous.and_then(|hid| {
            let h = self.households.get_mut(&hid)?;
            h.members.remove(&agent);
            h.members.is_empty().then_some(hid)
        }))
    }

    /// Moves an agent to another household. Returns the old household if it
    /// was left empty.
    pub fn move_agent(&mut self, agent: AgentId, to: HouseholdId) -> Result<Option<HouseholdId>> {
        if !self.households.contains_key(&to) {
            return Err(PopulationError::UnknownHousehold(to));
        }
        let emptied = self.detach_member(agent)?;
        self.add_member(to, agent)?;
        Ok(emptied)
    }

    /// Members aged at least `min_age`.
    pub fn members_aged(&self, household: HouseholdId, min_age: u32) -> usize {
        self.households
            .get(&household)
            .map(|h| {
                h.members
                    .iter()
                    .filter_map(|a| self.agent(*a))
                    .filter(|a| a.age >= min_age)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Sum of the members' last wages.
    pub fn household_income(&self, household: HouseholdId) -> f64 {
        self.households
            .get(&household)
            .map(|h| {
                h.members
                    .iter()
                    .filter_map(|a| self.agent(*a))
                    .filter_map(|a| a.last_wage)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Moves every member wallet into the household's cash.
    pub fn pool_member_money(&mut self, household: HouseholdId) -> Result<f64> {
        let members: Vec<AgentId> = self
            .households
            .get(&household)
            .ok_or(PopulationError::UnknownHousehold(household))?
            .members
            .iter()
            .copied()
            .collect();
        let mut pooled = 0.0;
        for agent in members {
            pooled += self.take_money(agent)?;
        }
        if let Some(h) = self.households.get_mut(&household) {
            h.cash += pooled;
        }
        Ok(pooled)
    }

    /// Unit of the household's residence.
    pub fn household_unit(&self, household: HouseholdId) -> Option<&UnitId> {
        let residence = self.households.get(&household)?.residence?;
        self.dwellings.get(&residence).map(|d| &d.unit)
    }

    /// Placement of an agent, derived from its household's residence.
    pub fn agent_unit(&self, agent: AgentId) -> Option<&UnitId> {
        self.household_unit(self.agent(agent)?.household?)
    }

    /// Residents per unit.
    pub fn unit_populations(&self) -> BTreeMap<UnitId, u64> {
        let mut pops: BTreeMap<UnitId, u64> = BTreeMap::new();
        for h in self.households.values() {
            if let Some(unit) = self.household_unit(h.id) {
                *pops.entry(unit.clone()).or_default() += h.members.len() as u64;
            }
        }
        pops
    }

    /// Moves a household into a dwelling, leaving its previous residence.
    pub fn move_in(&mut self, household: HouseholdId, dwelling: DwellingId, rent: Option<f64>) -> Result<()> {
        if !self.households.contains_key(&household) {
            return Err(PopulationError::UnknownHousehold(household));
        }
        match self.dwellings.get(&dwelling) {
            None => return Err(PopulationError::UnknownDwelling(dwelling)),
            Some(d) if d.occupant.is_some() && d.occupant != Some(household) => {
                return Err(PopulationError::Occupied(dwelling))
            }
            Some(_) => {}
        }
        self.vacate(household);
        if let Some(d) = self.dwellings.get_mut(&dwelling) {
            d.occupant = Some(household);
        }
        if let Some(h) = self.households.get_mut(&household) {
            h.residence = Some(dwelling);
            h.rent = rent;
            h.seeking = None;
        }
        Ok(())
    }

    /// Leaves the current residence, if any.
    pub fn vacate(&mut self, household: HouseholdId) {
        let Some(h) = self.households.get_mut(&household) else {
            return;
        };
        h.rent = None;
        if let Some(residence) = h.residence.take() {
            if let Some(d) = self.dwellings.get_mut(&residence) {
                if d.occupant == Some(household) {
                    d.occupant = None;
                }
            }
        }
    }

    /// Picks who inherits from a household: a household of the same unit,
    /// else any household, else a construction firm of the unit, else any
    /// construction firm.
    pub fn choose_heir<R: Rng + ?Sized>(
        &self,
        unit: Option<&UnitId>,
        exclude: HouseholdId,
        rng: &mut R,
    ) -> Option<Owner> {
        let others: Vec<HouseholdId> = self.households.keys().copied().filter(|h| *h != exclude).collect();
        let local: Vec<HouseholdId> = others
            .iter()
            .copied()
            .filter(|h| unit.is_some() && self.household_unit(*h) == unit)
            .collect();
        if let Some(h) = local.choose(rng).or_else(|| others.choose(rng)) {
            return Some(Owner::Household(*h));
        }
        let builders: Vec<&Firm> = self.firms.values().filter(|f| f.can_own_dwelling()).collect();
        let local: Vec<&Firm> = builders
            .iter()
            .copied()
            .filter(|f| Some(&f.unit) == unit)
            .collect();
        local
            .choose(rng)
            .or_else(|| builders.choose(rng))
            .map(|f| Owner::Firm(f.id))
    }

    /// Removes an empty household. Its dwellings, cash, savings and debt pass
    /// to an heir; dwellings are demolished when nobody can inherit.
    pub fn dissolve_household<R: Rng + ?Sized>(
        &mut self,
        household: HouseholdId,
        rng: &mut R,
    ) -> Result<Dissolution> {
        let unit = {
            let h = self
                .households
                .get(&household)
                .ok_or(PopulationError::UnknownHousehold(household))?;
            let via_owned = h.owned.iter().next().and_then(|d| self.dwellings.get(d)).map(|d| d.unit.clone());
            self.household_unit(household).cloned().or(via_owned)
        };
        let stray: Vec<AgentId> = self.households[&household].members.iter().copied().collect();
        for agent in stray {
            self.detach_member(agent)?;
        }
        self.vacate(household);
        let heir = self.choose_heir(unit.as_ref(), household, rng);

        let owned: Vec<DwellingId> = self.households[&household].owned.iter().copied().collect();
        let (mut inherited, mut demolished) = (0, 0);
        for dwelling in owned {
            match heir {
                Some(owner) => {
                    self.set_owner(dwelling, owner)?;
                    inherited += 1;
                }
                None => {
                    self.remove_dwelling(dwelling)?;
                    demolished += 1;
                }
            }
        }

        if let Some(estate) = self.households.remove(&household) {
            match heir {
                Some(Owner::Household(h)) => {
                    if let Some(h) = self.households.get_mut(&h) {
                        h.cash += estate.cash;
                        h.savings += estate.savings;
                        h.debt += estate.debt;
                    }
                }
                Some(Owner::Firm(f)) => {
                    if let Some(f) = self.firms.get_mut(&f) {
                        f.cash += estate.wealth();
                    }
                }
                None => {}
            }
        }
        debug!("Dissolved household {:?}: heir {:?}, {} dwellings demolished", household, heir, demolished);
        Ok(Dissolution {
            heir,
            inherited,
            demolished,
        })
    }

    /// Folds `from` into `into`: dwellings, cash, savings, debt and members
    /// move over, a residence of `from` is vacated and `from` is removed.
    pub fn merge_households(&mut self, into: HouseholdId, from: HouseholdId) -> Result<()> {
        if into == from || !self.households.contains_key(&into) {
            return Err(PopulationError::UnknownHousehold(into));
        }
        let (members, owned) = {
            let h = self
                .households
                .get(&from)
                .ok_or(PopulationError::UnknownHousehold(from))?;
            let members: Vec<AgentId> = h.members.iter().copied().collect();
            let owned: Vec<DwellingId> = h.owned.iter().copied().collect();
            (members, owned)
        };
        for dwelling in owned {
            self.set_owner(dwelling, Owner::Household(into))?;
        }
        for agent in members {
            self.move_agent(agent, into)?;
        }
        self.vacate(from);
        if let Some(estate) = self.households.remove(&from) {
            if let Some(h) = self.households.get_mut(&into) {
                h.cash += estate.cash;
                h.savings += estate.savings;
                h.debt += estate.debt;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Dwellings
    // ========================================================================

    pub fn add_dwelling(
        &mut self,
        location: Point,
        size: u32,
        quality: u8,
        price: f64,
        unit: UnitId,
        owner: Owner,
    ) -> Result<DwellingId> {
        let id = DwellingId(self.next.dwelling);
        self.check_owner(owner)?;
        self.next.dwelling += 1;
        self.dwellings.insert(
            id,
            Dwelling {
                id,
                location,
                size,
                quality,
                price,
                unit,
                owner,
                occupant: None,
                on_market: None,
            },
        );
        self.link_owner(id, owner);
        Ok(id)
    }

    pub(crate) fn restore_dwelling(&mut self, dwelling: Dwelling) {
        self.dwellings.insert(dwelling.id, dwelling);
    }

    fn check_owner(&self, owner: Owner) -> Result<()> {
        match owner {
            Owner::Household(h) if !self.households.contains_key(&h) => Err(PopulationError::UnknownHousehold(h)),
            Owner::Firm(f) => match self.firms.get(&f) {
                Some(firm) if firm.can_own_dwelling() => Ok(()),
                _ => Err(PopulationError::UnknownFirm(f)),
            },
            Owner::Household(_) => Ok(()),
        }
    }

    fn link_owner(&mut self, dwelling: DwellingId, owner: Owner) {
        match owner {
            Owner::Household(h) => {
                if let Some(h) = self.households.get_mut(&h) {
                    h.owned.insert(dwelling);
                }
            }
            Owner::Firm(f) => {
                if let Some(book) = self.firms.get_mut(&f).and_then(Firm::book_mut) {
                    book.listed.insert(dwelling);
                }
                if let Some(d) = self.dwellings.get_mut(&dwelling) {
                    d.on_market = Some(0);
                }
            }
        }
    }

    fn unlink_owner(&mut self, dwelling: DwellingId, owner: Owner) {
        match owner {
            Owner::Household(h) => {
                if let Some(h) = self.households.get_mut(&h) {
                    h.owned.remove(&dwelling);
                }
            }
            Owner::Firm(f) => {
                if let Some(book) = self.firms.get_mut(&f).and_then(Firm::book_mut) {
                    book.listed.remove(&dwelling);
                }
            }
        }
        if let Some(d) = self.dwellings.get_mut(&dwelling) {
            d.on_market = None;
        }
    }

    /// Transfers ownership. A construction firm taking a dwelling lists it.
    pub fn set_owner(&mut self, dwelling: DwellingId, owner: Owner) -> Result<()> {
        self.check_owner(owner)?;
        let previous = self
            .dwellings
            .get(&dwelling)
            .ok_or(PopulationError::UnknownDwelling(dwelling))?
            .owner;
        self.unlink_owner(dwelling, previous);
        if let Some(d) = self.dwellings.get_mut(&dwelling) {
            d.owner = owner;
        }
        self.link_owner(dwelling, owner);
        Ok(())
    }

    pub fn remove_dwelling(&mut self, dwelling: DwellingId) -> Result<Dwelling> {
        let d = self
            .dwellings
            .get(&dwelling)
            .ok_or(PopulationError::UnknownDwelling(dwelling))?;
        let (owner, occupant) = (d.owner, d.occupant);
        if let Some(h) = occupant {
            self.vacate(h);
        }
        self.unlink_owner(dwelling, owner);
        self.dwellings
            .remove(&dwelling)
            .ok_or(PopulationError::UnknownDwelling(dwelling))
    }

    pub fn dwelling(&self, id: DwellingId) -> Option<&Dwelling> {
        self.dwellings.get(&id)
    }

    pub fn dwelling_mut(&mut self, id: DwellingId) -> Option<&mut Dwelling> {
        self.dwellings.get_mut(&id)
    }

    pub fn dwellings(&self) -> impl Iterator<Item = &Dwelling> {
        self.dwellings.values()
    }

    pub fn dwellings_mut(&mut self) -> impl Iterator<Item = &mut Dwelling> {
        self.dwellings.values_mut()
    }

    pub fn dwelling_count(&self) -> usize {
        self.dwellings.len()
    }

    // ========================================================================
    // Firms
    // ========================================================================

    pub fn spawn_firm(&mut self, location: Point, unit: UnitId, cash: f64, construction: bool) -> FirmId {
        let id = FirmId(self.next.firm);
        self.next.firm += 1;
        self.firms.insert(id, Firm::new(id, location, unit, cash, construction));
        id
    }

    pub(crate) fn restore_firm(&mut self, firm: Firm) {
        self.firms.insert(firm.id, firm);
    }

    pub fn firm(&self, id: FirmId) -> Option<&Firm> {
        self.firms.get(&id)
    }

    pub fn firm_mut(&mut self, id: FirmId) -> Option<&mut Firm> {
        self.firms.get_mut(&id)
    }

    pub fn firms(&self) -> impl Iterator<Item = &Firm> {
        self.firms.values()
    }

    pub fn firm_ids(&self) -> Vec<FirmId> {
        self.firms.keys().copied().collect()
    }

    pub fn firm_count(&self) -> usize {
        self.firms.len()
    }

    pub fn hire(&mut self, firm: FirmId, agent: AgentId) -> Result<()> {
        if !self.firms.contains_key(&firm) {
            return Err(PopulationError::UnknownFirm(firm));
        }
        let previous = self.component_mut::<Employment>(agent)?.firm.replace(firm);
        if let Some(old) = previous.and_then(|f| self.firms.get_mut(&f)) {
            old.employees.remove(&agent);
        }
        if let Some(f) = self.firms.get_mut(&firm) {
            f.employees.insert(agent);
        }
        Ok(())
    }

    pub fn fire(&mut self, agent: AgentId) -> Result<()> {
        let mut employment = self.component_mut::<Employment>(agent)?;
        let previous = employment.firm.take();
        employment.last_wage = None;
        drop(employment);
        if let Some(f) = previous.and_then(|f| self.firms.get_mut(&f)) {
            f.employees.remove(&agent);
        }
        Ok(())
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        for h in self.households.values() {
            if h.members.is_empty() {
                violations.push(InvariantViolation::EmptyHousehold(h.id));
            }
            for agent in &h.members {
                match self.agent(*agent) {
                    None => violations.push(InvariantViolation::DanglingMember {
                        agent: *agent,
                        household: h.id,
                    }),
                    Some(a) if a.household != Some(h.id) => {
                        violations.push(InvariantViolation::MemberMismatch {
                            agent: *agent,
                            household: h.id,
                        })
                    }
                    Some(_) => {}
                }
            }
            if let Some(r) = h.residence {
                if self.dwellings.get(&r).and_then(|d| d.occupant) != Some(h.id) {
                    violations.push(InvariantViolation::ResidenceMismatch {
                        dwelling: r,
                        household: h.id,
                    });
                }
            }
            for d in &h.owned {
                if self.dwellings.get(d).map(|d| d.owner) != Some(Owner::Household(h.id)) {
                    violations.push(InvariantViolation::OwnershipMismatch {
                        dwelling: *d,
                        household: h.id,
                    });
                }
            }
        }

        for a in self.agents() {
            if let Some(h) = a.household {
                if !self.households.get(&h).map_or(false, |h| h.members.contains(&a.id)) {
                    violations.push(InvariantViolation::MemberMismatch {
                        agent: a.id,
                        household: h,
                    });
                }
            }
        }

        for d in self.dwellings.values() {
            match d.owner {
                Owner::Household(h) => match self.households.get(&h) {
                    None => violations.push(InvariantViolation::DanglingOwner(d.id)),
                    Some(owner) if !owner.owned.contains(&d.id) => {
                        violations.push(InvariantViolation::OwnershipMismatch {
                            dwelling: d.id,
                            household: h,
                        })
                    }
                    Some(_) => {}
                },
                Owner::Firm(f) => {
                    if !self.firms.get(&f).map_or(false, |f| f.can_own_dwelling()) {
                        violations.push(InvariantViolation::DanglingOwner(d.id));
                    }
                }
            }
            if let Some(h) = d.occupant {
                if self.households.get(&h).and_then(|h| h.residence) != Some(d.id) {
                    violations.push(InvariantViolation::ResidenceMismatch {
                        dwelling: d.id,
                        household: h,
                    });
                }
            }
        }

        for f in self.firms.values() {
            for agent in &f.employees {
                if self.agent(*agent).and_then(|a| a.firm) != Some(f.id) {
                    violations.push(InvariantViolation::DanglingEmployee {
                        agent: *agent,
                        firm: f.id,
                    });
                }
            }
        }

        violations
    }
}

impl Default for Population {
    fn default() -> Self {
        Self::new()
    }
}
