//! Persistence module for export/import of simulation state
//!
//! Captures the whole population, the units, the clock and the position of
//! the master generator into versioned export structs. Snapshots are written with bincode, or as JSON when the
//! path ends in `.json`, and can be re-imported to resume a run or to reuse a
//! synthesised population.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::clock::Clock;
use crate::components::{AgentRecord, UnitId};
use crate::entities::{Dwelling, Firm, Household};
use crate::error::SnapshotError;
use crate::population::{IdCounters, Population};
use crate::region::AdministrativeUnit;
use crate::rng::SimRng;

pub const SNAPSHOT_VERSION: u8 = 2;

// ============================================================================
// Export Data Structures
// ============================================================================

/// Complete simulation state for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportData {
    pub version: u8,
    pub clock: Clock,
    /// Master generator, so a resumed run draws what the original would have.
    pub rng: SimRng,
    pub next_ids: IdCounters,
    pub agents: Vec<AgentRecord>,
    pub households: Vec<Household>,
    pub dwellings: Vec<Dwelling>,
    pub firms: Vec<Firm>,
    pub units: Vec<AdministrativeUnit>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Binary,
    Json,
}

impl SnapshotFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => SnapshotFormat::Json,
            _ => SnapshotFormat::Binary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveStats {
    pub agents: usize,
    pub households: usize,
    pub dwellings: usize,
    pub firms: usize,
    pub bytes: usize,
}

/// State rebuilt from a snapshot.
pub struct ImportResult {
    pub clock: Clock,
    pub rng: SimRng,
    pub population: Population,
    pub units: BTreeMap<UnitId, AdministrativeUnit>,
}

// ============================================================================
// Export / Import
// ============================================================================

impl ExportData {
    pub fn capture(
        clock: Clock,
        rng: &SimRng,
        population: &Population,
        units: &BTreeMap<UnitId, AdministrativeUnit>,
    ) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            clock,
            rng: rng.clone(),
            next_ids: population.id_counters(),
            agents: population.agents().collect(),
            households: population.households().cloned().collect(),
            dwellings: population.dwellings().cloned().collect(),
            firms: population.firms().cloned().collect(),
            units: units.values().cloned().collect(),
        }
    }

    /// Rebuilds the arenas, refusing snapshots of another version or with
    /// broken links.
    pub fn restore(self) -> Result<ImportResult, SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(self.version));
        }
        let mut population = Population::new();
        for agent in &self.agents {
            population.restore_agent(agent);
        }
        for household in self.households {
            population.restore_household(household);
        }
        for dwelling in self.dwellings {
            population.restore_dwelling(dwelling);
        }
        for firm in self.firms {
            population.restore_firm(firm);
        }
        population.set_id_counters(self.next_ids);

        let violations = population.check_invariants();
        if !violations.is_empty() {
            return Err(SnapshotError::Inconsistent(violations));
        }
        Ok(ImportResult {
            clock: self.clock,
            rng: self.rng,
            population,
            units: self.units.into_iter().map(|u| (u.id.clone(), u)).collect(),
        })
    }

    pub fn encode(&self, format: SnapshotFormat) -> Result<Vec<u8>, SnapshotError> {
        Ok(match format {
            SnapshotFormat::Binary => bincode::serialize(self)?,
            SnapshotFormat::Json => serde_json::to_vec(self)?,
        })
    }

    pub fn decode(bytes: &[u8], format: SnapshotFormat) -> Result<Self, SnapshotError> {
        Ok(match format {
            SnapshotFormat::Binary => bincode::deserialize(bytes)?,
            SnapshotFormat::Json => serde_json::from_slice(bytes)?,
        })
    }
}

pub fn save_snapshot(path: &Path, data: &ExportData) -> Result<SaveStats, SnapshotError> {
    let bytes = data.encode(SnapshotFormat::for_path(path))?;
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    fs::write(path, &bytes).map_err(io_err)?;
    let stats = SaveStats {
        agents: data.agents.len(),
        households: data.households.len(),
        dwellings: data.dwellings.len(),
        firms: data.firms.len(),
        bytes: bytes.len(),
    };
    info!(
        "Saved snapshot {} ({} agents, {} households, {} bytes)",
        path.display(),
        stats.agents,
        stats.households,
        stats.bytes
    );
    Ok(stats)
}

pub fn load_snapshot(path: &Path) -> Result<ExportData, SnapshotError> {
    let bytes = fs::read(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ExportData::decode(&bytes, SnapshotFormat::for_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{AgentTraits, Gender, GroupId};
    use crate::entities::Owner;
    use crate::geometry::{MultiPolygon, Point};
    use crate::rng;
    use chrono::NaiveDate;
    use rand::Rng;

    fn state() -> (Clock, SimRng, Population, BTreeMap<UnitId, AdministrativeUnit>) {
        let mut pop = Population::new();
        let h = pop.create_household();
        let a = pop.spawn_agent(AgentTraits {
            gender: Gender::Female,
            age: 34,
            qualification: 12,
            money: 5.0,
            birth_month: 3,
        });
        pop.add_member(h, a).unwrap();
        let unit = UnitId::new("a");
        let d = pop
            .add_dwelling(Point::default(), 70, 3, 2100.0, unit.clone(), Owner::Household(h))
            .unwrap();
        pop.move_in(h, d, None).unwrap();
        let f = pop.spawn_firm(Point::default(), unit.clone(), 300.0, false);
        pop.hire(f, a).unwrap();

        let mut u = AdministrativeUnit::new(unit.clone(), GroupId::new("g"), "A".into(), MultiPolygon::default(), None, 1.2);
        let mut clock = Clock::new(NaiveDate::from_ymd_opt(2014, 1, 1).unwrap());
        clock.advance();
        u.registry.insert(clock.today(), vec![h]);
        let (mut rng, _) = rng::master(Some(7));
        let _: u64 = rng.gen();
        (clock, rng, pop, [(unit, u)].into_iter().collect())
    }

    #[test]
    fn test_restore_rebuilds_population() {
        let (clock, mut rng, pop, units) = state();
        let data = ExportData::capture(clock, &rng, &pop, &units);
        let bytes = data.encode(SnapshotFormat::Binary).unwrap();
        let restored = ExportData::decode(&bytes, SnapshotFormat::Binary)
            .unwrap()
            .restore()
            .unwrap();

        assert_eq!(restored.clock, clock);
        let mut resumed = restored.rng.clone();
        assert_eq!(resumed.gen::<u64>(), rng.gen::<u64>());
        assert_eq!(restored.units, units);
        assert_eq!(restored.population.id_counters(), pop.id_counters());
        assert_eq!(restored.population.agents().collect::<Vec<_>>(), pop.agents().collect::<Vec<_>>());
        assert_eq!(
            ExportData::capture(clock, &restored.rng, &restored.population, &restored.units),
            data
        );
    }

    #[test]
    fn test_rejects_other_versions_and_broken_links() {
        let (clock, rng, pop, units) = state();
        let mut data = ExportData::capture(clock, &rng, &pop, &units);
        data.version = 9;
        assert!(matches!(data.clone().restore(), Err(SnapshotError::Version(9))));

        data.version = SNAPSHOT_VERSION;
        data.households.clear();
        assert!(matches!(data.restore(), Err(SnapshotError::Inconsistent(_))));
    }

    #[test]
    fn test_json_snapshot_on_disk() {
        let (clock, rng, pop, units) = state();
        let data = ExportData::capture(clock, &rng, &pop, &units);
        let path = std::env::temp_dir().join(format!("regional-abm-snapshot-{}.json", std::process::id()));
        let stats = save_snapshot(&path, &data).unwrap();
        assert_eq!((stats.agents, stats.households, stats.dwellings, stats.firms), (1, 1, 1, 1));
        assert_eq!(load_snapshot(&path).unwrap(), data);
        fs::remove_file(&path).unwrap();
    }
}
