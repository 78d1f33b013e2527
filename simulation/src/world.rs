//! Simulation World - main orchestrator
//!
//! Owns the population, the units, the clock, the markets and the single
//! seeded generator. Each tick advances one day; month boundaries run the
//! monthly systems in a fixed order because later steps consume the ledgers
//! filled by earlier ones.

use chrono::{Datelike, NaiveDate};
use rand_distr::Beta;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use crate::clock::{Boundaries, Clock};
use crate::components::UnitId;
use crate::config::{SimulationConfig, SnapshotCadence};
use crate::data::InputData;
use crate::error::{GeographyError, Result, SimulationError};
use crate::funds::Funds;
use crate::generator::{create_regions, firm_cash_distribution, Generator};
use crate::geography::Geography;
use crate::markets::{BasicHousingMarket, BasicLaborMarket, HousingMarket, LaborMarket};
use crate::persistence::{load_snapshot, save_snapshot, ExportData, ImportResult};
use crate::population::Population;
use crate::region::{AdministrativeUnit, TaxLedger};
use crate::report::{unit_rows, vacancy, MonthlyReport, Reporter};
use crate::rng::{self, SimRng};
use crate::shapes::ShapeProvider;
use crate::systems::{self, ImmigrationSettings, RateCache};

/// What one tick did.
#[derive(Debug, Clone)]
pub struct TickResult {
    pub date: NaiveDate,
    pub boundaries: Boundaries,
    pub report: Option<MonthlyReport>,
}

pub struct SimulationWorld {
    config: SimulationConfig,
    data: InputData,
    geography: Geography,
    shapes: ShapeProvider,
    pub population: Population,
    pub units: BTreeMap<UnitId, AdministrativeUnit>,
    pub clock: Clock,
    rng: SimRng,
    seed: u64,
    labor: Box<dyn LaborMarket>,
    housing: Box<dyn HousingMarket>,
    funds: Funds,
    rates: RateCache,
    firm_cash: Beta<f64>,
    reporter: Reporter,
}

impl SimulationWorld {
    /// Builds a world with the basic labor and housing markets.
    pub fn new(config: SimulationConfig, data: InputData) -> Result<Self> {
        let labor = Box::new(BasicLaborMarket::new(config.labor));
        let housing = Box::new(BasicHousingMarket::new(config.housing, config.taxes.transaction));
        Self::with_markets(config, data, labor, housing)
    }

    /// Validates the configuration, selects the units, then loads or
    /// synthesises the population and bootstraps the labor market.
    pub fn with_markets(
        config: SimulationConfig,
        data: InputData,
        labor: Box<dyn LaborMarket>,
        housing: Box<dyn HousingMarket>,
    ) -> Result<Self> {
        config.validate()?;

        let mut geography = Geography::new(&data.units, &config.units)?;
        let before = geography.len();
        geography.retain(|id| data.shapes.contains_key(id));
        if geography.is_empty() {
            return Err(GeographyError::NoShapes.into());
        }
        if geography.len() < before {
            warn!("{} selected unit(s) have no shape and are skipped", before - geography.len());
        }

        let parsed: Vec<_> = geography
            .unit_ids()
            .into_iter()
            .filter_map(|id| data.shapes.get(&id).map(|s| (id, s.polygon(), s.urban())))
            .collect();
        let shapes = ShapeProvider::new(parsed.iter().map(|(id, p, u)| (id, p, u.as_ref())));

        let (rng, seed) = rng::master(config.seed);
        info!("Seed: {}", seed);
        let reporter = match &config.output_dir {
            Some(dir) => Reporter::to_dir(dir)?,
            None => Reporter::in_memory(),
        };

        let mut world = Self {
            funds: Funds::new(&config),
            clock: Clock::new(config.start_date),
            firm_cash: firm_cash_distribution()?,
            config,
            data,
            geography,
            shapes,
            population: Population::new(),
            units: BTreeMap::new(),
            rng,
            seed,
            labor,
            housing,
            rates: RateCache::default(),
            reporter,
        };
        world.initialize()?;
        Ok(world)
    }

    fn initialize(&mut self) -> Result<()> {
        info!("Initializing...");
        let cache = self
            .config
            .population_cache
            .clone()
            .filter(|p| p.exists() && !self.config.force_new_population);
        match cache {
            Some(path) => {
                let ImportResult { population, units, .. } = load_snapshot(&path)?.restore()?;
                info!(
                    "Loaded population from {}: {} agents in {} households",
                    path.display(),
                    population.agent_count(),
                    population.household_count()
                );
                self.population = population;
                self.units = units;
            }
            None => {
                self.generate()?;
                if let Some(path) = self.config.population_cache.clone() {
                    save_snapshot(&path, &self.export_world())?;
                }
            }
        }
        log_memory("after population synthesis");

        self.bootstrap_labor();
        let populations = self.population.unit_populations();
        for (id, unit) in self.units.iter_mut() {
            unit.population = populations.get(id).copied().unwrap_or(0);
        }
        self.check_invariants()
    }

    fn generate(&mut self) -> Result<()> {
        self.units = create_regions(&self.data, &self.geography, self.config.start_date.year());
        let generator = Generator::new(&self.config, &self.data, &self.shapes)?;
        generator.create_all(&self.units, &mut self.population, &mut *self.housing, &mut self.rng)?;
        Ok(())
    }

    /// Hires in rounds until unemployment reaches the configured target.
    fn bootstrap_labor(&mut self) {
        let target = self.config.labor.target_unemployment;
        let mut rounds = 0;
        let mut hired = 0;
        while self.labor.unemployment(&self.population) > target && rounds < self.config.labor.max_bootstrap_rounds {
            let report = self.labor.match_jobs(&mut self.population, true, &mut self.rng);
            rounds += 1;
            hired += report.hired;
            if report.hired == 0 {
                break;
            }
        }
        info!(
            "Labor bootstrap: {} hired in {} round(s), unemployment {:.3} (target {:.3})",
            hired,
            rounds,
            self.labor.unemployment(&self.population),
            target
        );
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn reports(&self) -> &[MonthlyReport] {
        self.reporter.reports()
    }

    // ========================================================================
    // Scheduling
    // ========================================================================

    /// Runs the configured number of days.
    pub fn run(&mut self) -> Result<()> {
        info!("Running {} days from {}", self.config.total_days, self.clock.today());
        for _ in 0..self.config.total_days {
            self.tick()?;
        }
        info!(
            "Simulation completed at {}: {} agents, {} households",
            self.clock.today(),
            self.population.agent_count(),
            self.population.household_count()
        );
        Ok(())
    }

    /// Run one simulation tick (advances 1 day)
    pub fn tick(&mut self) -> Result<TickResult> {
        self.daily();
        let boundaries = self.clock.advance();
        let mut result = TickResult {
            date: self.clock.today(),
            boundaries,
            report: None,
        };
        if boundaries.new_month {
            result.report = Some(self.monthly()?);
        }
        let cadence = self.config.snapshots;
        if (boundaries.new_quarter && cadence == SnapshotCadence::Quarterly)
            || (boundaries.new_year && cadence == SnapshotCadence::Yearly)
        {
            self.periodic_snapshot()?;
        }
        Ok(result)
    }

    fn daily(&mut self) {}

    fn monthly(&mut self) -> Result<MonthlyReport> {
        let today = self.clock.today();
        let year = self.clock.year();
        let taxes = self.config.taxes;
        let economy = self.config.economy;

        let licenses = systems::license_system(&mut self.units, self.config.licenses, &mut self.rng);
        let opened = systems::firm_growth_system(
            &mut self.population,
            &self.units,
            &self.data.firms,
            self.config.sampling_percentage,
            &self.shapes,
            &self.firm_cash,
            &mut self.rng,
        );
        systems::production_system(&mut self.population, &economy);

        let demography = systems::demography_system(
            &mut self.population,
            &self.units,
            &self.data,
            &mut self.rates,
            today,
            &mut self.rng,
        )?;
        let settings = ImmigrationSettings {
            sampling_percentage: self.config.sampling_percentage,
            members_per_household: self.config.members_per_household,
        };
        let immigration = systems::immigration_system(
            &mut self.population,
            &self.units,
            &self.data,
            &mut *self.housing,
            &settings,
            year,
            &mut self.rng,
        )?;
        let unions = systems::matchmaking_system(
            &mut self.population,
            self.data.unions.as_ref(),
            self.config.union_check_probability,
            &mut *self.housing,
            &mut self.rng,
        )?;

        let consumption =
            systems::consumption_system(&mut self.population, &mut self.units, &economy, taxes.consumption, &mut self.rng)?;
        let accounts = systems::accounts_system(
            &mut self.population,
            &mut self.units,
            &economy,
            taxes.labor,
            taxes.firm,
            &mut self.rng,
        )?;
        let construction =
            systems::construction_system(&mut self.population, &mut self.units, &economy, &self.shapes, &mut self.rng)?;

        let jobs = self.labor.match_jobs(&mut self.population, false, &mut self.rng);
        let sales = self.housing.clear_sales(&mut self.population, &mut self.units, &mut self.rng);
        let rehoused = systems::rehousing_system(&mut self.population, &mut *self.housing, &mut self.rng);
        let rent = systems::rent_system(&mut self.population);
        let property = systems::property_tax_system(&mut self.population, &mut self.units, taxes.property);
        systems::investment_system(&mut self.population, economy.savings_interest);

        let collected: BTreeMap<UnitId, TaxLedger> =
            self.units.iter().map(|(id, u)| (id.clone(), u.treasure)).collect();
        let populations = self.population.unit_populations();
        let redistribution = self.funds.invest_taxes(&mut self.units, &populations, &self.data.transfers, year);
        let policy = self.funds.apply_policies(&mut self.population, &mut self.units, today)?;
        systems::gdp_system(&self.population, &mut self.units);

        debug!(
            "{}: {} licenses, {} new firms, spent {:.2} (tax {:.2}), wages {:.2}, {} hired, {} fired, {} rehoused, rent {:.2}, property tax {:.2}",
            today,
            licenses,
            opened,
            consumption.spent,
            consumption.tax,
            accounts.wages,
            jobs.hired,
            jobs.fired,
            rehoused,
            rent.paid,
            property
        );

        let report = MonthlyReport {
            date: Some(today),
            population: self.population.agent_count(),
            households: self.population.household_count(),
            dwellings: self.population.dwelling_count(),
            firms: self.population.firm_count(),
            unemployment: self.labor.unemployment(&self.population),
            vacancy: vacancy(&self.population),
            births: demography.births,
            deaths: demography.deaths,
            immigrants: immigration.arrived,
            unions: unions.unions,
            new_dwellings: construction.completed,
            house_sales: sales.sold,
            welfare_households: policy.subsidised,
            gdp: self.units.values().map(|u| u.gdp).sum(),
            units: unit_rows(&self.units, &collected),
        };
        info!(
            "{}: population {}, households {}, unemployment {:.3}, collected {:.2}, undistributed {:.2}",
            today,
            report.population,
            report.households,
            report.unemployment,
            redistribution.collected,
            redistribution.undistributed
        );
        self.reporter.record(report.clone())?;
        self.check_invariants()?;
        Ok(report)
    }

    fn check_invariants(&self) -> Result<()> {
        let violations = self.population.check_invariants();
        if violations.is_empty() {
            return Ok(());
        }
        if self.config.strict_invariants {
            return Err(SimulationError::Invariant(violations));
        }
        error!(
            "{} invariant violation(s) on {}, first: {:?}",
            violations.len(),
            self.clock.today(),
            violations[0]
        );
        Ok(())
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    pub fn export_world(&self) -> ExportData {
        ExportData::capture(self.clock, &self.rng, &self.population, &self.units)
    }

    /// Replaces the state with a snapshot and resumes from its date.
    pub fn import_world(&mut self, data: ExportData) -> Result<()> {
        let ImportResult {
            clock,
            rng,
            population,
            units,
        } = data.restore()?;
        self.clock = clock;
        self.rng = rng;
        self.population = population;
        self.units = units;
        info!(
            "Imported snapshot at {}: {} agents",
            self.clock.today(),
            self.population.agent_count()
        );
        Ok(())
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        save_snapshot(path, &self.export_world())?;
        Ok(())
    }

    fn periodic_snapshot(&self) -> Result<()> {
        let Some(dir) = &self.config.output_dir else {
            debug!("Snapshot due on {} but no output directory is set", self.clock.today());
            return Ok(());
        };
        let path: PathBuf = dir
            .join("snapshots")
            .join(format!("snapshot-{}.bin", self.clock.today()));
        self.save_snapshot(&path)?;
        log_memory("after snapshot");
        Ok(())
    }
}

fn log_memory(when: &str) {
    match memory_stats::memory_stats() {
        Some(usage) => info!(
            "Memory {}: {} MB physical, {} MB virtual",
            when,
            usage.physical_mem / 1_048_576,
            usage.virtual_mem / 1_048_576
        ),
        None => debug!("Memory usage unavailable {}", when),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyKind;
    use crate::fixtures;
    use crate::persistence::SnapshotFormat;

    fn world(config: SimulationConfig) -> SimulationWorld {
        SimulationWorld::new(config, fixtures::data()).unwrap()
    }

    #[test]
    fn test_run_reports_every_month() {
        let mut w = world(fixtures::config());
        assert!(w.population.agent_count() > 0);
        assert!(w.units.values().all(|u| u.population > 0));
        w.run().unwrap();

        assert_eq!(w.clock.today(), NaiveDate::from_ymd_opt(2014, 5, 1).unwrap());
        assert_eq!(w.reports().len(), 4);
        for report in w.reports() {
            assert_eq!(report.units.len(), 3);
            assert!(report.population > 0);
            assert!((0.0..=1.0).contains(&report.unemployment));
        }
        assert!(w.population.check_invariants().is_empty());
        assert!(w.population.households().all(|h| !h.members.is_empty()));
    }

    #[test]
    fn test_fixed_seed_is_deterministic() {
        let mut config = fixtures::config();
        config.policy.kind = PolicyKind::DirectTransfer;
        let mut a = world(config.clone());
        let mut b = world(config);
        a.run().unwrap();
        b.run().unwrap();
        let ja = serde_json::to_string(a.reports()).unwrap();
        let jb = serde_json::to_string(b.reports()).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn test_tick_fires_month_once() {
        let mut w = world(fixtures::config());
        let mut months = 0;
        for _ in 0..31 {
            let t = w.tick().unwrap();
            months += t.report.is_some() as usize;
            assert_eq!(t.boundaries.new_month, t.report.is_some());
        }
        assert_eq!(months, 1);
    }

    #[test]
    fn test_population_cache_is_reused() {
        let path = std::env::temp_dir().join(format!("regional-abm-cache-{}.bin", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let mut config = fixtures::config();
        config.population_cache = Some(path.clone());

        let first = world(config.clone());
        assert!(path.exists());
        config.seed = Some(99);
        let second = world(config);
        assert_eq!(first.population.agent_count(), second.population.agent_count());
        assert_eq!(first.population.household_count(), second.population.household_count());
        assert_eq!(first.units.keys().collect::<Vec<_>>(), second.units.keys().collect::<Vec<_>>());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_import_resumes_from_snapshot() {
        let mut w = world(fixtures::config());
        for _ in 0..40 {
            w.tick().unwrap();
        }
        let saved = w.export_world();
        let mut other = world(fixtures::config());
        other.import_world(saved.clone()).unwrap();
        assert_eq!(other.clock, w.clock);
        assert_eq!(other.export_world(), saved);
    }

    #[test]
    fn test_resumed_run_matches_uninterrupted_run() {
        let mut config = fixtures::config();
        config.policy.kind = PolicyKind::DirectTransfer;
        let mut straight = world(config.clone());
        let mut first = world(config.clone());
        for _ in 0..59 {
            straight.tick().unwrap();
            first.tick().unwrap();
        }
        let bytes = first.export_world().encode(SnapshotFormat::Binary).unwrap();

        let mut resumed = world(config);
        resumed
            .import_world(ExportData::decode(&bytes, SnapshotFormat::Binary).unwrap())
            .unwrap();
        for _ in 59..120 {
            straight.tick().unwrap();
            resumed.tick().unwrap();
        }
        assert_eq!(resumed.clock, straight.clock);
        assert_eq!(resumed.reports().last(), straight.reports().last());
        assert_eq!(resumed.export_world(), straight.export_world());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = fixtures::config();
        config.sampling_percentage = 0.0;
        assert!(matches!(
            SimulationWorld::new(config, fixtures::data()),
            Err(SimulationError::Config(_))
        ));
    }
}
