//! Monthly statistics
//!
//! One `MonthlyReport` per simulated month, kept in memory and, when an
//! output directory is configured, appended to `stats.jsonl` as one JSON
//! object per line.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::components::UnitId;
use crate::error::{Result, SimulationError};
use crate::population::Population;
use crate::region::{AdministrativeUnit, AppliedLedger, TaxLedger};

pub const STATS_FILE: &str = "stats.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRow {
    pub id: UnitId,
    pub index: f64,
    pub population: u64,
    pub gdp: f64,
    /// Taxes collected in the unit this month.
    pub collected: TaxLedger,
    /// Money applied to the index since the start, by rule.
    pub applied: AppliedLedger,
    pub welfare_fund: f64,
    pub licenses: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub date: Option<NaiveDate>,
    pub population: usize,
    pub households: usize,
    pub dwellings: usize,
    pub firms: usize,
    pub unemployment: f64,
    pub vacancy: f64,
    pub births: usize,
    pub deaths: usize,
    pub immigrants: usize,
    pub unions: usize,
    pub new_dwellings: usize,
    pub house_sales: usize,
    pub welfare_households: usize,
    pub gdp: f64,
    pub units: Vec<UnitRow>,
}

/// Share of dwellings nobody lives in.
pub fn vacancy(population: &Population) -> f64 {
    let total = population.dwelling_count();
    if total == 0 {
        return 0.0;
    }
    population.dwellings().filter(|d| d.is_vacant()).count() as f64 / total as f64
}

pub fn unit_rows(
    units: &BTreeMap<UnitId, AdministrativeUnit>,
    collected: &BTreeMap<UnitId, TaxLedger>,
) -> Vec<UnitRow> {
    units
        .values()
        .map(|u| UnitRow {
            id: u.id.clone(),
            index: u.index,
            population: u.population,
            gdp: u.gdp,
            collected: collected.get(&u.id).copied().unwrap_or_default(),
            applied: u.applied_treasure,
            welfare_fund: u.welfare_fund,
            licenses: u.licenses,
        })
        .collect()
}

pub struct Reporter {
    reports: Vec<MonthlyReport>,
    path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
}

impl Reporter {
    /// Keeps reports in memory only.
    pub fn in_memory() -> Self {
        Self {
            reports: Vec::new(),
            path: None,
            writer: None,
        }
    }

    /// Creates `dir` if needed and truncates its statistics file.
    pub fn to_dir(dir: &Path) -> Result<Self> {
        let path = dir.join(STATS_FILE);
        let io_err = |source| SimulationError::Report {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        let file = File::create(&path).map_err(io_err)?;
        info!("Writing monthly statistics to {}", path.display());
        Ok(Self {
            reports: Vec::new(),
            path: Some(path),
            writer: Some(BufWriter::new(file)),
        })
    }

    pub fn record(&mut self, report: MonthlyReport) -> Result<()> {
        if let (Some(writer), Some(path)) = (self.writer.as_mut(), self.path.as_ref()) {
            let io_err = |source| SimulationError::Report {
                path: path.clone(),
                source,
            };
            let line = serde_json::to_string(&report).map_err(|e| io_err(e.into()))?;
            writeln!(writer, "{line}").map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        self.reports.push(report);
        Ok(())
    }

    pub fn reports(&self) -> &[MonthlyReport] {
        &self.reports
    }

    pub fn last(&self) -> Option<&MonthlyReport> {
        self.reports.last()
    }
}
