//! Input data providers
//!
//! All tables are read once from a data directory of JSON files and handed
//! to the engines by reference. Three tables are required; every other table
//! is optional and its absence is handled by a logged fallback.

pub mod lookup;
pub mod tables;

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{info, warn};

use crate::components::{GroupId, UnitId};
use crate::error::DataError;
use crate::geography::UnitRecord;
use crate::shapes::ShapeRecord;

pub use lookup::{Fallback, Lookup};
pub use tables::{
    AgeBracket, AgeRates, EducationCdf, EducationTable, FertilityTable, FirmBaseline,
    FirmGrowthStatistics, GenderCounts, GenderSeries, KeyedSeries, MortalityTable,
    PopulationCounts, PopulationEstimates, TransferTable, UnionRates, YearSeries,
};

pub const UNITS_TABLE: &str = "units.json";
pub const SHAPES_TABLE: &str = "shapes.json";
pub const POPULATION_TABLE: &str = "population.json";
pub const MORTALITY_TABLE: &str = "mortality.json";
pub const FERTILITY_TABLE: &str = "fertility.json";
pub const HDI_TABLE: &str = "hdi.json";
pub const EDUCATION_TABLE: &str = "education.json";
pub const HOUSEHOLD_SIZE_TABLE: &str = "household_size.json";
pub const FIRMS_TABLE: &str = "firms.json";
pub const POPULATION_SERIES_TABLE: &str = "population_series.json";
pub const TRANSFERS_TABLE: &str = "transfers.json";
pub const URBAN_TABLE: &str = "urban.json";
pub const UNIONS_TABLE: &str = "unions.json";

#[derive(Debug, Clone, Default)]
pub struct InputData {
    pub units: Vec<UnitRecord>,
    pub shapes: BTreeMap<UnitId, ShapeRecord>,
    pub population: PopulationCounts,
    pub mortality: MortalityTable,
    pub fertility: FertilityTable,
    /// Human development index per unit and year; seeds the quality index.
    pub hdi: KeyedSeries<UnitId>,
    pub education: EducationTable,
    pub household_size: KeyedSeries<GroupId>,
    pub firms: FirmGrowthStatistics,
    pub estimates: PopulationEstimates,
    pub transfers: TransferTable,
    pub urban: KeyedSeries<UnitId>,
    /// Union formation is disabled when absent.
    pub unions: Option<UnionRates>,
}

impl InputData {
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, DataError> {
        let dir = dir.as_ref();
        info!("Loading input tables from {}", dir.display());

        let data = Self {
            units: read_required(dir, UNITS_TABLE)?,
            shapes: read_required(dir, SHAPES_TABLE)?,
            population: read_required(dir, POPULATION_TABLE)?,
            mortality: MortalityTable(read_optional(dir, MORTALITY_TABLE)?.unwrap_or_default()),
            fertility: FertilityTable(read_optional(dir, FERTILITY_TABLE)?.unwrap_or_default()),
            hdi: KeyedSeries(read_optional(dir, HDI_TABLE)?.unwrap_or_default()),
            education: EducationTable(read_optional(dir, EDUCATION_TABLE)?.unwrap_or_default()),
            household_size: KeyedSeries(
                read_optional(dir, HOUSEHOLD_SIZE_TABLE)?.unwrap_or_default(),
            ),
            firms: read_optional::<FirmBaseline>(dir, FIRMS_TABLE)?
                .map(FirmGrowthStatistics::from_baseline)
                .unwrap_or_default(),
            estimates: PopulationEstimates::new(KeyedSeries(
                read_optional(dir, POPULATION_SERIES_TABLE)?.unwrap_or_default(),
            )),
            transfers: TransferTable::new(KeyedSeries(
                read_optional(dir, TRANSFERS_TABLE)?.unwrap_or_default(),
            )),
            urban: KeyedSeries(read_optional(dir, URBAN_TABLE)?.unwrap_or_default()),
            unions: read_optional(dir, UNIONS_TABLE)?,
        };

        info!(
            "Loaded {} unit records, {} shapes, {} population brackets",
            data.units.len(),
            data.shapes.len(),
            data.population.brackets.len()
        );
        Ok(data)
    }
}

fn read_required<T: DeserializeOwned>(dir: &Path, table: &'static str) -> Result<T, DataError> {
    let path = dir.join(table);
    let contents = fs::read_to_string(&path).map_err(|source| DataError::Read {
        table,
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| DataError::Parse { table, path, source })
}

fn read_optional<T: DeserializeOwned>(
    dir: &Path,
    table: &'static str,
) -> Result<Option<T>, DataError> {
    let path = dir.join(table);
    match fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| DataError::Parse { table, path, source }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("Optional table `{}` not found, its fallback applies", table);
            Ok(None)
        }
        Err(source) => Err(DataError::Read { table, path, source }),
    }
}
