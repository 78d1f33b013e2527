//! Statistical tables
//!
//! Immutable views over the input data. Year-keyed lookups report how they
//! were resolved through `Lookup` so callers pick the recovery explicitly.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::lookup::{Fallback, Lookup};
use crate::components::{Gender, GroupId, UnitId};

pub type YearSeries<T> = BTreeMap<i32, T>;

pub trait YearLookup<T> {
    /// Only the requested year.
    fn exact_year(&self, year: i32) -> Lookup<&T>;
    /// Requested year, else nearest earlier year, else earliest later year.
    fn year_or_nearest(&self, year: i32) -> Lookup<&T>;
}

impl<T> YearLookup<T> for YearSeries<T> {
    fn exact_year(&self, year: i32) -> Lookup<&T> {
        match self.get(&year) {
            Some(v) => Lookup::Found(v),
            None => Lookup::Missing,
        }
    }

    fn year_or_nearest(&self, year: i32) -> Lookup<&T> {
        if let Some(v) = self.get(&year) {
            return Lookup::Found(v);
        }
        if let Some((y, v)) = self.range(..year).next_back() {
            return Lookup::FallbackUsed(v, Fallback::EarlierYear(*y));
        }
        match self.range(year..).next() {
            Some((y, v)) => Lookup::FallbackUsed(v, Fallback::LaterYear(*y)),
            None => Lookup::Missing,
        }
    }
}

// ============================================================================
// Age-keyed rates
// ============================================================================

/// Annual probabilities keyed by integer age. An age resolves to the closest
/// tabulated age at or below it; ages before the first entry have rate zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgeRates(pub BTreeMap<u32, f64>);

impl AgeRates {
    pub fn rate(&self, age: u32) -> f64 {
        self.0
            .range(..=age)
            .next_back()
            .map(|(_, rate)| *rate)
            .unwrap_or(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenderSeries {
    pub male: YearSeries<AgeRates>,
    pub female: YearSeries<AgeRates>,
}

impl GenderSeries {
    pub fn for_gender(&self, gender: Gender) -> &YearSeries<AgeRates> {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MortalityTable(pub BTreeMap<GroupId, GenderSeries>);

impl MortalityTable {
    pub fn rates(&self, group: &GroupId, gender: Gender, year: i32) -> Lookup<&AgeRates> {
        match self.0.get(group) {
            Some(series) => series.for_gender(gender).year_or_nearest(year),
            None => Lookup::Missing,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FertilityTable(pub BTreeMap<GroupId, YearSeries<AgeRates>>);

impl FertilityTable {
    pub fn rates(&self, group: &GroupId, year: i32) -> Lookup<&AgeRates> {
        match self.0.get(group) {
            Some(series) => series.year_or_nearest(year),
            None => Lookup::Missing,
        }
    }
}

/// Probability of entering a union, by gender and age.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UnionRates {
    pub male: AgeRates,
    pub female: AgeRates,
}

impl UnionRates {
    pub fn rate(&self, gender: Gender, age: u32) -> f64 {
        match gender {
            Gender::Male => self.male.rate(age),
            Gender::Female => self.female.rate(age),
        }
    }
}

// ============================================================================
// Population counts
// ============================================================================

/// Inclusive age range of one census bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AgeBracket {
    pub min: u32,
    pub max: u32,
}

/// Real (unsampled) head counts per bracket, aligned with `PopulationCounts::brackets`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenderCounts {
    pub male: Vec<f64>,
    pub female: Vec<f64>,
}

impl GenderCounts {
    pub fn for_gender(&self, gender: Gender) -> &[f64] {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopulationCounts {
    pub brackets: Vec<AgeBracket>,
    pub units: BTreeMap<UnitId, YearSeries<GenderCounts>>,
}

impl PopulationCounts {
    pub fn for_unit(&self, unit: &UnitId, year: i32) -> Lookup<&GenderCounts> {
        match self.units.get(unit) {
            Some(series) => series.year_or_nearest(year),
            None => Lookup::Missing,
        }
    }
}

// ============================================================================
// Education
// ============================================================================

/// Qualification used when a group has no education distribution.
pub const DEFAULT_QUALIFICATION: u8 = 3;

/// Years of schooling an education level maps to; one is drawn uniformly.
fn years_for_level(level: u8) -> &'static [u8] {
    match level {
        0 | 1 => &[1, 2],
        2 => &[4, 6, 8],
        3 => &[9, 10, 11],
        4 => &[12, 13, 14, 15],
        _ => &[15, 16, 17],
    }
}

/// Cumulative distribution over education levels.
#[derive(Debug, Clone, PartialEq)]
pub struct EducationCdf {
    steps: Vec<(f64, u8)>,
}

impl EducationCdf {
    /// Builds the distribution from level shares (any scale). The last
    /// cumulative value is pinned to 1 so rounding never leaves a gap.
    pub fn from_shares(shares: &BTreeMap<u8, f64>) -> Option<Self> {
        let total: f64 = shares.values().filter(|s| **s > 0.0).sum();
        if total <= 0.0 {
            return None;
        }
        let mut acc = 0.0;
        let mut steps: Vec<(f64, u8)> = shares
            .iter()
            .filter(|(_, s)| **s > 0.0)
            .map(|(level, share)| {
                acc += share / total;
                (acc, *level)
            })
            .collect();
        if let Some(last) = steps.last_mut() {
            last.0 = 1.0;
        }
        Some(Self { steps })
    }

    pub fn sample_level<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        let r = rng.gen::<f64>();
        let idx = self.steps.partition_point(|(cum, _)| *cum <= r);
        self.steps[idx.min(self.steps.len() - 1)].1
    }

    pub fn sample_years<R: Rng + ?Sized>(&self, rng: &mut R) -> u8 {
        let choices = years_for_level(self.sample_level(rng));
        choices[rng.gen_range(0..choices.len())]
    }
}

/// Draws a qualification from an optional distribution.
pub fn draw_qualification<R: Rng + ?Sized>(cdf: Option<&EducationCdf>, rng: &mut R) -> u8 {
    match cdf {
        Some(cdf) => cdf.sample_years(rng),
        None => DEFAULT_QUALIFICATION,
    }
}

#[derive(Debug, Clone, Default)]
pub struct EducationTable(pub BTreeMap<GroupId, YearSeries<BTreeMap<u8, f64>>>);

impl EducationTable {
    pub fn distribution(&self, group: &GroupId, year: i32) -> Lookup<EducationCdf> {
        let shares = match self.0.get(group) {
            Some(series) => series.year_or_nearest(year),
            None => return Lookup::Missing,
        };
        match shares {
            Lookup::Found(s) => EducationCdf::from_shares(s).map_or(Lookup::Missing, Lookup::Found),
            Lookup::FallbackUsed(s, why) => EducationCdf::from_shares(s)
                .map_or(Lookup::Missing, |cdf| Lookup::FallbackUsed(cdf, why)),
            Lookup::Missing => Lookup::Missing,
        }
    }
}

// ============================================================================
// Scalar series
// ============================================================================

/// One value per key and year (index, household size, urban share, ...).
#[derive(Debug, Clone)]
pub struct KeyedSeries<K: Ord>(pub BTreeMap<K, YearSeries<f64>>);

impl<K: Ord> Default for KeyedSeries<K> {
    fn default() -> Self {
        Self(BTreeMap::new())
    }
}

impl<K: Ord> KeyedSeries<K> {
    pub fn exact(&self, key: &K, year: i32) -> Lookup<f64> {
        match self.0.get(key) {
            Some(series) => series.exact_year(year).map(|v| *v),
            None => Lookup::Missing,
        }
    }

    pub fn nearest(&self, key: &K, year: i32) -> Lookup<f64> {
        match self.0.get(key) {
            Some(series) => series.year_or_nearest(year).map(|v| *v),
            None => Lookup::Missing,
        }
    }

    pub fn series(&self, key: &K) -> Option<&YearSeries<f64>> {
        self.0.get(key)
    }
}

/// Share of the unit area's population living in urban zones. Values above
/// one are percentages.
pub fn urban_probability(table: &KeyedSeries<UnitId>, unit: &UnitId, year: i32) -> Lookup<f64> {
    table
        .nearest(unit, year)
        .map(|p| if p > 1.0 { p / 100.0 } else { p })
}

// ============================================================================
// Firm growth baseline
// ============================================================================

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct EmployeeCounts {
    pub t0: f64,
    pub t1: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirmBaseline {
    pub t0_year: i32,
    pub t1_year: i32,
    pub units: BTreeMap<UnitId, EmployeeCounts>,
}

/// Employee counts at two reference years and the monthly growth between them.
#[derive(Debug, Clone, Default)]
pub struct FirmGrowthStatistics {
    counts: BTreeMap<UnitId, EmployeeCounts>,
    months: f64,
}

impl FirmGrowthStatistics {
    pub fn from_baseline(baseline: FirmBaseline) -> Self {
        let months = f64::from((baseline.t1_year - baseline.t0_year).max(0) * 12);
        Self {
            counts: baseline.units,
            months,
        }
    }

    pub fn employees_t0(&self, unit: &UnitId) -> Lookup<f64> {
        match self.counts.get(unit) {
            Some(c) => Lookup::Found(c.t0),
            None => Lookup::Missing,
        }
    }

    pub fn average_monthly_growth(&self, unit: &UnitId) -> f64 {
        match self.counts.get(unit) {
            Some(c) if self.months > 0.0 => (c.t1 - c.t0) / self.months,
            _ => 0.0,
        }
    }
}

// ============================================================================
// Population estimates
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Trend {
    slope: f64,
    intercept: f64,
}

impl Trend {
    /// Ordinary least squares over (year, value) points; `None` with fewer
    /// than two distinct years.
    fn fit(series: &YearSeries<f64>) -> Option<Self> {
        if series.len() < 2 {
            return None;
        }
        let n = series.len() as f64;
        let mean_x = series.keys().map(|y| f64::from(*y)).sum::<f64>() / n;
        let mean_y = series.values().sum::<f64>() / n;
        let (mut sxy, mut sxx) = (0.0, 0.0);
        for (year, value) in series {
            let dx = f64::from(*year) - mean_x;
            sxy += dx * (value - mean_y);
            sxx += dx * dx;
        }
        if sxx == 0.0 {
            return None;
        }
        let slope = sxy / sxx;
        Some(Self {
            slope,
            intercept: mean_y - slope * mean_x,
        })
    }

    fn predict(&self, year: i32) -> f64 {
        self.intercept + self.slope * f64::from(year)
    }
}

/// Real population per unit: historical values, extended by a linear trend.
#[derive(Debug, Clone, Default)]
pub struct PopulationEstimates {
    series: KeyedSeries<UnitId>,
    trends: BTreeMap<UnitId, Trend>,
}

impl PopulationEstimates {
    pub fn new(series: KeyedSeries<UnitId>) -> Self {
        let trends = series
            .0
            .iter()
            .filter_map(|(unit, s)| Trend::fit(s).map(|t| (unit.clone(), t)))
            .collect();
        Self { series, trends }
    }

    pub fn estimate(&self, unit: &UnitId, year: i32) -> Lookup<f64> {
        if let Lookup::Found(v) = self.series.exact(unit, year) {
            return Lookup::Found(v);
        }
        match self.trends.get(unit) {
            Some(trend) => Lookup::FallbackUsed(trend.predict(year).max(0.0).round(), Fallback::Trend),
            None => Lookup::Missing,
        }
    }
}

// ============================================================================
// Inter-governmental transfers
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TransferTable {
    by_year: BTreeMap<i32, BTreeMap<UnitId, f64>>,
}

impl TransferTable {
    pub fn new(series: KeyedSeries<UnitId>) -> Self {
        let mut by_year: BTreeMap<i32, BTreeMap<UnitId, f64>> = BTreeMap::new();
        for (unit, years) in series.0 {
            for (year, value) in years {
                by_year.entry(year).or_default().insert(unit.clone(), value);
            }
        }
        Self { by_year }
    }

    /// Normalised transfer shares of `units` for `year`, using the latest
    /// year of the table when `year` is absent. `Missing` when no listed
    /// unit has a positive value.
    pub fn shares(&self, units: &[UnitId], year: i32) -> Lookup<BTreeMap<UnitId, f64>> {
        let (rows, fallback) = match self.by_year.get(&year) {
            Some(rows) => (rows, None),
            None => match self.by_year.iter().next_back() {
                Some((latest, rows)) => (rows, Some(Fallback::LatestYear(*latest))),
                None => return Lookup::Missing,
            },
        };
        let values: BTreeMap<UnitId, f64> = units
            .iter()
            .filter_map(|u| rows.get(u).map(|v| (u.clone(), v.max(0.0))))
            .collect();
        let total: f64 = values.values().sum();
        if total <= 0.0 {
            return Lookup::Missing;
        }
        let shares = values.into_iter().map(|(u, v)| (u, v / total)).collect();
        match fallback {
            None => Lookup::Found(shares),
            Some(why) => Lookup::FallbackUsed(shares, why),
        }
    }
}
