//! Small in-memory data set shared by the unit tests: two groups and three
//! units (two squares and an L-shape).

use std::collections::BTreeMap;

use crate::components::{GroupId, UnitId};
use crate::config::SimulationConfig;
use crate::data::tables::{AgeBracket, EmployeeCounts, FirmBaseline};
use crate::data::{
    AgeRates, EducationTable, FertilityTable, FirmGrowthStatistics, GenderCounts, GenderSeries,
    InputData, KeyedSeries, MortalityTable, PopulationCounts, PopulationEstimates, TransferTable,
    UnionRates,
};
use crate::geography::{Geography, UnitRecord};
use crate::shapes::{ShapeProvider, ShapeRecord};

pub const YEAR: i32 = 2014;

pub fn unit(id: &str) -> UnitId {
    UnitId::new(id)
}

fn rates(points: &[(u32, f64)]) -> AgeRates {
    AgeRates(points.iter().copied().collect())
}

fn yearly<T: Clone>(value: T) -> BTreeMap<i32, T> {
    [(YEAR, value)].into_iter().collect()
}

fn square(x: f64, y: f64, side: f64) -> Vec<[f64; 2]> {
    vec![[x, y], [x + side, y], [x + side, y + side], [x, y + side]]
}

pub fn data() -> InputData {
    let ids = ["AA01", "AA02", "BB01"];
    let units = vec![
        UnitRecord {
            id: unit("AA01"),
            name: Some("Alpha".into()),
            group: Some(GroupId::new("AA")),
        },
        UnitRecord {
            id: unit("AA02"),
            name: Some("Beta".into()),
            group: Some(GroupId::new("AA")),
        },
        UnitRecord {
            id: unit("BB01"),
            name: None,
            group: None,
        },
    ];

    let mut shapes = BTreeMap::new();
    shapes.insert(
        unit("AA01"),
        ShapeRecord {
            polygon: vec![square(0.0, 0.0, 10.0)],
            urban: Some(vec![square(2.0, 2.0, 3.0)]),
        },
    );
    shapes.insert(
        unit("AA02"),
        ShapeRecord {
            polygon: vec![vec![[10.0, 0.0], [20.0, 0.0], [20.0, 5.0], [15.0, 5.0], [15.0, 10.0], [10.0, 10.0]]],
            urban: None,
        },
    );
    shapes.insert(
        unit("BB01"),
        ShapeRecord {
            polygon: vec![square(0.0, 10.0, 8.0)],
            urban: Some(vec![square(1.0, 11.0, 2.0)]),
        },
    );

    let counts = GenderCounts {
        male: vec![100.0, 150.0, 200.0, 80.0],
        female: vec![95.0, 160.0, 210.0, 100.0],
    };
    let population = PopulationCounts {
        brackets: vec![
            AgeBracket { min: 0, max: 14 },
            AgeBracket { min: 15, max: 29 },
            AgeBracket { min: 30, max: 59 },
            AgeBracket { min: 60, max: 89 },
        ],
        units: ids.iter().map(|id| (unit(id), yearly(counts.clone()))).collect(),
    };

    let death = GenderSeries {
        male: yearly(rates(&[(0, 0.004), (50, 0.01), (70, 0.05), (85, 0.2)])),
        female: yearly(rates(&[(0, 0.003), (50, 0.008), (70, 0.04), (85, 0.18)])),
    };
    let mortality = MortalityTable(
        ["AA", "BB"]
            .iter()
            .map(|g| (GroupId::new(*g), death.clone()))
            .collect(),
    );
    let fertility = FertilityTable(
        [(GroupId::new("AA"), yearly(rates(&[(15, 0.06), (35, 0.03), (45, 0.0)])))]
            .into_iter()
            .collect(),
    );

    let education = EducationTable(
        [(
            GroupId::new("AA"),
            yearly([(1u8, 0.2), (2, 0.3), (3, 0.3), (4, 0.15), (5, 0.05)].into_iter().collect()),
        )]
        .into_iter()
        .collect(),
    );

    let keyed = |values: &[(&str, f64)]| -> KeyedSeries<UnitId> {
        KeyedSeries(values.iter().map(|(id, v)| (unit(id), yearly(*v))).collect())
    };

    let firms = FirmGrowthStatistics::from_baseline(FirmBaseline {
        t0_year: 2010,
        t1_year: 2015,
        units: ids
            .iter()
            .map(|id| (unit(id), EmployeeCounts { t0: 120.0, t1: 180.0 }))
            .collect(),
    });

    let estimates = PopulationEstimates::new(KeyedSeries(
        ids.iter()
            .map(|id| (unit(id), [(2010, 1000.0), (2012, 1100.0), (2013, 1150.0)].into_iter().collect()))
            .collect(),
    ));

    InputData {
        units,
        shapes,
        population,
        mortality,
        fertility,
        hdi: keyed(&[("AA01", 0.8), ("AA02", 0.7)]),
        education,
        household_size: KeyedSeries(
            [(GroupId::new("AA"), yearly(2.8))].into_iter().collect(),
        ),
        firms,
        estimates,
        transfers: TransferTable::new(keyed(&[("AA01", 3.0), ("BB01", 1.0)])),
        urban: keyed(&[("AA01", 70.0), ("BB01", 0.4)]),
        unions: Some(UnionRates {
            male: rates(&[(18, 0.2), (40, 0.1), (60, 0.02)]),
            female: rates(&[(18, 0.25), (40, 0.1), (60, 0.02)]),
        }),
    }
}

pub fn config() -> SimulationConfig {
    SimulationConfig {
        seed: Some(7),
        total_days: 120,
        sampling_percentage: 0.1,
        ..SimulationConfig::default()
    }
}

pub fn geography(data: &InputData, config: &SimulationConfig) -> Geography {
    match Geography::new(&data.units, &config.units) {
        Ok(g) => g,
        Err(e) => panic!("fixture geography: {}", e),
    }
}

pub fn shapes(data: &InputData) -> ShapeProvider {
    let parsed: Vec<_> = data
        .shapes
        .iter()
        .map(|(id, s)| (id.clone(), s.polygon(), s.urban()))
        .collect();
    ShapeProvider::new(parsed.iter().map(|(id, p, u)| (id, p, u.as_ref())))
}
