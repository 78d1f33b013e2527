//! Regional Economy Simulation Engine
//!
//! Agent-based model of a region's municipalities: a synthesised population
//! of agents, households, dwellings and firms evolves month by month through
//! demographics, markets and fiscal redistribution. Agents live in a hecs
//! ECS world; the other entities sit in keyed arenas.

pub mod clock;
pub mod components;
pub mod config;
pub mod data;
pub mod entities;
pub mod error;
pub mod funds;
pub mod generator;
pub mod geography;
pub mod geometry;
pub mod markets;
pub mod persistence;
pub mod population;
pub mod region;
pub mod report;
pub mod rng;
pub mod shapes;
pub mod systems;
pub mod world;

#[cfg(test)]
pub(crate) mod fixtures;

pub use components::*;
pub use config::SimulationConfig;
pub use data::InputData;
pub use error::{Result, SimulationError};
pub use persistence::{ExportData, ImportResult, SaveStats};
pub use population::Population;
pub use report::MonthlyReport;
pub use world::{SimulationWorld, TickResult};
