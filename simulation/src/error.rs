//! Error types
//!
//! Missing data is not an error (see `data::Lookup`). The enums here cover
//! conditions that stop a run: bad configuration, unreadable required tables,
//! broken referential invariants and snapshot I/O.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::components::{AgentId, DwellingId, FirmId, HouseholdId, UnitId};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid parameter `{name}`: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum DataError {
    #[error("required table `{table}` could not be read from {path}: {source}")]
    Read {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("table `{table}` at {path} is malformed: {source}")]
    Parse {
        table: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum GeographyError {
    #[error("no administrative unit selected (requested {requested} ids, {available} available)")]
    NoUnitsSelected { requested: usize, available: usize },
    #[error("no selected unit has a shape")]
    NoShapes,
}

#[derive(Debug, Error, PartialEq)]
pub enum PopulationError {
    #[error("unknown agent {0:?}")]
    UnknownAgent(AgentId),
    #[error("unknown household {0:?}")]
    UnknownHousehold(HouseholdId),
    #[error("unknown dwelling {0:?}")]
    UnknownDwelling(DwellingId),
    #[error("unknown firm {0:?}")]
    UnknownFirm(FirmId),
    #[error("agent {agent:?} already belongs to household {household:?}")]
    AlreadyInHousehold {
        agent: AgentId,
        household: HouseholdId,
    },
    #[error("dwelling {0:?} is already occupied")]
    Occupied(DwellingId),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("dwelling #{index} in unit {unit} has no owner after allocation")]
    OwnerlessDwelling { unit: UnitId, index: usize },
    #[error("invalid distribution: {0}")]
    Distribution(String),
    #[error(transparent)]
    Population(#[from] PopulationError),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] bincode::Error),
    #[error("snapshot JSON failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported snapshot version {0}")]
    Version(u8),
    #[error("snapshot breaks {} referential invariant(s), first: {:?}", .0.len(), .0.first())]
    Inconsistent(Vec<InvariantViolation>),
}

/// A broken referential invariant found by `Population::check_invariants`.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    EmptyHousehold(HouseholdId),
    MemberMismatch {
        agent: AgentId,
        household: HouseholdId,
    },
    DanglingMember {
        agent: AgentId,
        household: HouseholdId,
    },
    DanglingOwner(DwellingId),
    OwnershipMismatch {
        dwelling: DwellingId,
        household: HouseholdId,
    },
    ResidenceMismatch {
        dwelling: DwellingId,
        household: HouseholdId,
    },
    DanglingEmployee {
        agent: AgentId,
        firm: FirmId,
    },
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Geography(#[from] GeographyError),
    #[error(transparent)]
    Population(#[from] PopulationError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("{} invariant violation(s), first: {:?}", .0.len(), .0.first())]
    Invariant(Vec<InvariantViolation>),
    #[error("report output failed at {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T, E = SimulationError> = std::result::Result<T, E>;
