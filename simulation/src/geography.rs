//! Geography registry
//!
//! Resolves which administrative units take part in a run and which parent
//! group each belongs to.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::components::{GroupId, UnitId};
use crate::config::UnitSelection;
use crate::error::GeographyError;

/// Length of the id prefix that identifies the parent group when a record
/// does not name one.
const GROUP_PREFIX_LEN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: UnitId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub group: Option<GroupId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInfo {
    pub id: UnitId,
    pub name: String,
    pub group: GroupId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Geography {
    units: BTreeMap<UnitId, UnitInfo>,
    groups: BTreeMap<GroupId, Vec<UnitId>>,
}

impl Geography {
    /// Selects units from `records`. Unknown requested ids are reported and
    /// skipped; an empty selection is an error.
    pub fn new(records: &[UnitRecord], selection: &UnitSelection) -> Result<Self, GeographyError> {
        let wanted: Option<BTreeSet<&UnitId>> = match selection {
            UnitSelection::All => None,
            UnitSelection::Only(ids) => {
                let known: BTreeSet<&UnitId> = records.iter().map(|r| &r.id).collect();
                for id in ids.iter().filter(|id| !known.contains(id)) {
                    warn!("Requested unit {} is not in the unit table", id);
                }
                Some(ids.iter().collect())
            }
        };

        let mut units = BTreeMap::new();
        let mut missing_group = 0usize;
        for record in records {
            if wanted.as_ref().map_or(false, |w| !w.contains(&record.id)) {
                continue;
            }
            let group = match &record.group {
                Some(g) => g.clone(),
                None => {
                    missing_group += 1;
                    GroupId::new(record.id.0.chars().take(GROUP_PREFIX_LEN).collect::<String>())
                }
            };
            let info = UnitInfo {
                id: record.id.clone(),
                name: record.name.clone().unwrap_or_else(|| record.id.0.clone()),
                group,
            };
            units.insert(record.id.clone(), info);
        }
        if missing_group > 0 {
            warn!("{} unit(s) without a group, using id prefix", missing_group);
        }
        if units.is_empty() {
            return Err(GeographyError::NoUnitsSelected {
                requested: match selection {
                    UnitSelection::All => records.len(),
                    UnitSelection::Only(ids) => ids.len(),
                },
                available: records.len(),
            });
        }

        let geography = Self::from_units(units.into_values());
        info!(
            "Geography: {} units in {} groups",
            geography.units.len(),
            geography.groups.len()
        );
        Ok(geography)
    }

    fn from_units(units: impl IntoIterator<Item = UnitInfo>) -> Self {
        let units: BTreeMap<UnitId, UnitInfo> =
            units.into_iter().map(|u| (u.id.clone(), u)).collect();
        let mut groups: BTreeMap<GroupId, Vec<UnitId>> = BTreeMap::new();
        for info in units.values() {
            groups.entry(info.group.clone()).or_default().push(info.id.clone());
        }
        Self { units, groups }
    }

    /// Drops units for which `keep` is false (e.g. units without a shape).
    pub fn retain(&mut self, mut keep: impl FnMut(&UnitId) -> bool) {
        let kept: Vec<UnitInfo> = self
            .units
            .values()
            .filter(|u| keep(&u.id))
            .cloned()
            .collect();
        *self = Self::from_units(kept);
    }

    pub fn group_of(&self, unit: &UnitId) -> Option<&GroupId> {
        self.units.get(unit).map(|u| &u.group)
    }

    pub fn unit(&self, unit: &UnitId) -> Option<&UnitInfo> {
        self.units.get(unit)
    }

    /// Units in id order.
    pub fn units(&self) -> impl Iterator<Item = &UnitInfo> {
        self.units.values()
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().cloned().collect()
    }

    pub fn groups(&self) -> &BTreeMap<GroupId, Vec<UnitId>> {
        &self.groups
    }

    pub fn units_in(&self, group: &GroupId) -> &[UnitId] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
