//! Missions and their indices.
//!
//! Missions are kept forever in an append-only arena keyed by id. Two dense
//! index lists track the staked ones: per owner, and globally. Each mission
//! records its position in both so unstaking is a swap with the last entry.

use accrual_types::{Address, Amount, AssetClass, BlockNumber, UnitId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::errors::{MissionDefect, UnitGroup};

pub type MissionId = u64;

/// Units a staker proposes to lock as one mission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionCandidate {
    pub landers: Vec<UnitId>,
    pub sites: Vec<UnitId>,
    pub payloads: Vec<UnitId>,
}

impl MissionCandidate {
    pub fn new(landers: Vec<UnitId>, sites: Vec<UnitId>, payloads: Vec<UnitId>) -> Self {
        Self {
            landers,
            sites,
            payloads,
        }
    }

    /// Structural check: one lander, at most one site, at most `max_payloads` payloads.
    pub fn shape_defect(&self, max_payloads: usize) -> Option<MissionDefect> {
        if self.landers.len() != 1 {
            return Some(MissionDefect::LanderCount(self.landers.len()));
        }
        if self.sites.len() > 1 {
            return Some(MissionDefect::TooManySites(self.sites.len()));
        }
        if self.payloads.len() > max_payloads {
            return Some(MissionDefect::TooManyPayloads {
                count: self.payloads.len(),
                max: max_payloads,
            });
        }
        None
    }

    /// A full mission has a site and at least one payload.
    pub fn is_full(&self) -> bool {
        !self.landers.is_empty() && !self.sites.is_empty() && !self.payloads.is_empty()
    }

    pub fn groups(&self) -> [(UnitGroup, &[UnitId]); 3] {
        [
            (UnitGroup::Lander, self.landers.as_slice()),
            (UnitGroup::Site, self.sites.as_slice()),
            (UnitGroup::Payload, self.payloads.as_slice()),
        ]
    }
}

/// Asset classes of the three unit groups. Each is set at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetClasses {
    pub lander: Option<AssetClass>,
    pub site: Option<AssetClass>,
    pub payload: Option<AssetClass>,
}

impl AssetClasses {
    pub fn get(&self, group: UnitGroup) -> Option<&AssetClass> {
        match group {
            UnitGroup::Lander => self.lander.as_ref(),
            UnitGroup::Site => self.site.as_ref(),
            UnitGroup::Payload => self.payload.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, group: UnitGroup) -> &mut Option<AssetClass> {
        match group {
            UnitGroup::Lander => &mut self.lander,
            UnitGroup::Site => &mut self.site,
            UnitGroup::Payload => &mut self.payload,
        }
    }

    pub fn require(&self, group: UnitGroup) -> Result<&AssetClass, MissionDefect> {
        self.get(group).ok_or(MissionDefect::ClassNotConfigured(group))
    }
}

/// Outcome of appraising a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEvaluation {
    pub defect: Option<MissionDefect>,
    /// Mining power the candidate would carry; zero when invalid.
    pub mining_power: Amount,
    pub completion_bonus: bool,
}

impl CandidateEvaluation {
    pub fn is_valid(&self) -> bool {
        self.defect.is_none()
    }

    pub(crate) fn invalid(defect: MissionDefect) -> Self {
        Self {
            defect: Some(defect),
            mining_power: 0,
            completion_bonus: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub owner: Address,
    pub staked: bool,
    pub mining_power: Amount,
    pub units: MissionCandidate,
    pub staked_at: BlockNumber,
    pub unstaked_at: Option<BlockNumber>,
    /// Position in the owner's staked list; meaningful only while staked.
    pub owner_index: usize,
    /// Position in the global staked list; meaningful only while staked.
    pub active_index: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MissionBook {
    missions: Vec<Mission>,
    by_owner: HashMap<Address, Vec<MissionId>>,
    active: Vec<MissionId>,
}

impl MissionBook {
    pub fn get(&self, id: MissionId) -> Option<&Mission> {
        self.missions.get(usize::try_from(id).ok()?)
    }

    /// Number of missions ever staked.
    pub fn len(&self) -> usize {
        self.missions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.missions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mission> {
        self.missions.iter()
    }

    /// Staked missions of `owner`.
    pub fn staked_by(&self, owner: &Address) -> &[MissionId] {
        self.by_owner.get(owner).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All staked missions.
    pub fn active(&self) -> &[MissionId] {
        &self.active
    }

    pub(crate) fn get_mut(&mut self, id: MissionId) -> Option<&mut Mission> {
        self.missions.get_mut(usize::try_from(id).ok()?)
    }

    pub(crate) fn insert(
        &mut self,
        owner: Address,
        mining_power: Amount,
        units: MissionCandidate,
        block: BlockNumber,
    ) -> MissionId {
        let id = self.missions.len() as MissionId;
        let owned = self.by_owner.entry(owner).or_default();
        let mission = Mission {
            id,
            owner,
            staked: true,
            mining_power,
            units,
            staked_at: block,
            unstaked_at: None,
            owner_index: owned.len(),
            active_index: self.active.len(),
        };
        owned.push(id);
        self.active.push(id);
        self.missions.push(mission);
        id
    }

    /// Mark a staked mission unstaked and drop it from both indices.
    pub(crate) fn retire(&mut self, id: MissionId, block: BlockNumber) {
        let Some(mission) = self.get_mut(id) else {
            return;
        };
        if !mission.staked {
            return;
        }
        mission.staked = false;
        mission.unstaked_at = Some(block);
        let (owner, owner_index, active_index) = (mission.owner, mission.owner_index, mission.active_index);

        if let Some(owned) = self.by_owner.get_mut(&owner) {
            owned.swap_remove(owner_index);
            if let Some(moved) = owned.get(owner_index).copied() {
                if let Some(m) = self.missions.get_mut(moved as usize) {
                    m.owner_index = owner_index;
                }
            }
        }

        self.active.swap_remove(active_index);
        if let Some(moved) = self.active.get(active_index).copied() {
            if let Some(m) = self.missions.get_mut(moved as usize) {
                m.active_index = active_index;
            }
        }
    }
}
