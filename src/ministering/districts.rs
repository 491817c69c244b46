//! District membership and leaders.
//!
//! A companionship belongs to at most one district when it is placed with
//! [`DistrictManager::move_companionship`]. [`DistrictManager::toggle_companionship`]
//! is the raw per-district switch and does not enforce that.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{repo, DISTRICTS, MEMBERS};
use crate::config::MinisteringConfig;
use crate::domain::district::{district_name, sort_by_name, MinisteringDistrict};
use crate::store::{new_document_id, DocumentStore, SetOptions, StoreError, WriteOp};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DistrictBootstrap {
    pub districts: Vec<MinisteringDistrict>,
    pub created: usize,
    pub renamed: usize,
}

pub struct DistrictManager<'a> {
    store: &'a dyn DocumentStore,
    config: &'a MinisteringConfig,
}

fn ids_patch(ids: &[String]) -> Map<String, Value> {
    let mut patch = Map::new();
    patch.insert(
        "companionshipIds".to_string(),
        Value::Array(ids.iter().cloned().map(Value::String).collect()),
    );
    patch
}

impl<'a> DistrictManager<'a> {
    pub fn new(store: &'a dyn DocumentStore, config: &'a MinisteringConfig) -> Self {
        Self { store, config }
    }

    fn canonical_name(&self, number: usize) -> String {
        district_name(&self.config.district_name_template, number)
    }

    /// Districts sorted by name.
    pub fn list(&self) -> Result<Vec<MinisteringDistrict>, StoreError> {
        let mut districts = repo::load_districts(self.store)?;
        sort_by_name(&mut districts, &self.config.district_name_template);
        Ok(districts)
    }

    /// Creates the default districts on an empty install, otherwise renames
    /// districts whose name drifted from the sequence. Each path is one batch.
    pub fn ensure_districts(&self) -> Result<DistrictBootstrap, StoreError> {
        let mut districts = self.list()?;

        if districts.is_empty() {
            let count = self.config.default_district_count;
            let mut ops = Vec::with_capacity(count);
            for number in 1..=count {
                let district = MinisteringDistrict {
                    id: new_document_id(),
                    name: self.canonical_name(number),
                    companionship_ids: Vec::new(),
                    leader_id: None,
                    leader_name: None,
                    created_at: None,
                };
                ops.push(WriteOp::set(
                    DISTRICTS,
                    &district.id,
                    repo::district_data(&district)?,
                    SetOptions::overwrite(),
                ));
            }
            self.store.commit_batch(&ops)?;
            info!(count, "created default ministering districts");
            return Ok(DistrictBootstrap {
                districts: self.list()?,
                created: count,
                renamed: 0,
            });
        }

        let mut ops = Vec::new();
        for (index, district) in districts.iter_mut().enumerate() {
            let canonical = self.canonical_name(index + 1);
            if district.name != canonical {
                let mut patch = Map::new();
                patch.insert("name".to_string(), Value::String(canonical.clone()));
                ops.push(WriteOp::update(DISTRICTS, &district.id, patch));
                debug!(
                    district_id = %district.id,
                    from = %district.name,
                    to = %canonical,
                    "renaming district"
                );
                district.name = canonical;
            }
        }

        let renamed = ops.len();
        if renamed > 0 {
            self.store.commit_batch(&ops)?;
            info!(renamed, "repaired ministering district names");
        }
        Ok(DistrictBootstrap {
            districts,
            created: 0,
            renamed,
        })
    }

    /// Flips membership in one district. Returns whether the companionship is
    /// now a member.
    pub fn toggle_companionship(
        &self,
        district_id: &str,
        companionship_id: &str,
    ) -> Result<bool, StoreError> {
        let district = repo::require_district(self.store, district_id)?;
        let (ids, member) = if district.contains(companionship_id) {
            let ids = district
                .companionship_ids
                .iter()
                .filter(|id| id.as_str() != companionship_id)
                .cloned()
                .collect::<Vec<_>>();
            (ids, false)
        } else {
            let mut ids = district.companionship_ids.clone();
            ids.push(companionship_id.to_string());
            (ids, true)
        };
        self.store.update(DISTRICTS, district_id, &ids_patch(&ids))?;
        debug!(district_id, companionship_id, member, "toggled district membership");
        Ok(member)
    }

    /// Removes the companionship from every district holding it and adds it
    /// to `target`, in one batch. `None` leaves it unassigned.
    pub fn move_companionship(
        &self,
        companionship_id: &str,
        target: Option<&str>,
    ) -> Result<(), StoreError> {
        let districts = repo::load_districts(self.store)?;
        if let Some(target_id) = target {
            if !districts.iter().any(|district| district.id == target_id) {
                return Err(StoreError::NotFound {
                    collection: DISTRICTS.to_string(),
                    id: target_id.to_string(),
                });
            }
        }

        let mut ops = Vec::new();
        for district in &districts {
            let is_target = Some(district.id.as_str()) == target;
            let holds = district.contains(companionship_id);
            let next = match (holds, is_target) {
                (true, false) => district
                    .companionship_ids
                    .iter()
                    .filter(|id| id.as_str() != companionship_id)
                    .cloned()
                    .collect::<Vec<_>>(),
                (false, true) => {
                    let mut ids = district.companionship_ids.clone();
                    ids.push(companionship_id.to_string());
                    ids
                }
                _ => continue,
            };
            ops.push(WriteOp::update(DISTRICTS, &district.id, ids_patch(&next)));
        }

        if !ops.is_empty() {
            self.store.commit_batch(&ops)?;
        }
        debug!(companionship_id, target = ?target, writes = ops.len(), "moved companionship");
        Ok(())
    }

    pub fn detach_companionship(&self, companionship_id: &str) -> Result<(), StoreError> {
        self.move_companionship(companionship_id, None)
    }

    pub fn district_of(
        &self,
        companionship_id: &str,
    ) -> Result<Option<MinisteringDistrict>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .find(|district| district.contains(companionship_id)))
    }

    /// Stores the leader's current full name alongside the id. Passing `None`
    /// clears both fields.
    pub fn assign_leader(
        &self,
        district_id: &str,
        leader_id: Option<&str>,
    ) -> Result<MinisteringDistrict, StoreError> {
        let mut district = repo::require_district(self.store, district_id)?;
        let leader = match leader_id {
            Some(id) => Some(repo::get_member(self.store, id)?.ok_or_else(|| {
                StoreError::NotFound {
                    collection: MEMBERS.to_string(),
                    id: id.to_string(),
                }
            })?),
            None => None,
        };

        district.leader_id = leader.as_ref().map(|member| member.id.clone());
        district.leader_name = leader.as_ref().map(|member| member.full_name());

        let mut patch = Map::new();
        patch.insert(
            "leaderId".to_string(),
            district.leader_id.clone().map_or(Value::Null, Value::String),
        );
        patch.insert(
            "leaderName".to_string(),
            district.leader_name.clone().map_or(Value::Null, Value::String),
        );
        self.store.update(DISTRICTS, district_id, &patch)?;
        info!(district_id, leader = ?district.leader_name, "district leader updated");
        Ok(district)
    }

    /// Adds a district named after the next unused number in the sequence.
    pub fn add_district(&self) -> Result<MinisteringDistrict, StoreError> {
        let existing = repo::load_districts(self.store)?;
        let mut number = existing.len() + 1;
        while existing
            .iter()
            .any(|district| district.name == self.canonical_name(number))
        {
            number += 1;
        }

        let mut district = MinisteringDistrict {
            id: new_document_id(),
            name: self.canonical_name(number),
            companionship_ids: Vec::new(),
            leader_id: None,
            leader_name: None,
            created_at: None,
        };
        self.store.set(
            DISTRICTS,
            &district.id,
            &repo::district_data(&district)?,
            SetOptions::overwrite(),
        )?;
        if let Some(stored) = self.store.get(DISTRICTS, &district.id)? {
            district = repo::decode_district(&stored)?;
        }
        info!(district_id = %district.id, name = %district.name, "district added");
        Ok(district)
    }

    /// Deletes the district. Its companionships become unassigned.
    pub fn remove_district(&self, district_id: &str) -> Result<MinisteringDistrict, StoreError> {
        let district = repo::require_district(self.store, district_id)?;
        self.store.delete(DISTRICTS, district_id)?;
        info!(district_id, name = %district.name, "district removed");
        Ok(district)
    }
}
