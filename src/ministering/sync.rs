//! Mirrors companionship membership into `Member.ministeringTeachers`.
//!
//! Every write is a targeted single-member update. Failures are logged and
//! collected in [`SyncReport`]; they never undo the companionship write that
//! triggered the sync.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use super::{legacy, repo, MEMBERS};
use crate::domain::companionship::FamilyAssignment;
use crate::domain::member::Member;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncReport {
    pub updated_members: Vec<String>,
    pub unchanged_members: Vec<String>,
    pub skipped_families: Vec<String>,
    pub failures: Vec<SyncFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncFailure {
    pub family: String,
    pub member_id: Option<String>,
    pub error: String,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn merge(&mut self, other: SyncReport) {
        self.updated_members.extend(other.updated_members);
        self.unchanged_members.extend(other.unchanged_members);
        self.skipped_families.extend(other.skipped_families);
        self.failures.extend(other.failures);
    }
}

/// Old and new shape of an edited companionship.
#[derive(Debug, Clone, Copy)]
pub struct CompanionshipChange<'a> {
    pub old_companions: &'a [String],
    pub new_companions: &'a [String],
    pub old_families: &'a [FamilyAssignment],
    pub new_families: &'a [FamilyAssignment],
}

/// Union preserving the existing order.
pub fn merge_teachers(current: &[String], added: &[String]) -> Vec<String> {
    let mut next = Vec::with_capacity(current.len() + added.len());
    for name in current.iter().chain(added) {
        if !next.contains(name) {
            next.push(name.clone());
        }
    }
    next
}

pub fn remove_teachers(current: &[String], removed: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|name| !removed.contains(name))
        .cloned()
        .collect()
}

/// Drops companions that left the companionship, then adds the current ones.
pub fn replace_teachers(current: &[String], old: &[String], new: &[String]) -> Vec<String> {
    let departed = old
        .iter()
        .filter(|name| !new.contains(name))
        .cloned()
        .collect::<Vec<_>>();
    merge_teachers(&remove_teachers(current, &departed), new)
}

pub struct ReverseSync<'a> {
    store: &'a dyn DocumentStore,
    family_prefix: &'a str,
}

impl<'a> ReverseSync<'a> {
    pub fn new(store: &'a dyn DocumentStore, family_prefix: &'a str) -> Self {
        Self {
            store,
            family_prefix,
        }
    }

    /// New companionship: its companions start ministering to every family.
    pub fn add_teachers_to_families(
        &self,
        companions: &[String],
        families: &[FamilyAssignment],
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for family in families {
            self.apply("add_teachers", family, &mut report, |current| {
                merge_teachers(current, companions)
            });
        }
        report
    }

    pub fn update_teachers_on_companionship_change(
        &self,
        change: &CompanionshipChange<'_>,
    ) -> SyncReport {
        let new_names = change
            .new_families
            .iter()
            .map(|family| family.name.as_str())
            .collect::<HashSet<_>>();

        let removed = change
            .old_families
            .iter()
            .filter(|family| !new_names.contains(family.name.as_str()))
            .cloned()
            .collect::<Vec<_>>();

        let mut report = self.remove_teachers_from_families(change.old_companions, &removed);

        let mut kept = SyncReport::default();
        for family in change.new_families {
            self.apply("replace_teachers", family, &mut kept, |current| {
                replace_teachers(current, change.old_companions, change.new_companions)
            });
        }
        report.merge(kept);
        report
    }

    /// Companionship deleted or families dropped: strip these companions.
    pub fn remove_teachers_from_families(
        &self,
        companions: &[String],
        families: &[FamilyAssignment],
    ) -> SyncReport {
        let mut report = SyncReport::default();
        for family in families {
            self.apply("remove_teachers", family, &mut report, |current| {
                remove_teachers(current, companions)
            });
        }
        report
    }

    fn resolve(&self, family: &FamilyAssignment) -> Result<Option<Member>, StoreError> {
        match family.member_id.as_deref() {
            Some(member_id) => repo::get_member(self.store, member_id),
            None => {
                legacy::resolve_member_by_family_name(self.store, &family.name, self.family_prefix)
            }
        }
    }

    fn apply(
        &self,
        operation: &'static str,
        family: &FamilyAssignment,
        report: &mut SyncReport,
        edit: impl Fn(&[String]) -> Vec<String>,
    ) {
        let member = match self.resolve(family) {
            Ok(Some(member)) => member,
            Ok(None) => {
                debug!(operation, family = %family.name, "no member for family; skipping");
                report.skipped_families.push(family.name.clone());
                return;
            }
            Err(err) => {
                warn!(operation, family = %family.name, error = %err, "member lookup failed");
                report.failures.push(SyncFailure {
                    family: family.name.clone(),
                    member_id: family.member_id.clone(),
                    error: err.to_string(),
                });
                return;
            }
        };

        let next = edit(&member.ministering_teachers);
        if next == member.ministering_teachers {
            report.unchanged_members.push(member.id);
            return;
        }

        match self
            .store
            .update(MEMBERS, &member.id, &repo::teachers_patch(&next))
        {
            Ok(()) => {
                debug!(
                    operation,
                    member_id = %member.id,
                    teachers = ?next,
                    "ministering teachers updated"
                );
                report.updated_members.push(member.id);
            }
            Err(err) => {
                warn!(
                    operation,
                    member_id = %member.id,
                    family = %family.name,
                    error = %err,
                    "ministering teachers update failed"
                );
                report.failures.push(SyncFailure {
                    family: family.name.clone(),
                    member_id: Some(member.id),
                    error: err.to_string(),
                });
            }
        }
    }
}
