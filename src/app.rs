use std::error::Error;
use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info, warn};

use crate::config::{ConfigError, QuorumConfig};
use crate::domain::companionship::{Companionship, Family, FamilyAssignment};
use crate::domain::district::MinisteringDistrict;
use crate::domain::history::{MinisteringHistory, MonthKey};
use crate::domain::member::{Member, MemberStatus};
use crate::ministering::districts::DistrictManager;
use crate::ministering::rollover::{self, RolloverOutcome, RolloverPolicy, RolloverReport};
use crate::ministering::stats::{self, DistrictProgress, MinisteringStats, UrgentNeed};
use crate::ministering::sync::{CompanionshipChange, ReverseSync, SyncReport};
use crate::ministering::validator::{
    validate_assignment, validate_with_store, AssignmentIssue, AssignmentProposal, Validation,
};
use crate::ministering::{repo, COMPANIONSHIPS, DISTRICTS, HISTORY, MEMBERS};
use crate::store::sqlite::SqliteStore;
use crate::store::{new_document_id, DocumentStore, SetOptions, StoreError};

pub struct App {
    store: SqliteStore,
    config: QuorumConfig,
}

/// A family picked on the add/edit form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyInput {
    /// Household of a member in the directory; always carries `memberId`.
    Member(String),
    /// Free-text label for a household outside the directory.
    Manual(String),
}

#[derive(Debug, Clone)]
pub struct NewCompanionship {
    pub companions: Vec<String>,
    pub families: Vec<FamilyInput>,
    pub district: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistrictChange {
    Keep,
    Clear,
    MoveTo(String),
}

#[derive(Debug, Clone)]
pub struct CompanionshipPatch {
    pub companions: Option<Vec<String>>,
    pub add_families: Vec<FamilyInput>,
    pub remove_families: Vec<String>,
    pub district: DistrictChange,
}

impl CompanionshipPatch {
    fn has_changes(&self) -> bool {
        self.companions.is_some()
            || !self.add_families.is_empty()
            || !self.remove_families.is_empty()
            || self.district != DistrictChange::Keep
    }
}

#[derive(Debug, Clone)]
pub enum SaveOutcome {
    Saved {
        companionship: Companionship,
        sync: SyncReport,
        /// Set when the save landed but the district change did not.
        placement_error: Option<String>,
    },
    Rejected(AssignmentIssue),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteSummary {
    pub companionship: Companionship,
    pub sync: SyncReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct MinisteringPage {
    pub companionships: Vec<Companionship>,
    pub districts: Vec<MinisteringDistrict>,
    pub stats: MinisteringStats,
    pub progress: Vec<DistrictProgress>,
    pub urgent: Vec<UrgentNeed>,
    pub rollover: Option<RolloverReport>,
    pub marker_seeded: bool,
    pub districts_created: usize,
    pub districts_renamed: usize,
}

impl App {
    pub fn open(db_path: &str, config: QuorumConfig) -> Result<Self, AppError> {
        ensure_parent_dir(db_path)?;
        let store = SqliteStore::open(db_path)?;
        Ok(Self { store, config })
    }

    #[cfg(test)]
    pub fn open_in_memory(config: QuorumConfig) -> Result<Self, AppError> {
        Ok(Self {
            store: SqliteStore::open_in_memory()?,
            config,
        })
    }

    #[cfg(test)]
    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    fn family_prefix(&self) -> &str {
        &self.config.ministering.family_name_prefix
    }

    fn districts(&self) -> DistrictManager<'_> {
        DistrictManager::new(&self.store, &self.config.ministering)
    }

    fn reverse_sync(&self) -> ReverseSync<'_> {
        ReverseSync::new(&self.store, self.family_prefix())
    }

    pub fn add_member(
        &self,
        first_name: &str,
        last_name: &str,
        status: MemberStatus,
    ) -> Result<Member, AppError> {
        let first_name = non_empty(first_name).ok_or_else(|| {
            AppError::InvalidArgument("member first name cannot be empty".to_string())
        })?;
        let last_name = non_empty(last_name).ok_or_else(|| {
            AppError::InvalidArgument("member last name cannot be empty".to_string())
        })?;

        let member = Member {
            id: new_document_id(),
            first_name,
            last_name,
            status,
            ministering_teachers: Vec::new(),
        };
        self.store.set(
            MEMBERS,
            &member.id,
            &repo::member_data(&member)?,
            SetOptions::overwrite(),
        )?;
        info!(member_id = %member.id, name = %member.full_name(), "member added");
        Ok(member)
    }

    pub fn list_members(&self) -> Result<Vec<Member>, AppError> {
        Ok(repo::load_members(&self.store)?)
    }

    pub fn members_taught_by(&self, companion: &str) -> Result<Vec<Member>, AppError> {
        let companion = non_empty(companion).ok_or_else(|| {
            AppError::InvalidArgument("companion name cannot be empty".to_string())
        })?;
        Ok(repo::members_taught_by(&self.store, &companion)?)
    }

    pub fn show_member(&self, id: &str) -> Result<Option<Member>, AppError> {
        Ok(repo::get_member(&self.store, id)?)
    }

    pub fn list_companionships(&self) -> Result<Vec<Companionship>, AppError> {
        Ok(repo::load_companionships(&self.store)?)
    }

    pub fn show_companionship(&self, id: &str) -> Result<Option<Companionship>, AppError> {
        Ok(repo::get_companionship(&self.store, id)?)
    }

    fn resolve_families(&self, inputs: &[FamilyInput]) -> Result<Vec<FamilyAssignment>, AppError> {
        let mut resolved = Vec::with_capacity(inputs.len());
        for input in inputs {
            match input {
                FamilyInput::Member(member_id) => {
                    let member = repo::get_member(&self.store, member_id)?.ok_or_else(|| {
                        AppError::NotFound {
                            kind: "member",
                            id: member_id.clone(),
                        }
                    })?;
                    if !member.status.is_assignable() {
                        return Err(AppError::InvalidArgument(format!(
                            "member '{}' is {} and cannot be assigned as a family",
                            member.full_name(),
                            member.status
                        )));
                    }
                    resolved.push(FamilyAssignment::new(
                        &member.family_name(self.family_prefix()),
                        Some(&member.id),
                    ));
                }
                FamilyInput::Manual(name) => {
                    let name = non_empty(name).ok_or_else(|| {
                        AppError::InvalidArgument("family name cannot be empty".to_string())
                    })?;
                    resolved.push(FamilyAssignment::new(&name, None));
                }
            }
        }
        Ok(resolved)
    }

    /// Validates and writes in one transaction, then mirrors companions into
    /// member records and places the companionship in its district.
    pub fn create_companionship(&self, input: NewCompanionship) -> Result<SaveOutcome, AppError> {
        let families = self.resolve_families(&input.families)?;
        if let Some(district_id) = input.district.as_deref() {
            repo::require_district(&self.store, district_id)?;
        }

        let proposal = AssignmentProposal::new(&input.companions, families);
        let draft = Companionship {
            id: new_document_id(),
            companions: proposal.companions.clone(),
            families: proposal
                .families
                .iter()
                .map(|family| Family::new(&family.name, family.member_id.as_deref()))
                .collect(),
            created_at: None,
            updated_at: None,
        };

        let mut verdict = None;
        self.store.run_atomic(&mut |store: &dyn DocumentStore| {
            let validation = validate_with_store(store, &proposal, None)?;
            if validation.is_valid() {
                store.set(
                    COMPANIONSHIPS,
                    &draft.id,
                    &repo::companionship_data(&draft)?,
                    SetOptions::overwrite(),
                )?;
            }
            verdict = Some(validation);
            Ok(())
        })?;
        if let Some(Validation::Rejected(issue)) = verdict {
            info!(reason = %issue, "companionship rejected");
            return Ok(SaveOutcome::Rejected(issue));
        }

        let sync = self
            .reverse_sync()
            .add_teachers_to_families(&proposal.companions, &proposal.families);
        log_sync("create", &draft.id, &sync);

        let placement = match input.district {
            Some(district_id) => DistrictChange::MoveTo(district_id),
            None => DistrictChange::Keep,
        };
        let placement_error = self.place_in_district("create", &draft.id, &placement);

        let companionship = repo::require_companionship(&self.store, &draft.id)?;
        info!(
            companionship_id = %companionship.id,
            label = %companionship.label(),
            families = companionship.families.len(),
            "companionship created"
        );
        Ok(SaveOutcome::Saved {
            companionship,
            sync,
            placement_error,
        })
    }

    /// Applies a district change after the companionship itself is committed.
    /// A failure here does not undo the save; it is logged and handed back.
    fn place_in_district(
        &self,
        operation: &str,
        companionship_id: &str,
        change: &DistrictChange,
    ) -> Option<String> {
        let result = match change {
            DistrictChange::Keep => return None,
            DistrictChange::Clear => self.districts().detach_companionship(companionship_id),
            DistrictChange::MoveTo(district_id) => self
                .districts()
                .move_companionship(companionship_id, Some(district_id)),
        };
        match result {
            Ok(()) => None,
            Err(err) => {
                warn!(
                    operation,
                    companionship_id,
                    error = %err,
                    "companionship saved but district placement failed"
                );
                Some(err.to_string())
            }
        }
    }

    pub fn update_companionship(
        &self,
        id: &str,
        patch: CompanionshipPatch,
    ) -> Result<SaveOutcome, AppError> {
        if !patch.has_changes() {
            return Err(AppError::InvalidArgument(
                "update requires at least one change".to_string(),
            ));
        }
        let added = self.resolve_families(&patch.add_families)?;
        if let DistrictChange::MoveTo(district_id) = &patch.district {
            repo::require_district(&self.store, district_id)?;
        }

        let mut verdict = None;
        let mut edited = None;
        let mut unknown_family = None;
        self.store.run_atomic(&mut |store: &dyn DocumentStore| {
            let existing = repo::load_companionships(store)?;
            let current = existing
                .iter()
                .find(|companionship| companionship.id == id)
                .cloned()
                .ok_or_else(|| StoreError::NotFound {
                    collection: COMPANIONSHIPS.to_string(),
                    id: id.to_string(),
                })?;

            let next = match apply_patch(&current, &patch, &added) {
                Ok(next) => next,
                Err(name) => {
                    unknown_family = Some(name);
                    return Ok(());
                }
            };
            let proposal = AssignmentProposal::new(
                &next.companions,
                next.families.iter().map(Family::assignment).collect(),
            );
            let validation = validate_assignment(&existing, &proposal, Some(id));
            if validation.is_valid() {
                let next = Companionship {
                    companions: proposal.companions.clone(),
                    ..next
                };
                store.set(
                    COMPANIONSHIPS,
                    id,
                    &repo::companionship_data(&next)?,
                    SetOptions::overwrite(),
                )?;
                edited = Some((current, next));
            }
            verdict = Some(validation);
            Ok(())
        })?;
        if let Some(name) = unknown_family {
            return Err(AppError::NotFound {
                kind: "family",
                id: name,
            });
        }
        if let Some(Validation::Rejected(issue)) = verdict {
            info!(companionship_id = id, reason = %issue, "companionship edit rejected");
            return Ok(SaveOutcome::Rejected(issue));
        }

        let sync = match &edited {
            Some((old, new)) => {
                let old_families = old.families.iter().map(Family::assignment).collect::<Vec<_>>();
                let new_families = new.families.iter().map(Family::assignment).collect::<Vec<_>>();
                self.reverse_sync()
                    .update_teachers_on_companionship_change(&CompanionshipChange {
                        old_companions: &old.companions,
                        new_companions: &new.companions,
                        old_families: &old_families,
                        new_families: &new_families,
                    })
            }
            None => SyncReport::default(),
        };
        log_sync("update", id, &sync);

        let placement_error = self.place_in_district("update", id, &patch.district);

        let companionship = repo::require_companionship(&self.store, id)?;
        info!(companionship_id = id, label = %companionship.label(), "companionship updated");
        Ok(SaveOutcome::Saved {
            companionship,
            sync,
            placement_error,
        })
    }

    /// Removes the companions from each family's teachers, detaches the
    /// companionship from its districts, then deletes it.
    pub fn delete_companionship(&self, id: &str) -> Result<DeleteSummary, AppError> {
        let companionship = repo::require_companionship(&self.store, id)?;
        let families = companionship
            .families
            .iter()
            .map(Family::assignment)
            .collect::<Vec<_>>();
        let sync = self
            .reverse_sync()
            .remove_teachers_from_families(&companionship.companions, &families);
        log_sync("delete", id, &sync);

        self.districts().detach_companionship(id)?;
        self.store.delete(COMPANIONSHIPS, id)?;
        info!(companionship_id = id, label = %companionship.label(), "companionship deleted");
        Ok(DeleteSummary {
            companionship,
            sync,
        })
    }

    fn edit_family(
        &self,
        companionship_id: &str,
        family_name: &str,
        edit: impl FnOnce(&mut Family),
    ) -> Result<Companionship, AppError> {
        let mut companionship = repo::require_companionship(&self.store, companionship_id)?;
        let family = companionship
            .family_mut(family_name.trim())
            .ok_or_else(|| AppError::NotFound {
                kind: "family",
                id: family_name.to_string(),
            })?;
        edit(family);
        self.store.update(
            COMPANIONSHIPS,
            companionship_id,
            &repo::families_patch(&companionship.families)?,
        )?;
        Ok(repo::require_companionship(&self.store, companionship_id)?)
    }

    pub fn set_family_visited(
        &self,
        companionship_id: &str,
        family_name: &str,
        visited: bool,
    ) -> Result<Companionship, AppError> {
        self.edit_family(companionship_id, family_name, |family| {
            family.visited_this_month = visited;
        })
    }

    pub fn mark_family_urgent(
        &self,
        companionship_id: &str,
        family_name: &str,
        observation: &str,
    ) -> Result<Companionship, AppError> {
        let observation = observation.trim().to_string();
        self.edit_family(companionship_id, family_name, |family| {
            family.is_urgent = true;
            family.observation = observation;
        })
    }

    pub fn resolve_family_urgent(
        &self,
        companionship_id: &str,
        family_name: &str,
    ) -> Result<Companionship, AppError> {
        self.edit_family(companionship_id, family_name, Family::resolve_urgent)
    }

    pub fn list_districts(&self) -> Result<Vec<MinisteringDistrict>, AppError> {
        Ok(self.districts().list()?)
    }

    pub fn add_district(&self) -> Result<MinisteringDistrict, AppError> {
        Ok(self.districts().add_district()?)
    }

    pub fn remove_district(&self, district_id: &str) -> Result<MinisteringDistrict, AppError> {
        Ok(self.districts().remove_district(district_id)?)
    }

    pub fn toggle_district_companionship(
        &self,
        district_id: &str,
        companionship_id: &str,
    ) -> Result<bool, AppError> {
        repo::require_companionship(&self.store, companionship_id)?;
        Ok(self
            .districts()
            .toggle_companionship(district_id, companionship_id)?)
    }

    pub fn move_companionship(
        &self,
        companionship_id: &str,
        target: Option<&str>,
    ) -> Result<(), AppError> {
        repo::require_companionship(&self.store, companionship_id)?;
        Ok(self
            .districts()
            .move_companionship(companionship_id, target)?)
    }

    pub fn assign_district_leader(
        &self,
        district_id: &str,
        leader_id: Option<&str>,
    ) -> Result<MinisteringDistrict, AppError> {
        Ok(self.districts().assign_leader(district_id, leader_id)?)
    }

    pub fn district_of(
        &self,
        companionship_id: &str,
    ) -> Result<Option<MinisteringDistrict>, AppError> {
        Ok(self.districts().district_of(companionship_id)?)
    }

    /// Runs the rollover against `snapshot` and persists the marker only when
    /// it succeeded. Returns the outcome and the companionships as they now
    /// stand.
    fn rollover(
        &self,
        snapshot: Vec<Companionship>,
        now: OffsetDateTime,
        force: bool,
    ) -> Result<(RolloverOutcome, Vec<Companionship>), AppError> {
        let state = rollover::RolloverState::load(&self.store)?;
        let policy = RolloverPolicy {
            interval_days: self.config.ministering.rollover_interval_days,
            force,
        };

        let (next_state, outcome) =
            match rollover::run(&self.store, &state, &snapshot, now, policy) {
                Ok(result) => result,
                Err(err) => {
                    error!(error = %err, "ministering rollover failed; marker left unchanged");
                    return Err(err.into());
                }
            };
        if outcome.advances_marker() {
            if let Err(err) = next_state.save(&self.store) {
                error!(
                    error = %err,
                    "rollover applied but its marker was not saved; the next load repeats it"
                );
                return Err(err.into());
            }
        }

        let companionships = match outcome {
            RolloverOutcome::Rolled(_) => repo::load_companionships(&self.store)?,
            _ => snapshot,
        };
        Ok((outcome, companionships))
    }

    /// Page load: bootstrap districts, load companionships, roll the month
    /// over when due, and summarize.
    pub fn load_ministering_page(&self, now: OffsetDateTime) -> Result<MinisteringPage, AppError> {
        let bootstrap = self.districts().ensure_districts()?;
        let snapshot = repo::load_companionships(&self.store)?;
        let (outcome, companionships) = self.rollover(snapshot, now, false)?;

        let previous = repo::get_history(&self.store, &MonthKey::previous_of(now).to_string())?;
        let (rollover, marker_seeded) = match outcome {
            RolloverOutcome::Rolled(report) => (Some(report), false),
            RolloverOutcome::Seeded => (None, true),
            RolloverOutcome::Current { .. } => (None, false),
        };

        Ok(MinisteringPage {
            stats: stats::compute_stats(&companionships, previous.as_ref()),
            progress: stats::district_progress(&bootstrap.districts, &companionships),
            urgent: stats::urgent_needs(&companionships),
            companionships,
            districts: bootstrap.districts,
            rollover,
            marker_seeded,
            districts_created: bootstrap.created,
            districts_renamed: bootstrap.renamed,
        })
    }

    pub fn run_rollover(
        &self,
        now: OffsetDateTime,
        force: bool,
    ) -> Result<RolloverOutcome, AppError> {
        let snapshot = repo::load_companionships(&self.store)?;
        let (outcome, _) = self.rollover(snapshot, now, force)?;
        Ok(outcome)
    }

    pub fn list_history(&self) -> Result<Vec<MinisteringHistory>, AppError> {
        Ok(repo::load_history(&self.store)?)
    }

    pub fn urgent_needs(&self) -> Result<Vec<UrgentNeed>, AppError> {
        Ok(stats::urgent_needs(&repo::load_companionships(
            &self.store,
        )?))
    }

    pub fn unassigned_members(&self) -> Result<Vec<Member>, AppError> {
        let members = repo::load_members(&self.store)?;
        let companionships = repo::load_companionships(&self.store)?;
        Ok(
            stats::unassigned_members(&members, &companionships, self.family_prefix())
                .into_iter()
                .cloned()
                .collect(),
        )
    }
}

/// Keeps the current per-month state of families that stay, appends the
/// added ones fresh, and swaps companions when the patch names them.
/// Fails with the first removal that names no family of `current`.
fn apply_patch(
    current: &Companionship,
    patch: &CompanionshipPatch,
    added: &[FamilyAssignment],
) -> Result<Companionship, String> {
    let removed = patch
        .remove_families
        .iter()
        .map(|name| name.trim())
        .collect::<Vec<_>>();
    if let Some(unknown) = removed.iter().find(|name| current.family(name).is_none()) {
        return Err(unknown.to_string());
    }
    let mut families = current
        .families
        .iter()
        .filter(|family| !removed.contains(&family.name.as_str()))
        .cloned()
        .collect::<Vec<_>>();
    families.extend(
        added
            .iter()
            .map(|family| Family::new(&family.name, family.member_id.as_deref())),
    );

    Ok(Companionship {
        id: current.id.clone(),
        companions: patch
            .companions
            .clone()
            .unwrap_or_else(|| current.companions.clone()),
        families,
        created_at: current.created_at.clone(),
        updated_at: current.updated_at.clone(),
    })
}

fn log_sync(operation: &str, companionship_id: &str, report: &SyncReport) {
    if !report.is_clean() {
        warn!(
            operation,
            companionship_id,
            failures = report.failures.len(),
            "ministering teachers were not fully synchronized"
        );
    }
}

fn ensure_parent_dir(path: &str) -> Result<(), AppError> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn kind_of(collection: &str) -> &'static str {
    match collection {
        COMPANIONSHIPS => "companionship",
        DISTRICTS => "district",
        HISTORY => "history entry",
        MEMBERS => "member",
        _ => "document",
    }
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Store(StoreError),
    Config(ConfigError),
    InvalidArgument(String),
    NotFound { kind: &'static str, id: String },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Store(err) => write!(f, "{}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound { kind, id } => write!(f, "{} '{}' not found", kind, id),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Store(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::InvalidArgument(_) => None,
            AppError::NotFound { .. } => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<StoreError> for AppError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { collection, id } => AppError::NotFound {
                kind: kind_of(&collection),
                id,
            },
            other => AppError::Store(other),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

#[cfg(test)]
mod tests;
