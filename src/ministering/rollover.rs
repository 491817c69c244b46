//! Monthly reset of visit flags with a history snapshot.
//!
//! The marker only moves forward once [`run`] has returned successfully and
//! the caller has saved the returned [`RolloverState`]. A failure anywhere
//! leaves the previous marker in place, so the next page load retries the
//! whole rollover. The history record is keyed by month and tagged with the
//! marker it was computed under; a retry in the same cycle keeps the stored
//! completion instead of recomputing it from flags that may already be reset.

use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tracing::{info, warn};

use super::{repo, COMPANIONSHIPS, HISTORY};
use crate::domain::companionship::{overall_completion, Companionship, Family};
use crate::domain::history::{MinisteringHistory, MonthKey};
use crate::store::{DocumentStore, MarkerStore, SetOptions, StoreError, WriteOp};

pub const LAST_RESET_KEY: &str = "lastMinisteringReset";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RolloverState {
    pub last_reset_at: Option<OffsetDateTime>,
}

impl RolloverState {
    /// Reads the marker. A value that does not parse counts as missing.
    pub fn load(markers: &dyn MarkerStore) -> Result<Self, StoreError> {
        let Some(raw) = markers.get_item(LAST_RESET_KEY)? else {
            return Ok(Self::default());
        };
        match OffsetDateTime::parse(raw.trim(), &Rfc3339) {
            Ok(at) => Ok(Self {
                last_reset_at: Some(at),
            }),
            Err(err) => {
                warn!(value = %raw, error = %err, "ignoring unparsable rollover marker");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, markers: &dyn MarkerStore) -> Result<(), StoreError> {
        let Some(at) = self.last_reset_at else {
            return Ok(());
        };
        markers.set_item(LAST_RESET_KEY, &format_marker(at)?)
    }

    pub fn days_since(&self, now: OffsetDateTime) -> Option<i64> {
        self.last_reset_at.map(|last| (now - last).whole_days())
    }
}

fn format_marker(at: OffsetDateTime) -> Result<String, StoreError> {
    at.to_offset(UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|err| StoreError::InvalidDocument(format!("rollover marker {}: {}", at, err)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverDecision {
    /// No marker yet; record one without touching progress.
    Seed,
    Current { days_since: i64 },
    Due { days_since: i64 },
}

pub fn evaluate(
    state: &RolloverState,
    now: OffsetDateTime,
    interval_days: i64,
) -> RolloverDecision {
    match state.days_since(now) {
        None => RolloverDecision::Seed,
        Some(days_since) if days_since < interval_days => RolloverDecision::Current { days_since },
        Some(days_since) => RolloverDecision::Due { days_since },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverPolicy {
    pub interval_days: i64,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RolloverReport {
    pub month_key: String,
    pub percentage: u8,
    pub companionships_reset: usize,
    pub families_reset: usize,
    pub forced: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RolloverOutcome {
    Seeded,
    Current { days_since: i64 },
    Rolled(RolloverReport),
}

impl RolloverOutcome {
    /// Whether the caller must persist the returned state.
    pub fn advances_marker(&self) -> bool {
        !matches!(self, RolloverOutcome::Current { .. })
    }
}

/// Decides and, when due or forced, performs the rollover against the
/// already loaded `snapshot`. Returns the state to persist on success.
pub fn run(
    store: &dyn DocumentStore,
    state: &RolloverState,
    snapshot: &[Companionship],
    now: OffsetDateTime,
    policy: RolloverPolicy,
) -> Result<(RolloverState, RolloverOutcome), StoreError> {
    let advanced = RolloverState {
        last_reset_at: Some(now),
    };

    if !policy.force {
        match evaluate(state, now, policy.interval_days) {
            RolloverDecision::Seed => {
                info!("no rollover marker yet; recording the current time");
                return Ok((advanced, RolloverOutcome::Seeded));
            }
            RolloverDecision::Current { days_since } => {
                return Ok((*state, RolloverOutcome::Current { days_since }));
            }
            RolloverDecision::Due { .. } => {}
        }
    }

    let month = MonthKey::previous_of(now);
    let cycle = state.last_reset_at.map(format_marker).transpose()?;
    let percentage = match archived_in_cycle(store, month, cycle.as_deref())? {
        Some(kept) => {
            warn!(
                month = %month,
                percentage = kept,
                "month already archived by an unfinished rollover; keeping its completion"
            );
            kept
        }
        None => overall_completion(snapshot),
    };
    let families_reset = reset_and_archive(store, snapshot, month, percentage, cycle)?;

    info!(
        month = %month,
        percentage,
        companionships = snapshot.len(),
        families_reset,
        forced = policy.force,
        "ministering rollover completed"
    );
    Ok((
        advanced,
        RolloverOutcome::Rolled(RolloverReport {
            month_key: month.to_string(),
            percentage,
            companionships_reset: snapshot.len(),
            families_reset,
            forced: policy.force,
        }),
    ))
}

/// Completion stored for `month` by an earlier attempt of the same cycle.
/// That attempt saw the visit flags before any reset, so its value wins over
/// a snapshot that may already be cleared.
fn archived_in_cycle(
    store: &dyn DocumentStore,
    month: MonthKey,
    cycle: Option<&str>,
) -> Result<Option<u8>, StoreError> {
    let Some(cycle) = cycle else {
        return Ok(None);
    };
    let existing = repo::get_history(store, &month.to_string())?;
    Ok(existing
        .filter(|entry| entry.cycle_started_at.as_deref() == Some(cycle))
        .map(|entry| entry.percentage))
}

/// Writes the history record, then clears `visitedThisMonth` on every family
/// in one batch. Returns how many families had been visited.
pub fn reset_and_archive(
    store: &dyn DocumentStore,
    snapshot: &[Companionship],
    month: MonthKey,
    percentage: u8,
    cycle_started_at: Option<String>,
) -> Result<usize, StoreError> {
    let entry = MinisteringHistory {
        id: month.to_string(),
        percentage,
        year: month.year_str(),
        month: month.month_str(),
        cycle_started_at,
        created_at: None,
    };
    store.set(
        HISTORY,
        &entry.id,
        &repo::history_data(&entry)?,
        SetOptions::overwrite(),
    )?;

    let mut families_reset = 0;
    let mut ops = Vec::with_capacity(snapshot.len());
    for companionship in snapshot {
        families_reset += companionship.visited_count();
        let families = companionship
            .families
            .iter()
            .map(|family| Family {
                visited_this_month: false,
                ..family.clone()
            })
            .collect::<Vec<_>>();
        ops.push(WriteOp::update(
            COMPANIONSHIPS,
            &companionship.id,
            repo::families_patch(&families)?,
        ));
    }
    if !ops.is_empty() {
        store.commit_batch(&ops)?;
    }
    Ok(families_reset)
}
