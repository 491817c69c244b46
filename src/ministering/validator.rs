//! Assignment validation for companionship add/edit.
//!
//! Families and companions are matched by exact display name. Two distinct
//! members who render the same family name are reported as a conflict; the
//! check cannot tell them apart when a family carries no `memberId`.

use std::collections::HashSet;
use std::fmt;

use super::repo;
use crate::domain::companionship::{Companionship, FamilyAssignment};
use crate::store::{DocumentStore, StoreError};

pub const MIN_COMPANIONS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentProposal {
    pub companions: Vec<String>,
    pub families: Vec<FamilyAssignment>,
}

impl AssignmentProposal {
    /// Trims names and drops blank companion entries.
    pub fn new(companions: &[String], families: Vec<FamilyAssignment>) -> Self {
        Self {
            companions: companions
                .iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
            families,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentIssue {
    TooFewCompanions {
        found: usize,
    },
    DuplicateCompanion(String),
    DuplicateFamily(String),
    FamilyAlreadyAssigned {
        family: String,
        companionship_id: String,
        companionship_label: String,
    },
    CompanionAlreadyAssigned {
        companion: String,
        companionship_id: String,
        companionship_label: String,
    },
}

impl fmt::Display for AssignmentIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssignmentIssue::TooFewCompanions { found } => write!(
                f,
                "a companionship needs at least {} companions (got {})",
                MIN_COMPANIONS, found
            ),
            AssignmentIssue::DuplicateCompanion(name) => {
                write!(f, "companion '{}' is listed more than once", name)
            }
            AssignmentIssue::DuplicateFamily(name) => {
                write!(f, "family '{}' is listed more than once", name)
            }
            AssignmentIssue::FamilyAlreadyAssigned {
                family,
                companionship_id,
                companionship_label,
            } => write!(
                f,
                "family '{}' is already assigned to companionship {} ({})",
                family, companionship_label, companionship_id
            ),
            AssignmentIssue::CompanionAlreadyAssigned {
                companion,
                companionship_id,
                companionship_label,
            } => write!(
                f,
                "'{}' already serves in companionship {} ({})",
                companion, companionship_label, companionship_id
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Rejected(AssignmentIssue),
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        matches!(self, Validation::Valid)
    }

    pub fn error(&self) -> Option<String> {
        match self {
            Validation::Valid => None,
            Validation::Rejected(issue) => Some(issue.to_string()),
        }
    }
}

/// Checks a proposal against every companionship other than `exclude_id`.
pub fn validate_assignment(
    existing: &[Companionship],
    proposal: &AssignmentProposal,
    exclude_id: Option<&str>,
) -> Validation {
    if let Some(issue) = check_form(proposal) {
        return Validation::Rejected(issue);
    }

    let others = existing
        .iter()
        .filter(|companionship| Some(companionship.id.as_str()) != exclude_id);

    for other in others {
        for proposed in &proposal.families {
            let taken = other
                .families
                .iter()
                .any(|family| proposed.same_household(&family.name, family.member_id.as_deref()));
            if taken {
                return Validation::Rejected(AssignmentIssue::FamilyAlreadyAssigned {
                    family: proposed.name.clone(),
                    companionship_id: other.id.clone(),
                    companionship_label: other.label(),
                });
            }
        }

        for companion in &proposal.companions {
            if other.companions.iter().any(|existing| existing == companion) {
                return Validation::Rejected(AssignmentIssue::CompanionAlreadyAssigned {
                    companion: companion.clone(),
                    companionship_id: other.id.clone(),
                    companionship_label: other.label(),
                });
            }
        }
    }

    Validation::Valid
}

/// Loads the current companionships and validates against them.
pub fn validate_with_store(
    store: &dyn DocumentStore,
    proposal: &AssignmentProposal,
    exclude_id: Option<&str>,
) -> Result<Validation, StoreError> {
    let existing = repo::load_companionships(store)?;
    Ok(validate_assignment(&existing, proposal, exclude_id))
}

fn check_form(proposal: &AssignmentProposal) -> Option<AssignmentIssue> {
    if proposal.companions.len() < MIN_COMPANIONS {
        return Some(AssignmentIssue::TooFewCompanions {
            found: proposal.companions.len(),
        });
    }

    let mut seen = HashSet::new();
    for companion in &proposal.companions {
        if !seen.insert(companion.as_str()) {
            return Some(AssignmentIssue::DuplicateCompanion(companion.clone()));
        }
    }

    for (index, family) in proposal.families.iter().enumerate() {
        let repeated = proposal.families[..index]
            .iter()
            .any(|earlier| earlier.same_household(&family.name, family.member_id.as_deref()));
        if repeated {
            return Some(AssignmentIssue::DuplicateFamily(family.name.clone()));
        }
    }

    None
}
