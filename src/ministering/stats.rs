//! Read-side summaries for the dashboard.

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::companionship::{completion_percentage, overall_completion, Companionship};
use crate::domain::district::MinisteringDistrict;
use crate::domain::history::MinisteringHistory;
use crate::domain::member::Member;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MinisteringStats {
    pub companionships: usize,
    pub families: usize,
    pub visited: usize,
    pub urgent: usize,
    pub completion: u8,
    pub previous_month: Option<u8>,
    pub change_from_previous: Option<i16>,
}

pub fn compute_stats(
    companionships: &[Companionship],
    previous: Option<&MinisteringHistory>,
) -> MinisteringStats {
    let completion = overall_completion(companionships);
    let previous_month = previous.map(|entry| entry.percentage);
    MinisteringStats {
        companionships: companionships.len(),
        families: companionships.iter().map(|c| c.families.len()).sum(),
        visited: companionships.iter().map(Companionship::visited_count).sum(),
        urgent: companionships.iter().map(Companionship::urgent_count).sum(),
        completion,
        previous_month,
        change_from_previous: previous_month.map(|last| i16::from(completion) - i16::from(last)),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DistrictProgress {
    /// `None` for companionships outside every district.
    pub district_id: Option<String>,
    pub name: String,
    pub leader_name: Option<String>,
    pub companionships: usize,
    pub families: usize,
    pub visited: usize,
    pub completion: u8,
}

/// Per-district completion in district order, followed by an "unassigned"
/// bucket when some companionship is in no district. Ids listed by a district
/// that no longer exist are ignored.
pub fn district_progress(
    districts: &[MinisteringDistrict],
    companionships: &[Companionship],
) -> Vec<DistrictProgress> {
    let mut placed = HashSet::new();
    let mut rows = Vec::with_capacity(districts.len() + 1);

    for district in districts {
        let members = companionships
            .iter()
            .filter(|companionship| district.contains(&companionship.id))
            .collect::<Vec<_>>();
        placed.extend(members.iter().map(|companionship| companionship.id.clone()));
        rows.push(progress_row(
            Some(district.id.clone()),
            district.name.clone(),
            district.leader_name.clone(),
            &members,
        ));
    }

    let unplaced = companionships
        .iter()
        .filter(|companionship| !placed.contains(&companionship.id))
        .collect::<Vec<_>>();
    if !unplaced.is_empty() {
        rows.push(progress_row(None, "Sin distrito".to_string(), None, &unplaced));
    }
    rows
}

fn progress_row(
    district_id: Option<String>,
    name: String,
    leader_name: Option<String>,
    members: &[&Companionship],
) -> DistrictProgress {
    let families = members.iter().map(|c| c.families.len()).sum();
    let visited = members.iter().map(|c| c.visited_count()).sum();
    DistrictProgress {
        district_id,
        name,
        leader_name,
        companionships: members.len(),
        families,
        visited,
        completion: completion_percentage(visited, families),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UrgentNeed {
    pub companionship_id: String,
    pub companionship: String,
    pub family: String,
    pub observation: String,
}

pub fn urgent_needs(companionships: &[Companionship]) -> Vec<UrgentNeed> {
    companionships
        .iter()
        .flat_map(|companionship| {
            companionship
                .families
                .iter()
                .filter(|family| family.is_urgent)
                .map(move |family| UrgentNeed {
                    companionship_id: companionship.id.clone(),
                    companionship: companionship.label(),
                    family: family.name.clone(),
                    observation: family.observation.clone(),
                })
        })
        .collect()
}

/// Assignable members whose household no companionship ministers to, matched
/// by `memberId` or by the family label built from `prefix`.
pub fn unassigned_members<'a>(
    members: &'a [Member],
    companionships: &[Companionship],
    prefix: &str,
) -> Vec<&'a Member> {
    let mut assigned_ids = HashSet::new();
    let mut assigned_names = HashSet::new();
    for family in companionships.iter().flat_map(|c| &c.families) {
        if let Some(member_id) = family.member_id.as_deref() {
            assigned_ids.insert(member_id);
        }
        assigned_names.insert(family.name.as_str());
    }

    members
        .iter()
        .filter(|member| member.status.is_assignable())
        .filter(|member| !assigned_ids.contains(member.id.as_str()))
        .filter(|member| !assigned_names.contains(member.family_name(prefix).as_str()))
        .collect()
}
