use serde::{Deserialize, Serialize};

/// `round(100 * visited / total)` with halves rounded up; 100 when there is nothing to visit.
pub fn completion_percentage(visited: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let visited = visited.min(total);
    ((200 * visited + total) / (2 * total)) as u8
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Family {
    pub name: String,
    #[serde(default)]
    pub member_id: Option<String>,
    #[serde(default)]
    pub visited_this_month: bool,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub observation: String,
}

impl Family {
    pub fn new(name: &str, member_id: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            member_id: member_id.map(str::to_string),
            visited_this_month: false,
            is_urgent: false,
            observation: String::new(),
        }
    }

    pub fn assignment(&self) -> FamilyAssignment {
        FamilyAssignment {
            name: self.name.clone(),
            member_id: self.member_id.clone(),
        }
    }

    pub fn resolve_urgent(&mut self) {
        self.is_urgent = false;
        self.observation.clear();
    }
}

/// A family as proposed by the add/edit form, before per-month state exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FamilyAssignment {
    pub name: String,
    #[serde(default)]
    pub member_id: Option<String>,
}

impl FamilyAssignment {
    pub fn new(name: &str, member_id: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            member_id: member_id.map(str::to_string),
        }
    }

    /// Same household: equal display name, or both point at the same member.
    pub fn same_household(&self, name: &str, member_id: Option<&str>) -> bool {
        if self.name == name {
            return true;
        }
        matches!((self.member_id.as_deref(), member_id), (Some(a), Some(b)) if a == b)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Companionship {
    #[serde(default)]
    pub id: String,
    pub companions: Vec<String>,
    #[serde(default)]
    pub families: Vec<Family>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

impl Companionship {
    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.iter().find(|family| family.name == name)
    }

    pub fn family_mut(&mut self, name: &str) -> Option<&mut Family> {
        self.families.iter_mut().find(|family| family.name == name)
    }

    pub fn visited_count(&self) -> usize {
        self.families
            .iter()
            .filter(|family| family.visited_this_month)
            .count()
    }

    pub fn urgent_count(&self) -> usize {
        self.families.iter().filter(|family| family.is_urgent).count()
    }

    pub fn completion(&self) -> u8 {
        completion_percentage(self.visited_count(), self.families.len())
    }

    /// Display label, e.g. "Ana y Luis".
    pub fn label(&self) -> String {
        match self.companions.split_last() {
            None => String::new(),
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} y {}", rest.join(", "), last),
        }
    }
}

/// Overall completion across every family of every companionship.
pub fn overall_completion(companionships: &[Companionship]) -> u8 {
    let total = companionships
        .iter()
        .map(|companionship| companionship.families.len())
        .sum();
    let visited = companionships
        .iter()
        .map(Companionship::visited_count)
        .sum();
    completion_percentage(visited, total)
}
