use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub const NUMBER_PLACEHOLDER: &str = "{number}";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MinisteringDistrict {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub companionship_ids: Vec<String>,
    #[serde(default)]
    pub leader_id: Option<String>,
    #[serde(default)]
    pub leader_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl MinisteringDistrict {
    pub fn contains(&self, companionship_id: &str) -> bool {
        self.companionship_ids
            .iter()
            .any(|candidate| candidate == companionship_id)
    }
}

/// Renders a district name such as "Distrito 2" from the configured template.
pub fn district_name(template: &str, number: usize) -> String {
    template.replace(NUMBER_PLACEHOLDER, &number.to_string())
}

/// Reads the number back out of a name rendered from `template`.
pub fn template_number(template: &str, name: &str) -> Option<usize> {
    let (prefix, suffix) = template.split_once(NUMBER_PLACEHOLDER)?;
    let digits = name.strip_prefix(prefix)?.strip_suffix(suffix)?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Districts whose name follows `template` come first in numeric order, so
/// "Distrito 2" sorts before "Distrito 10". Other names follow alphabetically.
pub fn sort_by_name(districts: &mut [MinisteringDistrict], template: &str) {
    districts.sort_by(|left, right| {
        let ordering = match (
            template_number(template, &left.name),
            template_number(template, &right.name),
        ) {
            (Some(l), Some(r)) => l.cmp(&r),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => left.name.cmp(&right.name),
        };
        ordering.then_with(|| left.id.cmp(&right.id))
    });
}
