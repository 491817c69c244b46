use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    #[default]
    Active,
    LessActive,
    Inactive,
    Deceased,
}

impl MemberStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MemberStatus::Active => "active",
            MemberStatus::LessActive => "less_active",
            MemberStatus::Inactive => "inactive",
            MemberStatus::Deceased => "deceased",
        }
    }

    /// Deceased members are never offered as a family to minister to.
    pub fn is_assignable(self) -> bool {
        self != MemberStatus::Deceased
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemberStatus {
    type Err = ParseMemberStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "active" => Ok(MemberStatus::Active),
            "less_active" => Ok(MemberStatus::LessActive),
            "inactive" => Ok(MemberStatus::Inactive),
            "deceased" => Ok(MemberStatus::Deceased),
            _ => Err(ParseMemberStatusError {
                value: value.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseMemberStatusError {
    value: String,
}

impl fmt::Display for ParseMemberStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown member status '{}'; use active|less_active|inactive|deceased",
            self.value
        )
    }
}

impl Error for ParseMemberStatusError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    #[serde(default)]
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub status: MemberStatus,
    #[serde(default)]
    pub ministering_teachers: Vec<String>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Display label used when this member's household is assigned as a family.
    pub fn family_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.last_name.trim())
    }
}
