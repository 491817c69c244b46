use std::fmt;

use serde::{Deserialize, Serialize};
use time::{Month, OffsetDateTime};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MinisteringHistory {
    #[serde(default)]
    pub id: String,
    pub percentage: u8,
    pub year: String,
    pub month: String,
    /// Rollover marker in force when this month was archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// Calendar month used as the history document id (`yyyy-MM`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: i32,
    pub month: Month,
}

impl MonthKey {
    pub fn of(at: OffsetDateTime) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    pub fn previous(self) -> Self {
        let month = self.month.previous();
        let year = if month == Month::December {
            self.year - 1
        } else {
            self.year
        };
        Self { year, month }
    }

    /// The month before the one `now` falls in.
    pub fn previous_of(now: OffsetDateTime) -> Self {
        Self::of(now).previous()
    }

    pub fn year_str(self) -> String {
        format!("{:04}", self.year)
    }

    pub fn month_str(self) -> String {
        format!("{:02}", u8::from(self.month))
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (year, month) = raw.trim().split_once('-')?;
        let year = year.parse::<i32>().ok()?;
        let month = Month::try_from(month.parse::<u8>().ok()?).ok()?;
        Some(Self { year, month })
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.year_str(), self.month_str())
    }
}

#[cfg(test)]
mod tests {
    use super::MonthKey;
    use time::macros::datetime;
    use time::Month;

    #[test]
    fn previous_month_wraps_year() {
        let key = MonthKey::previous_of(datetime!(2026-01-15 10:00 UTC));
        assert_eq!(key.to_string(), "2025-12");
        assert_eq!(key.year_str(), "2025");
        assert_eq!(key.month_str(), "12");
    }

    #[test]
    fn previous_month_within_year() {
        let key = MonthKey::previous_of(datetime!(2026-10-01 00:00 UTC));
        assert_eq!(key.to_string(), "2026-09");
    }

    #[test]
    fn parses_keys() {
        assert_eq!(
            MonthKey::parse("2026-03"),
            Some(MonthKey {
                year: 2026,
                month: Month::March
            })
        );
        assert_eq!(MonthKey::parse("2026-13"), None);
        assert_eq!(MonthKey::parse("march"), None);
    }
}
