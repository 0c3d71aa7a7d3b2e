//! Partitions definitions
//!
//! A partitions definition yields the ordered list of partition keys an asset
//! (and the job it lands in) can be materialized for. Time-based definitions
//! only include partitions whose window has fully elapsed.

use crate::{Error, Result};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key format of daily, weekly and monthly partitions
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Key format of hourly partitions
pub const HOURLY_FORMAT: &str = "%Y-%m-%d-%H:%M";

/// Time granularity for time-based partitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGranularity {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl TimeGranularity {
    fn key_format(&self) -> &'static str {
        match self {
            Self::Hourly => HOURLY_FORMAT,
            Self::Daily | Self::Weekly | Self::Monthly => DATE_FORMAT,
        }
    }

    /// Start of the `index`-th window, always offset from `start` so month
    /// ends do not drift after a short month
    fn window_start(&self, start: NaiveDateTime, index: u32) -> Option<NaiveDateTime> {
        match self {
            Self::Hourly => start.checked_add_signed(Duration::hours(i64::from(index))),
            Self::Daily => start.checked_add_signed(Duration::days(i64::from(index))),
            Self::Weekly => start.checked_add_signed(Duration::weeks(i64::from(index))),
            Self::Monthly => start.checked_add_months(Months::new(index)),
        }
    }
}

/// Ordered set of partition keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionsDefinition {
    /// A fixed list of keys
    Static { keys: Vec<String> },

    /// Consecutive time windows starting at `start`
    Time {
        granularity: TimeGranularity,
        start: NaiveDateTime,
    },
}

impl PartitionsDefinition {
    /// Fixed list of partition keys, kept in the given order
    pub fn static_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Static {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Daily partitions starting at `start_date` (`YYYY-MM-DD`)
    pub fn daily(start_date: &str) -> Result<Self> {
        Self::from_date(TimeGranularity::Daily, start_date)
    }

    /// Weekly partitions starting at `start_date` (`YYYY-MM-DD`)
    pub fn weekly(start_date: &str) -> Result<Self> {
        Self::from_date(TimeGranularity::Weekly, start_date)
    }

    /// Monthly partitions starting at `start_date` (`YYYY-MM-DD`)
    pub fn monthly(start_date: &str) -> Result<Self> {
        Self::from_date(TimeGranularity::Monthly, start_date)
    }

    /// Hourly partitions starting at `start` (`YYYY-MM-DD-HH:MM`)
    pub fn hourly(start: &str) -> Result<Self> {
        let start = NaiveDateTime::parse_from_str(start, HOURLY_FORMAT).map_err(|e| {
            Error::InvalidDefinition(format!(
                "Invalid hourly partition start '{}': {} (expected {})",
                start, e, HOURLY_FORMAT
            ))
        })?;
        Ok(Self::Time {
            granularity: TimeGranularity::Hourly,
            start,
        })
    }

    fn from_date(granularity: TimeGranularity, start_date: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(start_date, DATE_FORMAT).map_err(|e| {
            Error::InvalidDefinition(format!(
                "Invalid partition start date '{}': {} (expected {})",
                start_date, e, DATE_FORMAT
            ))
        })?;
        Ok(Self::Time {
            granularity,
            start: date.and_time(chrono::NaiveTime::MIN),
        })
    }

    /// Partition keys available at `now`, oldest first
    pub fn partition_keys(&self, now: DateTime<Utc>) -> Vec<String> {
        match self {
            Self::Static { keys } => keys.clone(),
            Self::Time { granularity, start } => {
                let now = now.naive_utc();
                let mut keys = Vec::new();
                let mut index = 0_u32;
                while let (Some(window_start), Some(window_end)) = (
                    granularity.window_start(*start, index),
                    index
                        .checked_add(1)
                        .and_then(|next| granularity.window_start(*start, next)),
                ) {
                    if window_end > now {
                        break;
                    }
                    keys.push(window_start.format(granularity.key_format()).to_string());
                    index += 1;
                }
                keys
            }
        }
    }

    /// Partition keys available right now
    pub fn current_partition_keys(&self) -> Vec<String> {
        self.partition_keys(Utc::now())
    }

    pub fn has_partition_key(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.partition_keys(now).iter().any(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_static_keys_keep_order() {
        let def = PartitionsDefinition::static_keys(["b", "a", "c"]);
        assert_eq!(def.partition_keys(Utc::now()), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_daily_only_includes_elapsed_days() {
        let def = PartitionsDefinition::daily("2021-05-05").unwrap();
        let keys = def.partition_keys(at(2021, 5, 8, 12));
        assert_eq!(keys, vec!["2021-05-05", "2021-05-06", "2021-05-07"]);
    }

    #[test]
    fn test_hourly_keys() {
        let def = PartitionsDefinition::hourly("2021-05-05-00:00").unwrap();
        let keys = def.partition_keys(at(2021, 5, 5, 3));
        assert_eq!(
            keys,
            vec!["2021-05-05-00:00", "2021-05-05-01:00", "2021-05-05-02:00"]
        );
    }

    #[test]
    fn test_monthly_keys() {
        let def = PartitionsDefinition::monthly("2024-01-01").unwrap();
        let keys = def.partition_keys(at(2024, 3, 15, 0));
        assert_eq!(keys, vec!["2024-01-01", "2024-02-01"]);
    }

    #[test]
    fn test_monthly_keys_keep_day_of_month_after_short_month() {
        let def = PartitionsDefinition::monthly("2024-01-31").unwrap();
        let keys = def.partition_keys(at(2024, 5, 1, 0));
        assert_eq!(keys, vec!["2024-01-31", "2024-02-29", "2024-03-31"]);
    }

    #[test]
    fn test_start_in_future_has_no_keys() {
        let def = PartitionsDefinition::daily("2999-01-01").unwrap();
        assert!(def.current_partition_keys().is_empty());
    }

    #[test]
    fn test_invalid_start_date() {
        let err = PartitionsDefinition::daily("05/05/2021").unwrap_err();
        assert!(matches!(err, Error::InvalidDefinition(_)));
    }

    #[test]
    fn test_structural_equality() {
        let a = PartitionsDefinition::daily("2021-05-05").unwrap();
        let b = PartitionsDefinition::daily("2021-05-05").unwrap();
        let c = PartitionsDefinition::daily("2020-05-05").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_has_partition_key() {
        let def = PartitionsDefinition::static_keys(["p0", "p1"]);
        assert!(def.has_partition_key("p1", Utc::now()));
        assert!(!def.has_partition_key("p2", Utc::now()));
    }
}
