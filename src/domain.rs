use std::fmt;
use std::str::FromStr;

use camino::Utf8PathBuf;
use chrono::{DateTime, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;
use tracing::warn;

use crate::error::CladeError;

// Sequence metadata published before this date is not versioned consistently
// enough to resolve.
pub fn min_sequence_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 5, 1, 0, 0, 0).unwrap()
}

// The ncov pipeline metadata object only exists at or after this date.
pub fn min_ncov_metadata_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct AsOf(DateTime<Utc>);

impl AsOf {
    pub fn now() -> Self {
        let now = Utc::now();
        Self(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn from_datetime(value: DateTime<Utc>) -> Result<Self, CladeError> {
        let value = value.with_nanosecond(0).unwrap_or(value);
        if value < min_sequence_date() {
            return Err(CladeError::InvalidDate(format!(
                "date must be after May 1, 2023: {value}"
            )));
        }
        let utc_now = Utc::now();
        if value > utc_now {
            warn!(requested = %value, "as-of date is in the future, defaulting to current time");
            return Ok(Self(utc_now.with_nanosecond(0).unwrap_or(utc_now)));
        }
        Ok(Self(value))
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn date_stamp(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }
}

impl FromStr for AsOf {
    type Err = CladeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let date = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
            CladeError::InvalidDate(format!(
                "invalid date string: {value} (should be in YYYY-MM-DD format)"
            ))
        })?;
        let datetime = date
            .and_hms_opt(0, 0, 0)
            .map(|naive| Utc.from_utc_datetime(&naive))
            .ok_or_else(|| CladeError::InvalidDate(value.to_string()))?;
        Self::from_datetime(datetime)
    }
}

impl fmt::Display for AsOf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S UTC"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataSource {
    Path(Utf8PathBuf),
    Url(String),
}

impl MetadataSource {
    pub fn path(path: impl Into<Utf8PathBuf>) -> Self {
        MetadataSource::Path(path.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        MetadataSource::Url(url.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectReference {
    pub bucket: String,
    pub key: String,
    pub version_id: String,
    pub url: String,
    pub as_of: DateTime<Utc>,
}

// 50 state names as recorded in the division column, plus the two extra
// divisions the surveillance data reports for the US.
pub const US_DIVISIONS: [&str; 52] = [
    "Alabama",
    "Alaska",
    "Arizona",
    "Arkansas",
    "California",
    "Colorado",
    "Connecticut",
    "Delaware",
    "Florida",
    "Georgia",
    "Hawaii",
    "Idaho",
    "Illinois",
    "Indiana",
    "Iowa",
    "Kansas",
    "Kentucky",
    "Louisiana",
    "Maine",
    "Maryland",
    "Massachusetts",
    "Michigan",
    "Minnesota",
    "Mississippi",
    "Missouri",
    "Montana",
    "Nebraska",
    "Nevada",
    "New Hampshire",
    "New Jersey",
    "New Mexico",
    "New York",
    "North Carolina",
    "North Dakota",
    "Ohio",
    "Oklahoma",
    "Oregon",
    "Pennsylvania",
    "Rhode Island",
    "South Carolina",
    "South Dakota",
    "Tennessee",
    "Texas",
    "Utah",
    "Vermont",
    "Virginia",
    "Washington",
    "West Virginia",
    "Wisconsin",
    "Wyoming",
    "Washington DC",
    "Puerto Rico",
];

pub fn is_us_division(name: &str) -> bool {
    US_DIVISIONS.contains(&name)
}
