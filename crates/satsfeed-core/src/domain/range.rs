use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Display granularity for axis labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Hour,
    Day,
    Month,
    Year,
}

/// History range; each owns a cache slot and maps to a `days=` query value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RangeKey {
    #[serde(rename = "1")]
    Day,
    #[serde(rename = "7")]
    Week,
    #[serde(rename = "30")]
    Month,
    #[serde(rename = "180")]
    HalfYear,
    #[serde(rename = "365")]
    Year,
    #[serde(rename = "max")]
    Max,
}

impl RangeKey {
    pub const ALL: [Self; 6] = [
        Self::Day,
        Self::Week,
        Self::Month,
        Self::HalfYear,
        Self::Year,
        Self::Max,
    ];

    /// Provider query value.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Day => "1",
            Self::Week => "7",
            Self::Month => "30",
            Self::HalfYear => "180",
            Self::Year => "365",
            Self::Max => "max",
        }
    }

    /// `None` for the full history.
    pub const fn days(self) -> Option<u32> {
        match self {
            Self::Day => Some(1),
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::HalfYear => Some(180),
            Self::Year => Some(365),
            Self::Max => None,
        }
    }

    pub const fn granularity(self) -> Granularity {
        match self {
            Self::Day => Granularity::Hour,
            Self::Week | Self::Month => Granularity::Day,
            Self::HalfYear | Self::Year => Granularity::Month,
            Self::Max => Granularity::Year,
        }
    }

    pub fn cache_key(self) -> String {
        format!("history:{}", self.as_str())
    }
}

impl Display for RangeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RangeKey {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "1d" | "24h" => Ok(Self::Day),
            "7" | "7d" | "1w" => Ok(Self::Week),
            "30" | "30d" | "1m" => Ok(Self::Month),
            "180" | "180d" | "6m" => Ok(Self::HalfYear),
            "365" | "365d" | "1y" => Ok(Self::Year),
            "max" | "all" => Ok(Self::Max),
            other => Err(ValidationError::InvalidRange {
                value: other.to_owned(),
            }),
        }
    }
}
