use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::BoltError;

/// Suffix appended to the string form of title-origin token ids
pub const TITLE_MARKER: char = '#';

/// Field a token was drawn from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenOrigin {
    Title,
    Tag,
}

/// Token id plus its origin marker.
///
/// Title and tag tokens share one numeric id space; the marker only
/// distinguishes them in barrel keys (`"1234#"` vs `"1234"`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenKey {
    pub numeric_id: u64,
    pub marker: bool,
}

impl TokenKey {
    pub fn new(numeric_id: u64, origin: TokenOrigin) -> Self {
        Self {
            numeric_id,
            marker: origin == TokenOrigin::Title,
        }
    }

    pub fn bare(numeric_id: u64) -> Self {
        Self {
            numeric_id,
            marker: false,
        }
    }

    pub fn titled(numeric_id: u64) -> Self {
        Self {
            numeric_id,
            marker: true,
        }
    }

    pub fn origin(&self) -> TokenOrigin {
        if self.marker {
            TokenOrigin::Title
        } else {
            TokenOrigin::Tag
        }
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.marker {
            write!(f, "{}{}", self.numeric_id, TITLE_MARKER)
        } else {
            write!(f, "{}", self.numeric_id)
        }
    }
}

impl FromStr for TokenKey {
    type Err = BoltError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, marker) = match s.strip_suffix(TITLE_MARKER) {
            Some(rest) => (rest, true),
            None => (s, false),
        };
        let numeric_id = digits
            .parse::<u64>()
            .map_err(|_| BoltError::InvalidToken(format!("malformed token key {:?}", s)))?;
        Ok(Self { numeric_id, marker })
    }
}

impl Serialize for TokenKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
