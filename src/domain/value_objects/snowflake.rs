//! Snowflake identifiers.
//!
//! Users, conversations and messages are keyed by 64-bit snowflakes with an
//! embedded millisecond timestamp, so ids sort by creation time.
//!
//! ## Structure
//!
//! ```text
//! 64                         22            12          0
//! +---------------------------+-------------+-----------+
//! |         timestamp         |   machine   |  sequence |
//! |          (42 bits)        |  (10 bits)  |  (12 bits)|
//! +---------------------------+-------------+-----------+
//! ```
//!
//! On the wire a snowflake is a decimal string; clients written in languages
//! without 64-bit integers would otherwise lose precision.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// 2015-01-01T00:00:00Z in milliseconds
pub const SNOWFLAKE_EPOCH: u64 = 1420070400000;

/// A snowflake id. Valid ids are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub i64);

impl Snowflake {
    /// Create a new Snowflake from raw value.
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Extract the timestamp (ms since the Unix epoch).
    pub fn timestamp(&self) -> u64 {
        ((self.0 as u64) >> 22) + SNOWFLAKE_EPOCH
    }

    /// Get the timestamp as a DateTime.
    pub fn created_at(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp() as i64)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// Get the raw i64 value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Snowflake {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Snowflake> for i64 {
    fn from(snowflake: Snowflake) -> Self {
        snowflake.0
    }
}

/// Returned when a string is not a positive decimal id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid snowflake id: {0:?}")]
pub struct ParseSnowflakeError(pub String);

impl FromStr for Snowflake {
    type Err = ParseSnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<i64>() {
            Ok(v) if v > 0 && !s.starts_with('+') => Ok(Self(v)),
            _ => Err(ParseSnowflakeError(s.to_owned())),
        }
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnowflakeVisitor;

        impl Visitor<'_> for SnowflakeVisitor {
            type Value = Snowflake;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a snowflake id as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Snowflake, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Snowflake, E> {
                if v > 0 {
                    Ok(Snowflake(v))
                } else {
                    Err(E::custom(ParseSnowflakeError(v.to_string())))
                }
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Snowflake, E> {
                i64::try_from(v)
                    .map_err(|_| E::custom(ParseSnowflakeError(v.to_string())))
                    .and_then(|v| self.visit_i64(v))
            }
        }

        deserializer.deserialize_any(SnowflakeVisitor)
    }
}
