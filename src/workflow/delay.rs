//! Durations attached to wait and condition actions.
//!
//! The backend stores a duration as an integer magnitude followed by a
//! single unit letter, e.g. `"6s"`, `"2m"`, `"3h"`, `"5d"`.

use std::{fmt, str::FromStr, sync::LazyLock, time::Duration};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{MailflowError, Result};

static DELAY_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)([smhd])$").expect("valid delay regex"));

/// Unit letter of a [`Delay`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, strum::AsRefStr, strum::EnumString, strum::Display)]
pub enum DelayUnit {
    #[default]
    #[strum(serialize = "s")]
    Seconds,
    #[strum(serialize = "m")]
    Minutes,
    #[strum(serialize = "h")]
    Hours,
    #[strum(serialize = "d")]
    Days,
}

impl DelayUnit {
    fn seconds(&self) -> u64 {
        match self {
            DelayUnit::Seconds => 1,
            DelayUnit::Minutes => 60,
            DelayUnit::Hours => 60 * 60,
            DelayUnit::Days => 24 * 60 * 60,
        }
    }
}

/// A duration expressed as magnitude plus unit, e.g. `5d`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Delay {
    pub value: u64,
    pub unit: DelayUnit,
}

impl Delay {
    pub fn new(
        value: u64,
        unit: DelayUnit,
    ) -> Self {
        Self {
            value,
            unit,
        }
    }

    /// Convert to a [`std::time::Duration`], saturating on overflow.
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.value.saturating_mul(self.unit.seconds()))
    }
}

impl fmt::Display for Delay {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.as_ref())
    }
}

impl FromStr for Delay {
    type Err = MailflowError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = DELAY_PATTERN.captures(s.trim()).ok_or_else(|| MailflowError::Convert(format!("invalid duration '{}'", s)))?;

        let value = caps[1].parse::<u64>().map_err(|e| MailflowError::Convert(format!("invalid duration '{}': {}", s, e)))?;
        let unit = caps[2].parse::<DelayUnit>().map_err(|e| MailflowError::Convert(format!("invalid duration unit '{}': {}", &caps[2], e)))?;

        Ok(Self::new(value, unit))
    }
}

impl Serialize for Delay {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
