use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::num::{NonZeroU64, NonZeroUsize};
use std::time::Duration;

use crate::error::ValidationError;

use super::parsers::parse_duration_arg;

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Put,
    Delete,
}

impl HttpMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

/// How idempotency keys are issued across a run.
#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum IdempotencyMode {
    /// One key generated at start and reused by every iteration.
    #[default]
    PerRun,
    /// A fresh key for every iteration.
    PerIteration,
}

impl IdempotencyMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IdempotencyMode::PerRun => "per-run",
            IdempotencyMode::PerIteration => "per-iteration",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Pause a virtual user takes between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkTime {
    None,
    Fixed(Duration),
    Jittered { min: Duration, max: Duration },
}

impl std::str::FromStr for ThinkTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.eq_ignore_ascii_case("none") || value == "0" {
            return Ok(ThinkTime::None);
        }
        let invalid = || ValidationError::InvalidThinkTime {
            value: value.to_owned(),
        };
        match value.split_once("..") {
            Some((min, max)) => {
                let min = parse_duration_arg(min).map_err(|_err| invalid())?;
                let max = parse_duration_arg(max).map_err(|_err| invalid())?;
                if min > max {
                    return Err(invalid());
                }
                Ok(ThinkTime::Jittered { min, max })
            }
            None => parse_duration_arg(value)
                .map(ThinkTime::Fixed)
                .map_err(|_err| invalid()),
        }
    }
}

impl<'de> Deserialize<'de> for ThinkTime {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse::<ThinkTime>().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ThinkTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThinkTime::None => write!(f, "none"),
            ThinkTime::Fixed(duration) => write!(f, "{}ms", duration.as_millis()),
            ThinkTime::Jittered { min, max } => {
                write!(f, "{}ms..{}ms", min.as_millis(), max.as_millis())
            }
        }
    }
}

/// One ramp stage: reach `target` virtual users over `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RampStage {
    pub duration: Duration,
    pub target: usize,
}

impl std::str::FromStr for RampStage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidStageFormat {
            value: s.to_owned(),
        };
        let (duration, target) = s.trim().split_once(':').ok_or_else(invalid)?;
        let duration = parse_duration_arg(duration).map_err(|_err| invalid())?;
        let target: usize = target.trim().parse().map_err(|_err| invalid())?;
        Ok(RampStage { duration, target })
    }
}

/// A named template slot filled with a uniform integer from `min..=max`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomField {
    pub name: String,
    pub min: i64,
    pub max: i64,
}

impl std::str::FromStr for RandomField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidRandomField {
            value: s.to_owned(),
        };
        let (name, range) = s.trim().split_once('=').ok_or_else(invalid)?;
        let (min, max) = range.split_once("..").ok_or_else(invalid)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(invalid());
        }
        Ok(RandomField {
            name: name.to_owned(),
            min: min.trim().parse().map_err(|_err| invalid())?,
            max: max
                .trim()
                .trim_start_matches('=')
                .parse()
                .map_err(|_err| invalid())?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveU64(NonZeroU64);

impl PositiveU64 {
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl TryFrom<u64> for PositiveU64 {
    type Error = ValidationError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        NonZeroU64::new(value)
            .map(PositiveU64)
            .ok_or(ValidationError::ValueTooSmall { min: 1 })
    }
}

impl std::str::FromStr for PositiveU64 {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u64 = s
            .parse()
            .map_err(|err| ValidationError::InvalidNumber { source: err })?;
        PositiveU64::try_from(value)
    }
}

impl From<PositiveU64> for u64 {
    fn from(value: PositiveU64) -> Self {
        value.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveUsize(NonZeroUsize);

impl PositiveUsize {
    #[must_use]
    pub const fn get(self) -> usize {
        self.0.get()
    }
}

impl TryFrom<usize> for PositiveUsize {
    type Error = ValidationError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        NonZeroUsize::new(value)
            .map(PositiveUsize)
            .ok_or(ValidationError::ValueTooSmall { min: 1 })
    }
}

impl std::str::FromStr for PositiveUsize {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: usize = s
            .parse()
            .map_err(|err| ValidationError::InvalidNumber { source: err })?;
        PositiveUsize::try_from(value)
    }
}

impl From<PositiveUsize> for usize {
    fn from(value: PositiveUsize) -> Self {
        value.get()
    }
}
