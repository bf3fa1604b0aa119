use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::args::{HttpMethod, IdempotencyMode, OutputFormat, ThinkTime};
use crate::error::ValidationError;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub method: Option<HttpMethod>,
    pub url: Option<String>,
    pub headers: Option<Vec<String>>,
    pub token: Option<String>,
    pub idempotency: Option<IdempotencyMode>,
    pub idempotency_header: Option<String>,
    pub body: Option<serde_json::Value>,
    pub random: Option<BTreeMap<String, RandomRangeConfig>>,
    pub vars: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(alias = "concurrency")]
    pub vus: Option<usize>,
    pub iterations: Option<u64>,
    pub duration: Option<DurationValue>,
    pub stages: Option<Vec<StageConfig>>,
    pub think_time: Option<ThinkTime>,
    pub rate: Option<u64>,
    pub status: Option<u16>,
    pub timeout: Option<DurationValue>,
    pub connect_timeout: Option<DurationValue>,
    pub drain_timeout: Option<DurationValue>,
    pub tick_interval: Option<u64>,
    pub seed: Option<u64>,
    pub disable_keepalive: Option<bool>,
    pub insecure: Option<bool>,
    pub output: Option<String>,
    pub output_format: Option<OutputFormat>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RandomRangeConfig {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    pub duration: DurationValue,
    pub target: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl DurationValue {
    pub(crate) fn to_duration(&self) -> Result<Duration, ValidationError> {
        match self {
            DurationValue::Seconds(secs) => {
                if *secs == 0 {
                    Err(ValidationError::DurationZero)
                } else {
                    Ok(Duration::from_secs(*secs))
                }
            }
            DurationValue::Text(text) => crate::args::parse_duration_arg(text),
        }
    }
}
