use std::time::Duration;

use crate::args::{RampStage, ThinkTime};
use crate::error::ConfigError;

use super::ramp::RampProfile;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How a run is paced and when it ends. Fixed once the scheduler starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub vus: usize,
    pub iterations: Option<u64>,
    pub duration: Option<Duration>,
    pub stages: Vec<RampStage>,
    pub think_time: ThinkTime,
    /// Iterations per second across all workers.
    pub rate_limit: Option<u64>,
    pub request_timeout: Duration,
    pub drain_timeout: Duration,
    pub tick_interval: Duration,
    pub seed: Option<u64>,
}

impl ExecutionPlan {
    /// Plan for `vus` users with no end condition and no pacing.
    #[must_use]
    pub const fn new(vus: usize) -> Self {
        Self {
            vus,
            iterations: None,
            duration: None,
            stages: Vec::new(),
            think_time: ThinkTime::None,
            rate_limit: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            tick_interval: DEFAULT_TICK_INTERVAL,
            seed: None,
        }
    }

    /// # Errors
    ///
    /// Returns an error when a count or timeout is zero, when both a duration
    /// and ramp stages are set, or when the stages are unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vus == 0 {
            return Err(ConfigError::FieldMustBePositive { field: "vus" });
        }
        if self.iterations == Some(0) {
            return Err(ConfigError::FieldMustBePositive {
                field: "iterations",
            });
        }
        if self.duration == Some(Duration::ZERO) {
            return Err(ConfigError::FieldMustBePositive { field: "duration" });
        }
        if self.rate_limit == Some(0) {
            return Err(ConfigError::FieldMustBePositive { field: "rate" });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::FieldMustBePositive { field: "timeout" });
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::FieldMustBePositive {
                field: "tick_interval",
            });
        }
        if let ThinkTime::Jittered { min, max } = self.think_time
            && min > max
        {
            return Err(ConfigError::ThinkTimeRange);
        }
        if self.stages.is_empty() {
            return Ok(());
        }
        if self.duration.is_some() {
            return Err(ConfigError::Conflict {
                left: "duration",
                right: "stages",
            });
        }
        if let Some(index) = self.stages.iter().position(|stage| stage.duration.is_zero()) {
            return Err(ConfigError::StageDurationZero { index });
        }
        if self.stages.iter().all(|stage| stage.target == 0) {
            return Err(ConfigError::StagesWithoutUsers);
        }
        Ok(())
    }

    /// Number of workers to spawn: enough for the highest concurrency the run
    /// ever asks for.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| stage.target)
            .fold(self.vus, usize::max)
    }

    /// Wall-clock limit: the configured duration, or the length of the stages.
    #[must_use]
    pub fn run_limit(&self) -> Option<Duration> {
        if let Some(duration) = self.duration {
            return Some(duration);
        }
        if self.stages.is_empty() {
            return None;
        }
        Some(self.ramp().total_duration())
    }

    #[must_use]
    pub fn ramp(&self) -> RampProfile {
        RampProfile::new(self.vus, self.stages.clone())
    }
}
