use std::time::Duration;

use serde::Serialize;

use crate::args::RampStage;

/// Lifecycle of a run: `Idle → RampingUp → Steady → RampingDown → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchedulerPhase {
    Idle,
    RampingUp,
    Steady,
    RampingDown,
    Stopped,
}

impl SchedulerPhase {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SchedulerPhase::Idle => "idle",
            SchedulerPhase::RampingUp => "ramping-up",
            SchedulerPhase::Steady => "steady",
            SchedulerPhase::RampingDown => "ramping-down",
            SchedulerPhase::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the controller publishes on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseState {
    pub phase: SchedulerPhase,
    /// Number of workers that should be running iterations.
    pub target: usize,
}

impl PhaseState {
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            target: 0,
        }
    }

    #[must_use]
    pub const fn stopped() -> Self {
        Self {
            phase: SchedulerPhase::Stopped,
            target: 0,
        }
    }

    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self.phase, SchedulerPhase::Stopped)
    }

    /// Whether worker `id` should be running iterations.
    #[must_use]
    pub const fn admits(&self, id: usize) -> bool {
        !self.is_stopped() && id < self.target
    }
}

/// Target concurrency over time. Each stage moves linearly from the previous
/// stage's target (the first from `start`) to its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RampProfile {
    start: usize,
    stages: Vec<RampStage>,
}

impl RampProfile {
    #[must_use]
    pub const fn new(start: usize, stages: Vec<RampStage>) -> Self {
        Self { start, stages }
    }

    #[must_use]
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |total, stage| {
                total.saturating_add(stage.duration)
            })
    }

    /// Phase and target concurrency `elapsed` into the run. Past the last
    /// stage the final target holds steady.
    #[must_use]
    pub fn at(&self, elapsed: Duration) -> PhaseState {
        let mut stage_start = self.start;
        let mut stage_offset = Duration::ZERO;
        for stage in &self.stages {
            let stage_end = stage_offset.saturating_add(stage.duration);
            if elapsed < stage_end {
                let into_stage = elapsed.saturating_sub(stage_offset);
                return PhaseState {
                    phase: phase_between(stage_start, stage.target),
                    target: interpolate(stage_start, stage.target, into_stage, stage.duration),
                };
            }
            stage_start = stage.target;
            stage_offset = stage_end;
        }
        PhaseState {
            phase: SchedulerPhase::Steady,
            target: stage_start,
        }
    }
}

const fn phase_between(start: usize, target: usize) -> SchedulerPhase {
    if target > start {
        SchedulerPhase::RampingUp
    } else if target < start {
        SchedulerPhase::RampingDown
    } else {
        SchedulerPhase::Steady
    }
}

fn interpolate(start: usize, target: usize, elapsed: Duration, length: Duration) -> usize {
    let length_ms = i128::try_from(length.as_millis()).unwrap_or(i128::MAX).max(1);
    let elapsed_ms = i128::try_from(elapsed.as_millis())
        .unwrap_or(i128::MAX)
        .min(length_ms);

    let start = i128::try_from(start).unwrap_or(i128::MAX);
    let target = i128::try_from(target).unwrap_or(i128::MAX);
    let delta = target.saturating_sub(start);
    let step = delta
        .saturating_mul(elapsed_ms)
        .checked_div(length_ms)
        .unwrap_or(0);
    let current = start.saturating_add(step);
    if current < 0 {
        0
    } else {
        usize::try_from(current).unwrap_or(usize::MAX)
    }
}
