//! Execution scheduler: spawns the virtual users, moves the run through its
//! phases and decides when it ends.
mod limiter;
mod plan;
mod ramp;
mod rate;
mod worker;


use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior, sleep_until, timeout_at};
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult, ConfigError};
use crate::evaluator::ResponseEvaluator;
use crate::idempotency::IdempotencyKeyProvider;
use crate::metrics::{AggregateStats, MetricsHandle, RECORD_CHANNEL_CAPACITY, setup_metrics_collector};
use crate::shutdown::{ShutdownReceiver, ShutdownSender};
use crate::template::RequestTemplate;
use crate::transport::Transport;

use limiter::IterationLimiter;
use rate::spawn_fixed_rate_controller;
use worker::{Worker, WorkerShared};

pub use plan::{
    DEFAULT_DRAIN_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TICK_INTERVAL, ExecutionPlan,
};
pub use ramp::{PhaseState, RampProfile, SchedulerPhase};

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    IterationsCompleted,
    DurationElapsed,
    Signal,
}

impl StopReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StopReason::IterationsCompleted => "iterations completed",
            StopReason::DurationElapsed => "duration elapsed",
            StopReason::Signal => "stop signal",
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub stats: AggregateStats,
    pub stop_reason: StopReason,
    /// Wall-clock start, ms since the epoch.
    pub started_at_ms: i64,
}

pub struct Scheduler {
    plan: ExecutionPlan,
    template: Arc<RequestTemplate>,
    keys: Arc<IdempotencyKeyProvider>,
    evaluator: ResponseEvaluator,
    transport: Arc<dyn Transport>,
}

impl Scheduler {
    /// # Errors
    ///
    /// Returns an error if the plan is invalid.
    pub fn new(
        plan: ExecutionPlan,
        template: RequestTemplate,
        keys: IdempotencyKeyProvider,
        evaluator: ResponseEvaluator,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        plan.validate()?;
        Ok(Self {
            plan,
            template: Arc::new(template),
            keys: Arc::new(keys),
            evaluator,
            transport,
        })
    }

    #[must_use]
    pub const fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Runs to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the collector cannot start or a task panics.
    pub async fn run(self, shutdown_tx: &ShutdownSender) -> AppResult<RunOutcome> {
        self.start(shutdown_tx)?.wait().await
    }

    /// Spawns the collector, the controller and the worker pool, and returns
    /// a handle to observe and await the run. Must be called inside a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics collector cannot be created.
    pub fn start(self, shutdown_tx: &ShutdownSender) -> AppResult<RunningScheduler> {
        let run_start = Instant::now();
        let started_at_ms = chrono::Utc::now().timestamp_millis();
        let (records_tx, records_rx) = mpsc::channel(RECORD_CHANNEL_CAPACITY);
        let (collector, metrics) = setup_metrics_collector(run_start, records_rx)?;

        let (phase_tx, phase_rx) = watch::channel(PhaseState::idle());
        let (abandon_tx, abandon_rx) = watch::channel(false);
        let (stop_tx, stop_rx) = mpsc::channel(1);

        let (rate_limiter, rate_controller) = match self.plan.rate_limit {
            Some(rate) => {
                let limiter = Arc::new(Semaphore::new(0));
                let controller = spawn_fixed_rate_controller(Arc::clone(&limiter), rate);
                (Some(limiter), Some(controller))
            }
            None => (None, None),
        };

        let shared = Arc::new(WorkerShared {
            template: self.template,
            keys: self.keys,
            evaluator: self.evaluator,
            transport: self.transport,
            limiter: IterationLimiter::new(self.plan.iterations),
            rate_limiter,
            think_time: self.plan.think_time,
            request_timeout: self.plan.request_timeout,
        });

        let pool_size = self.plan.pool_size();
        let mut workers = JoinSet::new();
        for id in 0..pool_size {
            let worker = Worker {
                id,
                shared: Arc::clone(&shared),
                rng: worker_rng(self.plan.seed, id),
                phase_rx: phase_rx.clone(),
                abandon_rx: abandon_rx.clone(),
                records_tx: records_tx.clone(),
                stop_tx: stop_tx.clone(),
            };
            workers.spawn(worker.run());
        }
        drop(records_tx);
        drop(stop_tx);
        debug!("Spawned {} workers", pool_size);

        let controller = Controller {
            ramp: self.plan.ramp(),
            tick_interval: self.plan.tick_interval,
            deadline: self
                .plan
                .run_limit()
                .and_then(|limit| run_start.checked_add(limit)),
            run_start,
            phase_tx,
            stop_rx,
            shutdown_rx: shutdown_tx.subscribe(),
            shutdown_guard: shutdown_tx.clone(),
        };
        let controller = tokio::spawn(controller.run());

        Ok(RunningScheduler {
            phase_rx,
            metrics,
            controller,
            collector,
            workers,
            rate_controller,
            abandon_tx,
            shared,
            drain_timeout: self.plan.drain_timeout,
            started_at_ms,
        })
    }
}

/// A run in progress.
pub struct RunningScheduler {
    phase_rx: watch::Receiver<PhaseState>,
    metrics: MetricsHandle,
    controller: tokio::task::JoinHandle<StopReason>,
    collector: tokio::task::JoinHandle<AggregateStats>,
    workers: JoinSet<()>,
    rate_controller: Option<tokio::task::JoinHandle<()>>,
    abandon_tx: watch::Sender<bool>,
    shared: Arc<WorkerShared>,
    drain_timeout: Duration,
    started_at_ms: i64,
}

impl RunningScheduler {
    /// Receiver of the current phase and target concurrency.
    #[must_use]
    pub fn phase(&self) -> watch::Receiver<PhaseState> {
        self.phase_rx.clone()
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsHandle {
        self.metrics.clone()
    }

    /// Waits for the stop condition, drains in-flight iterations and returns
    /// the final stats.
    ///
    /// # Errors
    ///
    /// Returns an error if the controller or the collector task fails.
    pub async fn wait(mut self) -> AppResult<RunOutcome> {
        let stop_reason = self.controller.await.map_err(AppError::from)?;

        let drain_deadline = Instant::now()
            .checked_add(self.drain_timeout)
            .unwrap_or_else(Instant::now);
        while let Ok(Some(joined)) = timeout_at(drain_deadline, self.workers.join_next()).await {
            log_join_error(joined);
        }
        if !self.workers.is_empty() {
            warn!(
                "Drain timeout of {}ms reached; cancelling {} in-flight iterations",
                self.drain_timeout.as_millis(),
                self.workers.len()
            );
            self.abandon_tx.send_replace(true);
            while let Some(joined) = self.workers.join_next().await {
                log_join_error(joined);
            }
        }
        if let Some(rate_controller) = self.rate_controller.take() {
            rate_controller.abort();
        }
        debug!("{} iterations reserved", self.shared.limiter.reserved());

        let stats = self.collector.await.map_err(AppError::from)?;
        Ok(RunOutcome {
            stats,
            stop_reason,
            started_at_ms: self.started_at_ms,
        })
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        warn!("Worker task failed: {}", err);
    }
}

/// Moves the run through its phases and decides when it stops.
struct Controller {
    ramp: RampProfile,
    tick_interval: Duration,
    deadline: Option<Instant>,
    run_start: Instant,
    phase_tx: watch::Sender<PhaseState>,
    stop_rx: mpsc::Receiver<StopReason>,
    shutdown_rx: ShutdownReceiver,
    // Keeps the shutdown channel open so `recv` only returns on a real signal.
    shutdown_guard: ShutdownSender,
}

impl Controller {
    async fn run(mut self) -> StopReason {
        let mut tick = tokio::time::interval(self.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let deadline = self.deadline;
        let until_deadline = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(until_deadline);

        let mut current = PhaseState::idle();
        let reason = loop {
            tokio::select! {
                _ = tick.tick() => {
                    let next = self.ramp.at(self.run_start.elapsed());
                    if next.phase != current.phase {
                        info!("Phase {} -> {} (target {} vus)", current.phase, next.phase, next.target);
                    }
                    if next != current {
                        current = next;
                        self.phase_tx.send_replace(current);
                    }
                }
                () = &mut until_deadline => break StopReason::DurationElapsed,
                Some(reason) = self.stop_rx.recv() => break reason,
                _ = self.shutdown_rx.recv() => break StopReason::Signal,
            }
        };

        info!("Phase {} -> {} ({})", current.phase, SchedulerPhase::Stopped, reason);
        self.phase_tx.send_replace(PhaseState::stopped());
        drop(self.shutdown_guard);
        reason
    }
}

fn worker_rng(seed: Option<u64>, id: usize) -> StdRng {
    match seed {
        Some(seed) => {
            let offset = u64::try_from(id).unwrap_or(u64::MAX);
            StdRng::seed_from_u64(seed.wrapping_add(offset.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
        }
        None => StdRng::from_entropy(),
    }
}
