use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::time::{Instant, sleep, timeout};
use tracing::debug;

use crate::args::ThinkTime;
use crate::evaluator::{FailureReason, ResponseEvaluator, ResultRecord};
use crate::idempotency::IdempotencyKeyProvider;
use crate::template::{IterationContext, RequestTemplate};
use crate::transport::{Transport, TransportErrorKind, TransportFailure, TransportResponse};

use super::StopReason;
use super::limiter::IterationLimiter;
use super::ramp::PhaseState;

/// State shared by every worker of one run.
pub(super) struct WorkerShared {
    pub template: Arc<RequestTemplate>,
    pub keys: Arc<IdempotencyKeyProvider>,
    pub evaluator: ResponseEvaluator,
    pub transport: Arc<dyn Transport>,
    pub limiter: IterationLimiter,
    pub rate_limiter: Option<Arc<Semaphore>>,
    pub think_time: ThinkTime,
    pub request_timeout: Duration,
}

/// One virtual user.
pub(super) struct Worker {
    pub id: usize,
    pub shared: Arc<WorkerShared>,
    pub rng: StdRng,
    pub phase_rx: watch::Receiver<PhaseState>,
    pub abandon_rx: watch::Receiver<bool>,
    pub records_tx: mpsc::Sender<ResultRecord>,
    pub stop_tx: mpsc::Sender<StopReason>,
}

impl Worker {
    pub(super) async fn run(mut self) {
        loop {
            if !self.wait_until_admitted().await {
                break;
            }
            if !self.acquire_rate_permit().await {
                break;
            }
            let Some(reservation) = self.shared.limiter.try_reserve() else {
                break;
            };
            if reservation.last {
                drop(self.stop_tx.try_send(StopReason::IterationsCompleted));
            }

            let record = self.run_iteration(reservation.iteration).await;
            let cancelled =
                record.failure == Some(FailureReason::Transport(TransportErrorKind::Cancelled));
            if self.records_tx.send(record).await.is_err() || cancelled {
                break;
            }

            if !self.think().await {
                break;
            }
        }
        debug!(worker = self.id, "Worker exited");
    }

    async fn run_iteration(&mut self, iteration: u64) -> ResultRecord {
        let shared = Arc::clone(&self.shared);
        let random_values = shared.template.draw(&mut self.rng);
        let ctx = IterationContext::new(self.id, iteration, shared.keys.next_key(), random_values);
        let request = shared.template.materialize(&ctx);

        let sent_at = Instant::now();
        let outcome = tokio::select! {
            result = timeout(shared.request_timeout, shared.transport.send(request)) => {
                flatten_timeout(result, shared.request_timeout)
            }
            Ok(_) = self.abandon_rx.wait_for(|abandon| *abandon) => Err(TransportFailure::new(
                TransportErrorKind::Cancelled,
                "request still in flight at drain deadline",
            )),
        };
        shared.evaluator.evaluate(&ctx, outcome, sent_at.elapsed())
    }

    /// Waits until this worker falls under the target concurrency. Returns
    /// false once the run has stopped.
    async fn wait_until_admitted(&mut self) -> bool {
        let id = self.id;
        match self
            .phase_rx
            .wait_for(|state| state.is_stopped() || state.admits(id))
            .await
        {
            Ok(state) => !state.is_stopped(),
            Err(_closed) => false,
        }
    }

    async fn acquire_rate_permit(&mut self) -> bool {
        let Some(rate_limiter) = self.shared.rate_limiter.clone() else {
            return true;
        };
        tokio::select! {
            permit = rate_limiter.acquire() => match permit {
                Ok(permit) => {
                    permit.forget();
                    true
                }
                Err(_closed) => false,
            },
            _ = self.phase_rx.wait_for(PhaseState::is_stopped) => false,
        }
    }

    /// Pauses between iterations. Returns false if the run stopped meanwhile.
    async fn think(&mut self) -> bool {
        let pause = match self.shared.think_time {
            ThinkTime::None => {
                tokio::task::yield_now().await;
                return !self.phase_rx.borrow().is_stopped();
            }
            ThinkTime::Fixed(pause) => pause,
            ThinkTime::Jittered { min, max } => self.rng.gen_range(min..=max),
        };
        let slept = tokio::select! {
            () = sleep(pause) => true,
            _ = self.phase_rx.wait_for(PhaseState::is_stopped) => false,
        };
        slept && !self.phase_rx.borrow().is_stopped()
    }
}

fn flatten_timeout(
    result: Result<Result<TransportResponse, TransportFailure>, tokio::time::error::Elapsed>,
    request_timeout: Duration,
) -> Result<TransportResponse, TransportFailure> {
    match result {
        Ok(outcome) => outcome,
        Err(_elapsed) => Err(TransportFailure::new(
            TransportErrorKind::Timeout,
            format!("no response within {}ms", request_timeout.as_millis()),
        )),
    }
}
