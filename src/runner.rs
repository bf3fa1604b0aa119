//! Turns parsed arguments into a run: request template, execution plan,
//! transport, and the final summary.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use crate::args::{HttpMethod, LoadArgs, RandomField};
use crate::error::{AppResult, ConfigError};
use crate::evaluator::ResponseEvaluator;
use crate::idempotency::IdempotencyKeyProvider;
use crate::scheduler::{ExecutionPlan, Scheduler};
use crate::shutdown::ShutdownSender;
use crate::summary::{RunSummary, RunTarget, emit_summary};
use crate::template::{
    DEFAULT_ORDER_URL, RequestConfig, RequestTemplate, order_body, order_random_fields,
};
use crate::transport::{HttpClientSettings, ReqwestTransport, Transport};

/// Run length when neither a duration, an iteration count nor stages are set.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(30);

const IDEMPOTENCY_SLOT: &str = "{{idempotency_key}}";

/// Builds the request every iteration sends. Without a body template, methods
/// that carry a body send the default order payload.
///
/// # Errors
///
/// Returns an error when the body template cannot be read or parsed.
pub fn build_request_config(args: &LoadArgs) -> Result<RequestConfig, ConfigError> {
    let url = args
        .url
        .clone()
        .unwrap_or_else(|| DEFAULT_ORDER_URL.to_owned());
    let mut config = RequestConfig::new(args.method, url);

    let body = match (&args.body, &args.body_file) {
        (Some(body), _) => Some(parse_body(body)?),
        (None, Some(path)) => Some(read_body_file(Path::new(path))?),
        (None, None) if method_sends_body(args.method) => {
            config.random_fields = order_random_fields();
            Some(order_body())
        }
        (None, None) => None,
    };
    for field in &args.random {
        upsert_random_field(&mut config.random_fields, field);
    }
    config.vars = args.vars.clone();

    if body.is_some() {
        config.set_header("Content-Type", "application/json");
    }
    config.body = body;
    match args.token.as_deref() {
        Some(token) => config.set_header("Authorization", &format!("Bearer {}", token)),
        None => warn!("No token configured; requests are sent without an Authorization header"),
    }
    config.set_header(&args.idempotency_header, IDEMPOTENCY_SLOT);
    for (name, value) in &args.headers {
        config.set_header(name, value);
    }
    Ok(config)
}

/// # Errors
///
/// Returns an error when the plan is inconsistent.
pub fn build_plan(args: &LoadArgs) -> Result<ExecutionPlan, ConfigError> {
    let mut plan = ExecutionPlan::new(args.vus.get());
    plan.iterations = args.iterations.map(u64::from);
    plan.duration = args.duration;
    plan.stages = args.stages.clone();
    if plan.iterations.is_none() && plan.duration.is_none() && plan.stages.is_empty() {
        info!(
            "No duration, iteration count or stages given; running for {}s",
            DEFAULT_DURATION.as_secs()
        );
        plan.duration = Some(DEFAULT_DURATION);
    }
    plan.think_time = args.think_time;
    plan.rate_limit = args.rate_limit.map(u64::from);
    plan.request_timeout = args.request_timeout;
    plan.drain_timeout = args.drain_timeout;
    plan.tick_interval = Duration::from_millis(args.tick_interval.get());
    plan.seed = args.seed;
    plan.validate()?;
    Ok(plan)
}

/// Runs the load test described by `args` over HTTP and emits the summary.
///
/// # Errors
///
/// Returns an error for invalid configuration, a client that cannot be built,
/// or a summary that cannot be written. Failed iterations are not errors.
pub async fn run(args: &LoadArgs, shutdown_tx: &ShutdownSender) -> AppResult<RunSummary> {
    let transport = ReqwestTransport::new(&HttpClientSettings {
        request_timeout: args.request_timeout,
        connect_timeout: args.connect_timeout,
        disable_keepalive: args.disable_keepalive,
        insecure: args.insecure,
    })?;
    let summary = run_with_transport(args, Arc::new(transport), shutdown_tx).await?;
    emit_summary(
        &summary,
        args.output_format,
        args.output.as_deref().map(Path::new),
    )
    .await?;
    Ok(summary)
}

/// Same as [`run`] with a caller-supplied transport, without emitting.
///
/// # Errors
///
/// Returns an error for invalid configuration or a failed collector.
pub async fn run_with_transport(
    args: &LoadArgs,
    transport: Arc<dyn Transport>,
    shutdown_tx: &ShutdownSender,
) -> AppResult<RunSummary> {
    let request = build_request_config(args)?;
    let template = RequestTemplate::compile(&request)?;
    let plan = build_plan(args)?;
    let target = RunTarget {
        method: args.method.as_str().to_owned(),
        url: request.url.clone(),
        vus: plan.pool_size(),
        expected_status: args.expected_status_code,
    };

    info!(
        "Starting {} {} with {} vus ({} idempotency keys)",
        target.method,
        target.url,
        target.vus,
        args.idempotency.as_str()
    );
    let scheduler = Scheduler::new(
        plan,
        template,
        IdempotencyKeyProvider::new(args.idempotency),
        ResponseEvaluator::new(args.expected_status_code),
        transport,
    )?;
    let outcome = scheduler.run(shutdown_tx).await?;
    info!(
        "Run finished ({}): {} iterations, {} failed",
        outcome.stop_reason, outcome.stats.total, outcome.stats.failed
    );
    Ok(RunSummary::new(target, &outcome))
}

const fn method_sends_body(method: HttpMethod) -> bool {
    matches!(method, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
}

fn parse_body(body: &str) -> Result<Value, ConfigError> {
    serde_json::from_str(body).map_err(|source| ConfigError::InvalidBody { source })
}

fn read_body_file(path: &Path) -> Result<Value, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadBody {
        path: path.to_path_buf(),
        source,
    })?;
    parse_body(&content)
}

fn upsert_random_field(fields: &mut Vec<RandomField>, field: &RandomField) {
    match fields.iter_mut().find(|existing| existing.name == field.name) {
        Some(existing) => *existing = field.clone(),
        None => fields.push(field.clone()),
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use clap::Parser;

    use super::*;
    use crate::args::ThinkTime;
    use crate::scheduler::StopReason;
    use crate::shutdown_handlers::shutdown_channel;
    use crate::template::MaterializedRequest;
    use crate::transport::{TransportFailure, TransportResponse};

    fn run_async_test<F>(future: F) -> Result<(), String>
    where
        F: Future<Output = Result<(), String>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime.block_on(future)
    }

    fn parse_args(extra: &[&str]) -> Result<LoadArgs, String> {
        let mut argv = vec!["surge"];
        argv.extend_from_slice(extra);
        LoadArgs::try_parse_from(argv).map_err(|err| err.to_string())
    }

    #[derive(Default)]
    struct CountingTransport {
        calls: AtomicU64,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(
            &self,
            _request: MaterializedRequest,
        ) -> Result<TransportResponse, TransportFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse {
                status: 201,
                body_bytes: 0,
            })
        }
    }

    #[test]
    fn default_request_reproduces_order_workload() -> Result<(), String> {
        let args = parse_args(&["--token", "secret"])?;
        let config = build_request_config(&args).map_err(|err| err.to_string())?;
        if config.url != DEFAULT_ORDER_URL || config.method != HttpMethod::Post {
            return Err(format!("Unexpected target: {} {}", config.method.as_str(), config.url));
        }
        if config.header("authorization") != Some("Bearer secret") {
            return Err("Missing bearer token".to_owned());
        }
        if config.header("Idempotent-Key") != Some(IDEMPOTENCY_SLOT) {
            return Err("Missing idempotency header".to_owned());
        }
        if config.header("Content-Type") != Some("application/json") {
            return Err("Missing content type".to_owned());
        }
        if config.body != Some(order_body()) || config.random_fields != order_random_fields() {
            return Err("Default body must be the order payload".to_owned());
        }
        Ok(())
    }

    #[test]
    fn custom_body_and_headers_override_defaults() -> Result<(), String> {
        let args = parse_args(&[
            "--body",
            r#"{"sku": "{{sku}}"}"#,
            "--random",
            "sku=10..20",
            "-H",
            "content-type: application/vnd.order+json",
            "--idempotency-header",
            "X-Request-Key",
        ])?;
        let config = build_request_config(&args).map_err(|err| err.to_string())?;
        if config.header("Content-Type") != Some("application/vnd.order+json") {
            return Err(format!("Header override lost: {:?}", config.headers()));
        }
        if config.header("X-Request-Key") != Some(IDEMPOTENCY_SLOT)
            || config.header("Idempotent-Key").is_some()
        {
            return Err(format!("Unexpected idempotency header: {:?}", config.headers()));
        }
        if config.header("Authorization").is_some() {
            return Err("No token means no Authorization header".to_owned());
        }
        if config.random_fields.len() != 1 {
            return Err(format!("Unexpected random fields: {:?}", config.random_fields));
        }
        RequestTemplate::compile(&config).map_err(|err| err.to_string())?;
        Ok(())
    }

    #[test]
    fn get_without_body_sends_no_payload() -> Result<(), String> {
        let args = parse_args(&["-X", "get"])?;
        let config = build_request_config(&args).map_err(|err| err.to_string())?;
        if config.body.is_some() || config.header("Content-Type").is_some() {
            return Err("GET without a body template must not send one".to_owned());
        }
        Ok(())
    }

    #[test]
    fn invalid_body_is_a_config_error() -> Result<(), String> {
        let args = parse_args(&["--body", "{not json"])?;
        if !matches!(
            build_request_config(&args),
            Err(ConfigError::InvalidBody { .. })
        ) {
            return Err("Expected InvalidBody".to_owned());
        }
        Ok(())
    }

    #[test]
    fn body_file_is_read() -> Result<(), String> {
        let dir = tempfile::tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
        let path = dir.path().join("body.json");
        std::fs::write(&path, r#"{"id": "{{iteration}}"}"#)
            .map_err(|err| format!("write failed: {}", err))?;
        let path_arg = path.to_string_lossy().into_owned();
        let args = parse_args(&["--body-file", &path_arg])?;
        let config = build_request_config(&args).map_err(|err| err.to_string())?;
        if config.body != Some(serde_json::json!({"id": "{{iteration}}"})) {
            return Err(format!("Unexpected body: {:?}", config.body));
        }
        Ok(())
    }

    #[test]
    fn plan_defaults_to_thirty_seconds() -> Result<(), String> {
        let plan = build_plan(&parse_args(&[])?).map_err(|err| err.to_string())?;
        if plan.duration != Some(DEFAULT_DURATION) || plan.iterations.is_some() {
            return Err(format!("Unexpected plan: {:?}", plan));
        }
        if plan.think_time != ThinkTime::Fixed(Duration::from_secs(1)) {
            return Err(format!("Unexpected think time: {}", plan.think_time));
        }
        Ok(())
    }

    #[test]
    fn plan_rejects_duration_with_stages() -> Result<(), String> {
        let args = parse_args(&["--duration", "10s", "--stage", "5s:2"])?;
        if !matches!(build_plan(&args), Err(ConfigError::Conflict { .. })) {
            return Err("Expected duration/stages conflict".to_owned());
        }
        Ok(())
    }

    #[test]
    fn run_with_transport_applies_expected_status() -> Result<(), String> {
        run_async_test(async {
            let args = parse_args(&[
                "--iterations",
                "3",
                "--think-time",
                "none",
                "--status",
                "201",
                "--token",
                "t",
            ])?;
            let transport = Arc::new(CountingTransport::default());
            let (shutdown_tx, _) = shutdown_channel();
            let summary = run_with_transport(&args, transport.clone(), &shutdown_tx)
                .await
                .map_err(|err| err.to_string())?;
            if summary.total != 3 || summary.passed != 3 {
                return Err(format!("Unexpected summary: {:?}", summary));
            }
            if summary.stop_reason != StopReason::IterationsCompleted {
                return Err(format!("Unexpected stop reason: {}", summary.stop_reason));
            }
            if transport.calls.load(Ordering::SeqCst) != 3 {
                return Err("Transport must see every iteration".to_owned());
            }
            Ok(())
        })
    }

    #[test]
    fn staged_run_reports_peak_pool_size() -> Result<(), String> {
        run_async_test(async {
            let args = parse_args(&[
                "--vus",
                "1",
                "--stage",
                "200ms:3",
                "--think-time",
                "10ms",
                "--status",
                "201",
            ])?;
            let transport = Arc::new(CountingTransport::default());
            let (shutdown_tx, _) = shutdown_channel();
            let summary = run_with_transport(&args, transport, &shutdown_tx)
                .await
                .map_err(|err| err.to_string())?;
            if summary.target.vus != 3 {
                return Err(format!("Summary must report the peak of 3 vus, got {}", summary.target.vus));
            }
            if !summary.to_string().contains("Virtual Users: 3") {
                return Err(format!("Unexpected text summary:\n{}", summary));
            }
            Ok(())
        })
    }

    #[test]
    fn config_errors_surface_before_traffic() -> Result<(), String> {
        run_async_test(async {
            let args = parse_args(&["--body", r#"{"q": "{{undeclared}}"}"#, "-i", "1"])?;
            let transport = Arc::new(CountingTransport::default());
            let (shutdown_tx, _) = shutdown_channel();
            let result = run_with_transport(&args, transport.clone(), &shutdown_tx).await;
            match result {
                Err(err) if err.is_config() => {}
                other => return Err(format!("Expected config error, got {:?}", other)),
            }
            if transport.calls.load(Ordering::SeqCst) != 0 {
                return Err("No request may be sent on config errors".to_owned());
            }
            Ok(())
        })
    }
}
