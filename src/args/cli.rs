use std::collections::BTreeMap;
use std::time::Duration;

use clap::Parser;

use super::parsers::{
    parse_duration_arg, parse_header, parse_positive_u64, parse_positive_usize,
    parse_random_field, parse_stage, parse_think_time,
};
use super::types::{
    HttpMethod, IdempotencyMode, OutputFormat, PositiveU64, PositiveUsize, RampStage, RandomField,
    ThinkTime,
};

#[derive(Debug, Parser, Clone)]
#[clap(
    version,
    about = "Async HTTP load generator for order-creation endpoints - templated payloads, idempotency keys, ramp stages, and latency percentiles."
)]
pub struct LoadArgs {
    /// HTTP method to use
    #[arg(long, short = 'X', default_value = "post", ignore_case = true, env = "SURGE_METHOD")]
    pub method: HttpMethod,

    /// Target URL (defaults to the local order service)
    #[arg(long, short, env = "SURGE_URL")]
    pub url: Option<String>,

    /// HTTP headers in 'Key: Value' format (repeatable)
    #[arg(long = "header", short = 'H', value_parser = parse_header)]
    pub headers: Vec<(String, String)>,

    /// Bearer token sent as 'Authorization: Bearer <token>'
    #[arg(long, env = "SURGE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Idempotency key mode
    #[arg(long, value_enum, default_value = "per-run", env = "SURGE_IDEMPOTENCY")]
    pub idempotency: IdempotencyMode,

    /// Header carrying the idempotency key
    #[arg(long = "idempotency-header", default_value = "Idempotent-Key")]
    pub idempotency_header: String,

    /// JSON body template; `{{name}}` slots are filled per iteration
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the JSON body template from a file
    #[arg(long = "body-file")]
    pub body_file: Option<String>,

    /// Random integer slot as 'name=min..max' (repeatable)
    #[arg(long = "random", value_parser = parse_random_field)]
    pub random: Vec<RandomField>,

    /// Deterministic template values (config file only)
    #[arg(skip)]
    pub vars: BTreeMap<String, serde_json::Value>,

    /// Number of virtual users (starting concurrency when stages are set)
    #[arg(
        long,
        default_value = "1",
        value_parser = parse_positive_usize,
        env = "SURGE_VUS"
    )]
    pub vus: PositiveUsize,

    /// Stop after N total iterations
    #[arg(long, short = 'i', value_parser = parse_positive_u64, env = "SURGE_ITERATIONS")]
    pub iterations: Option<PositiveU64>,

    /// Run duration (supports ms/s/m/h)
    #[arg(long, short = 't', value_parser = parse_duration_arg, env = "SURGE_DURATION")]
    pub duration: Option<Duration>,

    /// Ramp stage as 'duration:target' (repeatable, e.g. 30s:10)
    #[arg(long = "stage", value_parser = parse_stage)]
    pub stages: Vec<RampStage>,

    /// Pause between iterations: a duration, 'min..max' for jitter, or 'none'
    #[arg(
        long = "think-time",
        default_value = "1s",
        value_parser = parse_think_time,
        env = "SURGE_THINK_TIME"
    )]
    pub think_time: ThinkTime,

    /// Cap iterations per second across all virtual users
    #[arg(long = "rate", short = 'r', value_parser = parse_positive_u64)]
    pub rate_limit: Option<PositiveU64>,

    /// Expected HTTP status code
    #[arg(long = "status", short = 's', default_value = "200", env = "SURGE_EXPECTED_STATUS")]
    pub expected_status_code: u16,

    /// Request timeout (supports ms/s/m/h)
    #[arg(long = "timeout", default_value = "10s", value_parser = parse_duration_arg)]
    pub request_timeout: Duration,

    /// Timeout for establishing a new connection (supports ms/s/m/h)
    #[arg(long = "connect-timeout", default_value = "5s", value_parser = parse_duration_arg)]
    pub connect_timeout: Duration,

    /// How long in-flight requests may finish after stop (supports ms/s/m/h)
    #[arg(long = "drain-timeout", default_value = "5s", value_parser = parse_duration_arg)]
    pub drain_timeout: Duration,

    /// Scheduler tick interval in milliseconds
    #[arg(long = "tick-interval", default_value = "100", value_parser = parse_positive_u64)]
    pub tick_interval: PositiveU64,

    /// Seed for payload randomness (reproducible bodies)
    #[arg(long, env = "SURGE_SEED")]
    pub seed: Option<u64>,

    /// Disable HTTP keep-alive
    #[arg(long = "disable-keepalive")]
    pub disable_keepalive: bool,

    /// Accept invalid TLS certificates
    #[arg(long)]
    pub insecure: bool,

    /// Summary format
    #[arg(long = "output-format", value_enum, default_value = "text")]
    pub output_format: OutputFormat,

    /// Write the summary to a file instead of stdout
    #[arg(long, short)]
    pub output: Option<String>,

    /// Enable verbose logging (debug unless overridden by SURGE_LOG/RUST_LOG)
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Path to config file (TOML/JSON). Defaults to ./surge.toml or ./surge.json if present.
    #[arg(long)]
    pub config: Option<String>,
}
