use clap::ArgMatches;
use clap::parser::ValueSource;

use crate::args::{LoadArgs, PositiveU64, PositiveUsize, RampStage, RandomField, parse_header};
use crate::error::{AppError, AppResult, ConfigError};

use super::types::{ConfigFile, DurationValue};

/// Applies configuration values to CLI arguments. Values given on the command
/// line or through `SURGE_*` environment variables win over the file.
///
/// # Errors
///
/// Returns an error when config values are invalid or conflict with each other.
pub fn apply_config(args: &mut LoadArgs, matches: &ArgMatches, config: &ConfigFile) -> AppResult<()> {
    if config.duration.is_some() && config.stages.is_some() {
        return Err(AppError::config(ConfigError::Conflict {
            left: "duration",
            right: "stages",
        }));
    }

    if !is_explicit(matches, "method")
        && let Some(method) = config.method
    {
        args.method = method;
    }

    if !is_explicit(matches, "url")
        && let Some(url) = config.url.clone()
    {
        args.url = Some(url);
    }

    if !is_explicit(matches, "headers")
        && let Some(headers) = config.headers.as_ref()
    {
        let mut parsed = Vec::with_capacity(headers.len());
        for header in headers {
            parsed.push(
                parse_header(header)
                    .map_err(|err| AppError::config(ConfigError::InvalidHeader { source: err }))?,
            );
        }
        args.headers = parsed;
    }

    if !is_explicit(matches, "token")
        && let Some(token) = config.token.clone()
    {
        args.token = Some(token);
    }

    if !is_explicit(matches, "idempotency")
        && let Some(mode) = config.idempotency
    {
        args.idempotency = mode;
    }

    if !is_explicit(matches, "idempotency_header")
        && let Some(header) = config.idempotency_header.clone()
    {
        args.idempotency_header = header;
    }

    if let Some(body) = config.body.as_ref() {
        if is_explicit(matches, "body") || is_explicit(matches, "body_file") {
            tracing::debug!("Ignoring config body; template given on the command line.");
        } else {
            args.body = Some(body.to_string());
        }
    }

    if !is_explicit(matches, "random")
        && let Some(random) = config.random.as_ref()
    {
        args.random = random
            .iter()
            .map(|(name, range)| RandomField {
                name: name.clone(),
                min: range.min,
                max: range.max,
            })
            .collect();
    }

    if let Some(vars) = config.vars.as_ref() {
        args.vars = vars.clone();
    }

    if !is_explicit(matches, "vus")
        && let Some(vus) = config.vus
    {
        args.vus = PositiveUsize::try_from(vus)
            .map_err(|_err| AppError::config(ConfigError::FieldMustBePositive { field: "vus" }))?;
    }

    if !is_explicit(matches, "iterations")
        && let Some(iterations) = config.iterations
    {
        args.iterations = Some(PositiveU64::try_from(iterations).map_err(|_err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "iterations",
            })
        })?);
    }

    if !is_explicit(matches, "duration")
        && let Some(duration) = config.duration.as_ref()
    {
        args.duration = Some(to_duration(duration, "duration")?);
    }

    if !is_explicit(matches, "stages")
        && let Some(stages) = config.stages.as_ref()
    {
        let mut parsed = Vec::with_capacity(stages.len());
        for stage in stages {
            parsed.push(RampStage {
                duration: to_duration(&stage.duration, "stages.duration")?,
                target: stage.target,
            });
        }
        args.stages = parsed;
    }

    if !is_explicit(matches, "think_time")
        && let Some(think_time) = config.think_time
    {
        args.think_time = think_time;
    }

    if !is_explicit(matches, "rate_limit")
        && let Some(rate) = config.rate
    {
        args.rate_limit = Some(
            PositiveU64::try_from(rate)
                .map_err(|_err| AppError::config(ConfigError::FieldMustBePositive { field: "rate" }))?,
        );
    }

    if !is_explicit(matches, "expected_status_code")
        && let Some(status) = config.status
    {
        args.expected_status_code = status;
    }

    if !is_explicit(matches, "request_timeout")
        && let Some(timeout) = config.timeout.as_ref()
    {
        args.request_timeout = to_duration(timeout, "timeout")?;
    }

    if !is_explicit(matches, "connect_timeout")
        && let Some(timeout) = config.connect_timeout.as_ref()
    {
        args.connect_timeout = to_duration(timeout, "connect_timeout")?;
    }

    if !is_explicit(matches, "drain_timeout")
        && let Some(timeout) = config.drain_timeout.as_ref()
    {
        args.drain_timeout = to_duration(timeout, "drain_timeout")?;
    }

    if !is_explicit(matches, "tick_interval")
        && let Some(tick) = config.tick_interval
    {
        args.tick_interval = PositiveU64::try_from(tick).map_err(|_err| {
            AppError::config(ConfigError::FieldMustBePositive {
                field: "tick_interval",
            })
        })?;
    }

    if !is_explicit(matches, "seed")
        && let Some(seed) = config.seed
    {
        args.seed = Some(seed);
    }

    if !is_explicit(matches, "disable_keepalive")
        && let Some(disable) = config.disable_keepalive
    {
        args.disable_keepalive = disable;
    }

    if !is_explicit(matches, "insecure")
        && let Some(insecure) = config.insecure
    {
        args.insecure = insecure;
    }

    if !is_explicit(matches, "output")
        && let Some(output) = config.output.clone()
    {
        args.output = Some(output);
    }

    if !is_explicit(matches, "output_format")
        && let Some(format) = config.output_format
    {
        args.output_format = format;
    }

    Ok(())
}

fn is_explicit(matches: &ArgMatches, name: &str) -> bool {
    matches!(
        matches.value_source(name),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    )
}

fn to_duration(value: &DurationValue, field: &'static str) -> AppResult<std::time::Duration> {
    value
        .to_duration()
        .map_err(|err| AppError::config(ConfigError::InvalidField { field, source: err }))
}
