use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Environment variables consulted for a filter override, first match wins.
const LOG_ENV_VARS: [&str; 2] = ["SURGE_LOG", "RUST_LOG"];

/// HTTP client internals stay at `warn` so `--verbose` only adds surge's own
/// debug lines.
const fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,surge=debug"
    } else {
        "warn,surge=info"
    }
}

fn build_filter(verbose: bool, override_directive: Option<&str>) -> EnvFilter {
    override_directive
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(default_directive(verbose)))
}

fn env_directive() -> Option<String> {
    LOG_ENV_VARS
        .iter()
        .find_map(|name| std::env::var(name).ok())
}

/// Installs the global `tracing` subscriber. Logs go to stderr so a JSON
/// summary on stdout stays machine-readable.
pub fn init_logging(verbose: bool) {
    let filter = build_filter(verbose, env_directive().as_deref());
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", err);
    }
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    fn init_logging_is_idempotent() {
        init_logging(false);
        init_logging(true);
    }

    #[test]
    fn verbose_raises_default_level() -> Result<(), String> {
        let quiet = build_filter(false, None).max_level_hint();
        let verbose = build_filter(true, None).max_level_hint();
        if quiet != Some(LevelFilter::INFO) || verbose != Some(LevelFilter::DEBUG) {
            return Err(format!("Unexpected levels: {:?} / {:?}", quiet, verbose));
        }
        Ok(())
    }

    #[test]
    fn env_override_wins_unless_invalid() -> Result<(), String> {
        let traced = build_filter(false, Some("trace")).max_level_hint();
        if traced != Some(LevelFilter::TRACE) {
            return Err(format!("Override ignored: {:?}", traced));
        }
        let fallback = build_filter(false, Some("surge=loud")).max_level_hint();
        if fallback != Some(LevelFilter::INFO) {
            return Err(format!("Invalid override must fall back: {:?}", fallback));
        }
        Ok(())
    }
}
