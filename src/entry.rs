use std::ffi::OsString;

use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::{error, warn};

use crate::args::LoadArgs;
use crate::error::AppResult;
use crate::shutdown_handlers::{setup_signal_shutdown_handler, shutdown_channel};

/// Parses arguments, merges the config file, and runs the load test on a
/// multi-threaded runtime.
///
/// # Errors
///
/// Returns an error for invalid arguments or configuration, or when the run
/// cannot start. Failed iterations do not make this fail.
pub fn run() -> AppResult<()> {
    let (mut args, matches) = parse_args(std::env::args_os())?;

    crate::logger::init_logging(args.verbose);

    if let Err(err) = apply_config(&mut args, &matches) {
        error!("{}", err);
        return Err(err);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run_async(args))
}

fn parse_args<I>(raw_args: I) -> AppResult<(LoadArgs, ArgMatches)>
where
    I: IntoIterator<Item = OsString>,
{
    let matches = LoadArgs::command().get_matches_from(raw_args);
    let args = LoadArgs::from_arg_matches(&matches)?;
    Ok((args, matches))
}

fn apply_config(args: &mut LoadArgs, matches: &ArgMatches) -> AppResult<()> {
    if let Some(config) = crate::config::load_config(args.config.as_deref())? {
        crate::config::apply_config(args, matches, &config)?;
    }
    Ok(())
}

async fn run_async(args: LoadArgs) -> AppResult<()> {
    let (shutdown_tx, _) = shutdown_channel();
    let signal_handle = setup_signal_shutdown_handler(&shutdown_tx);

    let result = crate::runner::run(&args, &shutdown_tx).await;

    drop(shutdown_tx.send(()));
    if let Err(err) = signal_handle.await {
        warn!("Signal handler task failed: {}", err);
    }

    match result {
        Ok(_summary) => Ok(()),
        Err(err) => {
            error!("{}", err);
            Err(err)
        }
    }
}
