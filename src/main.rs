use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sitetime::{
    tracker::{args::HostArgs, start_tracker},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, HOST_PREFIX},
        runtime::{run_to_completion, single_thread_runtime},
    },
};
use tracing::{error, info};

fn main() -> Result<()> {
    let args = HostArgs::parse();

    let app_dir = args.dir.clone().map_or_else(create_application_default_path, Ok)?;
    enable_logging(HOST_PREFIX, &app_dir.join("logs"), args.log, args.log_stderr)?;
    info!(
        "Started by {:?} (parent window {:?}), storing into {app_dir:?}",
        args.browser_args, args.parent_window
    );

    let tick_interval = Duration::from_millis(args.tick_interval_ms);
    run_to_completion(single_thread_runtime()?, async move {
        start_tracker(app_dir, tick_interval).await
    })
    .inspect_err(|e| error!("Host stopped with an error {e:?}"))?;
    Ok(())
}
