use tidewatch::core::config::RootConfig;

#[derive(Debug, clap::Args)]
pub struct Args {
    /// override the configured sweep interval, in seconds
    #[arg(long)]
    interval: Option<u64>,
}

#[tokio::main]
pub async fn run(mut config: RootConfig, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    if let Some(interval) = args.interval {
        config.monitor.sweep_interval_secs = interval;
    }

    let reconciler = crate::common::build_reconciler(&config)?;
    let every = crate::common::sweep_interval(&config);
    let exit = crate::common::hook_exit_token();

    tidewatch::daemon::run(reconciler, every, exit).await;

    Ok(())
}
