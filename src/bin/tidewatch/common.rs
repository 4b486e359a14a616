use std::time::Duration;

use miette::{Context as _, IntoDiagnostic};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tracing_subscriber::{filter::Targets, prelude::*};

use tidewatch::{
    adapters::{FanoutNotifier, StoreAdapter},
    core::config::{LoggingConfig, RootConfig},
    evm::EvmClient,
    prelude::*,
};

pub type DaemonReconciler = Reconciler<EvmClient, StoreAdapter, FanoutNotifier>;

pub fn setup_tracing(config: &LoggingConfig) -> miette::Result<()> {
    let level = config.max_level;

    let mut filter = Targets::new()
        .with_target("tidewatch", level)
        .with_target("tidewatch_core", level)
        .with_target("tidewatch_evm", level)
        .with_target("tidewatch_redb", level);

    if config.include_tokio {
        filter = filter.with_target("tokio", level);
    }

    if config.include_reqwest {
        filter = filter.with_target("reqwest", level);
    }

    tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .finish()
        .with(filter)
        .try_init()
        .into_diagnostic()
        .context("setting up tracing")?;

    Ok(())
}

pub fn open_store(config: &RootConfig) -> Result<StoreAdapter, Error> {
    StoreAdapter::open(&config.storage).map_err(Error::storage)
}

pub fn connect_chain(config: &RootConfig) -> Result<EvmClient, Error> {
    let client = EvmClient::new(&config.upstream).map_err(Error::client)?;
    debug!(url = client.url(), "upstream node client ready");

    Ok(client)
}

pub fn build_reconciler(config: &RootConfig) -> Result<DaemonReconciler, Error> {
    let chain = connect_chain(config)?;
    let store = open_store(config)?;
    let notifier = FanoutNotifier::from_config(&config.notify);

    Ok(Reconciler::new(chain, store, notifier, &config.monitor))
}

pub fn sweep_interval(config: &RootConfig) -> Duration {
    Duration::from_secs(config.monitor.sweep_interval_secs.max(1))
}

pub fn hook_exit_token() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel2 = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(%err, "can't listen for exit signal");
            return;
        }

        warn!("exit signal detected");
        debug!("notifying exit");
        cancel2.cancel();
    });

    cancel
}
