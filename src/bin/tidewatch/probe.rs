use tidewatch::{core::config::RootConfig, prelude::*};

#[derive(Debug, clap::Args)]
pub struct Args {
    tx_hash: String,

    /// height the window is measured from, defaults to the current height
    #[arg(long)]
    baseline: Option<BlockHeight>,
}

#[tokio::main]
pub async fn run(config: &RootConfig, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let tx_hash: TxHash = args.tx_hash.parse().map_err(Error::parse)?;
    let chain = crate::common::connect_chain(config)?;

    let baseline = match args.baseline {
        Some(x) => x,
        None => chain.block_height().await.map_err(Error::from)?,
    };

    let prober = Prober::new(chain, config.monitor.window_blocks);
    let outcome = prober.probe(baseline, &tx_hash).await.map_err(Error::from)?;

    println!(
        "{tx_hash} from block {baseline} (window {} blocks): {outcome:?}",
        prober.window_blocks()
    );

    Ok(())
}
