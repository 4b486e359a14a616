use tidewatch::{core::config::RootConfig, prelude::*};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// key the tx is known by locally
    local_id: String,

    /// 0x-prefixed hash returned by the node on broadcast
    tx_hash: String,

    /// chain height at broadcast time
    #[arg(long)]
    block: Option<BlockHeight>,
}

pub fn run(config: &RootConfig, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let tx_hash: TxHash = args.tx_hash.parse().map_err(Error::parse)?;

    let mut tx =
        PendingTx::new(args.local_id.as_str(), tx_hash).with_submitted_at(chrono::Utc::now());

    if let Some(block) = args.block {
        tx = tx.with_submitted_block(block);
    }

    let store = crate::common::open_store(config)?;
    store.insert(tx).map_err(Error::from)?;

    println!("tracking {} as {}", tx_hash, args.local_id);

    Ok(())
}
