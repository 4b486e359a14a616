use tidewatch::{core::config::RootConfig, prelude::*};

#[derive(Debug, clap::Args)]
pub struct Args {
    local_id: String,
}

pub fn run(config: &RootConfig, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let store = crate::common::open_store(config)?;

    match store.remove(&args.local_id).map_err(Error::from)? {
        true => println!("{} removed", args.local_id),
        false => println!("{} was not pending", args.local_id),
    }

    Ok(())
}
