use comfy_table::Table;
use miette::IntoDiagnostic;

use tidewatch::{core::config::RootConfig, prelude::*};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// print as JSON instead of a table
    #[arg(long)]
    json: bool,
}

enum Formatter {
    Table(Table),
    Json(Vec<PendingTx>),
}

impl Formatter {
    fn new_table() -> Self {
        let mut table = Table::new();
        table.set_header(vec!["Local Id", "Tx Hash", "Block", "Submitted At"]);

        Self::Table(table)
    }

    fn write(&mut self, tx: PendingTx) {
        match self {
            Formatter::Table(table) => {
                let block = tx
                    .submitted_block
                    .map(|x| x.to_string())
                    .unwrap_or("none".into());

                let at = tx
                    .submitted_at
                    .map(|x| x.to_rfc3339())
                    .unwrap_or("none".into());

                table.add_row(vec![tx.local_id, tx.tx_hash.to_string(), block, at]);
            }
            Formatter::Json(all) => all.push(tx),
        }
    }

    fn flush(self) -> miette::Result<()> {
        match self {
            Formatter::Table(table) => println!("{table}"),
            Formatter::Json(all) => {
                let json = serde_json::to_string_pretty(&all).into_diagnostic()?;
                println!("{json}");
            }
        }

        Ok(())
    }
}

pub fn run(config: &RootConfig, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let store = crate::common::open_store(config)?;
    let pending = store.read_all().map_err(Error::from)?;

    let mut formatter = match args.json {
        true => Formatter::Json(vec![]),
        false => Formatter::new_table(),
    };

    for tx in pending.into_values() {
        formatter.write(tx);
    }

    formatter.flush()
}
