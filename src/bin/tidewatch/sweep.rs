use tidewatch::{core::config::RootConfig, prelude::*};

#[derive(Debug, clap::Args)]
pub struct Args {
    /// probe right away instead of waiting out the first backoff delay
    #[arg(long)]
    immediate: bool,
}

#[tokio::main]
pub async fn run(config: &RootConfig, args: &Args) -> miette::Result<()> {
    crate::common::setup_tracing(&config.logging)?;

    let mut reconciler = crate::common::build_reconciler(config)?;

    if args.immediate {
        let schedule = backoff::RetrySchedule {
            delay_first_attempt: false,
            ..reconciler.schedule().clone()
        };

        reconciler = reconciler.with_schedule(schedule);
    }

    let report = reconciler.sweep().await;

    match &report.error {
        Some(err) if report.outcomes.is_empty() => {
            return Err(Error::message(format!("sweep aborted: {err}")).into());
        }
        Some(err) => eprintln!("sweep degraded: {err}"),
        None => (),
    }

    for (local_id, result) in report.outcomes.iter() {
        match result {
            Ok(Disposition::Confirmed) => println!("{local_id}: mined"),
            Ok(Disposition::Failed(reason)) => println!("{local_id}: removed, {reason}"),
            Ok(Disposition::Skipped) => println!("{local_id}: skipped"),
            Err(err) => println!("{local_id}: error, {err}"),
        }
    }

    println!(
        "{} pending, {} mined, {} removed, {} errors",
        report.outcomes.len(),
        report.confirmed(),
        report.failed(),
        report.errored()
    );

    Ok(())
}
