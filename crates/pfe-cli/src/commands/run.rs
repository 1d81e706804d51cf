use std::time::Duration;

use anyhow::anyhow;
use pfe_app::{MonitorHost, bootstrap};
use pfe_config::Settings;
use pfe_events::EventStream;
use tracing::info;

use crate::cli::{OutputFormat, RunArgs};
use crate::error::{CliError, CliResult};
use crate::output::{render_event, render_summary};

const IDLE_POLL: Duration = Duration::from_millis(500);
const DRAIN_GRACE: Duration = Duration::from_millis(50);

pub(crate) async fn handle_run(
    settings: Settings,
    args: RunArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let exit_when_idle = args.exit_when_idle;
    let mut host = bootstrap(settings, args.plan()).await?;
    let mut stream = host.events().subscribe(None);
    host.start().await?;

    let outcome = follow(&host, &mut stream, format, exit_when_idle).await;
    host.shutdown().await?;
    drain(&mut stream, format).await?;

    let records = host.monitor().snapshot().await?;
    render_summary(&records, &host.monitor().metrics().snapshot(), format)?;
    outcome
}

async fn follow(
    host: &MonitorHost,
    stream: &mut EventStream,
    format: OutputFormat,
    exit_when_idle: bool,
) -> CliResult<()> {
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut idle_check = tokio::time::interval(IDLE_POLL);

    loop {
        tokio::select! {
            signal = &mut interrupt => {
                signal.map_err(|err| {
                    CliError::failure(anyhow!("failed to listen for interrupt: {err}"))
                })?;
                info!("interrupt received; stopping monitor");
                return Ok(());
            }
            event = stream.next() => match event {
                Some(envelope) => render_event(&envelope, format)?,
                None => return Ok(()),
            },
            _ = idle_check.tick(), if exit_when_idle => {
                if all_stopped(host).await? {
                    info!("every transfer stopped; exiting");
                    return Ok(());
                }
            }
        }
    }
}

async fn all_stopped(host: &MonitorHost) -> CliResult<bool> {
    if !host.is_idle() {
        return Ok(false);
    }
    let records = host.monitor().snapshot().await?;
    Ok(records.len() == host.transfers().len()
        && records.iter().all(|record| record.state.is_stopped()))
}

async fn drain(stream: &mut EventStream, format: OutputFormat) -> CliResult<()> {
    while let Ok(Some(envelope)) = tokio::time::timeout(DRAIN_GRACE, stream.next()).await {
        render_event(&envelope, format)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(transfers: usize) -> RunArgs {
        RunArgs {
            transfers,
            size: 1_000,
            download_bps: 1_000,
            upload_bps: 0,
            upload_budget: None,
            seed: false,
            step_ms: 250,
            exit_when_idle: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_exits_once_every_transfer_stopped() {
        let settings = Settings {
            seed_after_download: false,
            ..Settings::default()
        };
        let result = handle_run(settings, args(2), OutputFormat::Table).await;
        assert!(result.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_runs_are_rejected() {
        let result = handle_run(Settings::default(), args(0), OutputFormat::Json).await;
        assert!(matches!(result, Err(CliError::Validation(_))));
    }
}
