use std::io;
use std::process::ExitCode;

use acquisition::{AcquisitionLoop, start_sensor};
use anyhow::Context;
use clap::Parser;
use config::{Cli, Command, RetryPolicy, TimestampFormat, WorkingPeriod};
use sds011::Sds011;
use sensor::SystemClock;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};
use sink::{ConsoleSink, CsvSink, DisplaySink, MailboxSink, PlotSink, Sinks, TerminalCanvas};
use tokio_util::sync::CancellationToken;

mod acquisition;
mod config;
mod dashboard;
mod error;
mod measurement;
mod sds011;
mod sensor;
mod sink;

#[tokio::main]
async fn main() -> Result<ExitCode, anyhow::Error> {
    let cli = Cli::parse();

    TermLogger::init(
        cli.sensor.log_level,
        ConfigBuilder::new()
            .set_time_format_rfc3339()
            .set_time_offset_to_local()
            .map_err(|_| anyhow::anyhow!("Failed to set time offset to local"))?
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;

    if let Err(e) = run(cli).await {
        log::error!("{e:#}");
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}

pub async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    let retry = RetryPolicy::from(&cli.sensor);
    let period =
        WorkingPeriod::new(cli.sensor.working_period).context("Invalid sensor configuration")?;

    let mut sinks = Sinks::new();
    let mut foreground = Sinks::new();

    let csv_output = match &cli.command {
        Command::Log {
            output,
            timestamp_format,
        } => Some((output, *timestamp_format)),
        Command::Display { output } | Command::Plot { output, .. } => output
            .as_ref()
            .map(|output| (output, TimestampFormat::default())),
    };
    if let Some((output, timestamp_format)) = csv_output {
        sinks.push(CsvSink::open(output, timestamp_format).context("Failed to open CSV log")?);
        log::info!("Logging to {}", output.display());
    }

    match cli.command {
        Command::Log { .. } => sinks.push(ConsoleSink),
        Command::Display { .. } => {
            foreground.push(DisplaySink::new(io::stdout()));
        }
        Command::Plot { history, width, .. } => {
            foreground.push(DisplaySink::new(io::stdout()));
            foreground.push(PlotSink::new(TerminalCanvas::new(io::stdout(), width), history));
        }
    }
    let mailbox = if foreground.is_empty() {
        None
    } else {
        let (sink, mailbox) = MailboxSink::new();
        sinks.push(sink);
        Some(mailbox)
    };

    let cancel = CancellationToken::new();

    let signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to wait for Ctrl+C signal: {e}");
        }
        log::info!("Shutting down");
        signal.cancel();
    });

    let mut sensor =
        Sds011::open(&cli.sensor.port, cancel.clone()).context("Failed to initialize SDS011")?;
    let (sensor, started) = tokio::task::spawn_blocking(move || {
        let started = start_sensor(&mut sensor, period, retry);
        (sensor, started)
    })
    .await
    .context("Sensor start-up task panicked")?;
    match started {
        Ok(()) => {}
        Err(_) if cancel.is_cancelled() => {
            log::info!("Interrupted during start-up");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to start SDS011"),
    }
    log::info!(
        "SDS011 on {} with working period {} min",
        cli.sensor.port,
        period.minutes()
    );

    let token = cancel.clone();
    let acquisition = tokio::task::spawn_blocking(move || {
        AcquisitionLoop::new(sensor, sinks, retry, SystemClock).run(&token)
    });

    let Some(mailbox) = mailbox else {
        let summary = acquisition
            .await
            .context("Acquisition task panicked")?
            .context("Sensor stopped")?;
        log::info!(
            "Logged {} measurement(s), {} sink failure(s)",
            summary.records,
            summary.sink_failures
        );
        return Ok(());
    };

    let acquisition = async {
        match acquisition.await.context("Acquisition task panicked")? {
            Ok(summary) => log::info!(
                "Received {} measurement(s), {} sink failure(s)",
                summary.records,
                summary.sink_failures
            ),
            Err(e) => log::error!("Sensor stopped: {e}"),
        }
        Ok::<(), anyhow::Error>(())
    };
    let (result, ()) = tokio::join!(acquisition, dashboard::run(mailbox, foreground, cancel));

    result
}
