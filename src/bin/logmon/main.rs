// SPDX-License-Identifier: Apache-2.0

use clap::{Parser, ValueEnum};
use std::error::Error;
use std::process::ExitCode;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{SignalKind, signal};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::metadata::LevelFilter;
use tracing::{error, info, warn};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use logmon::init::agent::Agent;
use logmon::init::args::MonitorRun;

type BoxError = Box<dyn Error + Send + Sync>;

// An in-flight cycle finishes its scans before the agent returns
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, clap::Subcommand)]
enum Commands {
    /// Run the log monitor
    Start(Box<MonitorRun>),

    /// Return version
    Version,
}

#[derive(Debug, Parser)]
#[command(name = "logmon")]
#[command(bin_name = "logmon")]
#[command(version, about, long_about = None)]
#[command(subcommand_required = true)]
struct Arguments {
    #[arg(
        value_enum,
        long,
        global = true,
        env = "LOGMON_LOG_FORMAT",
        default_value = "text"
    )]
    /// Log format
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

fn main() -> ExitCode {
    let opt = Arguments::parse();

    match opt.command {
        Some(Commands::Version) => {
            println!("{}", get_version())
        }
        Some(Commands::Start(run)) => {
            let _guard = match setup_logging(&opt.log_format, run.output.logs_to_stderr()) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("ERROR: failed to setup logging: {}", e);
                    return ExitCode::from(1);
                }
            };

            if let Err(e) = run_agent(run) {
                error!(error = %e, "Failed to run log monitor.");
                return ExitCode::from(1);
            }
        }
        None => {
            // subcommand_required makes this unreachable from the command line
            eprintln!("ERROR: must specify a command");
            return ExitCode::from(2);
        }
    }

    ExitCode::SUCCESS
}

#[tokio::main]
async fn run_agent(run: Box<MonitorRun>) -> Result<(), BoxError> {
    let cancel_token = CancellationToken::new();
    let mut agent_task = {
        let token = cancel_token.clone();
        tokio::spawn(async move { Agent::new(run).run(token).await })
    };

    select! {
        res = signal_wait() => {
            res?;
            info!("Shutdown signal received.");
            cancel_token.cancel();
        },
        res = &mut agent_task => {
            return res?;
        },
    }

    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), agent_task).await {
        Ok(res) => res?,
        Err(_) => {
            warn!("Timed out waiting for the log monitor to stop.");
            Err("timed out waiting for shutdown".into())
        }
    }
}

type LoggerGuard = tracing_appender::non_blocking::WorkerGuard;

fn setup_logging(log_format: &LogFormatArg, to_stderr: bool) -> Result<LoggerGuard, BoxError> {
    use std::io;
    use std::io::IsTerminal;

    LogTracer::init()?;

    // JSON metrics own stdout, so logs move to stderr
    let (non_blocking_writer, guard, is_terminal) = if to_stderr {
        let (writer, guard) = tracing_appender::non_blocking(io::stderr());
        (writer, guard, io::stderr().is_terminal())
    } else {
        let (writer, guard) = tracing_appender::non_blocking(io::stdout());
        (writer, guard, io::stdout().is_terminal())
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;

    if *log_format == LogFormatArg::Json {
        let app_name = format!("{}-{}", env!("CARGO_PKG_NAME"), get_version());
        let bunyan_formatting_layer = BunyanFormattingLayer::new(app_name, non_blocking_writer);

        let subscriber = Registry::default()
            .with(filter)
            .with(JsonStorageLayer)
            .with(bunyan_formatting_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        // Skip color codes when not in a terminal
        let use_ansi = is_terminal;

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_target(false)
            .with_level(true)
            .with_ansi(use_ansi)
            .compact();

        let subscriber = Registry::default().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(guard)
}

fn get_version() -> String {
    // Set during CI
    let version_build = option_env!("BUILD_SHORT_SHA").unwrap_or("dev");

    format!("{}-{}", env!("CARGO_PKG_VERSION"), version_build)
}

async fn signal_wait() -> std::io::Result<()> {
    let mut sig_term = signal(SignalKind::terminate())?;
    let mut sig_int = signal(SignalKind::interrupt())?;

    select! {
        _ = sig_term.recv() => {},
        _ = sig_int.recv() => {},
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_metrics_send_logs_to_stderr() {
        let opt = Arguments::try_parse_from([
            "logmon",
            "start",
            "--config",
            "/etc/logmon.json",
            "--output",
            "json",
        ])
        .unwrap();

        match opt.command {
            Some(Commands::Start(run)) => assert!(run.output.logs_to_stderr()),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
