use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tokio::{
    io::{AsyncBufReadExt, BufReader, ReadHalf, WriteHalf},
    signal,
};
use tokio_serial::SerialStream;

use grbl_jog::{
    config::Config,
    controller::MotionController,
    diagnostics::{self, CheckOutcome, LinkReport},
    grbl::{ExchangeOutcome, GrblClient},
    logging, transport,
};

type SerialClient = GrblClient<ReadHalf<SerialStream>, WriteHalf<SerialStream>>;

#[derive(Parser)]
#[command(name = "grbl_jog", version, about = "GRBL jog controller utilities")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial port override.
    #[arg(long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run link diagnostics against the connected controller.
    Check {
        /// Emit the report as JSON instead of the human summary.
        #[arg(long)]
        json: bool,
    },
    /// Interactive passthrough: lines go to the controller verbatim, `?`
    /// queries status.
    Console,
    /// Write a default configuration file and exit.
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command {
        Command::InitConfig => {
            let path = Config::write_default(cli.config.as_deref())?;
            println!("wrote {}", path.display());
            Ok(())
        }
        Command::Check { json } => check(cli.config.as_deref(), cli.port, json).await,
        Command::Console => console(cli.config.as_deref(), cli.port).await,
    }
}

fn load_config(path: Option<&Path>, port: Option<String>) -> anyhow::Result<Config> {
    let mut config = Config::load(path).context("loading configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    Ok(config)
}

async fn open_client(config: &Config) -> anyhow::Result<SerialClient> {
    let link = transport::open_serial(&config.port, config.baud).await?;
    let mut client = GrblClient::new(link);
    client.connect().await?;
    Ok(client)
}

async fn check(config_path: Option<&Path>, port: Option<String>, json: bool) -> anyhow::Result<()> {
    let config = load_config(config_path, port)?;
    let mut client = open_client(&config).await?;
    let report = diagnostics::run_link_checks(&mut client).await?;
    client.close().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_report(&report);
    }
    anyhow::ensure!(report.is_healthy(), "link checks failed");
    Ok(())
}

fn render_report(report: &LinkReport) {
    for check in &report.checks {
        let label = match check.outcome {
            CheckOutcome::Pass => format!("{}", "PASS".green()),
            CheckOutcome::Warn => format!("{}", "WARN".yellow()),
            CheckOutcome::Fail => format!("{}", "FAIL".red()),
        };
        println!("{label}  {:<16} {}", check.name, check.detail);
    }
    println!(
        "{} passed, {} warnings, {} failed",
        report.passed(),
        report.warned(),
        report.failed()
    );
}

async fn console(config_path: Option<&Path>, port: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path, port)?;
    let mut client = open_client(&config).await?;
    println!("connected to {}; `?` for status, ctrl-c to exit", config.port);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if line == "?" {
                    match client.query_status().await? {
                        Some(status) => println!(
                            "{:?} at ({:.3}, {:.3}, {:.3}) [{:?}]",
                            status.state,
                            status.position.x,
                            status.position.y,
                            status.position.z,
                            status.frame
                        ),
                        None => println!("(no parseable status)"),
                    }
                } else {
                    let exchange = client.send_command(line).await?;
                    for received in &exchange.lines {
                        println!("< {received}");
                    }
                    if exchange.outcome == ExchangeOutcome::TimedOut {
                        println!("(timed out waiting for ok/error)");
                    }
                }
            }
        }
    }
    client.close().await?;
    Ok(())
}
