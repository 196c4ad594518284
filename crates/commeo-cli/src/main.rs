//! Commeo CLI - Command-line interface for Selve Commeo shutter gateways
//!
//! Discover actors, watch their status and drive them from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use commeo_client::{Gateway, GatewayConfig, GatewayHooks, NoopHooks};
use commeo_core::{ActorId, Command};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod report;

/// Commeo - talk to a Selve Commeo USB gateway
#[derive(Parser)]
#[command(name = "commeo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial port of the gateway
    #[arg(short, long, global = true, env = "COMMEO_PORT")]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long, global = true)]
    baud: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bring up all actors and print them
    Discover {
        /// Print the actor table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Bring up all actors, then print status changes until Ctrl+C
    Monitor,

    /// Open a shutter
    Up { actor: ActorId },

    /// Close a shutter
    Down { actor: ActorId },

    /// Stop a moving shutter
    Stop { actor: ActorId },

    /// Drive a shutter to a position (0 = open, 100 = closed)
    Goto {
        actor: ActorId,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: u8,
    },

    /// Show version and defaults
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(&cli.log_level, cli.json_logs)?;

    // Handle Ctrl+C
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown_tx.send(()).await;
        }
    });

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Discover { json } => {
            discover(&config, json, &mut shutdown_rx).await?;
        }

        Commands::Monitor => {
            monitor(&config, &mut shutdown_rx).await?;
        }

        Commands::Up { actor } => {
            drive(&config, Command::drive_up(actor)).await?;
        }

        Commands::Down { actor } => {
            drive(&config, Command::drive_down(actor)).await?;
        }

        Commands::Stop { actor } => {
            drive(&config, Command::stop(actor)).await?;
        }

        Commands::Goto { actor, percent } => {
            let command = Command::drive_to_position(actor, percent)?;
            drive(&config, command).await?;
        }

        Commands::Info => {
            print_info(&config);
        }
    }

    Ok(())
}

fn setup_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .context("Failed to parse log level")?;

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).compact())
            .init();
    }

    Ok(())
}

/// Config file first, then command-line flags on top
fn load_config(cli: &Cli) -> Result<GatewayConfig> {
    let mut config = match &cli.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => GatewayConfig::default(),
    };

    if let Some(port) = &cli.port {
        config.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.transport.baud_rate = baud;
    }
    Ok(config)
}

async fn open(config: &GatewayConfig, hooks: Arc<dyn GatewayHooks>) -> Result<Gateway> {
    println!(
        "{} Opening {} @ {} baud",
        "COMMEO".cyan().bold(),
        config.port,
        config.transport.baud_rate
    );
    Gateway::open(config, hooks)
        .await
        .with_context(|| format!("Failed to open gateway on {}", config.port))
}

/// Run discovery until the gateway goes quiet. Returns false if interrupted.
async fn bring_up(gateway: &Gateway, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<bool> {
    tokio::select! {
        result = gateway.start_discovery() => {
            result.context("Discovery failed")?;
        }
        _ = shutdown_rx.recv() => {
            gateway.close();
            println!("{}", "Discovery interrupted".yellow());
            return Ok(false);
        }
    }

    if !gateway.is_setup_complete() {
        warn!(
            "Discovery incomplete, available actors: {:?}",
            gateway.available_actors()
        );
    }
    Ok(true)
}

async fn discover(
    config: &GatewayConfig,
    json: bool,
    shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let gateway = open(config, Arc::new(NoopHooks)).await?;
    if !bring_up(&gateway, shutdown_rx).await? {
        return Ok(());
    }

    let reports = report::collect(&gateway);
    if json {
        report::print_json(&reports)?;
    } else {
        report::print_table(&reports);
    }

    gateway.close();
    Ok(())
}

/// Forwards status updates to the monitor loop
struct MonitorHooks {
    updates: mpsc::UnboundedSender<ActorId>,
}

impl GatewayHooks for MonitorHooks {
    fn on_actor_updated(&self, actor_id: ActorId, _is_new: bool) {
        let _ = self.updates.send(actor_id);
    }

    fn on_setup_finished(&self, actors: &std::collections::BTreeSet<ActorId>) {
        info!("Setup finished, {} actors ready", actors.len());
    }
}

async fn monitor(config: &GatewayConfig, shutdown_rx: &mut mpsc::Receiver<()>) -> Result<()> {
    let (tx, mut updates) = mpsc::unbounded_channel();
    let gateway = open(config, Arc::new(MonitorHooks { updates: tx })).await?;
    if !bring_up(&gateway, shutdown_rx).await? {
        return Ok(());
    }

    report::print_table(&report::collect(&gateway));
    while updates.try_recv().is_ok() {}
    println!("{} Watching for changes (Ctrl+C to stop)", "OK".green().bold());

    loop {
        tokio::select! {
            result = gateway.receive_one() => {
                result.context("Lost connection to gateway")?;
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }

        while let Ok(actor_id) = updates.try_recv() {
            if let Some(status) = gateway.status(actor_id) {
                let label = gateway
                    .actor(actor_id)
                    .map(|a| a.label)
                    .unwrap_or_else(|| format!("actor {}", actor_id));
                report::print_status(&label, &status);
            }
        }
    }

    gateway.close();
    println!("{}", "Monitor stopped".yellow());
    Ok(())
}

async fn drive(config: &GatewayConfig, command: Command) -> Result<()> {
    let gateway = open(config, Arc::new(NoopHooks)).await?;

    println!(
        "{} {} actor {}",
        "COMMEO".cyan().bold(),
        command.kind.to_string().yellow(),
        command.actor_id
    );
    gateway.command(&command)?;

    // Collect the acknowledgement and the command result
    gateway.pump().await?;

    match gateway.last_command_outcome() {
        Some(outcome) => report::print_outcome(&outcome),
        None => println!("{}", "No command result received".yellow()),
    }

    gateway.close();
    Ok(())
}

fn print_info(config: &GatewayConfig) {
    println!("{}", "Commeo".cyan().bold());
    println!("  Version:          {}", env!("CARGO_PKG_VERSION"));
    println!("  Port:             {}", config.port);
    println!("  Baud rate:        {}", config.transport.baud_rate);
    println!(
        "  Send interval:    {} ms",
        config.transport.send_interval.as_millis()
    );
    println!(
        "  Receive timeout:  {} ms",
        config.transport.receive_timeout.as_millis()
    );
}
