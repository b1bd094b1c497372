use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::{error, info, LevelFilter};

use droctopus_bridge_lib::commands;
use droctopus_bridge_lib::config::AppConfig;
use droctopus_bridge_lib::dashboard;
use droctopus_bridge_lib::logging::{self, LogBuffer, LogTarget};
use droctopus_bridge_lib::state::AppState;

/// Number of log lines kept for the dashboard
const DASHBOARD_LOG_CAPACITY: usize = 500;

#[derive(Parser)]
#[command(name = "droctopus-bridge", version, about)]
struct Cli {
    /// Configuration file (defaults to the user's config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show the live terminal dashboard
    #[arg(long, global = true)]
    dashboard: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List advertising BLE devices
    Scan,
    /// Forward sender notifications to the receiver as framed motor data
    Relay {
        /// Serial port of the arm, moved to its initial pose before relaying
        serial_port: Option<String>,
    },
    /// Type motor values at a prompt and send them to the receiver
    Console,
    /// Drive the arm from the keyboard over serial and mirror the pose to the receiver
    Arm {
        /// Serial port name (e.g. COM1 or /dev/ttyUSB0)
        serial_port: String,
        /// Overrides the configured baud rate
        #[arg(long)]
        baud: Option<u32>,
    },
    /// Write the default configuration file if none exists
    InitConfig,
}

fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let uses_dashboard = cli.dashboard
        && matches!(
            cli.command,
            Command::Relay { .. } | Command::Console | Command::Arm { .. }
        );
    let log_buffer = LogBuffer::new(DASHBOARD_LOG_CAPACITY);
    let log_target = if uses_dashboard {
        LogTarget::Dashboard(log_buffer.clone())
    } else if matches!(cli.command, Command::Arm { .. }) {
        LogTarget::RawTerminal
    } else {
        LogTarget::Stderr
    };
    logging::init(log_target, log_level(cli.verbose))?;

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let mut config = AppConfig::load_config(&config_path).await?;

    if let Command::InitConfig = cli.command {
        if config_path.exists() {
            println!("Config already exists at {}", config_path.display());
        } else {
            config.save_config(&config_path).await?;
            println!("Wrote default config to {}", config_path.display());
        }
        return Ok(());
    }
    if let Command::Arm { baud: Some(baud), .. } = cli.command {
        config.arm.baud_rate = baud;
    }

    let app_state = AppState::new(config).await?;

    let cancel_token = app_state.cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down...");
            cancel_token.cancel();
        }
    });

    let dashboard_task = if uses_dashboard {
        let title = match cli.command {
            Command::Arm { .. } => "Robot Arm Control",
            _ => "Haptic Motor Visualizer",
        };
        app_state.update_dashboard(|state| state.title = title.to_string());
        Some(tokio::spawn(dashboard::run(
            app_state.subscribe_dashboard(),
            log_buffer,
            app_state.cancel_token.clone(),
        )))
    } else {
        None
    };

    let result = match &cli.command {
        Command::Scan => commands::scan_devices(&app_state).await,
        Command::Relay { serial_port } => {
            commands::run_relay(&app_state, serial_port.as_deref()).await
        }
        Command::Console => commands::run_console(&app_state, uses_dashboard).await,
        Command::Arm { serial_port, .. } => {
            commands::run_arm(&app_state, serial_port, uses_dashboard).await
        }
        Command::InitConfig => Ok(()),
    };
    if let Err(e) = &result {
        error!("{:#}", e);
    }

    app_state.cancel_token.cancel();
    if let Some(task) = dashboard_task {
        match task.await {
            Ok(Err(e)) => eprintln!("Dashboard failed: {:#}", e),
            Err(e) => eprintln!("Dashboard task panicked: {}", e),
            Ok(Ok(())) => {}
        }
    }

    result
}
