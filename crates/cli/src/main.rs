use clap::{Parser, Subcommand};
use rover::config::Settings;
use rover::device::IotHubGateway;
use rover::dispatch::{DeviceCommand, IntentDispatcher};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rover")]
#[command(about = "Rover CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory and a default config.json.
    Init {
        /// Config file path (default: ROVER_CONFIG_PATH or ~/.rover/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Run the fulfillment webhook. Needs a device id and registry connection string (config or DEVICE_ID / IOTHUB_CONNECTION_STRING).
    Serve {
        /// Config file path (default: ROVER_CONFIG_PATH or ~/.rover/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 7071)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Look the device up in the registry and report whether it is connected.
    Status {
        /// Config file path (default: ROVER_CONFIG_PATH or ~/.rover/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Send one command to the device (GoForward, GoBackward, TurnLeft, TurnRight, Break).
    Invoke {
        /// Config file path (default: ROVER_CONFIG_PATH or ~/.rover/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Command name, exact case.
        #[arg(value_parser = parse_command)]
        command: DeviceCommand,
    },
}

fn parse_command(s: &str) -> Result<DeviceCommand, String> {
    s.parse()
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("rover {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("webhook failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Status { config }) => {
            if let Err(e) = run_status(config).await {
                eprintln!("status: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Invoke { config, command }) => {
            if let Err(e) = run_invoke(config, command).await {
                eprintln!("invoke {}: {:#}", command, e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(rover::config::default_config_path);
    let dir = rover::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _) = rover::config::load_config(config_path)?;
    if let Some(p) = port {
        config.webhook.port = p;
    }
    log::info!("starting webhook on {}:{}", config.webhook.bind, config.webhook.port);
    rover::webhook::run_webhook(config).await
}

/// Dispatcher for one-off commands, built from the same settings the webhook uses.
fn dispatcher(config_path: Option<std::path::PathBuf>) -> anyhow::Result<IntentDispatcher> {
    let (config, _) = rover::config::load_config(config_path)?;
    let settings = Settings::resolve(&config)?;
    let gateway = IotHubGateway::new(settings.hub, settings.hub_options);
    Ok(IntentDispatcher::new(settings.device_id, Arc::new(gateway)))
}

async fn run_status(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let dispatcher = dispatcher(config_path)?;
    let device = dispatcher.check().await?;
    println!("{}: connected", device.id);
    Ok(())
}

async fn run_invoke(
    config_path: Option<std::path::PathBuf>,
    command: DeviceCommand,
) -> anyhow::Result<()> {
    let dispatcher = dispatcher(config_path)?;
    dispatcher.send(command).await?;
    println!("{} sent to {}", command, dispatcher.device_id());
    Ok(())
}
