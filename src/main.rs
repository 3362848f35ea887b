//! Sensor Publisher - Main Entry Point

use clap::{Parser, Subcommand};
use sensor_publisher::config::PublisherConfig;
use sensor_publisher::observability::init_default_logging;
use sensor_publisher::publisher::{
    spawn_signal_listener, ControllerSettings, Message, PublishController, ShutdownSignal,
};
use sensor_publisher::transport::mqtt::MqttSession;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};

/// Resilient MQTT telemetry publisher
#[derive(Parser)]
#[command(name = "sensor-publisher")]
#[command(about = "Publish sensor readings to an MQTT broker on a fixed interval")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "SENSOR_PUBLISHER_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and publish until interrupted (default)
    Run,
    /// Validate configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_default_logging(cli.verbose);

    info!("Starting sensor publisher v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let exit_code = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_publisher(config).await,
        Commands::Config { show } => handle_config_command(&config, show),
    };

    process::exit(exit_code);
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<PublisherConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(PublisherConfig::load_from_file(path)?)
        }
        None => {
            // Try default locations
            let default_paths = ["publisher.toml", "config/publisher.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(PublisherConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using built-in defaults");
            Ok(PublisherConfig::default())
        }
    }
}

/// Bootstrap: build the controller with its MQTT session
fn build_controller(
    config: &PublisherConfig,
    shutdown: ShutdownSignal,
) -> Result<PublishController<MqttSession>, Box<dyn std::error::Error>> {
    let settings = ControllerSettings::from_config(config)?;
    let message = Message::from_reading(
        config.publish.topic.clone(),
        &config.payload,
        config.publish.qos,
        config.publish.retain,
    )?;
    let session = MqttSession::new(config.mqtt.clone());

    Ok(PublishController::new(session, message, settings, shutdown))
}

async fn run_publisher(config: PublisherConfig) -> i32 {
    let shutdown = ShutdownSignal::new();

    let mut controller = match build_controller(&config, shutdown.clone()) {
        Ok(controller) => controller,
        Err(e) => {
            error!("Failed to build publisher: {}", e);
            return 1;
        }
    };

    let listener = spawn_signal_listener(shutdown);

    let exit_code = match controller.run().await {
        Ok(()) => {
            info!("Publisher shut down gracefully");
            0
        }
        Err(e) => {
            error!("Publisher terminated: {}", e);
            e.exit_code()
        }
    };

    listener.abort();
    exit_code
}

fn handle_config_command(config: &PublisherConfig, show: bool) -> i32 {
    if show {
        match config.to_toml_string() {
            Ok(rendered) => {
                // stdout carries only the TOML so it can be redirected into a file
                info!("Effective configuration:");
                print!("{rendered}");
            }
            Err(e) => {
                error!("Failed to render configuration: {}", e);
                return 1;
            }
        }
    }

    info!("Configuration validation complete");
    0
}
