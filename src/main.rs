//! edgelink - cloud-to-edge connector entry point

use clap::{Parser, Subcommand};
use edgelink::config::ConnectorConfig;
use edgelink::controller::{self, jwt};
use edgelink::error::ConnectorResult;
use edgelink::engine::{ControlDispatcher, DataForwarder, FrameRouter, HandshakeEngine};
use edgelink::observability::init_default_logging;
use edgelink::protocol::{TopicBuilder, TopicParser};
use edgelink::sink::{KafkaResponseWriter, RecordSink};
use edgelink::transport::{ControlPublisher, MqttLink, Subscription};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Cloud-to-edge connector bridging MQTT agents to the platform
#[derive(Parser)]
#[command(name = "edgelink")]
#[command(about = "Cloud-to-edge connector bridging MQTT agents to Kafka and platform services")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the connector
    Run,
    /// Validate configuration
    Config {
        /// Show the effective configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("starting edgelink v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::Run => run_connector(config).await.map_err(Into::into),
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(err) = result {
        error!(error = %err, "command failed");
        process::exit(1);
    }

    info!("edgelink shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<ConnectorConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            Ok(ConnectorConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["edgelink.toml", "config/edgelink.toml"];

            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!(path = %path.display(), "loading configuration");
                    return Ok(ConnectorConfig::load_from_file(&path)?);
                }
            }

            Err("no configuration file found; provide one with -c/--config or create edgelink.toml".into())
        }
    }
}

async fn run_connector(config: ConnectorConfig) -> ConnectorResult<()> {
    info!("connector configuration:\n{config}");

    // Root shutdown token plus a separate fatal token tripped by
    // unrecoverable downstream failures.
    let shutdown = CancellationToken::new();
    let fatal = CancellationToken::new();

    let resolver = controller::new_account_resolver(&config.controller)?;
    let registrar = Arc::new(controller::MemoryConnectionRegistrar::new());
    let recorder = controller::new_connected_client_recorder(&config.controller)?;
    let sources = controller::new_sources_recorder(&config.controller)?;

    // JWT material is only consulted for wss brokers.
    let jwt = if config.mqtt.broker_address.starts_with("wss://") {
        Some(jwt::new_jwt_generator(&config.mqtt)?)
    } else {
        None
    };

    let sink: Arc<dyn RecordSink> =
        Arc::new(KafkaResponseWriter::new(&config.kafka, shutdown.clone())?);

    let topics = TopicBuilder::new(&config.mqtt.topic_prefix);
    let parser = TopicParser::new(&config.mqtt.topic_prefix);

    let subscriptions = vec![
        Subscription {
            topic: topics.incoming_wildcard_control(),
            qos: config.mqtt.control_subscription_qos,
        },
        Subscription {
            topic: topics.incoming_wildcard_data(),
            qos: config.mqtt.data_subscription_qos,
        },
    ];

    let link = MqttLink::new(
        &config.mqtt,
        jwt,
        subscriptions,
        shutdown.clone(),
        fatal.clone(),
    )?;
    let publisher: Arc<dyn ControlPublisher> = Arc::new(link.handle());

    let handshake = Arc::new(HandshakeEngine::new(
        resolver,
        registrar,
        recorder,
        sources,
        publisher,
        topics,
        config.mqtt.control_publish_qos,
        config.handshake.invalid_reconnect_delay,
    ));

    let router = Arc::new(FrameRouter::new(
        parser,
        Arc::new(ControlDispatcher::new(handshake)),
        Arc::new(DataForwarder::new(sink, fatal.clone())),
    ));

    let link_task = tokio::spawn(link.run(router));

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    info!("connector is running and waiting for agent traffic");

    tokio::select! {
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
        }
        _ = fatal.cancelled() => {
            error!("fatal downstream failure, shutting down");
        }
    }

    shutdown.cancel();

    if tokio::time::timeout(Duration::from_secs(5), link_task)
        .await
        .is_err()
    {
        error!("mqtt event loop did not stop in time");
    }

    Ok(())
}

fn handle_config_command(
    config: ConnectorConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("configuration validation complete");
    Ok(())
}
