use clap::Parser;
use mschapv2_proto::eap::{add_eap_to_radius_packet, EapPacket};
use mschapv2_proto::{Code, Packet};
use mschapv2_server::{Config, MschapV2Handler, UnavailableBackend};
use std::process;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// EAP-MSCHAPv2 method handler
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "eap_mschapv2")]
struct Cli {
    /// Path to configuration file
    #[arg(value_name = "CONFIG", default_value = "config.json")]
    config_path: String,

    /// Validate configuration and exit
    #[arg(short, long)]
    validate: bool,

    /// Build the first Access-Challenge for this identity and print it as hex
    #[arg(short, long, value_name = "IDENTITY")]
    challenge: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::registry()
                .with(EnvFilter::new("info"))
                .with(tracing_subscriber::fmt::layer())
                .init();

            if cli.validate {
                eprintln!("Configuration validation failed!");
                eprintln!("   Error: {}", e);
                process::exit(1);
            }

            warn!("Could not load config file from {}: {}", cli.config_path, e);
            info!("Creating example configuration at: {}", cli.config_path);

            if let Err(e) = Config::example().to_file(&cli.config_path) {
                error!("Error creating example config: {}", e);
                process::exit(1);
            }

            info!("Please edit {} and run again", cli.config_path);
            process::exit(0);
        }
    };

    if cli.validate {
        println!("Configuration validated successfully!");
        println!();
        println!("Configuration summary:");
        println!("  Identity: {}", config.mschapv2.identity);
        println!("  Send error details: {}", config.mschapv2.send_error);
        println!("  Strip NT domain: {}", config.mschapv2.with_ntdomain_hack);
        println!("  Session timeout: {}s", config.session_timeout);
        println!("  Log level: {}", config.log_level.as_deref().unwrap_or("info"));
        process::exit(0);
    }

    let log_level = config.log_level.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("EAP-MSCHAPv2 v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded configuration from: {}", cli.config_path);

    let handler = MschapV2Handler::from_config(&config, Arc::new(UnavailableBackend));

    let Some(identity) = cli.challenge else {
        info!("Nothing to do; pass --challenge <IDENTITY> to build a sample Access-Challenge");
        return;
    };

    let mut request = Packet::new(Code::AccessRequest, 0);
    if let Err(e) = add_eap_to_radius_packet(&mut request, &EapPacket::identity_response(0, &identity)) {
        error!("Cannot encode identity {}: {}", identity, e);
        process::exit(1);
    }

    let reply = match handler.start(&request, &[]) {
        Ok(reply) => reply,
        Err(e) => {
            error!("Failed to start session: {}", e);
            process::exit(1);
        }
    };

    println!("Code: {:?}", reply.code());
    if let Some(state) = reply.state() {
        println!("State: {}", state);
    }
    for attribute in reply.attributes() {
        println!("Attribute {}: {}", attribute.attr_type, hex::encode(&attribute.value));
    }
}
