//! Reflex Server Binary
//!
//! Usage: reflex-server [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>  Path to JSON configuration file
//!   -g, --generate       Generate a starter configuration
//!   -h, --help           Print help information

use std::env;
use std::sync::Arc;

use reflex::config::{ClientConfig, FallbackConfig, InboundConfig, ReflexConfig};
use reflex::dispatch::DirectDispatcher;
use reflex::inbound::{Handler, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing — respects RUST_LOG env var (e.g. RUST_LOG=debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return Ok(());
    }

    match args[1].as_str() {
        "-h" | "--help" => {
            print_usage();
        }
        "-g" | "--generate" => {
            generate_config()?;
        }
        "-c" | "--config" => {
            if args.len() < 3 {
                eprintln!("Error: --config requires a file path");
                return Ok(());
            }
            run_server(&args[2]).await?;
        }
        _ => {
            eprintln!("Unknown option: {}", args[1]);
            print_usage();
        }
    }

    Ok(())
}

fn print_usage() {
    println!(
        r#"Reflex Server - obfuscated proxy inbound

USAGE:
    reflex-server [OPTIONS]

OPTIONS:
    -c, --config <FILE>     Path to JSON configuration file
    -g, --generate          Generate a starter configuration
    -h, --help              Print help information

EXAMPLES:
    Generate a new configuration:
        reflex-server --generate > reflex.json

    Run the server:
        reflex-server --config reflex.json
"#
    );
}

fn generate_config() -> anyhow::Result<()> {
    let config = ReflexConfig {
        listen: "0.0.0.0:8443".into(),
        inbound: InboundConfig {
            clients: vec![ClientConfig {
                id: uuid::Uuid::new_v4().to_string(),
                policy: "standard".into(),
            }],
            fallback: Some(FallbackConfig { dest: 8080 }),
        },
        outbound: None,
    };

    println!("{}", serde_json::to_string_pretty(&config)?);
    eprintln!();
    eprintln!("# Give the client id to your peer; point fallback.dest at a local web server.");

    Ok(())
}

async fn run_server(config_path: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(config_path)?;
    let config = ReflexConfig::from_json(&content)?;
    config.validate()?;

    let handler = Handler::new(&config.inbound)?;

    tracing::info!("Starting reflex server on {}", config.listen);
    tracing::info!("Configured clients: {}", config.inbound.clients.len());
    match &config.inbound.fallback {
        Some(fallback) => tracing::info!("Fallback backend: 127.0.0.1:{}", fallback.dest),
        None => tracing::info!("No fallback configured; disguise traffic gets 403"),
    }
    if let Some(outbound) = &config.outbound {
        tracing::info!("Outbound peer: {}:{}", outbound.address, outbound.port);
    }

    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    let server = Server::new(handler, Arc::new(DirectDispatcher));
    server.run(listener).await?;

    Ok(())
}
