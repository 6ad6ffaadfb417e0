use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use credgate::client::{ClientResponse, GatewayClient, DEFAULT_BASE_URL};
use credgate::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Credential store and HTTP Basic authentication gate.
#[derive(Parser, Debug)]
#[command(name = "credgate", version, about)]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP gateway.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
        /// SQLite database file.
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Register a user on a running gateway.
    Register(ClientArgs),
    /// Check credentials on a running gateway.
    Login(ClientArgs),
    /// Fetch the protected page with HTTP Basic credentials.
    Tasks(ClientArgs),
}

#[derive(Args, Debug)]
struct ClientArgs {
    username: String,
    password: String,
    /// Gateway base URL.
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { host, port, db } => {
            let mut config = Config::load(cli.config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            if let Some(db) = db {
                config.storage.db_path = db;
            }
            credgate::gateway::run_gateway(config).await
        }
        Command::Register(args) => {
            let client = GatewayClient::new(&args.url)?;
            print_response(&client.register(&args.username, &args.password).await?);
            Ok(())
        }
        Command::Login(args) => {
            let client = GatewayClient::new(&args.url)?;
            print_response(&client.login(&args.username, &args.password).await?);
            Ok(())
        }
        Command::Tasks(args) => {
            let client = GatewayClient::new(&args.url)?;
            print_response(&client.tasks(&args.username, &args.password).await?);
            Ok(())
        }
    }
}

fn print_response(response: &ClientResponse) {
    println!("STATUS: {}", response.status);
    println!("{}", response.display_body());
}
