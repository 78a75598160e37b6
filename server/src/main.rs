use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::network::Server;
use server::players::TokenRegistry;
use std::path::PathBuf;

/// Authoritative realtime arena session server.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,
    /// Tick rate (simulation updates per second)
    #[clap(short, long, default_value_t = shared::TICK_RATE)]
    tick_rate: u32,
    /// Maximum number of concurrent players
    #[clap(short, long, default_value_t = shared::MAX_PLAYERS)]
    max_players: usize,
    /// JSON file mapping auth tokens to display names; the built-in demo
    /// tokens are used when omitted
    #[clap(long)]
    tokens: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        tick_ms: (1000 / args.tick_rate.max(1)) as u64,
        max_players: args.max_players,
        ..ServerConfig::default()
    };

    let tokens = match &args.tokens {
        Some(path) => TokenRegistry::from_file(path)?,
        None => TokenRegistry::with_demo_tokens(),
    };
    info!("{} tokens registered", tokens.len());

    let addr = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&addr, config, tokens).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("received ctrl-c, shutting down");
        }
    }

    Ok(())
}
