use clap::Parser;
use log::{error, info};
use server::game::GameConfig;
use server::network::Server;
use shared::{MIN_PLAYERS, ROUND_DURATION_SECS, TOTAL_ROUNDS};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Maximum number of connected clients
    #[arg(short = 'c', long, default_value = "32")]
    max_clients: usize,

    /// Players required to start a game
    #[arg(long, default_value_t = MIN_PLAYERS)]
    min_players: usize,

    /// Rounds per game
    #[arg(short = 'r', long, default_value_t = TOTAL_ROUNDS,
          value_parser = clap::value_parser!(u32).range(1..))]
    total_rounds: u32,

    /// Seconds each round runs before a winner is drawn
    #[arg(long, default_value_t = ROUND_DURATION_SECS)]
    round_secs: u64,

    /// Fixed seed for winner selection
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = GameConfig {
        min_players: args.min_players,
        total_rounds: args.total_rounds,
        round_duration: Duration::from_secs(args.round_secs),
    };
    info!(
        "Room rules: {} players to start, {} rounds of {}s",
        config.min_players, config.total_rounds, args.round_secs
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config, args.max_clients, args.seed).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped with error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
