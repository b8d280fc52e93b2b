use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::{Server, ServerEvent};

/// Authoritative tag arena server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[clap(short, long, env = "PORT", default_value = "8080")]
    port: u16,

    /// Simulation tick in milliseconds
    #[clap(long, env = "TICK_MS", default_value_t = shared::SERVER_TICK_MS)]
    tick_ms: u64,

    /// Snapshot broadcast interval in milliseconds
    #[clap(long, env = "BROADCAST_MS", default_value_t = shared::BROADCAST_TICK_MS)]
    broadcast_ms: u64,

    /// Maximum number of players, bots included
    #[clap(long, env = "MAX_PLAYERS", default_value_t = shared::MAX_PLAYERS)]
    max_players: usize,

    /// Players needed before a round starts
    #[clap(long, env = "MIN_PLAYERS", default_value_t = shared::MIN_PLAYERS)]
    min_players: usize,

    /// Number of server-controlled bots
    #[clap(short, long, env = "AI_PLAYERS", default_value = "0")]
    ai_players: usize,

    /// Fixed world generation seed
    #[clap(long, env = "GAME_SEED")]
    seed: Option<u64>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            tick_ms: args.tick_ms,
            broadcast_ms: args.broadcast_ms,
            max_players: args.max_players,
            min_players: args.min_players,
            ai_players: args.ai_players,
            seed: args.seed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config: ServerConfig = Args::parse().into();
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    info!(
        "Starting server on {} (tick {}ms, broadcast {}ms, players {}..={}, bots {})",
        config.bind_addr(),
        config.tick_ms,
        config.broadcast_ms,
        config.min_players,
        config.max_players,
        config.ai_players
    );

    let mut server = Server::new(&config).await?;
    let handle = server.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
            let _ = handle.send(ServerEvent::Shutdown);
        }
    });

    server.run().await
}
