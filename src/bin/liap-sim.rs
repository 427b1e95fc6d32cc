use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use liap_state::{load_config, RoomConfig, RoomRegistry, Seating};

#[derive(Parser)]
#[command(name = "liap-sim", about = "Play all-bot Liap Tong rooms end to end")]
struct Cli {
    /// Number of rooms to play
    #[arg(short, long, default_value = "1", env = "LIAP_SIM_ROOMS")]
    rooms: u64,

    /// Base RNG seed; room i uses seed + i
    #[arg(short, long, env = "LIAP_SIM_SEED")]
    seed: Option<u64>,

    /// Path to a room config TOML
    #[arg(long, env = "LIAP_ROOM_CONFIG")]
    config: Option<PathBuf>,

    /// Override the winning score
    #[arg(long)]
    win_score: Option<i32>,

    /// Stop each game after this many rounds even if nobody reached the winning score
    #[arg(long, env = "LIAP_SIM_MAX_ROUNDS")]
    max_rounds: Option<u32>,

    /// Print each final status as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RoomConfig::default(),
    };
    if let Some(win_score) = cli.win_score {
        config.win_score = win_score;
    }
    if let Some(max_rounds) = cli.max_rounds {
        config = config.with_max_rounds(max_rounds);
    }

    for i in 0..cli.rooms {
        let mut room_config = config.clone();
        if let Some(seed) = cli.seed.or(config.rng_seed) {
            room_config = room_config.with_seed(seed.wrapping_add(i));
        }

        let registry = RoomRegistry::new(room_config);
        let room_id = format!("sim-{}", i);
        registry.create_room(room_id.as_str(), Seating::all_bots())?;

        let status = registry.status(&room_id)?;
        tracing::info!(
            room = %room_id,
            version = status.version,
            rounds = status.round_number,
            scores = ?status.scores,
            phase = %status.phase,
            "simulation finished"
        );
        if cli.json {
            println!("{}", serde_json::to_string(&status)?);
        }

        let closed = registry.cleanup_finished().await;
        tracing::debug!(closed = ?closed, "rooms cleaned up");
    }

    Ok(())
}
