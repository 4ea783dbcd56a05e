//! CTF Scoreboard Server
//!
//! Serves submissions and leaderboards for CTF events

use std::sync::Arc;

use clap::Parser;
use ctf_scoreboard::server::{run_server, AppState};
use ctf_scoreboard::{
    Adjudicator, Catalog, Clock, Config, LeaderboardService, PgStorage, SqliteStorage, Storage,
    SystemClock,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ctf-server")]
#[command(about = "CTF submission and scoreboard server")]
#[command(version)]
struct Args {
    /// Path to config.toml
    #[arg(short, long, default_value = "config.toml", env = "CTF_CONFIG")]
    config: String,

    /// Import a TOML event catalog before serving
    #[arg(long)]
    seed: Option<String>,

    /// Import the catalog and exit
    #[arg(long, requires = "seed")]
    seed_only: bool,

    /// PostgreSQL URL; SQLite from the config is used when absent
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::load_from(&args.config)?.with_env_overrides();

    info!("Starting CTF scoreboard server");

    let storage: Arc<dyn Storage> = match args.database_url.as_deref() {
        Some(url) if !url.is_empty() => {
            let storage = PgStorage::new(url).await?;
            info!("PostgreSQL storage initialized");
            Arc::new(storage)
        }
        _ => {
            let storage = SqliteStorage::new(&config.database.sqlite_path)?;
            info!(
                "SQLite storage initialized at {}",
                config.database.sqlite_path
            );
            Arc::new(storage)
        }
    };

    if let Some(path) = &args.seed {
        let catalog = Catalog::load(path)?;
        let seeded = catalog.import(storage.as_ref()).await?;
        info!("Catalog {} imported as event {}", path, seeded.event_id);
        if args.seed_only {
            return Ok(());
        }
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let state = Arc::new(AppState {
        adjudicator: Adjudicator::new(
            storage.clone(),
            clock.clone(),
            config.submissions.max_submission_length,
        ),
        leaderboard: LeaderboardService::new(storage, clock),
        admin_token: config.admin_token().map(str::to_string),
        started_at: std::time::Instant::now(),
    });

    if state.admin_token.is_none() {
        info!("No admin token configured, admin endpoints are disabled");
    }

    run_server(&config.server.host, config.server.port, state).await
}
