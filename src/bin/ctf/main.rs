//! CTF CLI
//!
//! Command-line client for a CTF scoreboard server.

mod client;
mod commands;
mod style;

use clap::{Parser, Subcommand};
use client::CtfClient;
use style::*;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "ctf")]
#[command(author = "CortexLM")]
#[command(version)]
#[command(about = "CTF - submit flags and follow the scoreboard", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Scoreboard server URL
    #[arg(
        short,
        long,
        env = "CTF_URL",
        default_value = "http://localhost:8080",
        global = true
    )]
    url: String,

    /// Your user id, forwarded as x-user-id
    #[arg(long, env = "CTF_USER_ID", global = true)]
    user: Option<i64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the event scoreboard
    #[command(visible_alias = "sb")]
    Scoreboard {
        /// Event id
        #[arg(short, long, env = "CTF_EVENT_ID")]
        event: i64,
    },

    /// List challenges with your team's progress
    #[command(visible_alias = "ls")]
    Challenges {
        /// Event id
        #[arg(short, long, env = "CTF_EVENT_ID")]
        event: i64,
    },

    /// Submit a flag (prompts when the flag is omitted)
    #[command(visible_alias = "s")]
    Submit {
        /// Challenge id
        challenge: i64,

        /// Flag value
        flag: Option<String>,
    },

    /// Show your team's member breakdown
    #[command(visible_alias = "t")]
    Team {
        /// Event id
        #[arg(short, long, env = "CTF_EVENT_ID")]
        event: i64,

        /// Include each member's solve history
        #[arg(long)]
        history: bool,
    },

    /// Show the teams that solved a challenge
    #[command(visible_alias = "cl")]
    ChallengeLeaderboard {
        /// Challenge id
        challenge: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_env_filter("info").init();
        tracing::info!("ctf v{} against {}", VERSION, cli.url);
    }

    let client = CtfClient::new(&cli.url, cli.user);

    let result = match cli.command {
        Commands::Scoreboard { event } => commands::scoreboard::run(&client, event).await,
        Commands::Challenges { event } => commands::challenges::run(&client, event).await,
        Commands::Submit { challenge, flag } => {
            commands::submit::run(&client, challenge, flag).await
        }
        Commands::Team { event, history } => commands::team::run(&client, event, history).await,
        Commands::ChallengeLeaderboard { challenge } => {
            commands::challenge_leaderboard::run(&client, challenge).await
        }
    };

    if let Err(e) = result {
        print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
