//! Challenge leaderboard command

use crate::client::CtfClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &CtfClient, challenge_id: i64) -> Result<()> {
    let board = client.challenge_leaderboard(challenge_id).await?;

    print_header(&format!("{} Solvers", board.challenge_name));
    println!("Type: {}", style_dim(&board.flag_type));
    if board.frozen {
        print_warning("Solves after the freeze are hidden");
    }

    if board.solvers.is_empty() {
        print_info("Nobody has solved this challenge yet.");
        return Ok(());
    }

    println!();
    for solver in &board.solvers {
        let blood = if solver.first_blood {
            style_red("first blood")
        } else {
            String::new()
        };
        println!(
            "{:>5}  {:<24}  {}  {}",
            rank_label(solver.rank),
            truncate(&solver.team_name, 24),
            style_dim(&solver.solved_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            blood
        );
    }

    Ok(())
}
