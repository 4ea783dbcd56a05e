//! Scoreboard command

use crate::client::CtfClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &CtfClient, event_id: i64) -> Result<()> {
    let board = client.scoreboard(event_id).await?;

    print_header(&format!("{} Scoreboard", board.event_name));
    println!("Phase: {}", style_cyan(&board.phase));
    if board.frozen {
        if let Some(at) = board.freeze_time {
            print_warning(&format!(
                "Scoreboard frozen at {}",
                at.format("%Y-%m-%d %H:%M UTC")
            ));
        }
    }

    if board.teams.is_empty() {
        print_info("No teams yet.");
        return Ok(());
    }

    println!();
    println!(
        "{:>5}  {:<24}  {:>8}  {:>6}  {:>6}  Last solve",
        "Rank", "Team", "Points", "Solves", "Bloods"
    );
    println!("{}", "─".repeat(75));

    for row in &board.teams {
        let last = row
            .last_solve_at
            .map(|at| at.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>5}  {:<24}  {:>8}  {:>6}  {:>6}  {}",
            rank_label(row.rank),
            truncate(&row.team_name, 24),
            style_bold(&row.points.to_string()),
            row.solved_count,
            row.first_blood_count,
            style_dim(&last)
        );
    }

    println!();
    println!("Total teams: {}", board.teams.len());
    Ok(())
}
