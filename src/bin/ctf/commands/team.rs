//! Team command - member breakdown for the caller's team

use crate::client::CtfClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &CtfClient, event_id: i64, history: bool) -> Result<()> {
    let board = client.team(event_id).await?;

    print_header(&format!("Team {}", board.team_name));
    println!("Points: {}", style_bold(&board.points.to_string()));
    if board.frozen {
        print_warning("Scores shown up to the freeze");
    }

    println!();
    println!(
        "{:>5}  {:<24}  {:>8}  {:>12}",
        "Rank", "Member", "Points", "First blood"
    );
    println!("{}", "─".repeat(56));

    for member in &board.members {
        println!(
            "{:>5}  {:<24}  {:>8}  {:>12}",
            rank_label(member.rank),
            truncate(&member.username, 24),
            member.points,
            member.first_blood_points
        );

        if history {
            for solve in &member.solve_history {
                let target = match &solve.flag_name {
                    Some(flag) => format!("{} / {}", solve.challenge_name, flag),
                    None => solve.challenge_name.clone(),
                };
                let blood = if solve.first_blood {
                    style_red(" first blood")
                } else {
                    String::new()
                };
                println!(
                    "         {} {}  +{}{}",
                    style_dim(&solve.solved_at.format("%H:%M:%S").to_string()),
                    target,
                    solve.points,
                    blood
                );
            }
        }
    }

    Ok(())
}
