//! Challenges command - list an event's challenges with the team's progress

use crate::client::CtfClient;
use crate::style::*;
use anyhow::Result;

pub async fn run(client: &CtfClient, event_id: i64) -> Result<()> {
    let listing = client.challenges(event_id).await?;

    print_header("Challenges");
    if listing.frozen {
        print_warning("Solve counts are frozen");
    }

    if listing.challenges.is_empty() {
        print_info("No challenges published.");
        return Ok(());
    }

    println!();
    for challenge in &listing.challenges {
        let status = if challenge.solved_by_team {
            style_green("✓")
        } else if challenge.progress > 0 {
            style_yellow(&format!("{}%", challenge.progress))
        } else {
            style_dim("·")
        };

        println!(
            "{:>4}  {} {:<28} {:<12} {:>5} (+{}) pts  {} solves  {}",
            challenge.id,
            status,
            truncate(&challenge.name, 28),
            challenge.category,
            challenge.bytes,
            challenge.first_blood_bytes,
            challenge.solve_count,
            style_dim(&challenge.flag_type)
        );

        for flag in &challenge.flags {
            let mark = if flag.solved_by_team {
                style_green("✓")
            } else {
                style_dim("·")
            };
            println!(
                "        {} {:<26} {:>5} pts  {} solves",
                mark,
                truncate(&flag.name, 26),
                flag.bytes,
                flag.solve_count
            );
        }
    }

    Ok(())
}
