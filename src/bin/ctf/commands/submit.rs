//! Submit command - send a flag for a challenge

use crate::client::CtfClient;
use crate::style::*;
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub async fn run(client: &CtfClient, challenge_id: i64, flag: Option<String>) -> Result<()> {
    let submission = match flag {
        Some(flag) => flag,
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("  Flag")
            .interact()?,
    };

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.set_message("Submitting flag...");
    pb.enable_steady_tick(Duration::from_millis(80));

    let result = client.submit(challenge_id, &submission).await;
    pb.finish_and_clear();
    let result = result?;

    print_success(&format!("Correct! +{} points", result.points));
    if result.first_blood {
        println!("  {}", style_red("First blood!"));
    }
    match result.progress {
        Some(progress) if !result.completed => print_info(&format!(
            "{}/{} flags found",
            progress.solved_flags, progress.total_flags
        )),
        _ if result.completed => print_info("Challenge completed"),
        _ => {}
    }

    Ok(())
}
