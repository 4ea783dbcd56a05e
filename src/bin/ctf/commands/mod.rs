//! CLI subcommands

pub mod challenge_leaderboard;
pub mod challenges;
pub mod scoreboard;
pub mod submit;
pub mod team;
