//! CTF Scoreboard - submission adjudication and scoring for CTF events
//!
//! Teams compete in a time-boxed event; members submit flags, the
//! adjudicator records every attempt in an append-only ledger, and the
//! leaderboard is computed on demand from that ledger.
//!
//! # How it works
//!
//! 1. A submission is resolved to the user's team for the challenge's event
//! 2. The flag is compared exactly (no trimming, no case folding)
//! 3. Correct and incorrect attempts are both recorded; duplicate team solves are not
//! 4. Scoring replays the ledger per discipline: `single`, `multiple_all`,
//!    `multiple_individual`
//! 5. Public views stop at the freeze instant when the event is frozen
//!
//! # Consistency
//!
//! - At most one accepted solve per team per challenge (and per flag),
//!   enforced by the database under concurrent submissions
//! - First blood is derived from the ledger: earliest solve, then insertion order
//! - Leaderboards never write and are deterministic

pub mod adjudicator;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod freeze;
pub mod leaderboard;
pub mod models;
pub mod pg_storage;
pub mod scoring;
pub mod seed;
pub mod server;
pub mod storage;
pub mod teams;

pub use adjudicator::{Adjudicator, Progress, SubmissionOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use freeze::EventPhase;
pub use leaderboard::{
    ChallengeLeaderboard, ChallengeListing, EventLeaderboard, LeaderboardService, SubmissionLog,
    TeamLeaderboard,
};
pub use models::{FlagType, LedgerEntry, LedgerKind, SubmissionRecord};
pub use pg_storage::PgStorage;
pub use seed::Catalog;
pub use storage::{SqliteStorage, Storage};
pub use teams::{EventAccess, TeamResolver};
