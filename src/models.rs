//! Competition entities and ledger records

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};

pub type EventId = i64;
pub type TeamId = i64;
pub type UserId = i64;
pub type ChallengeId = i64;
pub type FlagId = i64;

// ============================================================================
// CATALOG
// ============================================================================

/// A time-boxed competition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub team_formation_starts_at: Option<DateTime<Utc>>,
    pub team_formation_ends_at: Option<DateTime<Utc>>,
    pub registration_starts_at: Option<DateTime<Utc>>,
    pub registration_ends_at: Option<DateTime<Utc>>,
    pub requires_team: bool,
    pub min_team_size: i32,
    pub max_team_size: i32,
    pub freeze: bool,
    /// Only meaningful when `freeze` is set
    pub freeze_time: Option<DateTime<Utc>>,
}

/// Scoring discipline of a challenge
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSql, FromSql,
)]
#[serde(rename_all = "snake_case")]
#[postgres(name = "flag_type")]
pub enum FlagType {
    /// One flag stored on the challenge itself
    #[postgres(name = "single")]
    Single,
    /// Every flag must be found before any points are awarded
    #[postgres(name = "multiple_all")]
    MultipleAll,
    /// Each flag scores on its own
    #[postgres(name = "multiple_individual")]
    MultipleIndividual,
}

impl FlagType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagType::Single => "single",
            FlagType::MultipleAll => "multiple_all",
            FlagType::MultipleIndividual => "multiple_individual",
        }
    }

    pub fn is_multi(&self) -> bool {
        !matches!(self, FlagType::Single)
    }
}

impl fmt::Display for FlagType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlagType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single" => Ok(FlagType::Single),
            "multiple_all" => Ok(FlagType::MultipleAll),
            "multiple_individual" => Ok(FlagType::MultipleIndividual),
            other => Err(format!("unknown flag type: {}", other)),
        }
    }
}

/// A challenge with its flag configuration loaded
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub id: ChallengeId,
    pub event_id: EventId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub flag_type: FlagType,
    /// Flag for `single` challenges
    pub flag: Option<String>,
    pub bytes: i64,
    pub first_blood_bytes: i64,
    pub attempts: i64,
    /// Ordered by `order_index`; empty for `single` challenges
    pub flags: Vec<Flag>,
}

impl Challenge {
    /// First flag whose secret equals the submission exactly
    pub fn matching_flag(&self, submission: &str) -> Option<&Flag> {
        self.flags.iter().find(|f| f.flag == submission)
    }
}

/// Sub-flag of a multi-flag challenge
#[derive(Debug, Clone, PartialEq)]
pub struct Flag {
    pub id: FlagId,
    pub challenge_id: ChallengeId,
    pub name: String,
    pub description: String,
    pub flag: String,
    pub bytes: i64,
    pub first_blood_bytes: i64,
    pub order_index: i32,
    pub attempts: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMember {
    pub user_id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Team {
    pub id: TeamId,
    pub event_id: EventId,
    pub name: String,
    pub leader_id: UserId,
    pub is_locked: bool,
    /// Leader included
    pub members: Vec<TeamMember>,
}

// ============================================================================
// CATALOG INPUTS (written by the admin layer)
// ============================================================================

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub team_formation_starts_at: Option<DateTime<Utc>>,
    pub team_formation_ends_at: Option<DateTime<Utc>>,
    pub registration_starts_at: Option<DateTime<Utc>>,
    pub registration_ends_at: Option<DateTime<Utc>>,
    pub requires_team: bool,
    pub min_team_size: i32,
    pub max_team_size: i32,
    pub freeze: bool,
    pub freeze_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub event_id: EventId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub flag_type: FlagType,
    pub flag: Option<String>,
    pub bytes: i64,
    pub first_blood_bytes: i64,
    pub flags: Vec<NewFlag>,
}

#[derive(Debug, Clone)]
pub struct NewFlag {
    pub name: String,
    pub description: String,
    pub flag: String,
    pub bytes: i64,
    pub first_blood_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct NewTeam {
    pub event_id: EventId,
    pub name: String,
    pub leader_id: UserId,
    pub is_locked: bool,
    /// Leader is added automatically
    pub members: Vec<UserId>,
}

// ============================================================================
// LEDGER
// ============================================================================

/// Attempt on a `single` challenge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChallengeSubmission {
    pub id: i64,
    pub challenge_id: ChallengeId,
    pub user_id: UserId,
    pub team_id: TeamId,
    pub submission: String,
    pub solved: bool,
    pub attempts: i64,
    pub solved_at: Option<DateTime<Utc>>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Attempt on one flag of a multi-flag challenge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagSubmission {
    pub id: i64,
    pub flag_id: FlagId,
    pub challenge_id: ChallengeId,
    pub user_id: UserId,
    pub team_id: TeamId,
    pub submission: String,
    pub solved: bool,
    pub attempts: i64,
    pub solved_at: Option<DateTime<Utc>>,
    pub ip: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Common view over both ledger record kinds
pub trait LedgerEntry {
    /// Insertion order within the record's own table
    fn id(&self) -> i64;
    fn user_id(&self) -> UserId;
    fn challenge_id(&self) -> ChallengeId;
    fn flag_id(&self) -> Option<FlagId>;
    fn solved(&self) -> bool;
    fn solved_at(&self) -> Option<DateTime<Utc>>;

    /// Solve instant if this row is an accepted solve no later than `cutoff`
    fn solved_by(&self, cutoff: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.solved() {
            return None;
        }
        self.solved_at().filter(|at| *at <= cutoff)
    }
}

impl LedgerEntry for ChallengeSubmission {
    fn id(&self) -> i64 {
        self.id
    }
    fn user_id(&self) -> UserId {
        self.user_id
    }
    fn challenge_id(&self) -> ChallengeId {
        self.challenge_id
    }
    fn flag_id(&self) -> Option<FlagId> {
        None
    }
    fn solved(&self) -> bool {
        self.solved
    }
    fn solved_at(&self) -> Option<DateTime<Utc>> {
        self.solved_at
    }
}

impl LedgerEntry for FlagSubmission {
    fn id(&self) -> i64 {
        self.id
    }
    fn user_id(&self) -> UserId {
        self.user_id
    }
    fn challenge_id(&self) -> ChallengeId {
        self.challenge_id
    }
    fn flag_id(&self) -> Option<FlagId> {
        Some(self.flag_id)
    }
    fn solved(&self) -> bool {
        self.solved
    }
    fn solved_at(&self) -> Option<DateTime<Utc>> {
        self.solved_at
    }
}

/// One row of the submission ledger, of either kind
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionRecord {
    Challenge(ChallengeSubmission),
    Flag(FlagSubmission),
}

impl SubmissionRecord {
    fn entry(&self) -> &dyn LedgerEntry {
        match self {
            SubmissionRecord::Challenge(s) => s,
            SubmissionRecord::Flag(s) => s,
        }
    }

    pub fn kind(&self) -> LedgerKind {
        match self {
            SubmissionRecord::Challenge(_) => LedgerKind::Challenge,
            SubmissionRecord::Flag(_) => LedgerKind::Flag,
        }
    }
}

impl LedgerEntry for SubmissionRecord {
    fn id(&self) -> i64 {
        self.entry().id()
    }
    fn user_id(&self) -> UserId {
        self.entry().user_id()
    }
    fn challenge_id(&self) -> ChallengeId {
        self.entry().challenge_id()
    }
    fn flag_id(&self) -> Option<FlagId> {
        self.entry().flag_id()
    }
    fn solved(&self) -> bool {
        self.entry().solved()
    }
    fn solved_at(&self) -> Option<DateTime<Utc>> {
        self.entry().solved_at()
    }
}

/// Which ledger table a listing reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Challenge,
    Flag,
}

/// What a new ledger row is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionTarget {
    Challenge(ChallengeId),
    Flag {
        challenge_id: ChallengeId,
        flag_id: FlagId,
    },
}

#[derive(Debug, Clone)]
pub struct NewSubmission<'a> {
    pub target: SubmissionTarget,
    pub user_id: UserId,
    pub team_id: TeamId,
    pub submission: &'a str,
    pub solved: bool,
    pub at: DateTime<Utc>,
    pub ip: Option<&'a str>,
}

/// Result of appending to the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Recorded(SubmissionRecord),
    /// The team already holds a solved row for this target
    DuplicateSolve,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_flag_type_round_trips_through_str() {
        for ft in [
            FlagType::Single,
            FlagType::MultipleAll,
            FlagType::MultipleIndividual,
        ] {
            assert_eq!(ft.as_str().parse::<FlagType>().unwrap(), ft);
        }
        assert!("MULTIPLE_ALL".parse::<FlagType>().is_err());
    }

    #[test]
    fn test_matching_flag_is_exact_and_ordered() {
        let flag = |id, secret: &str| Flag {
            id,
            challenge_id: 1,
            name: format!("f{}", id),
            description: String::new(),
            flag: secret.to_string(),
            bytes: 10,
            first_blood_bytes: 0,
            order_index: id as i32,
            attempts: 0,
        };
        let challenge = Challenge {
            id: 1,
            event_id: 1,
            name: "multi".into(),
            category: "web".into(),
            description: String::new(),
            flag_type: FlagType::MultipleIndividual,
            flag: None,
            bytes: 0,
            first_blood_bytes: 0,
            attempts: 0,
            flags: vec![flag(1, "CTF{a}"), flag(2, "CTF{b}"), flag(3, "CTF{b}")],
        };

        assert_eq!(challenge.matching_flag("CTF{b}").map(|f| f.id), Some(2));
        assert!(challenge.matching_flag("ctf{a}").is_none());
        assert!(challenge.matching_flag(" CTF{a}").is_none());
    }

    #[test]
    fn test_solved_by_respects_cutoff() {
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
        let row = SubmissionRecord::Challenge(ChallengeSubmission {
            id: 1,
            challenge_id: 1,
            user_id: 1,
            team_id: 1,
            submission: "x".into(),
            solved: true,
            attempts: 1,
            solved_at: Some(at),
            ip: None,
            created_at: at,
        });

        assert_eq!(row.solved_by(at), Some(at));
        assert_eq!(row.solved_by(at - chrono::Duration::seconds(1)), None);
        assert_eq!(row.flag_id(), None);
        assert_eq!(row.kind(), LedgerKind::Challenge);
    }
}
