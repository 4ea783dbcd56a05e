//! Flag matching and submission adjudication
//!
//! `submit` is the only write path into the ledger. Its guarantees:
//!
//! - validation, not-found, authorization and already-solved outcomes write
//!   nothing;
//! - every other call writes exactly one ledger row;
//! - at most one accepted solve per (team, challenge) and per (team, flag),
//!   even when teammates submit concurrently. The read-side pre-check is
//!   only a shortcut; the storage uniqueness constraint is the guard.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::{ledger_instant, Clock};
use crate::error::{CoreError, CoreResult};
use crate::freeze;
use crate::models::{
    Challenge, ChallengeId, Event, EventId, FlagId, FlagType, InsertOutcome, LedgerEntry, NewSubmission,
    SubmissionRecord, SubmissionTarget, Team, UserId,
};
use crate::scoring::{self, ScoringInput};
use crate::storage::Storage;
use crate::teams::{roster_map, team_member_ids, EventAccess, TeamResolver};

/// Accepted submission
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionOutcome {
    pub correct: bool,
    pub submission_id: i64,
    pub challenge_id: ChallengeId,
    pub flag_id: Option<FlagId>,
    /// Points this submission earned, first blood included
    pub points: i64,
    pub first_blood: bool,
    /// Challenge completed for the team
    pub completed: bool,
    /// Flag progress, multi-flag challenges only
    pub progress: Option<Progress>,
    pub solved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Progress {
    pub solved_flags: usize,
    pub total_flags: usize,
}

#[derive(Clone)]
pub struct Adjudicator {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    resolver: TeamResolver,
    max_submission_length: usize,
}

impl Adjudicator {
    pub fn new(
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        max_submission_length: usize,
    ) -> Self {
        Self {
            resolver: TeamResolver::new(storage.clone(), clock.clone()),
            storage,
            clock,
            max_submission_length,
        }
    }

    /// Adjudicate one flag submission
    pub async fn submit(
        &self,
        challenge_id: ChallengeId,
        user_id: Option<UserId>,
        raw: &str,
        ip: Option<&str>,
    ) -> CoreResult<SubmissionOutcome> {
        let user_id = user_id.ok_or(CoreError::NotAuthenticated)?;

        if raw.is_empty() {
            return Err(CoreError::Validation("Submission is empty".to_string()));
        }
        if raw.len() > self.max_submission_length {
            return Err(CoreError::Validation(format!(
                "Submission exceeds {} bytes",
                self.max_submission_length
            )));
        }

        let challenge = self
            .storage
            .get_challenge(challenge_id)
            .await?
            .ok_or(CoreError::ChallengeNotFound(challenge_id))?;

        let (event, team) = self
            .resolver
            .resolve_team(challenge.event_id, Some(user_id), EventAccess::Active)
            .await?;

        let attempt = Attempt {
            event: &event,
            challenge: &challenge,
            team: &team,
            user_id,
            raw,
            ip,
        };

        match challenge.flag_type {
            FlagType::Single => self.submit_single(attempt).await,
            FlagType::MultipleAll | FlagType::MultipleIndividual => {
                self.submit_multi(attempt).await
            }
        }
    }

    async fn submit_single(&self, attempt: Attempt<'_>) -> CoreResult<SubmissionOutcome> {
        let challenge = attempt.challenge;
        let target = SubmissionTarget::Challenge(challenge.id);

        if self.team_has_solved(attempt.team, target).await? {
            info!(
                "Team {} already solved challenge {}, rejecting submission from user {}",
                attempt.team.id, challenge.id, attempt.user_id
            );
            return Err(CoreError::AlreadySolvedByTeam);
        }

        if challenge.flag.as_deref() != Some(attempt.raw) {
            self.record_incorrect(&attempt, target).await;
            return Err(CoreError::IncorrectFlag);
        }

        self.record_solve(&attempt, target).await
    }

    async fn submit_multi(&self, attempt: Attempt<'_>) -> CoreResult<SubmissionOutcome> {
        let challenge = attempt.challenge;

        let Some(flag) = challenge.matching_flag(attempt.raw) else {
            // Unmatched guesses are booked against the first flag
            match challenge.flags.first() {
                Some(first) => {
                    let target = SubmissionTarget::Flag {
                        challenge_id: challenge.id,
                        flag_id: first.id,
                    };
                    self.record_incorrect(&attempt, target).await;
                }
                None => warn!("Challenge {} has no flags configured", challenge.id),
            }
            return Err(CoreError::IncorrectFlag);
        };

        let target = SubmissionTarget::Flag {
            challenge_id: challenge.id,
            flag_id: flag.id,
        };

        if self.team_has_solved(attempt.team, target).await? {
            info!(
                "Team {} already solved flag {} of challenge {}, rejecting submission from user {}",
                attempt.team.id, flag.id, challenge.id, attempt.user_id
            );
            return Err(CoreError::AlreadySolvedByTeam);
        }

        self.record_solve(&attempt, target).await
    }

    async fn team_has_solved(&self, team: &Team, target: SubmissionTarget) -> CoreResult<bool> {
        let members: Vec<UserId> = team_member_ids(team).into_iter().collect();
        Ok(self.storage.has_solved(&members, target).await?)
    }

    /// Best effort: the caller is told the flag was wrong either way
    async fn record_incorrect(&self, attempt: &Attempt<'_>, target: SubmissionTarget) {
        let new = attempt.to_new(target, false, ledger_instant(self.clock.now()));

        match self.storage.record_submission(&new).await {
            Ok(_) => debug!(
                "Incorrect flag for challenge {} from user {} (team {})",
                attempt.challenge.id, attempt.user_id, attempt.team.id
            ),
            Err(e) => error!(
                "Failed to record incorrect submission for challenge {} from user {}: {:#}",
                attempt.challenge.id, attempt.user_id, e
            ),
        }
    }

    async fn record_solve(
        &self,
        attempt: &Attempt<'_>,
        target: SubmissionTarget,
    ) -> CoreResult<SubmissionOutcome> {
        let now = ledger_instant(self.clock.now());
        let new = attempt.to_new(target, true, now);

        let record = match self.storage.record_submission(&new).await? {
            InsertOutcome::Recorded(record) => record,
            InsertOutcome::DuplicateSolve => {
                info!(
                    "Concurrent solve of challenge {} by team {} lost the race (user {})",
                    attempt.challenge.id, attempt.team.id, attempt.user_id
                );
                return Err(CoreError::AlreadySolvedByTeam);
            }
        };

        let outcome = self.score_submission(attempt, &record, now).await?;

        info!(
            "Team {} solved {} (challenge {}{}) via user {}: {} points{}",
            attempt.team.id,
            attempt.challenge.name,
            attempt.challenge.id,
            outcome
                .flag_id
                .map(|id| format!(", flag {}", id))
                .unwrap_or_default(),
            attempt.user_id,
            outcome.points,
            if outcome.completed { ", completed" } else { "" }
        );
        if outcome.first_blood {
            info!(
                "First blood on challenge {} for team {}",
                attempt.challenge.id, attempt.team.id
            );
        }

        Ok(outcome)
    }

    /// Points earned by `record`, computed at its solve instant
    ///
    /// Once the event is frozen, other teams' solves after the freeze stay
    /// hidden; only the submitting team's own rows are added to the frozen
    /// ledger.
    async fn score_submission(
        &self,
        attempt: &Attempt<'_>,
        record: &SubmissionRecord,
        at: DateTime<Utc>,
    ) -> CoreResult<SubmissionOutcome> {
        let challenge = attempt.challenge;
        let team = attempt.team;
        let teams = self.event_teams(challenge.event_id).await?;
        let roster = roster_map(&teams);

        let mut ledger = self.storage.challenge_ledger(challenge.id).await?;
        if let Some(freeze_at) = freeze::freeze_time(attempt.event).filter(|f| at > *f) {
            ledger.retain(|row| {
                row.solved_at().map_or(true, |solved_at| solved_at <= freeze_at)
                    || roster.get(&row.user_id()) == Some(&team.id)
            });
        }

        let standings = scoring::compute(&ScoringInput {
            challenges: std::slice::from_ref(challenge),
            roster: &roster,
            ledger: &ledger,
            cutoff: at,
        });

        let team_score = standings.team(team.id);
        let award = team_score.and_then(|score| {
            score
                .awards
                .iter()
                .find(|a| a.challenge_id == challenge.id && a.row_id == record.id())
        });
        let challenge_score = team_score.and_then(|score| score.challenges.get(&challenge.id));

        Ok(SubmissionOutcome {
            correct: true,
            submission_id: record.id(),
            challenge_id: challenge.id,
            flag_id: record.flag_id(),
            points: award.map(|a| a.total()).unwrap_or(0),
            first_blood: award.is_some_and(|a| a.first_blood),
            completed: challenge_score.is_some_and(|c| c.completed),
            progress: challenge.flag_type.is_multi().then(|| Progress {
                solved_flags: challenge_score.map(|c| c.solved_flags).unwrap_or(0),
                total_flags: challenge.flags.len(),
            }),
            solved_at: at,
        })
    }

    async fn event_teams(&self, event_id: EventId) -> CoreResult<Vec<Team>> {
        Ok(self.storage.list_teams(event_id).await?)
    }
}

struct Attempt<'a> {
    event: &'a Event,
    challenge: &'a Challenge,
    team: &'a Team,
    user_id: UserId,
    raw: &'a str,
    ip: Option<&'a str>,
}

impl<'a> Attempt<'a> {
    fn to_new(&self, target: SubmissionTarget, solved: bool, at: DateTime<Utc>) -> NewSubmission<'a> {
        NewSubmission {
            target,
            user_id: self.user_id,
            team_id: self.team.id,
            submission: self.raw,
            solved,
            at,
            ip: self.ip,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::LedgerKind;
    use crate::seed::{Catalog, SeededEvent};
    use crate::storage::SqliteStorage;
    use chrono::{Duration, TimeZone};

    const CATALOG: &str = r#"
        [event]
        name = "Adjudication"
        starts_at = "2026-07-01T10:00:00Z"
        ends_at = "2026-07-01T20:00:00Z"

        [[challenges]]
        name = "warmup"
        flag_type = "single"
        flag = "CTF{Warmup}"
        bytes = 100
        first_blood_bytes = 50

        [[challenges]]
        name = "trio"
        flag_type = "multiple_individual"
        bytes = 999

        [[challenges.flags]]
        name = "one"
        flag = "CTF{one}"
        bytes = 10
        first_blood_bytes = 5

        [[challenges.flags]]
        name = "two"
        flag = "CTF{two}"
        bytes = 20

        [[challenges.flags]]
        name = "dup"
        flag = "CTF{two}"
        bytes = 30

        [[challenges]]
        name = "chain"
        flag_type = "multiple_all"
        bytes = 300
        first_blood_bytes = 150

        [[challenges.flags]]
        name = "a"
        flag = "CTF{a}"

        [[challenges.flags]]
        name = "b"
        flag = "CTF{b}"

        [[teams]]
        name = "alpha"
        leader = "u1"
        members = ["u2"]

        [[teams]]
        name = "beta"
        leader = "u3"
    "#;

    struct Fixture {
        storage: Arc<SqliteStorage>,
        clock: Arc<ManualClock>,
        adjudicator: Adjudicator,
        seeded: SeededEvent,
    }

    async fn fixture() -> Fixture {
        let storage = Arc::new(SqliteStorage::in_memory().unwrap());
        let seeded = Catalog::parse(CATALOG)
            .unwrap()
            .import(storage.as_ref())
            .await
            .unwrap();
        storage.create_user("loner").await.unwrap();

        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 7, 1, 11, 0, 0).unwrap(),
        ));
        let adjudicator = Adjudicator::new(storage.clone(), clock.clone(), 64);
        Fixture {
            storage,
            clock,
            adjudicator,
            seeded,
        }
    }

    impl Fixture {
        fn user(&self, name: &str) -> UserId {
            self.seeded.user(name).unwrap()
        }

        fn challenge(&self, name: &str) -> ChallengeId {
            self.seeded.challenge(name).unwrap()
        }

        async fn submit(&self, challenge: &str, user: &str, raw: &str) -> CoreResult<SubmissionOutcome> {
            self.adjudicator
                .submit(self.challenge(challenge), Some(self.user(user)), raw, Some("198.51.100.7"))
                .await
        }

        async fn ledger_len(&self) -> usize {
            self.storage
                .event_ledger(self.seeded.event_id)
                .await
                .unwrap()
                .len()
        }
    }

    #[tokio::test]
    async fn test_validation_writes_nothing() {
        let f = fixture().await;

        let err = f.submit("warmup", "u1", "").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let long = "A".repeat(65);
        let err = f.submit("warmup", "u1", &long).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));

        let err = f
            .adjudicator
            .submit(f.challenge("warmup"), None, "CTF{Warmup}", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotAuthenticated));

        let err = f
            .adjudicator
            .submit(424242, Some(f.user("u1")), "CTF{Warmup}", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ChallengeNotFound(424242)));

        let loner = f.storage.find_user("loner").await.unwrap().unwrap();
        let err = f
            .adjudicator
            .submit(f.challenge("warmup"), Some(loner), "CTF{Warmup}", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoTeamForUser));

        assert_eq!(f.ledger_len().await, 0);
    }

    #[tokio::test]
    async fn test_event_window_is_enforced() {
        let f = fixture().await;

        f.clock.set(Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap());
        let err = f.submit("warmup", "u1", "CTF{Warmup}").await.unwrap_err();
        assert!(matches!(err, CoreError::EventNotStarted));

        f.clock.set(Utc.with_ymd_and_hms(2026, 7, 1, 21, 0, 0).unwrap());
        let err = f.submit("warmup", "u1", "CTF{Warmup}").await.unwrap_err();
        assert!(matches!(err, CoreError::EventEnded));

        assert_eq!(f.ledger_len().await, 0);
    }

    #[tokio::test]
    async fn test_single_flag_is_exact_and_team_scoped() {
        let f = fixture().await;

        for guess in ["ctf{warmup}", "CTF{Warmup} ", " CTF{Warmup}"] {
            let err = f.submit("warmup", "u2", guess).await.unwrap_err();
            assert!(matches!(err, CoreError::IncorrectFlag));
        }
        assert_eq!(f.ledger_len().await, 3);

        f.clock.advance(Duration::seconds(10));
        let outcome = f.submit("warmup", "u2", "CTF{Warmup}").await.unwrap();
        assert_eq!(outcome.points, 150);
        assert!(outcome.first_blood);
        assert!(outcome.completed);
        assert!(outcome.progress.is_none());

        // Teammate: rejected before matching, even with a wrong flag
        let err = f.submit("warmup", "u1", "CTF{Warmup}").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadySolvedByTeam));
        let err = f.submit("warmup", "u1", "wrong").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadySolvedByTeam));
        assert_eq!(f.ledger_len().await, 4);

        f.clock.advance(Duration::seconds(10));
        let outcome = f.submit("warmup", "u3", "CTF{Warmup}").await.unwrap();
        assert_eq!(outcome.points, 100);
        assert!(!outcome.first_blood);

        let log = f
            .storage
            .list_submissions(f.seeded.event_id, LedgerKind::Challenge, 100)
            .await
            .unwrap();
        let u2_solve = log
            .iter()
            .find(|r| r.user_id() == f.user("u2") && r.solved())
            .unwrap();
        match u2_solve {
            SubmissionRecord::Challenge(row) => {
                assert_eq!(row.attempts, 4);
                assert_eq!(row.ip.as_deref(), Some("198.51.100.7"));
            }
            other => panic!("unexpected record {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unmatched_multi_guess_is_booked_on_first_flag() {
        let f = fixture().await;
        let trio = f.storage.get_challenge(f.challenge("trio")).await.unwrap().unwrap();

        let err = f.submit("trio", "u1", "CTF{nope}").await.unwrap_err();
        assert!(matches!(err, CoreError::IncorrectFlag));

        let log = f
            .storage
            .list_submissions(f.seeded.event_id, LedgerKind::Flag, 10)
            .await
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].flag_id(), Some(trio.flags[0].id));
        assert!(!log[0].solved());

        let trio = f.storage.get_challenge(trio.id).await.unwrap().unwrap();
        assert_eq!(trio.flags[0].attempts, 1);
    }

    #[tokio::test]
    async fn test_multiple_individual_scores_each_flag() {
        let f = fixture().await;
        let trio = f.storage.get_challenge(f.challenge("trio")).await.unwrap().unwrap();

        let first = f.submit("trio", "u1", "CTF{one}").await.unwrap();
        assert_eq!(first.flag_id, Some(trio.flags[0].id));
        assert_eq!(first.points, 15);
        assert!(first.first_blood);
        assert_eq!(
            first.progress,
            Some(Progress {
                solved_flags: 1,
                total_flags: 3
            })
        );

        // Shared secret resolves to the earlier flag only
        let second = f.submit("trio", "u2", "CTF{two}").await.unwrap();
        assert_eq!(second.flag_id, Some(trio.flags[1].id));
        assert_eq!(second.points, 20);

        let err = f.submit("trio", "u1", "CTF{two}").await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadySolvedByTeam));

        let beta = f.submit("trio", "u3", "CTF{one}").await.unwrap();
        assert_eq!(beta.points, 10);
        assert!(!beta.first_blood);
    }

    #[tokio::test]
    async fn test_multiple_all_pays_on_completion() {
        let f = fixture().await;

        let partial = f.submit("chain", "u1", "CTF{a}").await.unwrap();
        assert_eq!(partial.points, 0);
        assert!(!partial.completed);

        f.clock.advance(Duration::seconds(5));
        let done = f.submit("chain", "u2", "CTF{b}").await.unwrap();
        assert_eq!(done.points, 450);
        assert!(done.first_blood);
        assert!(done.completed);
        assert_eq!(
            done.progress,
            Some(Progress {
                solved_flags: 2,
                total_flags: 2
            })
        );
    }
}
