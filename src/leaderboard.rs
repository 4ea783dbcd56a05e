//! Leaderboard aggregation and read views
//!
//! Every view here is a pure reader over the ledger: it never writes, and
//! two calls with no submission in between return identical output. Public
//! numbers are computed as of the freeze cutoff.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use crate::clock::Clock;
use crate::error::{CoreError, CoreResult};
use crate::freeze::{self, EventPhase};
use crate::models::{
    Challenge, ChallengeId, Event, EventId, FlagId, FlagType, LedgerKind, SubmissionRecord, Team,
    TeamId, UserId,
};
use crate::scoring::{self, ScoringInput, Standings};
use crate::storage::Storage;
use crate::teams::{roster_map, EventAccess, TeamResolver};

/// Admin listings never return more than this many rows
pub const MAX_SUBMISSION_LOG_LIMIT: i64 = 1000;
pub const DEFAULT_SUBMISSION_LOG_LIMIT: i64 = 100;

// ============================================================================
// VIEWS
// ============================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EventLeaderboard {
    pub event_id: EventId,
    pub event_name: String,
    pub phase: EventPhase,
    pub frozen: bool,
    pub freeze_time: Option<DateTime<Utc>>,
    pub teams: Vec<TeamRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeamRow {
    pub rank: usize,
    pub team_id: TeamId,
    pub team_name: String,
    pub points: i64,
    pub first_blood_count: usize,
    pub solved_count: usize,
    pub last_solve_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TeamLeaderboard {
    pub event_id: EventId,
    pub team_id: TeamId,
    pub team_name: String,
    pub phase: EventPhase,
    pub frozen: bool,
    pub freeze_time: Option<DateTime<Utc>>,
    pub points: i64,
    pub members: Vec<MemberRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MemberRow {
    pub rank: usize,
    pub user_id: UserId,
    pub username: String,
    pub points: i64,
    pub first_blood_points: i64,
    pub solve_history: Vec<SolveEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SolveEntry {
    pub challenge_id: ChallengeId,
    pub challenge_name: String,
    pub flag_id: Option<FlagId>,
    pub flag_name: Option<String>,
    pub points: i64,
    pub first_blood: bool,
    pub solved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChallengeListing {
    pub event_id: EventId,
    pub team_id: TeamId,
    pub frozen: bool,
    pub freeze_time: Option<DateTime<Utc>>,
    pub challenges: Vec<ChallengeView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChallengeView {
    pub id: ChallengeId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub flag_type: FlagType,
    pub bytes: i64,
    pub first_blood_bytes: i64,
    /// Teams that completed the challenge, as of the freeze cutoff
    pub solve_count: usize,
    pub solved_by_team: bool,
    /// Team's completion percentage
    pub progress: u8,
    pub flags: Vec<FlagView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FlagView {
    pub id: FlagId,
    pub name: String,
    pub description: String,
    pub bytes: i64,
    pub first_blood_bytes: i64,
    pub solve_count: usize,
    pub solved_by_team: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChallengeLeaderboard {
    pub challenge_id: ChallengeId,
    pub challenge_name: String,
    pub flag_type: FlagType,
    pub frozen: bool,
    pub freeze_time: Option<DateTime<Utc>>,
    pub solvers: Vec<ChallengeSolverRow>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChallengeSolverRow {
    pub rank: usize,
    pub team_id: TeamId,
    pub team_name: String,
    pub solved_at: DateTime<Utc>,
    pub first_blood: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubmissionLog {
    pub event_id: EventId,
    pub kind: LedgerKind,
    pub submissions: Vec<SubmissionRecord>,
}

// ============================================================================
// SERVICE
// ============================================================================

/// Catalog, rosters and ledger of one event, read together
struct Snapshot {
    event: Event,
    challenges: Vec<Challenge>,
    teams: Vec<Team>,
    ledger: Vec<SubmissionRecord>,
}

impl Snapshot {
    fn standings(&self, cutoff: DateTime<Utc>) -> Standings {
        let roster = roster_map(&self.teams);
        scoring::compute(&ScoringInput {
            challenges: &self.challenges,
            roster: &roster,
            ledger: &self.ledger,
            cutoff,
        })
    }
}

#[derive(Clone)]
pub struct LeaderboardService {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    resolver: TeamResolver,
}

impl LeaderboardService {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self {
            resolver: TeamResolver::new(storage.clone(), clock.clone()),
            storage,
            clock,
        }
    }

    async fn snapshot(&self, event: Event) -> CoreResult<Snapshot> {
        let challenges = self.storage.list_challenges(event.id).await?;
        let teams = self.storage.list_teams(event.id).await?;
        let ledger = self.storage.event_ledger(event.id).await?;
        Ok(Snapshot {
            event,
            challenges,
            teams,
            ledger,
        })
    }

    /// Event-wide team ranking
    pub async fn event_leaderboard(&self, event_id: EventId) -> CoreResult<EventLeaderboard> {
        let event = self.resolver.load_event(event_id).await?;
        let now = self.clock.now();
        let snapshot = self.snapshot(event).await?;
        let standings = snapshot.standings(freeze::score_cutoff(&snapshot.event, now));

        let mut rows: Vec<TeamRow> = snapshot
            .teams
            .iter()
            .map(|team| {
                let score = standings.team(team.id).cloned().unwrap_or_default();
                TeamRow {
                    rank: 0,
                    team_id: team.id,
                    team_name: team.name.clone(),
                    points: score.points,
                    first_blood_count: score.first_blood_count,
                    solved_count: score.solved_count,
                    last_solve_at: score.last_solve_at,
                }
            })
            .collect();

        rows.sort_by_key(|r| {
            (
                Reverse(r.points),
                Reverse(r.first_blood_count),
                r.last_solve_at.is_none(),
                r.last_solve_at,
                r.team_id,
            )
        });
        for (i, row) in rows.iter_mut().enumerate() {
            row.rank = i + 1;
        }

        let event = &snapshot.event;
        Ok(EventLeaderboard {
            event_id: event.id,
            event_name: event.name.clone(),
            phase: freeze::event_phase(event, now),
            frozen: freeze::is_frozen(event, now),
            freeze_time: freeze::freeze_time(event),
            teams: rows,
        })
    }

    /// Member ranking inside the caller's team
    pub async fn team_leaderboard(
        &self,
        event_id: EventId,
        user_id: Option<UserId>,
    ) -> CoreResult<TeamLeaderboard> {
        let (event, team) = self
            .resolver
            .resolve_team(event_id, user_id, EventAccess::Bypass)
            .await?;
        let now = self.clock.now();
        let snapshot = self.snapshot(event).await?;
        let standings = snapshot.standings(freeze::score_cutoff(&snapshot.event, now));
        let score = standings.team(team.id).cloned().unwrap_or_default();

        let challenges: HashMap<ChallengeId, &Challenge> =
            snapshot.challenges.iter().map(|c| (c.id, c)).collect();

        let mut members: Vec<MemberRow> = team
            .members
            .iter()
            .map(|member| {
                let awards = score.awards.iter().filter(|a| a.user_id == member.user_id);
                let solve_history: Vec<SolveEntry> = awards
                    .map(|award| {
                        let challenge = challenges.get(&award.challenge_id);
                        let flag_name = award.flag_id.and_then(|flag_id| {
                            challenge.and_then(|c| {
                                c.flags.iter().find(|f| f.id == flag_id).map(|f| f.name.clone())
                            })
                        });
                        SolveEntry {
                            challenge_id: award.challenge_id,
                            challenge_name: challenge.map(|c| c.name.clone()).unwrap_or_default(),
                            flag_id: award.flag_id,
                            flag_name,
                            points: award.total(),
                            first_blood: award.first_blood,
                            solved_at: award.at,
                        }
                    })
                    .collect();

                MemberRow {
                    rank: 0,
                    user_id: member.user_id,
                    username: member.username.clone(),
                    points: solve_history.iter().map(|s| s.points).sum(),
                    first_blood_points: score
                        .awards
                        .iter()
                        .filter(|a| a.user_id == member.user_id)
                        .map(|a| a.first_blood_points)
                        .sum(),
                    solve_history,
                }
            })
            .collect();

        members.sort_by_key(|m| {
            let earliest = m.solve_history.iter().map(|s| s.solved_at).min();
            (Reverse(m.points), earliest.is_none(), earliest, m.user_id)
        });
        for (i, member) in members.iter_mut().enumerate() {
            member.rank = i + 1;
        }

        let event = &snapshot.event;
        Ok(TeamLeaderboard {
            event_id: event.id,
            team_id: team.id,
            team_name: team.name.clone(),
            phase: freeze::event_phase(event, now),
            frozen: freeze::is_frozen(event, now),
            freeze_time: freeze::freeze_time(event),
            points: score.points,
            members,
        })
    }

    /// Challenges of an event with the caller's team status
    ///
    /// Solve counts respect the freeze; the team's own status does not.
    pub async fn challenge_list(
        &self,
        event_id: EventId,
        user_id: Option<UserId>,
    ) -> CoreResult<ChallengeListing> {
        let (event, team) = self
            .resolver
            .resolve_team(event_id, user_id, EventAccess::Active)
            .await?;
        let now = self.clock.now();
        let snapshot = self.snapshot(event).await?;
        let public = snapshot.standings(freeze::score_cutoff(&snapshot.event, now));
        let live = snapshot.standings(now);
        let own = live.team(team.id);

        let challenges = snapshot
            .challenges
            .iter()
            .map(|challenge| {
                let standing = public.challenges.get(&challenge.id);
                let own_score = own.and_then(|s| s.challenges.get(&challenge.id));

                ChallengeView {
                    id: challenge.id,
                    name: challenge.name.clone(),
                    category: challenge.category.clone(),
                    description: challenge.description.clone(),
                    flag_type: challenge.flag_type,
                    bytes: challenge.bytes,
                    first_blood_bytes: challenge.first_blood_bytes,
                    solve_count: standing.map(|s| s.solvers.len()).unwrap_or(0),
                    solved_by_team: own_score.is_some_and(|s| s.completed),
                    progress: own_score.map(|s| s.progress()).unwrap_or(0),
                    flags: challenge
                        .flags
                        .iter()
                        .map(|flag| FlagView {
                            id: flag.id,
                            name: flag.name.clone(),
                            description: flag.description.clone(),
                            bytes: flag.bytes,
                            first_blood_bytes: flag.first_blood_bytes,
                            solve_count: standing
                                .and_then(|s| s.flag_solve_counts.get(&flag.id).copied())
                                .unwrap_or(0),
                            solved_by_team: own_score
                                .is_some_and(|s| s.flags.contains_key(&flag.id)),
                        })
                        .collect(),
                }
            })
            .collect();

        let event = &snapshot.event;
        Ok(ChallengeListing {
            event_id: event.id,
            team_id: team.id,
            frozen: freeze::is_frozen(event, now),
            freeze_time: freeze::freeze_time(event),
            challenges,
        })
    }

    /// Teams that completed one challenge, in completion order
    pub async fn challenge_leaderboard(
        &self,
        challenge_id: ChallengeId,
    ) -> CoreResult<ChallengeLeaderboard> {
        let challenge = self
            .storage
            .get_challenge(challenge_id)
            .await?
            .ok_or(CoreError::ChallengeNotFound(challenge_id))?;
        let event = self.resolver.load_event(challenge.event_id).await?;
        let now = self.clock.now();

        let teams = self.storage.list_teams(event.id).await?;
        let ledger = self.storage.challenge_ledger(challenge.id).await?;
        let roster = roster_map(&teams);
        let standings = scoring::compute(&ScoringInput {
            challenges: std::slice::from_ref(&challenge),
            roster: &roster,
            ledger: &ledger,
            cutoff: freeze::score_cutoff(&event, now),
        });

        let names: HashMap<TeamId, &str> = teams.iter().map(|t| (t.id, t.name.as_str())).collect();
        let solvers = standings
            .challenges
            .get(&challenge.id)
            .map(|s| s.solvers.as_slice())
            .unwrap_or_default()
            .iter()
            .enumerate()
            .map(|(i, solver)| ChallengeSolverRow {
                rank: i + 1,
                team_id: solver.team_id,
                team_name: names.get(&solver.team_id).copied().unwrap_or_default().to_string(),
                solved_at: solver.solved_at,
                first_blood: solver.first_blood,
            })
            .collect();

        Ok(ChallengeLeaderboard {
            challenge_id: challenge.id,
            challenge_name: challenge.name.clone(),
            flag_type: challenge.flag_type,
            frozen: freeze::is_frozen(&event, now),
            freeze_time: freeze::freeze_time(&event),
            solvers,
        })
    }

    /// Raw ledger rows of one kind, newest first
    pub async fn submission_log(
        &self,
        event_id: EventId,
        kind: LedgerKind,
        limit: Option<i64>,
    ) -> CoreResult<SubmissionLog> {
        let event = self.resolver.load_event(event_id).await?;
        let limit = limit
            .unwrap_or(DEFAULT_SUBMISSION_LOG_LIMIT)
            .clamp(1, MAX_SUBMISSION_LOG_LIMIT);

        let submissions = self.storage.list_submissions(event.id, kind, limit).await?;
        Ok(SubmissionLog {
            event_id: event.id,
            kind,
            submissions,
        })
    }
}
