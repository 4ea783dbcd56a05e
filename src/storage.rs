//! Storage for the catalog and the submission ledger
//!
//! [`Storage`] is the seam between the core and its database. Two backends
//! implement it against the same schema: [`SqliteStorage`] here, used for
//! single-node deployments and tests, and [`crate::pg_storage::PgStorage`].
//!
//! Both enforce "at most one accepted solve per (team, challenge)" and
//! "per (team, flag)" with partial unique indexes. An insert that collides
//! with one of them is reported as [`InsertOutcome::DuplicateSolve`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::models::{
    Challenge, ChallengeId, ChallengeSubmission, Event, EventId, Flag, FlagSubmission, FlagType,
    InsertOutcome, LedgerKind, NewChallenge, NewEvent, NewSubmission, NewTeam, SubmissionRecord,
    SubmissionTarget, Team, TeamId, TeamMember, UserId,
};

const SQLITE_MIGRATIONS: &[(i64, &str, &str)] = &[(
    1,
    "001_schema",
    include_str!("../migrations/sqlite/001_schema.sql"),
)];

#[async_trait]
pub trait Storage: Send + Sync {
    // ------------------------------------------------------------------------
    // Catalog reads
    // ------------------------------------------------------------------------

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>>;

    /// Challenge with its flags, ordered by `order_index`
    async fn get_challenge(&self, challenge_id: ChallengeId) -> Result<Option<Challenge>>;

    /// All challenges of an event, ordered by id
    async fn list_challenges(&self, event_id: EventId) -> Result<Vec<Challenge>>;

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>>;

    async fn find_team_for_user(&self, event_id: EventId, user_id: UserId)
        -> Result<Option<Team>>;

    /// All teams of an event with rosters, ordered by id
    async fn list_teams(&self, event_id: EventId) -> Result<Vec<Team>>;

    // ------------------------------------------------------------------------
    // Ledger
    // ------------------------------------------------------------------------

    /// Whether any of `member_ids` holds an accepted solve for `target`
    async fn has_solved(&self, member_ids: &[UserId], target: SubmissionTarget) -> Result<bool>;

    /// Append one attempt and bump the aggregate attempts counter of its target
    async fn record_submission(&self, submission: &NewSubmission<'_>) -> Result<InsertOutcome>;

    /// Every ledger row of one challenge, in insertion order per table
    async fn challenge_ledger(&self, challenge_id: ChallengeId) -> Result<Vec<SubmissionRecord>>;

    /// Every ledger row of an event, in insertion order per table
    async fn event_ledger(&self, event_id: EventId) -> Result<Vec<SubmissionRecord>>;

    /// Most recent rows of one ledger table
    async fn list_submissions(
        &self,
        event_id: EventId,
        kind: LedgerKind,
        limit: i64,
    ) -> Result<Vec<SubmissionRecord>>;

    // ------------------------------------------------------------------------
    // Catalog writes (admin layer)
    // ------------------------------------------------------------------------

    async fn create_user(&self, username: &str) -> Result<UserId>;

    async fn find_user(&self, username: &str) -> Result<Option<UserId>>;

    async fn create_event(&self, event: &NewEvent) -> Result<EventId>;

    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<ChallengeId>;

    async fn create_team(&self, team: &NewTeam) -> Result<TeamId>;
}

// ============================================================================
// SQLITE STORAGE
// ============================================================================

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open {}", path.as_ref().display()))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::from_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.run_migrations()?;
        Ok(storage)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();

        let has_table: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = 'schema_migrations'",
            [],
            |row| row.get(0),
        )?;

        for (version, name, sql) in SQLITE_MIGRATIONS {
            let applied = has_table
                && conn
                    .query_row(
                        "SELECT 1 FROM schema_migrations WHERE version = ?1",
                        [version],
                        |_| Ok(()),
                    )
                    .optional()?
                    .is_some();

            if !applied {
                conn.execute_batch(sql)
                    .with_context(|| format!("Failed to apply migration {}", name))?;
                info!("Applied migration {}", name);
            }
        }

        Ok(())
    }

    fn load_flags(
        conn: &Connection,
        challenge_ids: &[ChallengeId],
    ) -> Result<BTreeMap<ChallengeId, Vec<Flag>>> {
        let mut by_challenge: BTreeMap<ChallengeId, Vec<Flag>> = BTreeMap::new();
        let mut stmt = conn.prepare(
            "SELECT id, challenge_id, name, description, flag, bytes, first_blood_bytes, order_index, attempts
             FROM flags WHERE challenge_id = ?1 ORDER BY order_index, id",
        )?;

        for challenge_id in challenge_ids {
            let flags = stmt
                .query_map([challenge_id], flag_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            by_challenge.insert(*challenge_id, flags);
        }

        Ok(by_challenge)
    }

    fn load_challenges(conn: &Connection, filter: ChallengeFilter) -> Result<Vec<Challenge>> {
        let (clause, id) = match filter {
            ChallengeFilter::Id(id) => ("id = ?1", id),
            ChallengeFilter::Event(event_id) => ("event_id = ?1", event_id),
        };
        let sql = format!(
            "SELECT id, event_id, name, category, description, flag_type, flag, bytes, first_blood_bytes, attempts
             FROM challenges WHERE {} ORDER BY id",
            clause
        );

        let mut challenges = conn
            .prepare(&sql)?
            .query_map([id], challenge_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let ids: Vec<ChallengeId> = challenges.iter().map(|c| c.id).collect();
        let mut flags = Self::load_flags(conn, &ids)?;
        for challenge in &mut challenges {
            challenge.flags = flags.remove(&challenge.id).unwrap_or_default();
        }

        Ok(challenges)
    }

    fn load_teams(conn: &Connection, filter: TeamFilter) -> Result<Vec<Team>> {
        let (team_sql, member_sql, id) = match filter {
            TeamFilter::Id(id) => (
                "SELECT id, event_id, name, leader_id, is_locked FROM teams WHERE id = ?1",
                "SELECT tm.team_id, u.id, u.username FROM team_members tm
                 JOIN users u ON u.id = tm.user_id
                 WHERE tm.team_id = ?1 ORDER BY u.id",
                id,
            ),
            TeamFilter::Event(event_id) => (
                "SELECT id, event_id, name, leader_id, is_locked FROM teams WHERE event_id = ?1 ORDER BY id",
                "SELECT tm.team_id, u.id, u.username FROM team_members tm
                 JOIN users u ON u.id = tm.user_id
                 WHERE tm.event_id = ?1 ORDER BY tm.team_id, u.id",
                event_id,
            ),
        };

        let mut teams = conn
            .prepare(team_sql)?
            .query_map([id], |row| {
                Ok(Team {
                    id: row.get(0)?,
                    event_id: row.get(1)?,
                    name: row.get(2)?,
                    leader_id: row.get(3)?,
                    is_locked: row.get(4)?,
                    members: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut members: BTreeMap<TeamId, Vec<TeamMember>> = BTreeMap::new();
        let mut stmt = conn.prepare(member_sql)?;
        let rows = stmt.query_map([id], |row| {
            Ok((
                row.get::<_, TeamId>(0)?,
                TeamMember {
                    user_id: row.get(1)?,
                    username: row.get(2)?,
                },
            ))
        })?;
        for row in rows {
            let (team_id, member) = row?;
            members.entry(team_id).or_default().push(member);
        }

        for team in &mut teams {
            team.members = members.remove(&team.id).unwrap_or_default();
        }

        Ok(teams)
    }

    fn load_ledger(conn: &Connection, filter: LedgerFilter) -> Result<Vec<SubmissionRecord>> {
        let (single_where, multi_where, id) = match filter {
            LedgerFilter::Challenge(id) => ("s.challenge_id = ?1", "s.challenge_id = ?1", id),
            LedgerFilter::Event(event_id) => ("c.event_id = ?1", "c.event_id = ?1", event_id),
        };

        let single_sql = format!(
            "SELECT s.id, s.challenge_id, s.user_id, s.team_id, s.submission, s.solved, s.attempts, s.solved_at, s.ip, s.created_at
             FROM submissions s JOIN challenges c ON c.id = s.challenge_id
             WHERE {} ORDER BY s.id",
            single_where
        );
        let multi_sql = format!(
            "SELECT s.id, s.flag_id, s.challenge_id, s.user_id, s.team_id, s.submission, s.solved, s.attempts, s.solved_at, s.ip, s.created_at
             FROM flag_submissions s JOIN challenges c ON c.id = s.challenge_id
             WHERE {} ORDER BY s.id",
            multi_where
        );

        let mut records = conn
            .prepare(&single_sql)?
            .query_map([id], |row| {
                challenge_submission_from_row(row).map(SubmissionRecord::Challenge)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let flag_records = conn
            .prepare(&multi_sql)?
            .query_map([id], |row| flag_submission_from_row(row).map(SubmissionRecord::Flag))?
            .collect::<Result<Vec<_>, _>>()?;

        records.extend(flag_records);
        Ok(records)
    }
}

enum ChallengeFilter {
    Id(ChallengeId),
    Event(EventId),
}

enum TeamFilter {
    Id(TeamId),
    Event(EventId),
}

enum LedgerFilter {
    Challenge(ChallengeId),
    Event(EventId),
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        let conn = self.conn.lock();
        let event = conn
            .query_row(
                "SELECT id, name, starts_at, ends_at, team_formation_starts_at, team_formation_ends_at,
                        registration_starts_at, registration_ends_at, requires_team, min_team_size,
                        max_team_size, freeze, freeze_time
                 FROM events WHERE id = ?1",
                [event_id],
                |row| {
                    Ok(Event {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        starts_at: ts(row, 2)?,
                        ends_at: ts(row, 3)?,
                        team_formation_starts_at: opt_ts(row, 4)?,
                        team_formation_ends_at: opt_ts(row, 5)?,
                        registration_starts_at: opt_ts(row, 6)?,
                        registration_ends_at: opt_ts(row, 7)?,
                        requires_team: row.get(8)?,
                        min_team_size: row.get(9)?,
                        max_team_size: row.get(10)?,
                        freeze: row.get(11)?,
                        freeze_time: opt_ts(row, 12)?,
                    })
                },
            )
            .optional()?;
        Ok(event)
    }

    async fn get_challenge(&self, challenge_id: ChallengeId) -> Result<Option<Challenge>> {
        let conn = self.conn.lock();
        let challenge = Self::load_challenges(&conn, ChallengeFilter::Id(challenge_id))?
            .into_iter()
            .next();
        Ok(challenge)
    }

    async fn list_challenges(&self, event_id: EventId) -> Result<Vec<Challenge>> {
        let conn = self.conn.lock();
        Self::load_challenges(&conn, ChallengeFilter::Event(event_id))
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        let conn = self.conn.lock();
        Ok(Self::load_teams(&conn, TeamFilter::Id(team_id))?
            .into_iter()
            .next())
    }

    async fn find_team_for_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Team>> {
        let conn = self.conn.lock();
        let team_id: Option<TeamId> = conn
            .query_row(
                "SELECT team_id FROM team_members WHERE event_id = ?1 AND user_id = ?2",
                params![event_id, user_id],
                |row| row.get(0),
            )
            .optional()?;

        match team_id {
            Some(id) => Ok(Self::load_teams(&conn, TeamFilter::Id(id))?
                .into_iter()
                .next()),
            None => Ok(None),
        }
    }

    async fn list_teams(&self, event_id: EventId) -> Result<Vec<Team>> {
        let conn = self.conn.lock();
        Self::load_teams(&conn, TeamFilter::Event(event_id))
    }

    async fn has_solved(&self, member_ids: &[UserId], target: SubmissionTarget) -> Result<bool> {
        if member_ids.is_empty() {
            return Ok(false);
        }

        let conn = self.conn.lock();
        let (sql, target_id) = match target {
            SubmissionTarget::Challenge(id) => (
                "SELECT 1 FROM submissions WHERE challenge_id = ?1 AND user_id = ?2 AND solved = 1 LIMIT 1",
                id,
            ),
            SubmissionTarget::Flag { flag_id, .. } => (
                "SELECT 1 FROM flag_submissions WHERE flag_id = ?1 AND user_id = ?2 AND solved = 1 LIMIT 1",
                flag_id,
            ),
        };

        let mut stmt = conn.prepare(sql)?;
        for user_id in member_ids {
            if stmt
                .query_row(params![target_id, user_id], |_| Ok(()))
                .optional()?
                .is_some()
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn record_submission(&self, new: &NewSubmission<'_>) -> Result<InsertOutcome> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let at = fmt_ts(new.at);
        let solved_at = new.solved.then(|| at.clone());

        let record = match new.target {
            SubmissionTarget::Challenge(challenge_id) => {
                let prior: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM submissions WHERE user_id = ?1 AND challenge_id = ?2",
                    params![new.user_id, challenge_id],
                    |row| row.get(0),
                )?;

                let inserted = tx.execute(
                    "INSERT INTO submissions (challenge_id, user_id, team_id, submission, solved, attempts, solved_at, ip, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                     ON CONFLICT DO NOTHING",
                    params![
                        challenge_id,
                        new.user_id,
                        new.team_id,
                        new.submission,
                        new.solved,
                        prior + 1,
                        solved_at,
                        new.ip,
                        at,
                    ],
                )?;
                if inserted == 0 {
                    debug!(
                        "Solve of challenge {} by team {} collided with an existing solve",
                        challenge_id, new.team_id
                    );
                    return Ok(InsertOutcome::DuplicateSolve);
                }
                let id = tx.last_insert_rowid();

                tx.execute(
                    "UPDATE challenges SET attempts = attempts + 1 WHERE id = ?1",
                    [challenge_id],
                )?;

                SubmissionRecord::Challenge(ChallengeSubmission {
                    id,
                    challenge_id,
                    user_id: new.user_id,
                    team_id: new.team_id,
                    submission: new.submission.to_string(),
                    solved: new.solved,
                    attempts: prior + 1,
                    solved_at: new.solved.then_some(new.at),
                    ip: new.ip.map(str::to_string),
                    created_at: new.at,
                })
            }
            SubmissionTarget::Flag {
                challenge_id,
                flag_id,
            } => {
                let prior: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM flag_submissions WHERE user_id = ?1 AND flag_id = ?2",
                    params![new.user_id, flag_id],
                    |row| row.get(0),
                )?;

                let inserted = tx.execute(
                    "INSERT INTO flag_submissions (flag_id, challenge_id, user_id, team_id, submission, solved, attempts, solved_at, ip, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                     ON CONFLICT DO NOTHING",
                    params![
                        flag_id,
                        challenge_id,
                        new.user_id,
                        new.team_id,
                        new.submission,
                        new.solved,
                        prior + 1,
                        solved_at,
                        new.ip,
                        at,
                    ],
                )?;
                if inserted == 0 {
                    debug!(
                        "Solve of flag {} by team {} collided with an existing solve",
                        flag_id, new.team_id
                    );
                    return Ok(InsertOutcome::DuplicateSolve);
                }
                let id = tx.last_insert_rowid();

                tx.execute(
                    "UPDATE flags SET attempts = attempts + 1 WHERE id = ?1",
                    [flag_id],
                )?;

                SubmissionRecord::Flag(FlagSubmission {
                    id,
                    flag_id,
                    challenge_id,
                    user_id: new.user_id,
                    team_id: new.team_id,
                    submission: new.submission.to_string(),
                    solved: new.solved,
                    attempts: prior + 1,
                    solved_at: new.solved.then_some(new.at),
                    ip: new.ip.map(str::to_string),
                    created_at: new.at,
                })
            }
        };

        tx.commit()?;
        Ok(InsertOutcome::Recorded(record))
    }

    async fn challenge_ledger(&self, challenge_id: ChallengeId) -> Result<Vec<SubmissionRecord>> {
        let conn = self.conn.lock();
        Self::load_ledger(&conn, LedgerFilter::Challenge(challenge_id))
    }

    async fn event_ledger(&self, event_id: EventId) -> Result<Vec<SubmissionRecord>> {
        let conn = self.conn.lock();
        Self::load_ledger(&conn, LedgerFilter::Event(event_id))
    }

    async fn list_submissions(
        &self,
        event_id: EventId,
        kind: LedgerKind,
        limit: i64,
    ) -> Result<Vec<SubmissionRecord>> {
        let conn = self.conn.lock();
        let records = match kind {
            LedgerKind::Challenge => conn
                .prepare(
                    "SELECT s.id, s.challenge_id, s.user_id, s.team_id, s.submission, s.solved, s.attempts, s.solved_at, s.ip, s.created_at
                     FROM submissions s JOIN challenges c ON c.id = s.challenge_id
                     WHERE c.event_id = ?1 ORDER BY s.id DESC LIMIT ?2",
                )?
                .query_map(params![event_id, limit], |row| {
                    challenge_submission_from_row(row).map(SubmissionRecord::Challenge)
                })?
                .collect::<Result<Vec<_>, _>>()?,
            LedgerKind::Flag => conn
                .prepare(
                    "SELECT s.id, s.flag_id, s.challenge_id, s.user_id, s.team_id, s.submission, s.solved, s.attempts, s.solved_at, s.ip, s.created_at
                     FROM flag_submissions s JOIN challenges c ON c.id = s.challenge_id
                     WHERE c.event_id = ?1 ORDER BY s.id DESC LIMIT ?2",
                )?
                .query_map(params![event_id, limit], |row| {
                    flag_submission_from_row(row).map(SubmissionRecord::Flag)
                })?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(records)
    }

    async fn create_user(&self, username: &str) -> Result<UserId> {
        let conn = self.conn.lock();
        conn.execute("INSERT INTO users (username) VALUES (?1)", [username])?;
        Ok(conn.last_insert_rowid())
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserId>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()?)
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventId> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO events (name, starts_at, ends_at, team_formation_starts_at, team_formation_ends_at,
                                 registration_starts_at, registration_ends_at, requires_team, min_team_size,
                                 max_team_size, freeze, freeze_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                event.name,
                fmt_ts(event.starts_at),
                fmt_ts(event.ends_at),
                event.team_formation_starts_at.map(fmt_ts),
                event.team_formation_ends_at.map(fmt_ts),
                event.registration_starts_at.map(fmt_ts),
                event.registration_ends_at.map(fmt_ts),
                event.requires_team,
                event.min_team_size,
                event.max_team_size,
                event.freeze,
                event.freeze_time.map(fmt_ts),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<ChallengeId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO challenges (event_id, name, category, description, flag_type, flag, bytes, first_blood_bytes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                challenge.event_id,
                challenge.name,
                challenge.category,
                challenge.description,
                challenge.flag_type.as_str(),
                challenge.flag,
                challenge.bytes,
                challenge.first_blood_bytes,
            ],
        )?;
        let challenge_id = tx.last_insert_rowid();

        for (index, flag) in challenge.flags.iter().enumerate() {
            tx.execute(
                "INSERT INTO flags (challenge_id, name, description, flag, bytes, first_blood_bytes, order_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    challenge_id,
                    flag.name,
                    flag.description,
                    flag.flag,
                    flag.bytes,
                    flag.first_blood_bytes,
                    index as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(challenge_id)
    }

    async fn create_team(&self, team: &NewTeam) -> Result<TeamId> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO teams (event_id, name, leader_id, is_locked) VALUES (?1, ?2, ?3, ?4)",
            params![team.event_id, team.name, team.leader_id, team.is_locked],
        )?;
        let team_id = tx.last_insert_rowid();

        let mut members = vec![team.leader_id];
        members.extend(team.members.iter().filter(|id| **id != team.leader_id));
        for user_id in members {
            tx.execute(
                "INSERT INTO team_members (team_id, event_id, user_id) VALUES (?1, ?2, ?3)",
                params![team_id, team.event_id, user_id],
            )
            .with_context(|| format!("User {} is already on a team for this event", user_id))?;
        }

        tx.commit()?;
        Ok(team_id)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

pub(crate) fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

fn flag_type(row: &Row<'_>, idx: usize) -> rusqlite::Result<FlagType> {
    let raw: String = row.get(idx)?;
    raw.parse::<FlagType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

fn challenge_from_row(row: &Row<'_>) -> rusqlite::Result<Challenge> {
    Ok(Challenge {
        id: row.get(0)?,
        event_id: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        description: row.get(4)?,
        flag_type: flag_type(row, 5)?,
        flag: row.get(6)?,
        bytes: row.get(7)?,
        first_blood_bytes: row.get(8)?,
        attempts: row.get(9)?,
        flags: Vec::new(),
    })
}

fn flag_from_row(row: &Row<'_>) -> rusqlite::Result<Flag> {
    Ok(Flag {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        flag: row.get(4)?,
        bytes: row.get(5)?,
        first_blood_bytes: row.get(6)?,
        order_index: row.get(7)?,
        attempts: row.get(8)?,
    })
}

fn challenge_submission_from_row(row: &Row<'_>) -> rusqlite::Result<ChallengeSubmission> {
    Ok(ChallengeSubmission {
        id: row.get(0)?,
        challenge_id: row.get(1)?,
        user_id: row.get(2)?,
        team_id: row.get(3)?,
        submission: row.get(4)?,
        solved: row.get(5)?,
        attempts: row.get(6)?,
        solved_at: opt_ts(row, 7)?,
        ip: row.get(8)?,
        created_at: ts(row, 9)?,
    })
}

fn flag_submission_from_row(row: &Row<'_>) -> rusqlite::Result<FlagSubmission> {
    Ok(FlagSubmission {
        id: row.get(0)?,
        flag_id: row.get(1)?,
        challenge_id: row.get(2)?,
        user_id: row.get(3)?,
        team_id: row.get(4)?,
        submission: row.get(5)?,
        solved: row.get(6)?,
        attempts: row.get(7)?,
        solved_at: opt_ts(row, 8)?,
        ip: row.get(9)?,
        created_at: ts(row, 10)?,
    })
}
