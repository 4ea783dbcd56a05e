//! PostgreSQL storage for the catalog and the submission ledger
//!
//! Selected by the server when `DATABASE_URL` is set. Same schema and
//! semantics as [`crate::storage::SqliteStorage`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use deadpool_postgres::{Config, Pool, Runtime};
use std::collections::BTreeMap;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info};

use crate::models::{
    Challenge, ChallengeId, ChallengeSubmission, Event, EventId, Flag, FlagSubmission,
    InsertOutcome, LedgerKind, NewChallenge, NewEvent, NewSubmission, NewTeam, SubmissionRecord,
    SubmissionTarget, Team, TeamId, TeamMember, UserId,
};
use crate::storage::Storage;

/// Database pool configuration
const DB_POOL_MAX_SIZE: usize = 20;
const DB_QUERY_TIMEOUT_SECS: u64 = 30;

const PG_MIGRATIONS: &[(i32, &str, &str)] = &[(
    1,
    "001_schema",
    include_str!("../migrations/postgres/001_schema.sql"),
)];

const CHALLENGE_COLUMNS: &str =
    "id, event_id, name, category, description, flag_type, flag, bytes, first_blood_bytes, attempts";

const SUBMISSION_COLUMNS: &str =
    "s.id, s.challenge_id, s.user_id, s.team_id, s.submission, s.solved, s.attempts, s.solved_at, s.ip, s.created_at";

const FLAG_SUBMISSION_COLUMNS: &str =
    "s.id, s.flag_id, s.challenge_id, s.user_id, s.team_id, s.submission, s.solved, s.attempts, s.solved_at, s.ip, s.created_at";

#[derive(Clone)]
pub struct PgStorage {
    pool: Pool,
}

impl PgStorage {
    /// Create storage from a connection URL
    pub async fn new(database_url: &str) -> Result<Self> {
        use deadpool_postgres::{ManagerConfig, PoolConfig, RecyclingMethod};
        use std::time::Duration;

        let mut config = Config::new();
        config.url = Some(database_url.to_string());

        config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        config.pool = Some(PoolConfig {
            max_size: DB_POOL_MAX_SIZE,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(Duration::from_secs(DB_QUERY_TIMEOUT_SECS)),
                create: Some(Duration::from_secs(10)),
                recycle: Some(Duration::from_secs(30)),
            },
            ..Default::default()
        });

        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        let client = pool.get().await.context("Failed to connect to PostgreSQL")?;
        client
            .execute(
                &format!("SET statement_timeout = '{}s'", DB_QUERY_TIMEOUT_SECS),
                &[],
            )
            .await?;

        info!(
            "Connected to PostgreSQL (pool_size: {}, query_timeout: {}s)",
            DB_POOL_MAX_SIZE, DB_QUERY_TIMEOUT_SECS
        );

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    async fn run_migrations(&self) -> Result<()> {
        let client = self.pool.get().await?;

        let has_table: bool = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM information_schema.tables WHERE table_name = 'schema_migrations')",
                &[],
            )
            .await?
            .get(0);

        for (version, name, sql) in PG_MIGRATIONS {
            let applied = has_table
                && client
                    .query_one(
                        "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = $1)",
                        &[version],
                    )
                    .await?
                    .get::<_, bool>(0);

            if !applied {
                client
                    .batch_execute(sql)
                    .await
                    .with_context(|| format!("Failed to apply migration {}", name))?;
                info!("Applied migration {}", name);
            }
        }

        Ok(())
    }

    async fn load_challenges(&self, clause: &str, id: i64) -> Result<Vec<Challenge>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM challenges WHERE {} ORDER BY id",
                    CHALLENGE_COLUMNS, clause
                ),
                &[&id],
            )
            .await?;
        let mut challenges = rows.iter().map(challenge_from_row).collect::<Vec<_>>();
        if challenges.is_empty() {
            return Ok(challenges);
        }

        let ids: Vec<ChallengeId> = challenges.iter().map(|c| c.id).collect();
        let flag_rows = client
            .query(
                "SELECT id, challenge_id, name, description, flag, bytes, first_blood_bytes, order_index, attempts
                 FROM flags WHERE challenge_id = ANY($1) ORDER BY challenge_id, order_index, id",
                &[&ids],
            )
            .await?;

        let mut flags: BTreeMap<ChallengeId, Vec<Flag>> = BTreeMap::new();
        for row in &flag_rows {
            let flag = flag_from_row(row);
            flags.entry(flag.challenge_id).or_default().push(flag);
        }
        for challenge in &mut challenges {
            challenge.flags = flags.remove(&challenge.id).unwrap_or_default();
        }

        Ok(challenges)
    }

    async fn load_teams(&self, clause: &str, id: i64) -> Result<Vec<Team>> {
        let client = self.pool.get().await?;

        let rows = client
            .query(
                &format!(
                    "SELECT id, event_id, name, leader_id, is_locked FROM teams WHERE {} ORDER BY id",
                    clause
                ),
                &[&id],
            )
            .await?;
        let mut teams: Vec<Team> = rows
            .iter()
            .map(|row| Team {
                id: row.get(0),
                event_id: row.get(1),
                name: row.get(2),
                leader_id: row.get(3),
                is_locked: row.get(4),
                members: Vec::new(),
            })
            .collect();
        if teams.is_empty() {
            return Ok(teams);
        }

        let ids: Vec<TeamId> = teams.iter().map(|t| t.id).collect();
        let member_rows = client
            .query(
                "SELECT tm.team_id, u.id, u.username FROM team_members tm
                 JOIN users u ON u.id = tm.user_id
                 WHERE tm.team_id = ANY($1) ORDER BY tm.team_id, u.id",
                &[&ids],
            )
            .await?;

        let mut members: BTreeMap<TeamId, Vec<TeamMember>> = BTreeMap::new();
        for row in &member_rows {
            members
                .entry(row.get::<_, TeamId>(0))
                .or_default()
                .push(TeamMember {
                    user_id: row.get(1),
                    username: row.get(2),
                });
        }
        for team in &mut teams {
            team.members = members.remove(&team.id).unwrap_or_default();
        }

        Ok(teams)
    }

    async fn load_ledger(&self, clause: &str, id: i64) -> Result<Vec<SubmissionRecord>> {
        let client = self.pool.get().await?;

        let single = client
            .query(
                &format!(
                    "SELECT {} FROM submissions s JOIN challenges c ON c.id = s.challenge_id
                     WHERE {} ORDER BY s.id",
                    SUBMISSION_COLUMNS, clause
                ),
                &[&id],
            )
            .await?;
        let multi = client
            .query(
                &format!(
                    "SELECT {} FROM flag_submissions s JOIN challenges c ON c.id = s.challenge_id
                     WHERE {} ORDER BY s.id",
                    FLAG_SUBMISSION_COLUMNS, clause
                ),
                &[&id],
            )
            .await?;

        Ok(single
            .iter()
            .map(|row| SubmissionRecord::Challenge(challenge_submission_from_row(row)))
            .chain(
                multi
                    .iter()
                    .map(|row| SubmissionRecord::Flag(flag_submission_from_row(row))),
            )
            .collect())
    }
}

#[async_trait]
impl Storage for PgStorage {
    // ========================================================================
    // CATALOG READS
    // ========================================================================

    async fn get_event(&self, event_id: EventId) -> Result<Option<Event>> {
        let client = self.pool.get().await?;

        let row = client
            .query_opt(
                "SELECT id, name, starts_at, ends_at, team_formation_starts_at, team_formation_ends_at,
                        registration_starts_at, registration_ends_at, requires_team, min_team_size,
                        max_team_size, freeze, freeze_time
                 FROM events WHERE id = $1",
                &[&event_id],
            )
            .await?;

        Ok(row.map(|r| Event {
            id: r.get(0),
            name: r.get(1),
            starts_at: r.get(2),
            ends_at: r.get(3),
            team_formation_starts_at: r.get(4),
            team_formation_ends_at: r.get(5),
            registration_starts_at: r.get(6),
            registration_ends_at: r.get(7),
            requires_team: r.get(8),
            min_team_size: r.get(9),
            max_team_size: r.get(10),
            freeze: r.get(11),
            freeze_time: r.get(12),
        }))
    }

    async fn get_challenge(&self, challenge_id: ChallengeId) -> Result<Option<Challenge>> {
        Ok(self
            .load_challenges("id = $1", challenge_id)
            .await?
            .into_iter()
            .next())
    }

    async fn list_challenges(&self, event_id: EventId) -> Result<Vec<Challenge>> {
        self.load_challenges("event_id = $1", event_id).await
    }

    async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>> {
        Ok(self.load_teams("id = $1", team_id).await?.into_iter().next())
    }

    async fn find_team_for_user(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Option<Team>> {
        let team_id: Option<TeamId> = {
            let client = self.pool.get().await?;
            client
                .query_opt(
                    "SELECT team_id FROM team_members WHERE event_id = $1 AND user_id = $2",
                    &[&event_id, &user_id],
                )
                .await?
                .map(|row| row.get(0))
        };

        match team_id {
            Some(id) => self.get_team(id).await,
            None => Ok(None),
        }
    }

    async fn list_teams(&self, event_id: EventId) -> Result<Vec<Team>> {
        self.load_teams("event_id = $1", event_id).await
    }

    // ========================================================================
    // LEDGER
    // ========================================================================

    async fn has_solved(&self, member_ids: &[UserId], target: SubmissionTarget) -> Result<bool> {
        if member_ids.is_empty() {
            return Ok(false);
        }

        let client = self.pool.get().await?;
        let (sql, target_id) = match target {
            SubmissionTarget::Challenge(id) => (
                "SELECT EXISTS(SELECT 1 FROM submissions WHERE challenge_id = $1 AND user_id = ANY($2) AND solved)",
                id,
            ),
            SubmissionTarget::Flag { flag_id, .. } => (
                "SELECT EXISTS(SELECT 1 FROM flag_submissions WHERE flag_id = $1 AND user_id = ANY($2) AND solved)",
                flag_id,
            ),
        };

        Ok(client
            .query_one(sql, &[&target_id, &member_ids])
            .await?
            .get(0))
    }

    async fn record_submission(&self, new: &NewSubmission<'_>) -> Result<InsertOutcome> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;
        let solved_at = new.solved.then_some(new.at);

        let record = match new.target {
            SubmissionTarget::Challenge(challenge_id) => {
                let prior: i64 = tx
                    .query_one(
                        "SELECT COUNT(*) FROM submissions WHERE user_id = $1 AND challenge_id = $2",
                        &[&new.user_id, &challenge_id],
                    )
                    .await?
                    .get(0);

                let row = tx
                    .query_opt(
                        "INSERT INTO submissions (challenge_id, user_id, team_id, submission, solved, attempts, solved_at, ip, created_at)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                         ON CONFLICT DO NOTHING
                         RETURNING id",
                        &[
                            &challenge_id,
                            &new.user_id,
                            &new.team_id,
                            &new.submission,
                            &new.solved,
                            &(prior + 1),
                            &solved_at,
                            &new.ip,
                            &new.at,
                        ],
                    )
                    .await?;
                let Some(row) = row else {
                    debug!(
                        "Solve of challenge {} by team {} collided with an existing solve",
                        challenge_id, new.team_id
                    );
                    return Ok(InsertOutcome::DuplicateSolve);
                };

                tx.execute(
                    "UPDATE challenges SET attempts = attempts + 1 WHERE id = $1",
                    &[&challenge_id],
                )
                .await?;

                SubmissionRecord::Challenge(ChallengeSubmission {
                    id: row.get(0),
                    challenge_id,
                    user_id: new.user_id,
                    team_id: new.team_id,
                    submission: new.submission.to_string(),
                    solved: new.solved,
                    attempts: prior + 1,
                    solved_at,
                    ip: new.ip.map(str::to_string),
                    created_at: new.at,
                })
            }
            SubmissionTarget::Flag {
                challenge_id,
                flag_id,
            } => {
                let prior: i64 = tx
                    .query_one(
                        "SELECT COUNT(*) FROM flag_submissions WHERE user_id = $1 AND flag_id = $2",
                        &[&new.user_id, &flag_id],
                    )
                    .await?
                    .get(0);

                let row = tx
                    .query_opt(
                        "INSERT INTO flag_submissions (flag_id, challenge_id, user_id, team_id, submission, solved, attempts, solved_at, ip, created_at)
                         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                         ON CONFLICT DO NOTHING
                         RETURNING id",
                        &[
                            &flag_id,
                            &challenge_id,
                            &new.user_id,
                            &new.team_id,
                            &new.submission,
                            &new.solved,
                            &(prior + 1),
                            &solved_at,
                            &new.ip,
                            &new.at,
                        ],
                    )
                    .await?;
                let Some(row) = row else {
                    debug!(
                        "Solve of flag {} by team {} collided with an existing solve",
                        flag_id, new.team_id
                    );
                    return Ok(InsertOutcome::DuplicateSolve);
                };

                tx.execute(
                    "UPDATE flags SET attempts = attempts + 1 WHERE id = $1",
                    &[&flag_id],
                )
                .await?;

                SubmissionRecord::Flag(FlagSubmission {
                    id: row.get(0),
                    flag_id,
                    challenge_id,
                    user_id: new.user_id,
                    team_id: new.team_id,
                    submission: new.submission.to_string(),
                    solved: new.solved,
                    attempts: prior + 1,
                    solved_at,
                    ip: new.ip.map(str::to_string),
                    created_at: new.at,
                })
            }
        };

        tx.commit().await?;
        Ok(InsertOutcome::Recorded(record))
    }

    async fn challenge_ledger(&self, challenge_id: ChallengeId) -> Result<Vec<SubmissionRecord>> {
        self.load_ledger("s.challenge_id = $1", challenge_id).await
    }

    async fn event_ledger(&self, event_id: EventId) -> Result<Vec<SubmissionRecord>> {
        self.load_ledger("c.event_id = $1", event_id).await
    }

    async fn list_submissions(
        &self,
        event_id: EventId,
        kind: LedgerKind,
        limit: i64,
    ) -> Result<Vec<SubmissionRecord>> {
        let client = self.pool.get().await?;

        let (table, columns) = match kind {
            LedgerKind::Challenge => ("submissions", SUBMISSION_COLUMNS),
            LedgerKind::Flag => ("flag_submissions", FLAG_SUBMISSION_COLUMNS),
        };
        let rows = client
            .query(
                &format!(
                    "SELECT {} FROM {} s JOIN challenges c ON c.id = s.challenge_id
                     WHERE c.event_id = $1 ORDER BY s.id DESC LIMIT $2",
                    columns, table
                ),
                &[&event_id, &limit],
            )
            .await?;

        Ok(rows
            .iter()
            .map(|row| match kind {
                LedgerKind::Challenge => {
                    SubmissionRecord::Challenge(challenge_submission_from_row(row))
                }
                LedgerKind::Flag => SubmissionRecord::Flag(flag_submission_from_row(row)),
            })
            .collect())
    }

    // ========================================================================
    // CATALOG WRITES
    // ========================================================================

    async fn create_user(&self, username: &str) -> Result<UserId> {
        let client = self.pool.get().await?;
        Ok(client
            .query_one(
                "INSERT INTO users (username) VALUES ($1) RETURNING id",
                &[&username],
            )
            .await?
            .get(0))
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserId>> {
        let client = self.pool.get().await?;
        Ok(client
            .query_opt("SELECT id FROM users WHERE username = $1", &[&username])
            .await?
            .map(|row| row.get(0)))
    }

    async fn create_event(&self, event: &NewEvent) -> Result<EventId> {
        let client = self.pool.get().await?;
        Ok(client
            .query_one(
                "INSERT INTO events (name, starts_at, ends_at, team_formation_starts_at, team_formation_ends_at,
                                     registration_starts_at, registration_ends_at, requires_team, min_team_size,
                                     max_team_size, freeze, freeze_time)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                 RETURNING id",
                &[
                    &event.name,
                    &event.starts_at,
                    &event.ends_at,
                    &event.team_formation_starts_at,
                    &event.team_formation_ends_at,
                    &event.registration_starts_at,
                    &event.registration_ends_at,
                    &event.requires_team,
                    &event.min_team_size,
                    &event.max_team_size,
                    &event.freeze,
                    &event.freeze_time,
                ],
            )
            .await?
            .get(0))
    }

    async fn create_challenge(&self, challenge: &NewChallenge) -> Result<ChallengeId> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let challenge_id: ChallengeId = tx
            .query_one(
                "INSERT INTO challenges (event_id, name, category, description, flag_type, flag, bytes, first_blood_bytes)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 RETURNING id",
                &[
                    &challenge.event_id,
                    &challenge.name,
                    &challenge.category,
                    &challenge.description,
                    &challenge.flag_type,
                    &challenge.flag,
                    &challenge.bytes,
                    &challenge.first_blood_bytes,
                ],
            )
            .await?
            .get(0);

        for (index, flag) in challenge.flags.iter().enumerate() {
            tx.execute(
                "INSERT INTO flags (challenge_id, name, description, flag, bytes, first_blood_bytes, order_index)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
                &[
                    &challenge_id,
                    &flag.name,
                    &flag.description,
                    &flag.flag,
                    &flag.bytes,
                    &flag.first_blood_bytes,
                    &(index as i32),
                ],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(challenge_id)
    }

    async fn create_team(&self, team: &NewTeam) -> Result<TeamId> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let team_id: TeamId = tx
            .query_one(
                "INSERT INTO teams (event_id, name, leader_id, is_locked) VALUES ($1, $2, $3, $4) RETURNING id",
                &[&team.event_id, &team.name, &team.leader_id, &team.is_locked],
            )
            .await?
            .get(0);

        let mut members = vec![team.leader_id];
        members.extend(team.members.iter().filter(|id| **id != team.leader_id));
        for user_id in members {
            tx.execute(
                "INSERT INTO team_members (team_id, event_id, user_id) VALUES ($1, $2, $3)",
                &[&team_id, &team.event_id, &user_id],
            )
            .await
            .with_context(|| format!("User {} is already on a team for this event", user_id))?;
        }

        tx.commit().await?;
        Ok(team_id)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn challenge_from_row(row: &Row) -> Challenge {
    Challenge {
        id: row.get(0),
        event_id: row.get(1),
        name: row.get(2),
        category: row.get(3),
        description: row.get(4),
        flag_type: row.get(5),
        flag: row.get(6),
        bytes: row.get(7),
        first_blood_bytes: row.get(8),
        attempts: row.get(9),
        flags: Vec::new(),
    }
}

fn flag_from_row(row: &Row) -> Flag {
    Flag {
        id: row.get(0),
        challenge_id: row.get(1),
        name: row.get(2),
        description: row.get(3),
        flag: row.get(4),
        bytes: row.get(5),
        first_blood_bytes: row.get(6),
        order_index: row.get(7),
        attempts: row.get(8),
    }
}

fn challenge_submission_from_row(row: &Row) -> ChallengeSubmission {
    ChallengeSubmission {
        id: row.get(0),
        challenge_id: row.get(1),
        user_id: row.get(2),
        team_id: row.get(3),
        submission: row.get(4),
        solved: row.get(5),
        attempts: row.get(6),
        solved_at: row.get(7),
        ip: row.get(8),
        created_at: row.get(9),
    }
}

fn flag_submission_from_row(row: &Row) -> FlagSubmission {
    FlagSubmission {
        id: row.get(0),
        flag_id: row.get(1),
        challenge_id: row.get(2),
        user_id: row.get(3),
        team_id: row.get(4),
        submission: row.get(5),
        solved: row.get(6),
        attempts: row.get(7),
        solved_at: row.get(8),
        ip: row.get(9),
        created_at: row.get(10),
    }
}
