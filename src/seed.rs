//! TOML catalog import
//!
//! Stands in for the admin layer during local runs and tests: one file
//! describes one event with its challenges, flags and teams. Users named in
//! team rosters are created on demand.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::models::{
    ChallengeId, EventId, FlagType, NewChallenge, NewEvent, NewFlag, NewTeam, TeamId, UserId,
};
use crate::storage::Storage;

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub event: EventSpec,
    #[serde(default)]
    pub challenges: Vec<ChallengeSpec>,
    #[serde(default)]
    pub teams: Vec<TeamSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventSpec {
    pub name: String,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub team_formation_starts_at: Option<DateTime<Utc>>,
    pub team_formation_ends_at: Option<DateTime<Utc>>,
    pub registration_starts_at: Option<DateTime<Utc>>,
    pub registration_ends_at: Option<DateTime<Utc>>,
    #[serde(default = "default_true")]
    pub requires_team: bool,
    #[serde(default = "default_min_team_size")]
    pub min_team_size: i32,
    #[serde(default = "default_max_team_size")]
    pub max_team_size: i32,
    #[serde(default)]
    pub freeze: bool,
    pub freeze_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChallengeSpec {
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub flag_type: FlagType,
    pub flag: Option<String>,
    #[serde(default)]
    pub bytes: i64,
    #[serde(default)]
    pub first_blood_bytes: i64,
    #[serde(default)]
    pub flags: Vec<FlagSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlagSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub flag: String,
    #[serde(default)]
    pub bytes: i64,
    #[serde(default)]
    pub first_blood_bytes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamSpec {
    pub name: String,
    pub leader: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub locked: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_team_size() -> i32 {
    1
}

fn default_max_team_size() -> i32 {
    4
}

/// Ids assigned while importing a catalog, keyed by name
#[derive(Debug, Clone, Default)]
pub struct SeededEvent {
    pub event_id: EventId,
    pub challenges: BTreeMap<String, ChallengeId>,
    pub teams: BTreeMap<String, TeamId>,
    pub users: BTreeMap<String, UserId>,
}

impl SeededEvent {
    pub fn challenge(&self, name: &str) -> Result<ChallengeId> {
        self.challenges
            .get(name)
            .copied()
            .with_context(|| format!("Unknown challenge '{}'", name))
    }

    pub fn team(&self, name: &str) -> Result<TeamId> {
        self.teams
            .get(name)
            .copied()
            .with_context(|| format!("Unknown team '{}'", name))
    }

    pub fn user(&self, name: &str) -> Result<UserId> {
        self.users
            .get(name)
            .copied()
            .with_context(|| format!("Unknown user '{}'", name))
    }
}

impl Catalog {
    pub fn parse(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content).context("Failed to parse catalog")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        Self::parse(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.event.ends_at <= self.event.starts_at {
            bail!("Event '{}' ends before it starts", self.event.name);
        }

        for challenge in &self.challenges {
            match challenge.flag_type {
                FlagType::Single => {
                    if challenge.flag.as_deref().map_or(true, str::is_empty) {
                        bail!("Challenge '{}' is single but has no flag", challenge.name);
                    }
                    if !challenge.flags.is_empty() {
                        bail!("Challenge '{}' is single but lists sub-flags", challenge.name);
                    }
                }
                FlagType::MultipleAll | FlagType::MultipleIndividual => {
                    if challenge.flags.is_empty() {
                        bail!("Challenge '{}' needs at least one flag", challenge.name);
                    }
                    if challenge.flags.iter().any(|f| f.flag.is_empty()) {
                        bail!("Challenge '{}' has an empty flag", challenge.name);
                    }
                }
            }
        }

        Ok(())
    }

    /// Write the catalog through `storage`
    pub async fn import(&self, storage: &dyn Storage) -> Result<SeededEvent> {
        let event = &self.event;
        let event_id = storage
            .create_event(&NewEvent {
                name: event.name.clone(),
                starts_at: event.starts_at,
                ends_at: event.ends_at,
                team_formation_starts_at: event.team_formation_starts_at,
                team_formation_ends_at: event.team_formation_ends_at,
                registration_starts_at: event.registration_starts_at,
                registration_ends_at: event.registration_ends_at,
                requires_team: event.requires_team,
                min_team_size: event.min_team_size,
                max_team_size: event.max_team_size,
                freeze: event.freeze,
                freeze_time: event.freeze_time,
            })
            .await?;

        let mut seeded = SeededEvent {
            event_id,
            ..Default::default()
        };

        for challenge in &self.challenges {
            let id = storage
                .create_challenge(&NewChallenge {
                    event_id,
                    name: challenge.name.clone(),
                    category: challenge.category.clone(),
                    description: challenge.description.clone(),
                    flag_type: challenge.flag_type,
                    flag: challenge.flag.clone(),
                    bytes: challenge.bytes,
                    first_blood_bytes: challenge.first_blood_bytes,
                    flags: challenge
                        .flags
                        .iter()
                        .map(|f| NewFlag {
                            name: f.name.clone(),
                            description: f.description.clone(),
                            flag: f.flag.clone(),
                            bytes: f.bytes,
                            first_blood_bytes: f.first_blood_bytes,
                        })
                        .collect(),
                })
                .await
                .with_context(|| format!("Failed to create challenge '{}'", challenge.name))?;
            seeded.challenges.insert(challenge.name.clone(), id);
        }

        for team in &self.teams {
            let leader_id = ensure_user(storage, &mut seeded, &team.leader).await?;
            let mut members = Vec::with_capacity(team.members.len());
            for username in &team.members {
                members.push(ensure_user(storage, &mut seeded, username).await?);
            }

            let id = storage
                .create_team(&NewTeam {
                    event_id,
                    name: team.name.clone(),
                    leader_id,
                    is_locked: team.locked,
                    members,
                })
                .await
                .with_context(|| format!("Failed to create team '{}'", team.name))?;
            seeded.teams.insert(team.name.clone(), id);
        }

        info!(
            "Seeded event '{}' (id {}): {} challenges, {} teams, {} users",
            event.name,
            event_id,
            seeded.challenges.len(),
            seeded.teams.len(),
            seeded.users.len()
        );

        Ok(seeded)
    }
}

async fn ensure_user(
    storage: &dyn Storage,
    seeded: &mut SeededEvent,
    username: &str,
) -> Result<UserId> {
    if let Some(id) = seeded.users.get(username) {
        return Ok(*id);
    }
    let id = match storage.find_user(username).await? {
        Some(id) => id,
        None => storage.create_user(username).await?,
    };
    seeded.users.insert(username.to_string(), id);
    Ok(id)
}
