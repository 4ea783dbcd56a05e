//! HTTP client for the CTF scoreboard server

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use ctf_scoreboard::server::Envelope;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const USER_ID_HEADER: &str = "x-user-id";

pub struct CtfClient {
    client: Client,
    base_url: String,
    user_id: Option<i64>,
}

impl CtfClient {
    pub fn new(base_url: &str, user_id: Option<i64>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let user_id = self
            .user_id
            .ok_or_else(|| anyhow!("This command needs --user (or CTF_USER_ID)"))?;
        Ok(request.header(USER_ID_HEADER, user_id.to_string()))
    }

    pub async fn scoreboard(&self, event_id: i64) -> Result<Scoreboard> {
        let resp = self
            .client
            .get(self.url(&format!("/events/{}/scoreboard", event_id)))
            .send()
            .await?;
        unwrap_envelope(resp, "Failed to fetch scoreboard").await
    }

    pub async fn challenges(&self, event_id: i64) -> Result<ChallengeListing> {
        let request = self
            .client
            .get(self.url(&format!("/events/{}/challenges", event_id)));
        let resp = self.authed(request)?.send().await?;
        unwrap_envelope(resp, "Failed to fetch challenges").await
    }

    pub async fn team(&self, event_id: i64) -> Result<TeamBoard> {
        let request = self
            .client
            .get(self.url(&format!("/events/{}/team-leaderboard", event_id)));
        let resp = self.authed(request)?.send().await?;
        unwrap_envelope(resp, "Failed to fetch team leaderboard").await
    }

    pub async fn challenge_leaderboard(&self, challenge_id: i64) -> Result<ChallengeBoard> {
        let resp = self
            .client
            .get(self.url(&format!("/challenges/{}/leaderboard", challenge_id)))
            .send()
            .await?;
        unwrap_envelope(resp, "Failed to fetch challenge leaderboard").await
    }

    pub async fn submit(&self, challenge_id: i64, submission: &str) -> Result<SubmitResult> {
        let request = self
            .client
            .post(self.url(&format!("/challenges/{}/submit", challenge_id)))
            .json(&SubmitRequest { submission });
        let resp = self.authed(request)?.send().await?;
        unwrap_envelope(resp, "Submission rejected").await
    }
}

/// Decode the `{status, message, kind, data}` envelope
async fn unwrap_envelope<T: DeserializeOwned>(resp: Response, context: &str) -> Result<T> {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_else(|_| "Unknown error".into());
    decode_envelope(status.as_u16(), &text, context)
}

fn decode_envelope<T: DeserializeOwned>(status: u16, text: &str, context: &str) -> Result<T> {
    let envelope: Envelope<T> = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(_) => return Err(anyhow!("{} ({}): {}", context, status, text)),
    };

    if envelope.status != "success" {
        let message = envelope.message.unwrap_or_else(|| "Unknown error".into());
        return Err(anyhow!("{} ({}): {}", context, status, message));
    }

    envelope
        .data
        .ok_or_else(|| anyhow!("{} ({}): empty response", context, status))
}

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct SubmitRequest<'a> {
    submission: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct Scoreboard {
    pub event_name: String,
    pub phase: String,
    pub frozen: bool,
    pub freeze_time: Option<DateTime<Utc>>,
    pub teams: Vec<ScoreboardRow>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreboardRow {
    pub rank: usize,
    pub team_name: String,
    pub points: i64,
    pub first_blood_count: usize,
    pub solved_count: usize,
    pub last_solve_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeListing {
    pub frozen: bool,
    pub challenges: Vec<ChallengeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeEntry {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub flag_type: String,
    pub bytes: i64,
    pub first_blood_bytes: i64,
    pub solve_count: usize,
    pub solved_by_team: bool,
    pub progress: u8,
    #[serde(default)]
    pub flags: Vec<FlagEntry>,
}

#[derive(Debug, Deserialize)]
pub struct FlagEntry {
    pub name: String,
    pub bytes: i64,
    pub solve_count: usize,
    pub solved_by_team: bool,
}

#[derive(Debug, Deserialize)]
pub struct TeamBoard {
    pub team_name: String,
    pub points: i64,
    pub frozen: bool,
    pub members: Vec<MemberEntry>,
}

#[derive(Debug, Deserialize)]
pub struct MemberEntry {
    pub rank: usize,
    pub username: String,
    pub points: i64,
    pub first_blood_points: i64,
    pub solve_history: Vec<SolveEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SolveEntry {
    pub challenge_name: String,
    pub flag_name: Option<String>,
    pub points: i64,
    pub first_blood: bool,
    pub solved_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ChallengeBoard {
    pub challenge_name: String,
    pub flag_type: String,
    pub frozen: bool,
    pub solvers: Vec<SolverEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SolverEntry {
    pub rank: usize,
    pub team_name: String,
    pub solved_at: DateTime<Utc>,
    pub first_blood: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResult {
    pub points: i64,
    pub first_blood: bool,
    pub completed: bool,
    pub progress: Option<SubmitProgress>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitProgress {
    pub solved_flags: usize,
    pub total_flags: usize,
}
