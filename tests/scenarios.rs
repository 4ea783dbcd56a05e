//! End-to-end adjudication and scoring scenarios over SQLite

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use ctf_scoreboard::seed::SeededEvent;
use ctf_scoreboard::{
    Adjudicator, Catalog, CoreError, EventPhase, LeaderboardService, LedgerEntry, ManualClock,
    SqliteStorage, Storage,
};

const CATALOG: &str = r#"
    [event]
    name = "Scenarios"
    starts_at = "2026-10-01T00:00:00Z"
    ends_at = "2026-10-02T00:00:00Z"
    freeze = true
    freeze_time = "2026-10-01T12:00:00Z"

    [[challenges]]
    name = "warmup"
    category = "misc"
    flag_type = "single"
    flag = "CTF{warm}"
    bytes = 100
    first_blood_bytes = 50

    [[challenges]]
    name = "chain"
    category = "crypto"
    flag_type = "multiple_all"
    bytes = 300
    first_blood_bytes = 150

    [[challenges.flags]]
    name = "first"
    flag = "CTF{chain_1}"

    [[challenges.flags]]
    name = "second"
    flag = "CTF{chain_2}"

    [[teams]]
    name = "alpha"
    leader = "u1"
    members = ["u2"]

    [[teams]]
    name = "beta"
    leader = "b1"
    members = ["b2"]

    [[teams]]
    name = "gamma"
    leader = "g1"
"#;

struct Harness {
    storage: Arc<SqliteStorage>,
    clock: Arc<ManualClock>,
    adjudicator: Adjudicator,
    leaderboard: LeaderboardService,
    seeded: SeededEvent,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap()
}

async fn harness() -> Harness {
    let storage = Arc::new(SqliteStorage::in_memory().unwrap());
    let seeded = Catalog::parse(CATALOG)
        .unwrap()
        .import(storage.as_ref())
        .await
        .unwrap();
    let clock = Arc::new(ManualClock::new(start()));

    Harness {
        adjudicator: Adjudicator::new(storage.clone(), clock.clone(), 256),
        leaderboard: LeaderboardService::new(storage.clone(), clock.clone()),
        storage,
        clock,
        seeded,
    }
}

impl Harness {
    fn at(&self, seconds: i64) {
        self.clock.set(start() + Duration::seconds(seconds));
    }

    async fn submit(
        &self,
        challenge: &str,
        user: &str,
        raw: &str,
    ) -> Result<ctf_scoreboard::SubmissionOutcome, CoreError> {
        self.adjudicator
            .submit(
                self.seeded.challenge(challenge).unwrap(),
                Some(self.seeded.user(user).unwrap()),
                raw,
                None,
            )
            .await
    }

    async fn points(&self, team: &str) -> i64 {
        let board = self
            .leaderboard
            .event_leaderboard(self.seeded.event_id)
            .await
            .unwrap();
        board
            .teams
            .iter()
            .find(|row| row.team_name == team)
            .map(|row| row.points)
            .unwrap_or(0)
    }

    async fn solved_rows(&self, challenge: &str) -> usize {
        let id = self.seeded.challenge(challenge).unwrap();
        self.storage
            .challenge_ledger(id)
            .await
            .unwrap()
            .iter()
            .filter(|row| row.solved())
            .count()
    }
}

#[tokio::test]
async fn single_flag_first_blood_then_team_duplicate() {
    let h = harness().await;

    h.at(10);
    let first = h.submit("warmup", "u1", "CTF{warm}").await.unwrap();
    assert!(first.correct);
    assert!(first.first_blood);
    assert_eq!(first.points, 150);

    h.at(11);
    let again = h.submit("warmup", "u2", "CTF{warm}").await;
    assert!(matches!(again, Err(CoreError::AlreadySolvedByTeam)));

    assert_eq!(h.solved_rows("warmup").await, 1);
    assert_eq!(h.points("alpha").await, 150);

    h.at(12);
    let second = h.submit("warmup", "b1", "CTF{warm}").await.unwrap();
    assert!(!second.first_blood);
    assert_eq!(second.points, 100);
}

#[tokio::test]
async fn multiple_all_rewards_first_completion() {
    let h = harness().await;

    h.at(1);
    h.submit("chain", "g1", "CTF{chain_1}").await.unwrap();
    h.at(5);
    h.submit("chain", "b1", "CTF{chain_2}").await.unwrap();
    h.at(8);
    let beta_done = h.submit("chain", "b2", "CTF{chain_1}").await.unwrap();
    assert!(beta_done.completed);
    assert!(beta_done.first_blood);
    assert_eq!(beta_done.points, 450);

    h.at(20);
    let gamma_done = h.submit("chain", "g1", "CTF{chain_2}").await.unwrap();
    assert!(gamma_done.completed);
    assert!(!gamma_done.first_blood);
    assert_eq!(gamma_done.points, 300);

    assert_eq!(h.points("beta").await, 450);
    assert_eq!(h.points("gamma").await, 300);
    assert_eq!(h.points("alpha").await, 0);

    let board = h
        .leaderboard
        .challenge_leaderboard(h.seeded.challenge("chain").unwrap())
        .await
        .unwrap();
    let names: Vec<_> = board.solvers.iter().map(|s| s.team_name.as_str()).collect();
    assert_eq!(names, vec!["beta", "gamma"]);
    assert!(board.solvers[0].first_blood);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_team_submissions_record_one_solve() {
    let h = harness().await;
    h.at(30);

    let challenge_id = h.seeded.challenge("warmup").unwrap();
    let members = [h.seeded.user("u1").unwrap(), h.seeded.user("u2").unwrap()];

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let adjudicator = h.adjudicator.clone();
            let user_id = members[i % members.len()];
            tokio::spawn(async move {
                adjudicator
                    .submit(challenge_id, Some(user_id), "CTF{warm}", None)
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let accepted = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, CoreError::AlreadySolvedByTeam)));

    assert_eq!(h.solved_rows("warmup").await, 1);
    assert_eq!(h.points("alpha").await, 150);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_teammates_on_one_flag_record_one_solve() {
    let h = harness().await;
    h.at(30);

    let challenge_id = h.seeded.challenge("chain").unwrap();
    let members = [h.seeded.user("b1").unwrap(), h.seeded.user("b2").unwrap()];

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let adjudicator = h.adjudicator.clone();
            let user_id = members[i % members.len()];
            tokio::spawn(async move {
                adjudicator
                    .submit(challenge_id, Some(user_id), "CTF{chain_1}", None)
                    .await
            })
        })
        .collect();

    let results: Vec<_> = futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    let accepted: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert_eq!(accepted.len(), 1);
    assert!(!accepted[0].completed);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, CoreError::AlreadySolvedByTeam)));
    assert_eq!(h.solved_rows("chain").await, 1);

    // The second flag still completes the challenge
    h.at(40);
    let done = h.submit("chain", "b2", "CTF{chain_2}").await.unwrap();
    assert!(done.completed);
    assert_eq!(done.points, 450);
    assert_eq!(h.solved_rows("chain").await, 2);
}

#[tokio::test]
async fn solve_just_after_freeze_stays_hidden() {
    let h = harness().await;
    let freeze = start() + Duration::hours(12);

    h.clock.set(freeze + Duration::nanoseconds(500));
    let late = h.submit("warmup", "u1", "CTF{warm}").await.unwrap();
    assert!(late.solved_at > freeze);

    let ledger = h
        .storage
        .challenge_ledger(h.seeded.challenge("warmup").unwrap())
        .await
        .unwrap();
    assert_eq!(ledger[0].solved_at(), Some(late.solved_at));

    assert_eq!(h.points("alpha").await, 0);
}

#[tokio::test]
async fn frozen_submit_response_does_not_reveal_hidden_solves() {
    let h = harness().await;

    // Public before the freeze: gamma completes the chain
    h.at(3600);
    h.submit("chain", "g1", "CTF{chain_1}").await.unwrap();
    h.submit("chain", "g1", "CTF{chain_2}").await.unwrap();

    // Both warmup solves land after the freeze at 12:00
    h.at(13 * 3600);
    let alpha = h.submit("warmup", "u1", "CTF{warm}").await.unwrap();
    assert!(alpha.first_blood);

    h.at(14 * 3600);
    let beta = h.submit("warmup", "b1", "CTF{warm}").await.unwrap();
    assert!(beta.first_blood);
    assert_eq!(beta.points, 150);

    // Solves from before the freeze still take first blood
    h.at(15 * 3600);
    h.submit("chain", "u1", "CTF{chain_1}").await.unwrap();
    let late = h.submit("chain", "u2", "CTF{chain_2}").await.unwrap();
    assert!(late.completed);
    assert!(!late.first_blood);
    assert_eq!(late.points, 300);
}

#[tokio::test]
async fn freeze_hides_late_solves_and_is_stable() {
    let h = harness().await;

    h.at(3600);
    h.submit("warmup", "u1", "CTF{warm}").await.unwrap();

    // Past the freeze at 12:00
    h.at(13 * 3600);
    let late = h.submit("warmup", "b1", "CTF{warm}").await.unwrap();
    assert_eq!(late.points, 100);

    let board = h
        .leaderboard
        .event_leaderboard(h.seeded.event_id)
        .await
        .unwrap();
    assert_eq!(board.phase, EventPhase::Frozen);
    assert!(board.frozen);
    assert_eq!(h.points("alpha").await, 150);
    assert_eq!(h.points("beta").await, 0);

    // Reading twice without new submissions yields the same board
    let again = h
        .leaderboard
        .event_leaderboard(h.seeded.event_id)
        .await
        .unwrap();
    assert_eq!(board, again);

    // Moving the clock forward within the freeze never changes public scores
    h.at(20 * 3600);
    let later = h
        .leaderboard
        .event_leaderboard(h.seeded.event_id)
        .await
        .unwrap();
    assert_eq!(board.teams, later.teams);
}

#[tokio::test]
async fn scores_never_decrease_without_freeze() {
    let h = harness().await;
    let mut last = 0;

    for (seconds, user, raw, challenge) in [
        (60, "u1", "CTF{chain_1}", "chain"),
        (120, "u2", "CTF{warm}", "warmup"),
        (180, "u1", "CTF{nope}", "warmup"),
        (240, "u2", "CTF{chain_2}", "chain"),
    ] {
        h.at(seconds);
        let _ = h.submit(challenge, user, raw).await;
        let points = h.points("alpha").await;
        assert!(points >= last, "{} dropped below {}", points, last);
        last = points;
    }

    assert_eq!(last, 600);
}
