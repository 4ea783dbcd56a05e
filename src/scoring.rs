//! Scoring engine
//!
//! A pure function from (catalog, rosters, ledger, as-of instant) to
//! standings. Nothing here touches storage, and first blood is always derived
//! from the ledger rather than stored.
//!
//! Ordering of solves is `(solved_at, row id)` everywhere: the earliest
//! instant wins and insertion order breaks ties.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::models::{
    Challenge, ChallengeId, FlagId, FlagType, LedgerEntry, SubmissionRecord, TeamId, UserId,
};

/// Everything one scoring pass reads
pub struct ScoringInput<'a> {
    pub challenges: &'a [Challenge],
    /// Current roster: user -> team
    pub roster: &'a HashMap<UserId, TeamId>,
    pub ledger: &'a [SubmissionRecord],
    /// Rows solved after this instant are ignored
    pub cutoff: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Standings {
    pub teams: BTreeMap<TeamId, TeamScore>,
    /// One entry per catalog challenge, solved or not
    pub challenges: BTreeMap<ChallengeId, ChallengeStanding>,
}

impl Standings {
    pub fn team(&self, team_id: TeamId) -> Option<&TeamScore> {
        self.teams.get(&team_id)
    }

    fn team_mut(&mut self, team_id: TeamId) -> &mut TeamScore {
        self.teams.entry(team_id).or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamScore {
    pub points: i64,
    pub first_blood_count: usize,
    pub first_blood_points: i64,
    /// Challenges fully completed
    pub solved_count: usize,
    /// Instant of the most recent point-earning solve
    pub last_solve_at: Option<DateTime<Utc>>,
    pub challenges: BTreeMap<ChallengeId, ChallengeScore>,
    /// Per-member attribution, ordered by `(at, row_id)`
    pub awards: Vec<Award>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeScore {
    /// Base plus first-blood points
    pub points: i64,
    pub first_blood_points: i64,
    /// 0 or 1 except for `multiple_individual`, which counts per flag
    pub first_bloods: usize,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub solved_flags: usize,
    pub total_flags: usize,
    pub flags: BTreeMap<FlagId, FlagScore>,
}

impl ChallengeScore {
    /// Completion percentage, 0 to 100
    pub fn progress(&self) -> u8 {
        if self.total_flags == 0 {
            return if self.completed { 100 } else { 0 };
        }
        ((self.solved_flags * 100) / self.total_flags) as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlagScore {
    pub solved_at: DateTime<Utc>,
    pub user_id: UserId,
    /// Points this flag contributes on its own (zero for `multiple_all`)
    pub points: i64,
    pub first_blood: bool,
}

/// Points credited to one member for one ledger row
#[derive(Debug, Clone, PartialEq)]
pub struct Award {
    pub row_id: i64,
    pub user_id: UserId,
    pub challenge_id: ChallengeId,
    pub flag_id: Option<FlagId>,
    pub points: i64,
    pub first_blood: bool,
    pub first_blood_points: i64,
    pub at: DateTime<Utc>,
}

impl Award {
    pub fn total(&self) -> i64 {
        self.points + self.first_blood_points
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChallengeStanding {
    /// Teams that completed the challenge, in completion order
    pub solvers: Vec<Solver>,
    /// Challenge-level first blood; never set for `multiple_individual`
    pub first_blood: Option<TeamId>,
    pub flag_first_bloods: BTreeMap<FlagId, TeamId>,
    /// Number of teams holding each flag
    pub flag_solve_counts: BTreeMap<FlagId, usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Solver {
    pub team_id: TeamId,
    /// Member whose row completed the challenge
    pub user_id: UserId,
    pub solved_at: DateTime<Utc>,
    pub row_id: i64,
    pub first_blood: bool,
}

#[derive(Debug, Clone, Copy)]
struct Solve {
    row_id: i64,
    user_id: UserId,
    team_id: Option<TeamId>,
    flag_id: Option<FlagId>,
    at: DateTime<Utc>,
}

impl Solve {
    fn key(&self) -> (DateTime<Utc>, i64) {
        (self.at, self.row_id)
    }
}

fn keep_earliest<K: Ord>(map: &mut BTreeMap<K, Solve>, key: K, solve: Solve) {
    map.entry(key)
        .and_modify(|current| {
            if solve.key() < current.key() {
                *current = solve;
            }
        })
        .or_insert(solve);
}

/// Compute standings as of `input.cutoff`
pub fn compute(input: &ScoringInput<'_>) -> Standings {
    let mut by_challenge: HashMap<ChallengeId, Vec<Solve>> = HashMap::new();
    for record in input.ledger {
        let Some(at) = record.solved_by(input.cutoff) else {
            continue;
        };
        by_challenge
            .entry(record.challenge_id())
            .or_default()
            .push(Solve {
                row_id: record.id(),
                user_id: record.user_id(),
                team_id: input.roster.get(&record.user_id()).copied(),
                flag_id: record.flag_id(),
                at,
            });
    }

    let mut standings = Standings::default();
    for challenge in input.challenges {
        let solves = by_challenge.remove(&challenge.id).unwrap_or_default();
        let standing = match challenge.flag_type {
            FlagType::Single => {
                let rows: Vec<Solve> = solves.into_iter().filter(|s| s.flag_id.is_none()).collect();
                score_single(challenge, &rows, &mut standings)
            }
            FlagType::MultipleAll => {
                let rows = flag_rows(challenge, solves);
                score_all(challenge, &rows, &mut standings)
            }
            FlagType::MultipleIndividual => {
                let rows = flag_rows(challenge, solves);
                score_individual(challenge, &rows, &mut standings)
            }
        };
        standings.challenges.insert(challenge.id, standing);
    }

    for team in standings.teams.values_mut() {
        team.awards.sort_by_key(|a| (a.at, a.row_id, a.challenge_id));
        team.points = team.challenges.values().map(|c| c.points).sum();
        team.first_blood_points = team.challenges.values().map(|c| c.first_blood_points).sum();
        team.first_blood_count = team.challenges.values().map(|c| c.first_bloods).sum();
        team.solved_count = team.challenges.values().filter(|c| c.completed).count();
        team.last_solve_at = team.awards.iter().map(|a| a.at).max();
    }

    standings
}

/// Flag rows of `challenge` whose flag still belongs to it
fn flag_rows(challenge: &Challenge, solves: Vec<Solve>) -> Vec<Solve> {
    solves
        .into_iter()
        .filter(|s| {
            s.flag_id
                .is_some_and(|id| challenge.flags.iter().any(|f| f.id == id))
        })
        .collect()
}

fn sort_solvers(solvers: &mut [Solver]) {
    solvers.sort_by_key(|s| (s.solved_at, s.row_id, s.team_id));
}

fn score_single(challenge: &Challenge, solves: &[Solve], standings: &mut Standings) -> ChallengeStanding {
    // A first solver without a team denies first blood to everyone
    let first_blood = solves
        .iter()
        .min_by_key(|s| s.key())
        .and_then(|s| s.team_id);

    let mut earliest: BTreeMap<TeamId, Solve> = BTreeMap::new();
    for solve in solves {
        if let Some(team_id) = solve.team_id {
            keep_earliest(&mut earliest, team_id, *solve);
        }
    }

    let mut standing = ChallengeStanding {
        first_blood,
        ..Default::default()
    };

    for (team_id, solve) in earliest {
        let is_first = first_blood == Some(team_id);
        let fb_points = if is_first { challenge.first_blood_bytes } else { 0 };

        let team = standings.team_mut(team_id);
        team.challenges.insert(
            challenge.id,
            ChallengeScore {
                points: challenge.bytes + fb_points,
                first_blood_points: fb_points,
                first_bloods: usize::from(is_first),
                completed: true,
                completed_at: Some(solve.at),
                ..Default::default()
            },
        );
        team.awards.push(Award {
            row_id: solve.row_id,
            user_id: solve.user_id,
            challenge_id: challenge.id,
            flag_id: None,
            points: challenge.bytes,
            first_blood: is_first,
            first_blood_points: fb_points,
            at: solve.at,
        });

        standing.solvers.push(Solver {
            team_id,
            user_id: solve.user_id,
            solved_at: solve.at,
            row_id: solve.row_id,
            first_blood: is_first,
        });
    }

    sort_solvers(&mut standing.solvers);
    standing
}

/// Earliest solve of each flag per team, in one pass
fn team_flag_solves(solves: &[Solve]) -> BTreeMap<TeamId, BTreeMap<FlagId, Solve>> {
    let mut by_team: BTreeMap<TeamId, BTreeMap<FlagId, Solve>> = BTreeMap::new();
    for solve in solves {
        if let (Some(team_id), Some(flag_id)) = (solve.team_id, solve.flag_id) {
            keep_earliest(by_team.entry(team_id).or_default(), flag_id, *solve);
        }
    }
    by_team
}

fn flag_solve_counts(by_team: &BTreeMap<TeamId, BTreeMap<FlagId, Solve>>) -> BTreeMap<FlagId, usize> {
    let mut counts = BTreeMap::new();
    for flags in by_team.values() {
        for flag_id in flags.keys() {
            *counts.entry(*flag_id).or_insert(0) += 1;
        }
    }
    counts
}

fn score_all(challenge: &Challenge, solves: &[Solve], standings: &mut Standings) -> ChallengeStanding {
    let total_flags = challenge.flags.len();
    let by_team = team_flag_solves(solves);

    // The row that completed the set is the latest of the team's earliest
    // per-flag solves.
    let mut completions: Vec<(TeamId, Solve)> = by_team
        .iter()
        .filter(|(_, flags)| total_flags > 0 && flags.len() == total_flags)
        .filter_map(|(team_id, flags)| {
            flags
                .values()
                .max_by_key(|s| s.key())
                .map(|last| (*team_id, *last))
        })
        .collect();
    completions.sort_by_key(|(team_id, s)| (s.at, s.row_id, *team_id));
    let first_blood = completions.first().map(|(team_id, _)| *team_id);

    let mut standing = ChallengeStanding {
        first_blood,
        flag_solve_counts: flag_solve_counts(&by_team),
        ..Default::default()
    };

    for (team_id, flags) in &by_team {
        let team = standings.team_mut(*team_id);
        team.challenges.insert(
            challenge.id,
            ChallengeScore {
                solved_flags: flags.len(),
                total_flags,
                flags: flags
                    .iter()
                    .map(|(flag_id, s)| {
                        (
                            *flag_id,
                            FlagScore {
                                solved_at: s.at,
                                user_id: s.user_id,
                                points: 0,
                                first_blood: false,
                            },
                        )
                    })
                    .collect(),
                ..Default::default()
            },
        );
    }

    for (team_id, last) in completions {
        let is_first = first_blood == Some(team_id);
        let fb_points = if is_first { challenge.first_blood_bytes } else { 0 };

        let team = standings.team_mut(team_id);
        if let Some(score) = team.challenges.get_mut(&challenge.id) {
            score.points = challenge.bytes + fb_points;
            score.first_blood_points = fb_points;
            score.first_bloods = usize::from(is_first);
            score.completed = true;
            score.completed_at = Some(last.at);
        }
        team.awards.push(Award {
            row_id: last.row_id,
            user_id: last.user_id,
            challenge_id: challenge.id,
            flag_id: last.flag_id,
            points: challenge.bytes,
            first_blood: is_first,
            first_blood_points: fb_points,
            at: last.at,
        });

        standing.solvers.push(Solver {
            team_id,
            user_id: last.user_id,
            solved_at: last.at,
            row_id: last.row_id,
            first_blood: is_first,
        });
    }

    standing
}

fn score_individual(
    challenge: &Challenge,
    solves: &[Solve],
    standings: &mut Standings,
) -> ChallengeStanding {
    let total_flags = challenge.flags.len();
    let by_team = team_flag_solves(solves);

    let mut flag_first_bloods = BTreeMap::new();
    for flag in &challenge.flags {
        let first = solves
            .iter()
            .filter(|s| s.flag_id == Some(flag.id))
            .min_by_key(|s| s.key())
            .and_then(|s| s.team_id);
        if let Some(team_id) = first {
            flag_first_bloods.insert(flag.id, team_id);
        }
    }

    let mut standing = ChallengeStanding {
        flag_solve_counts: flag_solve_counts(&by_team),
        ..Default::default()
    };

    for (team_id, flags) in &by_team {
        let mut score = ChallengeScore {
            solved_flags: flags.len(),
            total_flags,
            completed: flags.len() == total_flags,
            ..Default::default()
        };
        let mut awards = Vec::with_capacity(flags.len());

        for flag in &challenge.flags {
            let Some(solve) = flags.get(&flag.id) else {
                continue;
            };
            let is_first = flag_first_bloods.get(&flag.id) == Some(team_id);
            let fb_points = if is_first { flag.first_blood_bytes } else { 0 };

            score.points += flag.bytes + fb_points;
            score.first_blood_points += fb_points;
            score.first_bloods += usize::from(is_first);
            score.flags.insert(
                flag.id,
                FlagScore {
                    solved_at: solve.at,
                    user_id: solve.user_id,
                    points: flag.bytes + fb_points,
                    first_blood: is_first,
                },
            );
            awards.push(Award {
                row_id: solve.row_id,
                user_id: solve.user_id,
                challenge_id: challenge.id,
                flag_id: Some(flag.id),
                points: flag.bytes,
                first_blood: is_first,
                first_blood_points: fb_points,
                at: solve.at,
            });
        }

        if score.completed {
            if let Some(last) = flags.values().max_by_key(|s| s.key()) {
                score.completed_at = Some(last.at);
                standing.solvers.push(Solver {
                    team_id: *team_id,
                    user_id: last.user_id,
                    solved_at: last.at,
                    row_id: last.row_id,
                    first_blood: false,
                });
            }
        }

        let team = standings.team_mut(*team_id);
        team.challenges.insert(challenge.id, score);
        team.awards.extend(awards);
    }

    standing.flag_first_bloods = flag_first_bloods;
    sort_solvers(&mut standing.solvers);
    standing
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{ChallengeSubmission, Flag, FlagSubmission};
    use chrono::{Duration, TimeZone};
    use rand::seq::SliceRandom;

    pub(crate) fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn flag(id: FlagId, challenge_id: ChallengeId, bytes: i64, fb: i64) -> Flag {
        Flag {
            id,
            challenge_id,
            name: format!("flag {}", id),
            description: String::new(),
            flag: format!("CTF{{{}}}", id),
            bytes,
            first_blood_bytes: fb,
            order_index: id as i32,
            attempts: 0,
        }
    }

    fn challenge(id: ChallengeId, flag_type: FlagType, bytes: i64, fb: i64, flags: Vec<Flag>) -> Challenge {
        Challenge {
            id,
            event_id: 1,
            name: format!("challenge {}", id),
            category: "misc".into(),
            description: String::new(),
            flag_type,
            flag: (flag_type == FlagType::Single).then(|| "CTF{single}".to_string()),
            bytes,
            first_blood_bytes: fb,
            attempts: 0,
            flags,
        }
    }

    fn solved(id: i64, challenge_id: ChallengeId, user_id: UserId, secs: i64) -> SubmissionRecord {
        SubmissionRecord::Challenge(ChallengeSubmission {
            id,
            challenge_id,
            user_id,
            team_id: 0,
            submission: "CTF{single}".into(),
            solved: true,
            attempts: 1,
            solved_at: Some(at(secs)),
            ip: None,
            created_at: at(secs),
        })
    }

    fn flag_solved(id: i64, challenge_id: ChallengeId, flag_id: FlagId, user_id: UserId, secs: i64) -> SubmissionRecord {
        SubmissionRecord::Flag(FlagSubmission {
            id,
            flag_id,
            challenge_id,
            user_id,
            team_id: 0,
            submission: format!("CTF{{{}}}", flag_id),
            solved: true,
            attempts: 1,
            solved_at: Some(at(secs)),
            ip: None,
            created_at: at(secs),
        })
    }

    fn failed(id: i64, challenge_id: ChallengeId, user_id: UserId, secs: i64) -> SubmissionRecord {
        SubmissionRecord::Challenge(ChallengeSubmission {
            id,
            challenge_id,
            user_id,
            team_id: 0,
            submission: "nope".into(),
            solved: false,
            attempts: 1,
            solved_at: None,
            ip: None,
            created_at: at(secs),
        })
    }

    fn roster(pairs: &[(UserId, TeamId)]) -> HashMap<UserId, TeamId> {
        pairs.iter().copied().collect()
    }

    fn run(challenges: &[Challenge], roster: &HashMap<UserId, TeamId>, ledger: &[SubmissionRecord], cutoff: i64) -> Standings {
        compute(&ScoringInput {
            challenges,
            roster,
            ledger,
            cutoff: at(cutoff),
        })
    }

    #[test]
    fn test_single_first_solver_gets_bonus() {
        let challenges = [challenge(1, FlagType::Single, 100, 50, vec![])];
        let roster = roster(&[(1, 10), (2, 10), (3, 20)]);
        let ledger = [
            failed(1, 1, 3, 5),
            solved(2, 1, 1, 10),
            solved(3, 1, 3, 12),
        ];

        let standings = run(&challenges, &roster, &ledger, 100);
        let alpha = standings.team(10).unwrap();
        let beta = standings.team(20).unwrap();

        assert_eq!(alpha.points, 150);
        assert_eq!(alpha.first_blood_count, 1);
        assert_eq!(alpha.awards[0].user_id, 1);
        assert_eq!(beta.points, 100);
        assert_eq!(beta.first_blood_count, 0);
        assert_eq!(beta.last_solve_at, Some(at(12)));
        assert_eq!(standings.challenges[&1].first_blood, Some(10));
        assert_eq!(standings.challenges[&1].solvers.len(), 2);
    }

    #[test]
    fn test_first_blood_tie_breaks_on_insertion_order() {
        let challenges = [challenge(1, FlagType::Single, 100, 50, vec![])];
        let roster = roster(&[(1, 10), (2, 20)]);
        let ledger = [solved(8, 1, 2, 30), solved(7, 1, 1, 30)];

        let standings = run(&challenges, &roster, &ledger, 100);
        assert_eq!(standings.challenges[&1].first_blood, Some(10));
        assert_eq!(standings.team(10).unwrap().points, 150);
        assert_eq!(standings.team(20).unwrap().points, 100);
    }

    #[test]
    fn test_teamless_first_solver_denies_first_blood() {
        let challenges = [challenge(1, FlagType::Single, 100, 50, vec![])];
        let roster = roster(&[(2, 20)]);
        let ledger = [solved(1, 1, 99, 1), solved(2, 1, 2, 2)];

        let standings = run(&challenges, &roster, &ledger, 100);
        assert_eq!(standings.challenges[&1].first_blood, None);
        assert_eq!(standings.team(20).unwrap().points, 100);
    }

    #[test]
    fn test_multiple_all_first_blood_goes_to_first_completion() {
        let challenges = [challenge(
            1,
            FlagType::MultipleAll,
            300,
            150,
            vec![flag(11, 1, 0, 0), flag(12, 1, 0, 0)],
        )];
        // Beta: users 1, 2. Gamma: users 3, 4.
        let roster = roster(&[(1, 20), (2, 20), (3, 30), (4, 30)]);
        let ledger = [
            flag_solved(1, 1, 11, 1, 3),
            flag_solved(2, 1, 12, 3, 5),
            flag_solved(3, 1, 12, 2, 8),
            flag_solved(4, 1, 11, 4, 20),
        ];

        let standings = run(&challenges, &roster, &ledger, 100);
        let beta = standings.team(20).unwrap();
        let gamma = standings.team(30).unwrap();

        assert_eq!(beta.points, 450);
        assert_eq!(gamma.points, 300);
        assert_eq!(beta.challenges[&1].completed_at, Some(at(8)));
        // Completing member takes the points
        assert_eq!(beta.awards.len(), 1);
        assert_eq!(beta.awards[0].user_id, 2);
        assert_eq!(gamma.awards[0].user_id, 4);

        let standing = &standings.challenges[&1];
        assert_eq!(standing.first_blood, Some(20));
        assert_eq!(
            standing.solvers.iter().map(|s| s.team_id).collect::<Vec<_>>(),
            vec![20, 30]
        );
    }

    #[test]
    fn test_multiple_all_partial_earns_nothing() {
        let challenges = [challenge(
            1,
            FlagType::MultipleAll,
            300,
            150,
            vec![flag(11, 1, 40, 10), flag(12, 1, 40, 10), flag(13, 1, 40, 10)],
        )];
        let roster = roster(&[(1, 10), (2, 10)]);
        let ledger = [flag_solved(1, 1, 11, 1, 1), flag_solved(2, 1, 13, 2, 2)];

        let standings = run(&challenges, &roster, &ledger, 100);
        let team = standings.team(10).unwrap();
        let score = &team.challenges[&1];

        assert_eq!(team.points, 0);
        assert_eq!(team.solved_count, 0);
        assert!(!score.completed);
        assert_eq!(score.solved_flags, 2);
        assert_eq!(score.progress(), 66);
        assert!(team.awards.is_empty());
        assert!(team.last_solve_at.is_none());
        assert_eq!(standings.challenges[&1].first_blood, None);
    }

    #[test]
    fn test_multiple_individual_sums_flag_bytes() {
        let challenges = [challenge(
            1,
            FlagType::MultipleIndividual,
            1000,
            500,
            vec![flag(11, 1, 100, 20), flag(12, 1, 200, 40)],
        )];
        let roster = roster(&[(1, 10), (2, 20)]);
        let ledger = [
            flag_solved(1, 1, 12, 2, 1),
            flag_solved(2, 1, 11, 1, 2),
            flag_solved(3, 1, 12, 1, 3),
        ];

        let standings = run(&challenges, &roster, &ledger, 100);
        let alpha = standings.team(10).unwrap();
        let beta = standings.team(20).unwrap();

        // Flag 11 with its first blood, flag 12 without
        assert_eq!(alpha.points, 100 + 20 + 200);
        assert_eq!(alpha.first_blood_count, 1);
        assert_eq!(alpha.solved_count, 1);
        assert_eq!(beta.points, 200 + 40);
        assert_eq!(beta.first_blood_count, 1);
        assert_eq!(beta.solved_count, 0);

        let standing = &standings.challenges[&1];
        assert_eq!(standing.first_blood, None);
        assert_eq!(standing.flag_first_bloods[&11], 10);
        assert_eq!(standing.flag_first_bloods[&12], 20);
        assert_eq!(standing.flag_solve_counts[&12], 2);
        assert_eq!(standing.solvers.len(), 1);
    }

    #[test]
    fn test_cutoff_hides_later_solves() {
        let challenges = [
            challenge(1, FlagType::Single, 100, 50, vec![]),
            challenge(2, FlagType::Single, 200, 0, vec![]),
        ];
        let roster = roster(&[(1, 10), (2, 20)]);
        let mut ledger = vec![solved(1, 1, 1, 10), solved(2, 2, 2, 40)];

        let frozen = run(&challenges, &roster, &ledger, 30);
        assert_eq!(frozen.team(10).unwrap().points, 150);
        assert!(frozen.team(20).is_none());

        // Later activity never changes the board at the same cutoff
        ledger.push(solved(3, 1, 2, 45));
        ledger.push(solved(4, 2, 1, 50));
        assert_eq!(run(&challenges, &roster, &ledger, 30), frozen);

        let live = run(&challenges, &roster, &ledger, 100);
        assert_eq!(live.team(10).unwrap().points, 350);
        assert_eq!(live.team(20).unwrap().points, 300);
    }

    #[test]
    fn test_ledger_order_does_not_matter() {
        let challenges = [
            challenge(1, FlagType::Single, 100, 50, vec![]),
            challenge(
                2,
                FlagType::MultipleAll,
                300,
                150,
                vec![flag(21, 2, 0, 0), flag(22, 2, 0, 0)],
            ),
            challenge(
                3,
                FlagType::MultipleIndividual,
                0,
                0,
                vec![flag(31, 3, 10, 5), flag(32, 3, 20, 5)],
            ),
        ];
        let roster = roster(&[(1, 10), (2, 10), (3, 20), (4, 30)]);
        let mut ledger = vec![
            solved(1, 1, 3, 5),
            solved(2, 1, 1, 5),
            flag_solved(1, 2, 21, 2, 7),
            flag_solved(2, 2, 22, 3, 7),
            flag_solved(3, 2, 22, 1, 9),
            flag_solved(4, 2, 21, 3, 9),
            flag_solved(5, 3, 31, 4, 2),
            flag_solved(6, 3, 31, 2, 2),
            flag_solved(7, 3, 32, 4, 3),
            failed(3, 1, 4, 1),
        ];

        let expected = run(&challenges, &roster, &ledger, 100);
        let mut rng = rand::thread_rng();
        for _ in 0..20 {
            ledger.shuffle(&mut rng);
            assert_eq!(run(&challenges, &roster, &ledger, 100), expected);
        }

        // Same instant: row 1 (user 3) was inserted first
        assert_eq!(expected.challenges[&1].first_blood, Some(20));
        // Both teams complete at 9; team 10's completing row has id 3, team 20's id 4
        assert_eq!(expected.challenges[&2].first_blood, Some(10));
    }

    #[test]
    fn test_rows_for_unknown_flags_are_ignored() {
        let challenges = [challenge(
            1,
            FlagType::MultipleAll,
            300,
            0,
            vec![flag(11, 1, 0, 0)],
        )];
        let roster = roster(&[(1, 10)]);
        let ledger = [flag_solved(1, 1, 99, 1, 1), solved(2, 1, 1, 2)];

        let standings = run(&challenges, &roster, &ledger, 100);
        assert!(standings.team(10).is_none());
        assert!(standings.challenges[&1].solvers.is_empty());
    }
}
