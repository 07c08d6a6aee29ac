use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{
    Absence, ClosingOdds, MatchRecord, MatchResult, MatchStatus, Player, PlayerMatchStat,
    PlayerPosition, PlayerStatus, Rivalry, Team, TeamMatchStats,
};
use crate::store::MemoryStore;

const TEAM_NAMES: [&str; 10] = [
    "Internazionale",
    "AC Milan",
    "Juventus",
    "Napoli",
    "Roma",
    "Lazio",
    "Atalanta",
    "Fiorentina",
    "Torino",
    "Genoa",
];

const SEASON: &str = "2025/26";
const ROUNDS: u32 = 12;
/// The final rounds stay unplayed so the prediction path has fixtures.
const SCHEDULED_ROUNDS: u32 = 2;

/// Build a self-consistent synthetic season for demos and integration
/// tests: ten teams, a round-robin schedule with the last rounds still
/// unplayed, per-player match lines, two derbies, and closing odds for the
/// open fixtures. Deterministic for a given seed.
pub fn demo_store(seed: u64) -> MemoryStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = MemoryStore::default();

    // latent strengths drive results so form signals are learnable
    let strengths: Vec<f64> = (0..TEAM_NAMES.len())
        .map(|i| 1.9 - 0.14 * i as f64)
        .collect();

    for (i, name) in TEAM_NAMES.iter().enumerate() {
        store.teams.push(Team {
            id: format!("t{}", i + 1),
            name: name.to_string(),
            short_name: Some(name[..3].to_uppercase()),
            league: "Serie A".to_string(),
        });
        seed_squad(&mut store, i + 1);
    }

    store.rivalries = vec![
        Rivalry {
            team_a: "Internazionale".to_string(),
            team_b: "AC Milan".to_string(),
            intensity: 10,
            name: "Derby della Madonnina".to_string(),
        },
        Rivalry {
            team_a: "Roma".to_string(),
            team_b: "Lazio".to_string(),
            intensity: 10,
            name: "Derby della Capitale".to_string(),
        },
    ];

    let kickoff_base = Utc.with_ymd_and_hms(2025, 8, 24, 18, 0, 0).unwrap();
    let n = TEAM_NAMES.len();
    let mut rotation: Vec<usize> = (1..n).collect();

    for round in 0..ROUNDS {
        let kickoff = kickoff_base + Duration::weeks(round as i64);
        let mut pairs: Vec<(usize, usize)> = vec![(0, rotation[n - 2])];
        for k in 0..(n / 2 - 1) {
            pairs.push((rotation[k], rotation[n - 3 - k]));
        }
        rotation.rotate_left(1);

        for (slot, (a, b)) in pairs.into_iter().enumerate() {
            let (home, away) = if round % 2 == 0 { (a, b) } else { (b, a) };
            let match_id = format!("r{:02}-m{}", round + 1, slot + 1);
            let date_time = kickoff + Duration::hours(slot as i64);

            if round < ROUNDS - SCHEDULED_ROUNDS {
                let result = play_match(&mut rng, strengths[home], strengths[away]);
                seed_player_lines(&mut store, &match_id, home + 1, date_time, &mut rng);
                seed_player_lines(&mut store, &match_id, away + 1, date_time, &mut rng);
                store.matches.push(MatchRecord {
                    id: match_id,
                    season: SEASON.to_string(),
                    round: round + 1,
                    home_team_id: format!("t{}", home + 1),
                    away_team_id: format!("t{}", away + 1),
                    date_time,
                    status: MatchStatus::Finished(result),
                });
            } else {
                store.odds.insert(
                    match_id.clone(),
                    closing_odds(strengths[home], strengths[away]),
                );
                store.matches.push(MatchRecord {
                    id: match_id,
                    season: SEASON.to_string(),
                    round: round + 1,
                    home_team_id: format!("t{}", home + 1),
                    away_team_id: format!("t{}", away + 1),
                    date_time,
                    status: MatchStatus::Scheduled,
                });
            }
        }
    }

    // one long-term absentee, so lineup estimation has something to dodge
    if let Some(open_match) = store
        .matches
        .iter()
        .find(|m| matches!(m.status, MatchStatus::Scheduled))
    {
        store.absences.push(Absence {
            match_id: open_match.id.clone(),
            team_id: open_match.home_team_id.clone(),
            player_id: format!("{}-fw1", open_match.home_team_id),
            reason: "Hamstring strain".to_string(),
        });
    }

    tracing::info!(
        "seeded demo dataset: {} teams, {} matches, {} player lines",
        store.teams.len(),
        store.matches.len(),
        store.player_stats.len()
    );
    store
}

fn seed_squad(store: &mut MemoryStore, team_index: usize) {
    let team_id = format!("t{}", team_index);
    let groups = [
        (PlayerPosition::Goalkeeper, "gk", 2usize),
        (PlayerPosition::Defender, "df", 6),
        (PlayerPosition::Midfielder, "mf", 6),
        (PlayerPosition::Forward, "fw", 4),
    ];
    for (position, tag, count) in groups {
        for j in 1..=count {
            store.players.push(Player {
                id: format!("{}-{}{}", team_id, tag, j),
                name: format!("{} {}{}", TEAM_NAMES[team_index - 1], tag.to_uppercase(), j),
                team_id: team_id.clone(),
                position,
                status: PlayerStatus::Available,
            });
        }
    }
}

/// Inverse-CDF sample from a Poisson-shaped goal distribution.
fn sample_goals(rng: &mut StdRng, rate: f64) -> u32 {
    let mut u: f64 = rng.gen();
    let mut k = 0u32;
    let mut p = (-rate).exp();
    loop {
        if u <= p || k >= 7 {
            return k;
        }
        u -= p;
        k += 1;
        p *= rate / k as f64;
    }
}

fn play_match(rng: &mut StdRng, home_strength: f64, away_strength: f64) -> MatchResult {
    let home_rate = (home_strength * 0.62 + (2.6 - away_strength) * 0.38) * 1.15;
    let away_rate = (away_strength * 0.62 + (2.6 - home_strength) * 0.38) * 0.9;
    let home_goals = sample_goals(rng, home_rate);
    let away_goals = sample_goals(rng, away_rate);

    let stats = |goals: u32, rate: f64, rng: &mut StdRng| {
        let shots = goals as f64 * 2.0 + rng.gen_range(6.0..14.0);
        TeamMatchStats {
            shots: Some(shots.round()),
            shots_on_target: Some((shots * rng.gen_range(0.3..0.5)).round()),
            corners: Some(rng.gen_range(2.0f64..9.0).round()),
            fouls: Some(rng.gen_range(8.0f64..17.0).round()),
            yellow_cards: Some(rng.gen_range(0.0f64..5.0).round()),
            offsides: Some(rng.gen_range(0.0f64..5.0).round()),
            possession: Some((50.0 + rng.gen_range(-12.0f64..12.0)).round()),
            xg: Some((rate + rng.gen_range(-0.4..0.4)).max(0.1)),
        }
    };
    let home_stats = stats(home_goals, home_rate, rng);
    let away_stats = stats(away_goals, away_rate, rng);
    MatchResult::new(home_goals, away_goals, home_stats, away_stats)
}

fn seed_player_lines(
    store: &mut MemoryStore,
    match_id: &str,
    team_index: usize,
    date_time: DateTime<Utc>,
    rng: &mut StdRng,
) {
    let team_id = format!("t{}", team_index);
    // a settled 4-4-2: gk1, df1-4, mf1-4, fw1-2 start every week
    let starters = [
        "gk1", "df1", "df2", "df3", "df4", "mf1", "mf2", "mf3", "mf4", "fw1", "fw2",
    ];
    for tag in starters {
        let position = match &tag[..2] {
            "gk" => PlayerPosition::Goalkeeper,
            "df" => PlayerPosition::Defender,
            "mf" => PlayerPosition::Midfielder,
            _ => PlayerPosition::Forward,
        };
        let xg = match position {
            PlayerPosition::Forward => rng.gen_range(0.1..0.6),
            PlayerPosition::Midfielder => rng.gen_range(0.0..0.25),
            PlayerPosition::Defender => rng.gen_range(0.0..0.08),
            PlayerPosition::Goalkeeper => 0.0,
        };
        store.player_stats.push(PlayerMatchStat {
            player_id: format!("{}-{}", team_id, tag),
            match_id: match_id.to_string(),
            team_id: team_id.clone(),
            date_time,
            position,
            is_starter: true,
            minutes: rng.gen_range(70..=90),
            goals: 0,
            xg,
        });
    }
}

fn closing_odds(home_strength: f64, away_strength: f64) -> ClosingOdds {
    let edge = home_strength - away_strength;
    let home_prob = (0.42 + edge * 0.16).clamp(0.1, 0.8);
    let draw_prob = 0.26;
    let away_prob = (1.0 - home_prob - draw_prob).max(0.05);
    // a flat 5% bookmaker margin on each outcome
    ClosingOdds {
        home: 1.0 / (home_prob * 1.05),
        draw: 1.0 / (draw_prob * 1.05),
        away: 1.0 / (away_prob * 1.05),
    }
}
