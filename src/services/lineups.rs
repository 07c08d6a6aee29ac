use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::models::{Player, PlayerPosition, PlayerStatus};
use crate::store::{HistoryStore, StoreError};
use crate::utils::mean;

/// How many of a player's own most recent matches feed the minutes ranking.
const MINUTES_LOOKBACK: usize = 3;
/// How many of a player's own most recent matches feed the xG average.
const XG_LOOKBACK: usize = 5;
const STARTING_XI: usize = 11;

/// Which starting eleven the feature engine should resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineupMode {
    /// Training mode: the eleven that actually started the anchor match.
    Actual,
    /// Live mode: a stored official/probable lineup, or an estimate.
    Probable,
}

/// Resolve the starting eleven for a team ahead of (or during replay of) a
/// match. Every fallback lands on the minutes-based estimate, so the
/// pipeline stays total even with no lineup data at all.
pub fn resolve_starters<S: HistoryStore>(
    store: &S,
    team_id: &str,
    anchor_match_id: Option<&str>,
    as_of: DateTime<Utc>,
    mode: LineupMode,
) -> Result<Vec<String>, StoreError> {
    if let Some(match_id) = anchor_match_id {
        match mode {
            LineupMode::Actual => {
                let starters: Vec<String> = store
                    .player_match_stats(match_id, team_id)?
                    .into_iter()
                    .filter(|s| s.is_starter)
                    .map(|s| s.player_id)
                    .collect();
                if !starters.is_empty() {
                    return Ok(starters);
                }
            }
            LineupMode::Probable => {
                if let Some(lineup) = store.lineup(match_id, team_id)? {
                    if !lineup.starting_xi.is_empty() {
                        return Ok(lineup.starting_xi);
                    }
                }
            }
        }
    }
    estimate_starters(store, team_id, anchor_match_id, as_of)
}

/// Estimate a probable eleven from recent minutes played, constrained to a
/// minimum positional skeleton (1 GK, 3 DF, 3 MF, 1 FW) and topped up to
/// eleven by remaining minutes rank.
pub fn estimate_starters<S: HistoryStore>(
    store: &S,
    team_id: &str,
    anchor_match_id: Option<&str>,
    as_of: DateTime<Utc>,
) -> Result<Vec<String>, StoreError> {
    let squad = store.squad(team_id)?;

    let mut unavailable: HashSet<String> = squad
        .iter()
        .filter(|p| p.status != PlayerStatus::Available)
        .map(|p| p.id.clone())
        .collect();
    if let Some(match_id) = anchor_match_id {
        unavailable.extend(store.absentees(match_id, team_id)?);
    }

    let mut ranked: Vec<(Player, u32)> = Vec::new();
    for player in squad {
        if unavailable.contains(&player.id) {
            continue;
        }
        let minutes: u32 = store
            .appearances(&player.id, as_of, MINUTES_LOOKBACK)?
            .iter()
            .map(|s| s.minutes)
            .sum();
        ranked.push((player, minutes));
    }
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut eleven: Vec<String> = Vec::with_capacity(STARTING_XI);
    let skeleton = [
        (PlayerPosition::Goalkeeper, 1usize),
        (PlayerPosition::Defender, 3),
        (PlayerPosition::Midfielder, 3),
        (PlayerPosition::Forward, 1),
    ];
    for (position, slots) in skeleton {
        for (player, _) in ranked
            .iter()
            .filter(|(p, _)| p.position == position)
            .take(slots)
        {
            eleven.push(player.id.clone());
        }
    }
    for (player, _) in &ranked {
        if eleven.len() >= STARTING_XI {
            break;
        }
        if !eleven.contains(&player.id) {
            eleven.push(player.id.clone());
        }
    }

    Ok(eleven)
}

/// Average expected goals across the given players, each over their own
/// last five appearances before the cutoff. Players with no recorded
/// appearances contribute nothing; returns 0.0 with no data at all.
pub fn starters_average_xg<S: HistoryStore>(
    store: &S,
    starters: &[String],
    as_of: DateTime<Utc>,
) -> Result<f64, StoreError> {
    let mut per_player: Vec<f64> = Vec::new();
    for player_id in starters {
        let appearances = store.appearances(player_id, as_of, XG_LOOKBACK)?;
        if appearances.is_empty() {
            continue;
        }
        let xgs: Vec<f64> = appearances.iter().map(|s| s.xg).collect();
        per_player.push(mean(&xgs));
    }
    Ok(mean(&per_player))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlayerMatchStat;
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, day, 18, 0, 0).unwrap()
    }

    fn player(id: &str, position: PlayerPosition, status: PlayerStatus) -> Player {
        Player {
            id: id.to_string(),
            name: id.to_uppercase(),
            team_id: "t1".to_string(),
            position,
            status,
        }
    }

    fn appearance(player_id: &str, day: u32, minutes: u32, xg: f64) -> PlayerMatchStat {
        PlayerMatchStat {
            player_id: player_id.to_string(),
            match_id: format!("m{}", day),
            team_id: "t1".to_string(),
            date_time: date(day),
            position: PlayerPosition::Midfielder,
            is_starter: true,
            minutes,
            goals: 0,
            xg,
        }
    }

    fn squad_store() -> MemoryStore {
        let mut players = vec![
            player("gk1", PlayerPosition::Goalkeeper, PlayerStatus::Available),
            player("gk2", PlayerPosition::Goalkeeper, PlayerStatus::Available),
        ];
        for i in 1..=5 {
            players.push(player(
                &format!("df{}", i),
                PlayerPosition::Defender,
                PlayerStatus::Available,
            ));
            players.push(player(
                &format!("mf{}", i),
                PlayerPosition::Midfielder,
                PlayerStatus::Available,
            ));
        }
        for i in 1..=3 {
            players.push(player(
                &format!("fw{}", i),
                PlayerPosition::Forward,
                PlayerStatus::Available,
            ));
        }
        let mut player_stats = Vec::new();
        for p in &players {
            // every player has minutes; gk1 and df1..3 etc. rank highest
            let base = match p.id.as_str() {
                "gk1" => 90,
                "gk2" => 10,
                id if id.ends_with('1') || id.ends_with('2') || id.ends_with('3') => 80,
                _ => 30,
            };
            for day in 1..=3 {
                player_stats.push(appearance(&p.id, day, base, 0.1));
            }
        }
        MemoryStore {
            players,
            player_stats,
            ..Default::default()
        }
    }

    #[test]
    fn test_estimate_fills_skeleton_and_eleven() {
        let store = squad_store();
        let eleven = estimate_starters(&store, "t1", None, date(10)).unwrap();
        assert_eq!(eleven.len(), 11);
        assert!(eleven.contains(&"gk1".to_string()));
        assert!(!eleven.contains(&"gk2".to_string()));
        let defenders = eleven.iter().filter(|id| id.starts_with("df")).count();
        let midfielders = eleven.iter().filter(|id| id.starts_with("mf")).count();
        let forwards = eleven.iter().filter(|id| id.starts_with("fw")).count();
        assert!(defenders >= 3);
        assert!(midfielders >= 3);
        assert!(forwards >= 1);
    }

    #[test]
    fn test_estimate_excludes_unavailable_players() {
        let mut store = squad_store();
        store
            .players
            .iter_mut()
            .find(|p| p.id == "gk1")
            .unwrap()
            .status = PlayerStatus::Injured;
        let eleven = estimate_starters(&store, "t1", None, date(10)).unwrap();
        assert!(!eleven.contains(&"gk1".to_string()));
        assert!(eleven.contains(&"gk2".to_string()));
    }

    #[test]
    fn test_starters_average_xg_ignores_players_without_data() {
        let mut store = MemoryStore::default();
        store.player_stats = vec![
            appearance("p1", 1, 90, 0.4),
            appearance("p1", 2, 90, 0.2),
            appearance("p2", 1, 90, 0.6),
        ];
        let starters = vec!["p1".to_string(), "p2".to_string(), "ghost".to_string()];
        let avg = starters_average_xg(&store, &starters, date(10)).unwrap();
        // p1 averages 0.3, p2 averages 0.6; the unknown player is skipped
        assert!((avg - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_starters_average_xg_defaults_to_zero() {
        let store = MemoryStore::default();
        let avg = starters_average_xg(&store, &["p1".to_string()], date(10)).unwrap();
        assert_eq!(avg, 0.0);
    }

    #[test]
    fn test_resolve_actual_mode_reads_fielded_starters() {
        let mut store = squad_store();
        store.player_stats.push(PlayerMatchStat {
            player_id: "fw1".to_string(),
            match_id: "anchor".to_string(),
            team_id: "t1".to_string(),
            date_time: date(5),
            position: PlayerPosition::Forward,
            is_starter: true,
            minutes: 90,
            goals: 1,
            xg: 0.8,
        });
        let starters =
            resolve_starters(&store, "t1", Some("anchor"), date(5), LineupMode::Actual).unwrap();
        assert_eq!(starters, vec!["fw1".to_string()]);
    }

    #[test]
    fn test_resolve_probable_mode_falls_back_to_estimate() {
        let store = squad_store();
        // no stored lineup for this match: estimation kicks in
        let starters =
            resolve_starters(&store, "t1", Some("future"), date(10), LineupMode::Probable)
                .unwrap();
        assert_eq!(starters.len(), 11);
    }
}
