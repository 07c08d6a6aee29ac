use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::models::ForecastRow;
use crate::services::features::{FeatureEngine, FeatureRequest};
use crate::services::lineups::LineupMode;
use crate::store::{DerbyRegistry, HistoryStore, StoreError};

/// One supervised-learning example: both teams' pre-match features plus the
/// realized targets. Column names are the training contract shared with the
/// model-fitting side.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRow {
    pub match_id: String,
    pub date: DateTime<Utc>,
    pub home_team: String,
    pub away_team: String,

    pub home_last_5_pts: u32,
    pub home_rest_days: i64,
    pub home_elo: f64,
    pub home_avg_xg: f64,
    pub home_avg_gf: f64,
    pub home_avg_ga: f64,
    pub home_xg_ratio: f64,
    pub home_eff_att: f64,
    pub home_eff_def: f64,
    pub home_volatility: f64,
    pub home_is_derby: u8,
    pub home_pressure: f64,
    pub home_starters_xg: f64,

    pub away_last_5_pts: u32,
    pub away_rest_days: i64,
    pub away_elo: f64,
    pub away_avg_xg: f64,
    pub away_avg_gf: f64,
    pub away_avg_ga: f64,
    pub away_xg_ratio: f64,
    pub away_eff_att: f64,
    pub away_eff_def: f64,
    pub away_volatility: f64,
    pub away_is_derby: u8,
    pub away_pressure: f64,
    pub away_starters_xg: f64,

    pub target_home_goals: u32,
    pub target_away_goals: u32,
    pub target_home_shots: Option<f64>,
    pub target_away_shots: Option<f64>,
    pub target_home_shots_on_target: Option<f64>,
    pub target_away_shots_on_target: Option<f64>,
    pub target_home_corners: Option<f64>,
    pub target_away_corners: Option<f64>,
    pub target_home_fouls: Option<f64>,
    pub target_away_fouls: Option<f64>,
    pub target_home_cards: Option<f64>,
    pub target_away_cards: Option<f64>,
    pub target_home_offsides: Option<f64>,
    pub target_away_offsides: Option<f64>,
    pub target_home_possession: Option<f64>,
    pub target_away_possession: Option<f64>,
}

fn side_columns(row: &ForecastRow) -> (u32, i64, f64, f64, f64, f64, f64, f64, f64, f64, u8, f64, f64) {
    (
        row.points,
        row.rest_days,
        row.elo,
        row.avg_xg,
        row.avg_gf,
        row.avg_ga,
        row.xg_ratio,
        row.eff_att,
        row.eff_def,
        row.volatility,
        row.is_derby,
        row.pressure_index,
        row.starters_xg,
    )
}

/// Build one training row per finished match of a season, chronologically.
/// Features are computed in training mode (actual lineups) by the same
/// engine that serves live predictions.
pub fn build_rows<S: HistoryStore>(
    store: &S,
    engine: &FeatureEngine,
    derbies: &DerbyRegistry,
    season: &str,
) -> Result<Vec<TrainingRow>, StoreError> {
    let mut rows = Vec::new();

    for m in store.finished_matches()? {
        if m.season != season {
            continue;
        }
        let Some(result) = m.result() else { continue };
        let home_team = store.team(&m.home_team_id)?;
        let away_team = store.team(&m.away_team_id)?;

        let mut request = FeatureRequest {
            team: &home_team,
            home_team: &home_team,
            away_team: &away_team,
            season: &m.season,
            as_of: m.date_time,
            lineup_mode: LineupMode::Actual,
            anchor_match_id: Some(&m.id),
        };
        let home_row = engine.compute(store, derbies, &request)?;
        request.team = &away_team;
        let away_row = engine.compute(store, derbies, &request)?;

        let (h_pts, h_rest, h_elo, h_xg, h_gf, h_ga, h_ratio, h_att, h_def, h_vol, h_derby, h_press, h_sxg) =
            side_columns(&home_row);
        let (a_pts, a_rest, a_elo, a_xg, a_gf, a_ga, a_ratio, a_att, a_def, a_vol, a_derby, a_press, a_sxg) =
            side_columns(&away_row);

        rows.push(TrainingRow {
            match_id: m.id.clone(),
            date: m.date_time,
            home_team: home_team.name.clone(),
            away_team: away_team.name.clone(),
            home_last_5_pts: h_pts,
            home_rest_days: h_rest,
            home_elo: h_elo,
            home_avg_xg: h_xg,
            home_avg_gf: h_gf,
            home_avg_ga: h_ga,
            home_xg_ratio: h_ratio,
            home_eff_att: h_att,
            home_eff_def: h_def,
            home_volatility: h_vol,
            home_is_derby: h_derby,
            home_pressure: h_press,
            home_starters_xg: h_sxg,
            away_last_5_pts: a_pts,
            away_rest_days: a_rest,
            away_elo: a_elo,
            away_avg_xg: a_xg,
            away_avg_gf: a_gf,
            away_avg_ga: a_ga,
            away_xg_ratio: a_ratio,
            away_eff_att: a_att,
            away_eff_def: a_def,
            away_volatility: a_vol,
            away_is_derby: a_derby,
            away_pressure: a_press,
            away_starters_xg: a_sxg,
            target_home_goals: result.home_goals,
            target_away_goals: result.away_goals,
            target_home_shots: result.home_stats.shots,
            target_away_shots: result.away_stats.shots,
            target_home_shots_on_target: result.home_stats.shots_on_target,
            target_away_shots_on_target: result.away_stats.shots_on_target,
            target_home_corners: result.home_stats.corners,
            target_away_corners: result.away_stats.corners,
            target_home_fouls: result.home_stats.fouls,
            target_away_fouls: result.away_stats.fouls,
            target_home_cards: result.home_stats.yellow_cards,
            target_away_cards: result.away_stats.yellow_cards,
            target_home_offsides: result.home_stats.offsides,
            target_away_offsides: result.away_stats.offsides,
            target_home_possession: result.home_stats.possession,
            target_away_possession: result.away_stats.possession,
        });
    }

    tracing::info!("training dataset built: {} rows", rows.len());
    Ok(rows)
}

/// Write the training rows as CSV with stable headers.
pub fn export_csv(rows: &[TrainingRow], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchRecord, MatchResult, MatchStatus, Team, TeamMatchStats};
    use crate::store::MemoryStore;
    use chrono::TimeZone;

    fn team(id: &str) -> Team {
        Team {
            id: id.to_string(),
            name: id.to_uppercase(),
            short_name: None,
            league: "Serie A".to_string(),
        }
    }

    fn finished(id: &str, day: u32, home: &str, away: &str) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            season: "2025/26".to_string(),
            round: day,
            home_team_id: home.to_string(),
            away_team_id: away.to_string(),
            date_time: Utc.with_ymd_and_hms(2026, 3, day, 15, 0, 0).unwrap(),
            status: MatchStatus::Finished(MatchResult::new(
                2,
                1,
                TeamMatchStats {
                    corners: Some(6.0),
                    ..Default::default()
                },
                TeamMatchStats::default(),
            )),
        }
    }

    #[test]
    fn test_build_rows_one_per_finished_match() {
        let store = MemoryStore {
            teams: vec![team("t1"), team("t2")],
            matches: vec![
                finished("m1", 1, "t1", "t2"),
                finished("m2", 8, "t2", "t1"),
            ],
            ..Default::default()
        };
        let engine = FeatureEngine::default();
        let rows = build_rows(&store, &engine, &DerbyRegistry::default(), "2025/26").unwrap();
        assert_eq!(rows.len(), 2);
        // the first match has no prior history: default features
        assert_eq!(rows[0].home_last_5_pts, 5);
        assert_eq!(rows[0].target_home_goals, 2);
        assert_eq!(rows[0].target_home_corners, Some(6.0));
        assert_eq!(rows[0].target_away_corners, None);
        // the second match sees the first: home side (t2) lost it
        assert_eq!(rows[1].home_last_5_pts, 0);
        assert_eq!(rows[1].away_last_5_pts, 3);
    }

    #[test]
    fn test_rows_filter_by_season() {
        let mut other = finished("m9", 2, "t1", "t2");
        other.season = "2024/25".to_string();
        let store = MemoryStore {
            teams: vec![team("t1"), team("t2")],
            matches: vec![finished("m1", 1, "t1", "t2"), other],
            ..Default::default()
        };
        let engine = FeatureEngine::default();
        let rows = build_rows(&store, &engine, &DerbyRegistry::default(), "2025/26").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].match_id, "m1");
    }
}
