use chrono::{DateTime, Utc};

use crate::config::PressureParams;
use crate::models::{FormSnapshot, ForecastRow, MatchRecord, Team, DEFAULT_RATING};
use crate::services::lineups::{self, LineupMode};
use crate::store::{DerbyRegistry, HistoryStore, SnapshotSink, StoreError};
use crate::utils::{mean, sample_std_dev};

/// Recent-match pool fetched per team; wide enough to find venue-specific
/// games inside it.
const POOL_SIZE: usize = 15;
/// Matches actually aggregated into the form metrics.
const WINDOW_SIZE: usize = 5;
/// How many of the window slots are reserved for same-venue matches.
const VENUE_SLOTS: usize = 3;
const H2H_LIMIT: usize = 5;
/// Below this many head-to-head meetings the H2H signal is noise.
const H2H_MIN: usize = 3;
const FORM_WEIGHT: f64 = 0.7;
const H2H_WEIGHT: f64 = 0.3;

/// Everything needed to compute one team's features for one fixture.
#[derive(Debug, Clone)]
pub struct FeatureRequest<'a> {
    /// The team the row describes.
    pub team: &'a Team,
    /// The two sides of the fixture being forecast.
    pub home_team: &'a Team,
    pub away_team: &'a Team,
    pub season: &'a str,
    /// Exclusive upper bound on all historical lookups.
    pub as_of: DateTime<Utc>,
    pub lineup_mode: LineupMode,
    /// The fixture's match id, when it exists in the store (always in
    /// training mode, usually in live mode).
    pub anchor_match_id: Option<&'a str>,
}

struct BaseMetrics {
    points: u32,
    avg_gf: f64,
    avg_ga: f64,
    avg_xg_for: f64,
    xg_ratio: f64,
    eff_att: f64,
    eff_def: f64,
    volatility: f64,
}

/// The canonical feature engine. Both the training sweep and the live
/// prediction path go through `compute`; there is deliberately no second
/// implementation to drift from.
pub struct FeatureEngine {
    pressure: PressureParams,
}

impl Default for FeatureEngine {
    fn default() -> Self {
        Self::new(PressureParams::default())
    }
}

impl FeatureEngine {
    pub fn new(pressure: PressureParams) -> Self {
        FeatureEngine { pressure }
    }

    /// Compute the pre-match feature vector for one team at one instant.
    ///
    /// Every historical comparison is strictly `< as_of`; with no usable
    /// history at all, the documented default vector comes back instead of
    /// an error.
    pub fn compute<S: HistoryStore>(
        &self,
        store: &S,
        derbies: &DerbyRegistry,
        req: &FeatureRequest<'_>,
    ) -> Result<ForecastRow, StoreError> {
        let pool = store.matches_for_team(&req.team.id, req.season, req.as_of, POOL_SIZE)?;
        if pool.is_empty() {
            tracing::debug!(team = %req.team.name, "no history before cutoff, default features");
            return Ok(ForecastRow::default());
        }

        let starters = lineups::resolve_starters(
            store,
            &req.team.id,
            req.anchor_match_id,
            req.as_of,
            req.lineup_mode,
        )?;
        let starters_xg = lineups::starters_average_xg(store, &starters, req.as_of)?;

        // Rest is measured from the absolute latest match, not the weighted
        // window.
        let rest_days = (req.as_of - pool[0].date_time).num_days();
        let elo = store
            .rating_snapshot(&req.team.id, req.as_of)?
            .unwrap_or(DEFAULT_RATING);

        let plays_home = req.team.id == req.home_team.id;
        let window = select_window(&pool, &req.team.id, plays_home);
        let metrics = base_metrics(&window, &req.team.id);

        let sos = sos_factor(store, &window, &req.team.id)?;
        let avg_gf_sos = metrics.avg_gf * sos;
        let avg_xg_sos = metrics.avg_xg_for * sos;
        // Goals conceded against a strong schedule are partly excused; a
        // non-positive factor would flip the sign, so leave them unscaled.
        let avg_ga_sos = if sos > 0.0 {
            metrics.avg_ga / sos
        } else {
            metrics.avg_ga
        };

        let opponent_id = if plays_home {
            &req.away_team.id
        } else {
            &req.home_team.id
        };
        let (avg_gf, avg_ga) = h2h_blend(
            store,
            &req.team.id,
            opponent_id,
            req.as_of,
            avg_gf_sos,
            avg_ga_sos,
        )?;

        let is_derby = derbies.intensity(&req.home_team.name, &req.away_team.name);
        let pressure_index = self.pressure.index(elo, metrics.points);
        let form_sequence = form_sequence(&pool, &req.team.id);

        Ok(ForecastRow {
            points: metrics.points,
            rest_days,
            elo,
            avg_xg: avg_xg_sos,
            avg_gf,
            avg_ga,
            xg_ratio: metrics.xg_ratio,
            eff_att: metrics.eff_att,
            eff_def: metrics.eff_def,
            volatility: metrics.volatility,
            is_derby,
            pressure_index,
            starters_xg,
            form_sequence,
        })
    }

    /// Recompute the form snapshot for every finished match and both of its
    /// teams (training mode: actual lineups). Run after the Elo replay so
    /// rating snapshots are in place.
    pub fn snapshot_all<S: HistoryStore + SnapshotSink>(
        &self,
        store: &mut S,
        derbies: &DerbyRegistry,
    ) -> Result<usize, StoreError> {
        let matches = store.finished_matches()?;
        let mut written = 0usize;

        for m in &matches {
            let home_team = store.team(&m.home_team_id)?;
            let away_team = store.team(&m.away_team_id)?;
            for team in [&home_team, &away_team] {
                let row = self.compute(
                    &*store,
                    derbies,
                    &FeatureRequest {
                        team,
                        home_team: &home_team,
                        away_team: &away_team,
                        season: &m.season,
                        as_of: m.date_time,
                        lineup_mode: LineupMode::Actual,
                        anchor_match_id: Some(&m.id),
                    },
                )?;
                store.record_snapshot(snapshot_from_row(&m.id, &team.id, &row))?;
                written += 1;
            }
        }

        tracing::info!("form snapshots written: {}", written);
        Ok(written)
    }
}

fn snapshot_from_row(match_id: &str, team_id: &str, row: &ForecastRow) -> FormSnapshot {
    FormSnapshot {
        match_id: match_id.to_string(),
        team_id: team_id.to_string(),
        points: row.points,
        rest_days: row.rest_days,
        rating: row.elo,
        avg_xg: row.avg_xg,
        avg_goals_for: row.avg_gf,
        avg_goals_against: row.avg_ga,
        xg_ratio: row.xg_ratio,
        attack_efficiency: row.eff_att,
        defense_efficiency: row.eff_def,
        goal_volatility: row.volatility,
        derby_intensity: row.is_derby,
        pressure_index: row.pressure_index,
        starters_xg: row.starters_xg,
        form_sequence: row.form_sequence.clone(),
    }
}

/// Pick the metric window out of the recent pool: up to three matches at
/// the same venue orientation, topped up with the most recent others. With
/// fewer than five found, fall back to the plain five most recent.
fn select_window<'a>(
    pool: &'a [MatchRecord],
    team_id: &str,
    plays_home: bool,
) -> Vec<&'a MatchRecord> {
    let mut window: Vec<&MatchRecord> = pool
        .iter()
        .filter(|m| (m.home_team_id == team_id) == plays_home)
        .take(VENUE_SLOTS)
        .collect();

    for m in pool {
        if window.len() >= WINDOW_SIZE {
            break;
        }
        if !window.iter().any(|chosen| chosen.id == m.id) {
            window.push(m);
        }
    }

    if window.len() < WINDOW_SIZE {
        return pool.iter().take(WINDOW_SIZE).collect();
    }
    window
}

fn base_metrics(window: &[&MatchRecord], team_id: &str) -> BaseMetrics {
    let mut points = 0u32;
    let mut goals_for: Vec<f64> = Vec::with_capacity(window.len());
    let mut goals_against_sum = 0.0;
    let mut xg_for_sum = 0.0;
    let mut xg_against_sum = 0.0;

    for m in window {
        let Some(outcome) = m.outcome_for(team_id) else { continue };
        points += outcome.points();

        if let Some((gf, ga)) = m.goals_for(team_id) {
            goals_for.push(gf as f64);
            goals_against_sum += ga as f64;
        }
        if let Some(stats) = m.stats_for(team_id) {
            xg_for_sum += stats.xg.unwrap_or(0.0);
        }
        if let Some(opponent) = m.opponent_of(team_id) {
            if let Some(stats) = m.stats_for(opponent) {
                xg_against_sum += stats.xg.unwrap_or(0.0);
            }
        }
    }

    let count = window.len().max(1) as f64;
    let avg_gf = goals_for.iter().sum::<f64>() / count;
    let avg_ga = goals_against_sum / count;
    let avg_xg_for = xg_for_sum / count;
    let avg_xg_against = xg_against_sum / count;

    let xg_volume = xg_for_sum + xg_against_sum;
    let xg_ratio = if xg_volume > 0.0 {
        xg_for_sum / xg_volume
    } else {
        0.5
    };

    BaseMetrics {
        points,
        avg_gf,
        avg_ga,
        avg_xg_for,
        xg_ratio,
        eff_att: avg_gf - avg_xg_for,
        eff_def: avg_xg_against - avg_ga,
        volatility: sample_std_dev(&goals_for),
    }
}

/// Strength-of-schedule factor from the average opponent rating across the
/// window, each taken strictly before that match was played.
fn sos_factor<S: HistoryStore>(
    store: &S,
    window: &[&MatchRecord],
    team_id: &str,
) -> Result<f64, StoreError> {
    let mut sum = 0.0;
    let mut count = 0usize;
    for m in window {
        let Some(opponent) = m.opponent_of(team_id) else { continue };
        let rating = store
            .rating_snapshot(opponent, m.date_time)?
            .unwrap_or(DEFAULT_RATING);
        sum += rating;
        count += 1;
    }
    let avg = if count > 0 {
        sum / count as f64
    } else {
        DEFAULT_RATING
    };
    Ok(1.0 + (avg - DEFAULT_RATING) / DEFAULT_RATING)
}

/// Blend the schedule-adjusted averages with head-to-head history against
/// this opponent, 70/30. Skipped entirely below three prior meetings.
fn h2h_blend<S: HistoryStore>(
    store: &S,
    team_id: &str,
    opponent_id: &str,
    as_of: DateTime<Utc>,
    avg_gf: f64,
    avg_ga: f64,
) -> Result<(f64, f64), StoreError> {
    let meetings = store.h2h_matches(team_id, opponent_id, as_of, H2H_LIMIT)?;
    if meetings.len() < H2H_MIN {
        return Ok((avg_gf, avg_ga));
    }

    let mut gf: Vec<f64> = Vec::with_capacity(meetings.len());
    let mut ga: Vec<f64> = Vec::with_capacity(meetings.len());
    for m in &meetings {
        if let Some((f, a)) = m.goals_for(team_id) {
            gf.push(f as f64);
            ga.push(a as f64);
        }
    }

    Ok((
        avg_gf * FORM_WEIGHT + mean(&gf) * H2H_WEIGHT,
        avg_ga * FORM_WEIGHT + mean(&ga) * H2H_WEIGHT,
    ))
}

/// The display form string: the five most recent matches regardless of
/// venue, oldest to newest.
fn form_sequence(pool: &[MatchRecord], team_id: &str) -> String {
    let mut recent: Vec<&MatchRecord> = pool.iter().take(WINDOW_SIZE).collect();
    recent.reverse();
    recent
        .iter()
        .filter_map(|m| m.outcome_for(team_id))
        .map(|o| o.as_char().to_string())
        .collect::<Vec<_>>()
        .join(",")
}
