use chrono::Utc;
use std::collections::HashMap;

use crate::config::{AccuracyCache, BettingConfig};
use crate::models::{AccuracyProfile, MarketDirection, StatFamily, Winner};
use crate::store::{AccuracyStore, HistoryStore, StoreError};

/// Offline sweep comparing stored predictions against realized results,
/// producing the per-market success rates the scorer re-weights with.
///
/// Each stat family is graded at its fixed reference line (e.g. 2.5 total
/// goals); 1X2 is graded through the configured win threshold, the same
/// rule the scorer uses to pick a winner.
pub struct AccuracyTracker<'a> {
    config: &'a BettingConfig,
}

impl<'a> AccuracyTracker<'a> {
    pub fn new(config: &'a BettingConfig) -> Self {
        AccuracyTracker { config }
    }

    /// Walk every finished match that has a stored prediction and tally
    /// success/total per (family, direction).
    pub fn run<S: HistoryStore>(&self, store: &S) -> Result<Vec<AccuracyProfile>, StoreError> {
        let mut counts: HashMap<(StatFamily, MarketDirection), (u32, u32)> = HashMap::new();
        let mut graded_matches = 0usize;

        for m in store.finished_matches()? {
            let Some(result) = m.result() else { continue };
            let Some(prediction) = store.latest_prediction(&m.id)? else {
                continue;
            };
            graded_matches += 1;

            // 1X2, through the same win threshold the scorer applies.
            let diff = prediction.stats.home.goals - prediction.stats.away.goals;
            let predicted_winner = if diff > self.config.win_threshold {
                MarketDirection::Home
            } else if diff < -self.config.win_threshold {
                MarketDirection::Away
            } else {
                MarketDirection::Draw
            };
            let actual_winner = match result.winner {
                Winner::Home => MarketDirection::Home,
                Winner::Draw => MarketDirection::Draw,
                Winner::Away => MarketDirection::Away,
            };
            let entry = counts
                .entry((StatFamily::Outcome, predicted_winner))
                .or_insert((0, 0));
            entry.1 += 1;
            if predicted_winner == actual_winner {
                entry.0 += 1;
            }

            // Over/Under per family at the reference line. A family whose
            // realized value is unknown for this match is skipped, not
            // counted as zero.
            for family in StatFamily::MEASURABLE {
                let line = self.config.market(family).reference_line;
                let predicted_total = prediction.stats.total_stat(family);
                let Some(realized_total) = result.total_stat(family) else {
                    continue;
                };
                let direction = if predicted_total > line {
                    MarketDirection::Over
                } else {
                    MarketDirection::Under
                };
                let entry = counts.entry((family, direction)).or_insert((0, 0));
                entry.1 += 1;
                let success = match direction {
                    MarketDirection::Over => realized_total > line,
                    _ => realized_total < line,
                };
                if success {
                    entry.0 += 1;
                }
            }
        }

        let now = Utc::now();
        let mut profiles: Vec<AccuracyProfile> = counts
            .into_iter()
            .filter(|(_, (_, total))| *total > 0)
            .map(|((family, direction), (ok, total))| AccuracyProfile {
                family,
                direction,
                accuracy: ok as f64 / total as f64 * 100.0,
                sample_size: total,
                last_updated: now,
            })
            .collect();
        profiles.sort_by_key(|p| (p.family.as_str(), p.direction.as_str()));

        tracing::info!(
            "accuracy sweep: {} matches graded, {} market profiles",
            graded_matches,
            profiles.len()
        );
        Ok(profiles)
    }

    /// Run the sweep, persist the profiles, and invalidate the read-through
    /// cache so the next scoring pass sees fresh multipliers.
    pub fn run_and_store<S: HistoryStore + AccuracyStore>(
        &self,
        store: &mut S,
        cache: &mut AccuracyCache,
    ) -> Result<Vec<AccuracyProfile>, StoreError> {
        let profiles = self.run(&*store)?;
        store.save_profiles(&profiles)?;
        cache.invalidate();
        Ok(profiles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        MatchRecord, MatchResult, MatchStatus, PredictedStats, PredictionRecord, SidePrediction,
        TeamMatchStats,
    };
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone};

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, day, 15, 0, 0).unwrap()
    }

    fn side(goals: f64, corners: f64) -> SidePrediction {
        SidePrediction {
            goals,
            possession: 50.0,
            shots: 12.0,
            shots_on_target: 4.0,
            corners,
            fouls: 12.0,
            yellow_cards: 2.0,
            offsides: 1.5,
        }
    }

    fn graded_match(
        id: &str,
        day: u32,
        predicted: PredictedStats,
        home_goals: u32,
        away_goals: u32,
        corners: Option<(f64, f64)>,
    ) -> (MatchRecord, PredictionRecord) {
        let stats = |value: Option<f64>| TeamMatchStats {
            corners: value,
            ..Default::default()
        };
        let record = MatchRecord {
            id: id.to_string(),
            season: "2025/26".to_string(),
            round: day,
            home_team_id: "t1".to_string(),
            away_team_id: "t2".to_string(),
            date_time: date(day),
            status: MatchStatus::Finished(MatchResult::new(
                home_goals,
                away_goals,
                stats(corners.map(|c| c.0)),
                stats(corners.map(|c| c.1)),
            )),
        };
        let prediction = PredictionRecord {
            id: format!("p-{}", id),
            match_id: id.to_string(),
            created_at: date(day),
            stats: predicted,
        };
        (record, prediction)
    }

    #[test]
    fn test_tracker_counts_hits_and_misses() {
        let mut store = MemoryStore::default();
        // predicted home win 2-0, realized 3-1: outcome hit, goals Over
        // line 2.5 predicted Under (2.0 < 2.5) but realized 4 -> miss
        let (m1, p1) = graded_match(
            "m1",
            1,
            PredictedStats {
                home: side(2.0, 6.0),
                away: side(0.0, 3.0),
            },
            3,
            1,
            Some((5.0, 4.0)),
        );
        // predicted draw, realized draw: outcome hit
        let (m2, p2) = graded_match(
            "m2",
            2,
            PredictedStats {
                home: side(1.0, 5.0),
                away: side(1.0, 5.0),
            },
            0,
            0,
            Some((6.0, 6.0)),
        );
        store.matches = vec![m1, m2];
        store.predictions = vec![p1, p2];

        let config = BettingConfig::default();
        let tracker = AccuracyTracker::new(&config);
        let profiles = tracker.run(&store).unwrap();

        let outcome_home = profiles
            .iter()
            .find(|p| p.family == StatFamily::Outcome && p.direction == MarketDirection::Home)
            .unwrap();
        assert_eq!(outcome_home.sample_size, 1);
        assert_eq!(outcome_home.accuracy, 100.0);

        let outcome_draw = profiles
            .iter()
            .find(|p| p.family == StatFamily::Outcome && p.direction == MarketDirection::Draw)
            .unwrap();
        assert_eq!(outcome_draw.accuracy, 100.0);

        // goals: m1 predicted 2.0 (Under 2.5) realized 4 -> miss;
        //        m2 predicted 2.0 (Under 2.5) realized 0 -> hit
        let goal_under = profiles
            .iter()
            .find(|p| p.family == StatFamily::Goal && p.direction == MarketDirection::Under)
            .unwrap();
        assert_eq!(goal_under.sample_size, 2);
        assert_eq!(goal_under.accuracy, 50.0);

        // corners: m1 predicted 9.0 (Under 9.5) realized 9 -> 9 < 9.5 hit;
        //          m2 predicted 10.0 (Over 9.5) realized 12 -> hit
        let corners_over = profiles
            .iter()
            .find(|p| p.family == StatFamily::Corners && p.direction == MarketDirection::Over)
            .unwrap();
        assert_eq!(corners_over.accuracy, 100.0);
    }

    #[test]
    fn test_unknown_realized_stats_are_skipped_not_zero() {
        let mut store = MemoryStore::default();
        let (m1, p1) = graded_match(
            "m1",
            1,
            PredictedStats {
                home: side(1.0, 6.0),
                away: side(1.0, 6.0),
            },
            1,
            1,
            None, // corners never recorded
        );
        store.matches = vec![m1];
        store.predictions = vec![p1];

        let config = BettingConfig::default();
        let profiles = AccuracyTracker::new(&config).run(&store).unwrap();
        assert!(!profiles.iter().any(|p| p.family == StatFamily::Corners));
        // goals are always known, so the Goal family is still graded
        assert!(profiles.iter().any(|p| p.family == StatFamily::Goal));
    }

    #[test]
    fn test_run_and_store_persists_and_invalidates() {
        let mut store = MemoryStore::default();
        let (m1, p1) = graded_match(
            "m1",
            1,
            PredictedStats {
                home: side(2.0, 6.0),
                away: side(0.0, 3.0),
            },
            2,
            0,
            Some((5.0, 4.0)),
        );
        store.matches = vec![m1];
        store.predictions = vec![p1];

        let config = BettingConfig::default();
        let mut cache = AccuracyCache::new(std::time::Duration::from_secs(300));
        // warm the cache on the empty profile table
        assert!(cache.profiles(&store).unwrap().is_empty());

        let tracker = AccuracyTracker::new(&config);
        tracker.run_and_store(&mut store, &mut cache).unwrap();

        assert!(!store.profiles.is_empty());
        // invalidation makes the fresh profiles visible immediately
        assert!(!cache.profiles(&store).unwrap().is_empty());
    }
}
