use std::collections::HashMap;

use crate::models::{Winner, DEFAULT_RATING};
use crate::store::{HistoryStore, RatingSink, StoreError};

/// Standard football K-factor.
pub const K_FACTOR: f64 = 30.0;

/// Maintains one scalar strength rating per team by replaying finished
/// matches in chronological order. Ratings are deterministic from the
/// ordered match list; a re-run over unchanged data reproduces every
/// snapshot exactly.
pub struct EloTracker {
    k_factor: f64,
}

impl Default for EloTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl EloTracker {
    pub fn new() -> Self {
        Self {
            k_factor: K_FACTOR,
        }
    }

    pub fn with_k_factor(k_factor: f64) -> Self {
        Self { k_factor }
    }

    /// Expected score for a team via the base-400 logistic curve.
    pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
        1.0 / (1.0 + 10f64.powf((rating_b - rating_a) / 400.0))
    }

    /// Post-match ratings for both sides. No home-advantage term: venue
    /// effects are the feature engine's job, the rating stays a pure
    /// strength estimate.
    pub fn update_ratings(&self, home_rating: f64, away_rating: f64, winner: Winner) -> (f64, f64) {
        let (actual_home, actual_away) = match winner {
            Winner::Home => (1.0, 0.0),
            Winner::Draw => (0.5, 0.5),
            Winner::Away => (0.0, 1.0),
        };

        let expected_home = Self::expected_score(home_rating, away_rating);
        let expected_away = 1.0 - expected_home;

        (
            home_rating + self.k_factor * (actual_home - expected_home),
            away_rating + self.k_factor * (actual_away - expected_away),
        )
    }

    /// Replay every finished match in ascending date-time order, recording
    /// each side's pre-match rating as that match's historical snapshot.
    /// Returns the final ratings table.
    pub fn replay<S: HistoryStore + RatingSink>(
        &self,
        store: &mut S,
    ) -> Result<HashMap<String, f64>, StoreError> {
        let matches = store.finished_matches()?;
        let mut ratings: HashMap<String, f64> = HashMap::new();

        let mut replayed = 0usize;
        for m in &matches {
            let Some(result) = m.result() else { continue };

            let home_before = *ratings
                .get(&m.home_team_id)
                .unwrap_or(&DEFAULT_RATING);
            let away_before = *ratings
                .get(&m.away_team_id)
                .unwrap_or(&DEFAULT_RATING);

            // The snapshot is the strength *going into* the match; the
            // result of the match itself must not leak into it.
            store.record_rating(&m.home_team_id, m.date_time, home_before)?;
            store.record_rating(&m.away_team_id, m.date_time, away_before)?;

            let (home_after, away_after) =
                self.update_ratings(home_before, away_before, result.winner);
            ratings.insert(m.home_team_id.clone(), home_after);
            ratings.insert(m.away_team_id.clone(), away_after);
            replayed += 1;
        }

        tracing::info!("Elo replay complete: {} matches, {} teams", replayed, ratings.len());
        Ok(ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MatchRecord, MatchResult, MatchStatus, TeamMatchStats};
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};

    fn date(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, day, 20, 45, 0).unwrap()
    }

    fn finished(id: &str, home: &str, away: &str, day: u32, hg: u32, ag: u32) -> MatchRecord {
        MatchRecord {
            id: id.to_string(),
            season: "2025/26".to_string(),
            round: day,
            home_team_id: home.to_string(),
            away_team_id: away.to_string(),
            date_time: date(day),
            status: MatchStatus::Finished(MatchResult::new(
                hg,
                ag,
                TeamMatchStats::default(),
                TeamMatchStats::default(),
            )),
        }
    }

    #[test]
    fn test_equal_ratings_home_win_moves_exactly_fifteen() {
        let tracker = EloTracker::new();
        let (home, away) = tracker.update_ratings(1500.0, 1500.0, Winner::Home);
        // expected score is 0.5 each at equal ratings, so 30 * (1 - 0.5)
        assert!((home - 1515.0).abs() < 1e-9);
        assert!((away - 1485.0).abs() < 1e-9);
    }

    #[test]
    fn test_draw_between_unequal_ratings_narrows_the_gap() {
        let tracker = EloTracker::new();
        let (strong, weak) = tracker.update_ratings(1600.0, 1400.0, Winner::Draw);
        assert!(strong < 1600.0);
        assert!(weak > 1400.0);
        // zero-sum update
        assert!((strong + weak - 3000.0).abs() < 1e-9);
    }

    #[test]
    fn test_expected_score_is_logistic() {
        assert!((EloTracker::expected_score(1500.0, 1500.0) - 0.5).abs() < 1e-9);
        // 400-point gap means 10:1 expected odds
        assert!((EloTracker::expected_score(1900.0, 1500.0) - 10.0 / 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_replay_snapshots_pre_match_ratings() {
        let mut store = MemoryStore {
            matches: vec![
                finished("m1", "t1", "t2", 1, 1, 0),
                finished("m2", "t1", "t2", 8, 0, 0),
            ],
            ..Default::default()
        };
        let tracker = EloTracker::new();
        let ratings = tracker.replay(&mut store).unwrap();

        // both sides entered m1 at the default rating
        assert_eq!(store.rating_snapshot("t1", date(2)).unwrap(), Some(1500.0));
        // m2's snapshot reflects m1's outcome only
        assert_eq!(store.rating_snapshot("t1", date(9)).unwrap(), Some(1515.0));
        assert_eq!(store.rating_snapshot("t2", date(9)).unwrap(), Some(1485.0));
        // the draw in m2 favors the lower-rated side
        assert!(ratings["t1"] < 1515.0);
        assert!(ratings["t2"] > 1485.0);
    }

    #[test]
    fn test_replay_is_deterministic_and_idempotent() {
        let mut store = MemoryStore {
            matches: vec![
                finished("m1", "t1", "t2", 1, 2, 1),
                finished("m2", "t2", "t3", 4, 0, 1),
                finished("m3", "t3", "t1", 9, 3, 3),
            ],
            ..Default::default()
        };
        let tracker = EloTracker::new();
        let first = tracker.replay(&mut store).unwrap();
        let snapshots_first = store.ratings.clone();
        let second = tracker.replay(&mut store).unwrap();

        assert_eq!(first, second);
        for (team, points) in &store.ratings {
            let before = &snapshots_first[team];
            assert_eq!(before.len(), points.len());
            for (a, b) in before.iter().zip(points) {
                assert_eq!(a.at, b.at);
                assert_eq!(a.rating, b.rating);
            }
        }
    }
}
