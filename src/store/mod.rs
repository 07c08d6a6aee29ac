pub mod seed;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::models::{
    Absence, AccuracyProfile, ClosingOdds, FormSnapshot, LineupProvenance, MatchRecord, Player,
    PlayerMatchStat, PredictionRecord, Rivalry, StoredLineup, Team,
};

/// Structural store failures. Data sparsity is never an error; it is
/// absorbed by the callers with documented defaults.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown team: {0}")]
    UnknownTeam(String),
    #[error("failed to read dataset {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed dataset {path}: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read access to recorded match history. All `before` bounds are strict:
/// the feature pipeline must never see data at or after its cutoff.
pub trait HistoryStore {
    fn team(&self, team_id: &str) -> Result<Team, StoreError>;

    fn teams(&self) -> Result<Vec<Team>, StoreError>;

    fn match_by_id(&self, match_id: &str) -> Result<Option<MatchRecord>, StoreError>;

    /// All finished matches, ascending by date-time.
    fn finished_matches(&self) -> Result<Vec<MatchRecord>, StoreError>;

    /// All scheduled matches, ascending by date-time.
    fn scheduled_matches(&self) -> Result<Vec<MatchRecord>, StoreError>;

    /// Finished matches for a team within a season, strictly before the
    /// cutoff, newest first.
    fn matches_for_team(
        &self,
        team_id: &str,
        season: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Finished meetings between two teams regardless of venue or season,
    /// strictly before the cutoff, newest first.
    fn h2h_matches(
        &self,
        team_a: &str,
        team_b: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Last known rating strictly before the cutoff, if any.
    fn rating_snapshot(
        &self,
        team_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<f64>, StoreError>;

    fn squad(&self, team_id: &str) -> Result<Vec<Player>, StoreError>;

    fn player_match_stats(
        &self,
        match_id: &str,
        team_id: &str,
    ) -> Result<Vec<PlayerMatchStat>, StoreError>;

    /// A player's match lines strictly before the cutoff, newest first.
    fn appearances(
        &self,
        player_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PlayerMatchStat>, StoreError>;

    /// Stored lineup for a match/team: an official one wins, otherwise the
    /// most recently updated probable one.
    fn lineup(&self, match_id: &str, team_id: &str) -> Result<Option<StoredLineup>, StoreError>;

    fn absentees(&self, match_id: &str, team_id: &str) -> Result<Vec<String>, StoreError>;

    fn latest_prediction(&self, match_id: &str)
        -> Result<Option<PredictionRecord>, StoreError>;
}

/// Write path for the rating replay.
pub trait RatingSink {
    fn record_rating(
        &mut self,
        team_id: &str,
        at: DateTime<Utc>,
        rating: f64,
    ) -> Result<(), StoreError>;
}

/// Write path for the form-snapshot sweep.
pub trait SnapshotSink {
    fn record_snapshot(&mut self, snapshot: FormSnapshot) -> Result<(), StoreError>;
}

/// Accuracy-profile persistence, read by the scorer and written by the
/// tracker. Eventually consistent by design.
pub trait AccuracyStore {
    fn load_profiles(&self) -> Result<Vec<AccuracyProfile>, StoreError>;
    fn save_profiles(&mut self, profiles: &[AccuracyProfile]) -> Result<(), StoreError>;
}

/// Optional bookmaker odds. Returning `None` silently disables value-bet
/// detection; it is never an error.
pub trait OddsSource {
    fn closing_odds(&self, match_id: &str) -> Option<ClosingOdds>;
}

/// A team's rating at one instant of the chronological replay.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RatingPoint {
    pub at: DateTime<Utc>,
    pub rating: f64,
}

/// In-memory store backing the CLI and tests. Serializes to the JSON
/// dataset format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub matches: Vec<MatchRecord>,
    #[serde(default)]
    pub player_stats: Vec<PlayerMatchStat>,
    #[serde(default)]
    pub lineups: Vec<StoredLineup>,
    #[serde(default)]
    pub absences: Vec<Absence>,
    #[serde(default)]
    pub rivalries: Vec<Rivalry>,
    #[serde(default)]
    pub ratings: HashMap<String, Vec<RatingPoint>>,
    #[serde(default)]
    pub snapshots: Vec<FormSnapshot>,
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
    #[serde(default)]
    pub odds: HashMap<String, ClosingOdds>,
    #[serde(default)]
    pub profiles: Vec<AccuracyProfile>,
}

impl MemoryStore {
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::Format {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(self).map_err(|source| StoreError::Format {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn team_by_name(&self, name: &str) -> Option<&Team> {
        let needle = normalize_name(name);
        self.teams
            .iter()
            .find(|t| normalize_name(&t.name) == needle)
    }

    pub fn upsert_prediction(&mut self, record: PredictionRecord) {
        self.predictions.retain(|p| p.match_id != record.match_id);
        self.predictions.push(record);
    }

    pub fn derby_registry(&self) -> DerbyRegistry {
        DerbyRegistry::new(self.rivalries.clone())
    }
}

impl HistoryStore for MemoryStore {
    fn team(&self, team_id: &str) -> Result<Team, StoreError> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTeam(team_id.to_string()))
    }

    fn teams(&self) -> Result<Vec<Team>, StoreError> {
        Ok(self.teams.clone())
    }

    fn match_by_id(&self, match_id: &str) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.matches.iter().find(|m| m.id == match_id).cloned())
    }

    fn finished_matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        let mut matches: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|m| m.is_finished())
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.date_time);
        Ok(matches)
    }

    fn scheduled_matches(&self) -> Result<Vec<MatchRecord>, StoreError> {
        let mut matches: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|m| matches!(m.status, crate::models::MatchStatus::Scheduled))
            .cloned()
            .collect();
        matches.sort_by_key(|m| m.date_time);
        Ok(matches)
    }

    fn matches_for_team(
        &self,
        team_id: &str,
        season: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let mut matches: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|m| {
                m.is_finished() && m.involves(team_id) && m.season == season && m.date_time < before
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        matches.truncate(limit);
        Ok(matches)
    }

    fn h2h_matches(
        &self,
        team_a: &str,
        team_b: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MatchRecord>, StoreError> {
        let mut matches: Vec<MatchRecord> = self
            .matches
            .iter()
            .filter(|m| {
                m.is_finished()
                    && m.date_time < before
                    && m.involves(team_a)
                    && m.involves(team_b)
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        matches.truncate(limit);
        Ok(matches)
    }

    fn rating_snapshot(
        &self,
        team_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<f64>, StoreError> {
        let Some(points) = self.ratings.get(team_id) else {
            return Ok(None);
        };
        Ok(points
            .iter()
            .rev()
            .find(|p| p.at < before)
            .map(|p| p.rating))
    }

    fn squad(&self, team_id: &str) -> Result<Vec<Player>, StoreError> {
        Ok(self
            .players
            .iter()
            .filter(|p| p.team_id == team_id)
            .cloned()
            .collect())
    }

    fn player_match_stats(
        &self,
        match_id: &str,
        team_id: &str,
    ) -> Result<Vec<PlayerMatchStat>, StoreError> {
        Ok(self
            .player_stats
            .iter()
            .filter(|s| s.match_id == match_id && s.team_id == team_id)
            .cloned()
            .collect())
    }

    fn appearances(
        &self,
        player_id: &str,
        before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PlayerMatchStat>, StoreError> {
        let mut stats: Vec<PlayerMatchStat> = self
            .player_stats
            .iter()
            .filter(|s| s.player_id == player_id && s.date_time < before)
            .cloned()
            .collect();
        stats.sort_by(|a, b| b.date_time.cmp(&a.date_time));
        stats.truncate(limit);
        Ok(stats)
    }

    fn lineup(&self, match_id: &str, team_id: &str) -> Result<Option<StoredLineup>, StoreError> {
        let mut candidates: Vec<&StoredLineup> = self
            .lineups
            .iter()
            .filter(|l| l.match_id == match_id && l.team_id == team_id)
            .collect();
        if let Some(official) = candidates
            .iter()
            .find(|l| l.provenance == LineupProvenance::Official)
        {
            return Ok(Some((*official).clone()));
        }
        candidates.retain(|l| l.provenance == LineupProvenance::Probable);
        candidates.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        Ok(candidates.first().map(|l| (*l).clone()))
    }

    fn absentees(&self, match_id: &str, team_id: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .absences
            .iter()
            .filter(|a| a.match_id == match_id && a.team_id == team_id)
            .map(|a| a.player_id.clone())
            .collect())
    }

    fn latest_prediction(
        &self,
        match_id: &str,
    ) -> Result<Option<PredictionRecord>, StoreError> {
        Ok(self
            .predictions
            .iter()
            .filter(|p| p.match_id == match_id)
            .max_by_key(|p| p.created_at)
            .cloned())
    }
}

impl RatingSink for MemoryStore {
    fn record_rating(
        &mut self,
        team_id: &str,
        at: DateTime<Utc>,
        rating: f64,
    ) -> Result<(), StoreError> {
        let points = self.ratings.entry(team_id.to_string()).or_default();
        if let Some(existing) = points.iter_mut().find(|p| p.at == at) {
            // Replays are idempotent: a re-run overwrites, never duplicates.
            existing.rating = rating;
            return Ok(());
        }
        points.push(RatingPoint { at, rating });
        points.sort_by_key(|p| p.at);
        Ok(())
    }
}

impl SnapshotSink for MemoryStore {
    fn record_snapshot(&mut self, snapshot: FormSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .retain(|s| !(s.match_id == snapshot.match_id && s.team_id == snapshot.team_id));
        self.snapshots.push(snapshot);
        Ok(())
    }
}

impl AccuracyStore for MemoryStore {
    fn load_profiles(&self) -> Result<Vec<AccuracyProfile>, StoreError> {
        Ok(self.profiles.clone())
    }

    fn save_profiles(&mut self, profiles: &[AccuracyProfile]) -> Result<(), StoreError> {
        self.profiles = profiles.to_vec();
        Ok(())
    }
}

impl OddsSource for MemoryStore {
    fn closing_odds(&self, match_id: &str) -> Option<ClosingOdds> {
        self.odds.get(match_id).copied()
    }
}

/// Lowercase, alphanumeric-only form of a team name for comparisons across
/// data sources ("AC Milan" / "Milan" / "milan").
fn normalize_name(name: &str) -> String {
    let mut normalized: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    for prefix in ["fc", "ac", "as", "ssc", "us"] {
        if normalized.len() > prefix.len() + 2 {
            if let Some(stripped) = normalized.strip_prefix(prefix) {
                normalized = stripped.to_string();
                break;
            }
        }
    }
    normalized
}

/// Static lookup of rivalry intensity between team pairs, tolerant of the
/// name variants different feeds use.
#[derive(Debug, Clone, Default)]
pub struct DerbyRegistry {
    rivalries: Vec<Rivalry>,
}

impl DerbyRegistry {
    pub fn new(rivalries: Vec<Rivalry>) -> Self {
        DerbyRegistry { rivalries }
    }

    pub fn len(&self) -> usize {
        self.rivalries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rivalries.is_empty()
    }

    fn matches_name(registered: &str, queried: &str) -> bool {
        let a = normalize_name(registered);
        let b = normalize_name(queried);
        if a.is_empty() || b.is_empty() {
            return false;
        }
        a == b || strsim::jaro_winkler(&a, &b) >= 0.92
    }

    /// Rivalry intensity for a pairing, symmetric; 0 for unknown pairs.
    pub fn intensity(&self, team_a: &str, team_b: &str) -> u8 {
        for rivalry in &self.rivalries {
            let direct = Self::matches_name(&rivalry.team_a, team_a)
                && Self::matches_name(&rivalry.team_b, team_b);
            let flipped = Self::matches_name(&rivalry.team_a, team_b)
                && Self::matches_name(&rivalry.team_b, team_a);
            if direct || flipped {
                return rivalry.intensity;
            }
        }
        0
    }
}
