use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::models::{AccuracyProfile, MarketDirection, StatFamily};
use crate::store::AccuracyStore;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config {path}: {source}")]
    Format {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Tunable parameters for one stat family's markets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketParams {
    pub label: String,
    /// Score sensitivity to the margin between prediction and line.
    pub volatility: f64,
    /// Margins below this score zero and are filtered out.
    pub min_margin: f64,
    /// Lines further than this from the prediction are not offered.
    pub max_gap: f64,
    pub step: f64,
    pub base_score: f64,
    /// Fixed line the accuracy tracker grades this family at.
    pub reference_line: f64,
}

fn params(
    label: &str,
    volatility: f64,
    min_margin: f64,
    max_gap: f64,
    step: f64,
    base_score: f64,
    reference_line: f64,
) -> MarketParams {
    MarketParams {
        label: label.to_string(),
        volatility,
        min_margin,
        max_gap,
        step,
        base_score,
        reference_line,
    }
}

/// Hardcoded defaults per family, used whenever a loaded config is missing
/// that family's entry.
pub fn default_market_params(family: StatFamily) -> MarketParams {
    match family {
        StatFamily::Goal => params("Goals", 3.5, 0.2, 1.2, 1.0, 50.0, 2.5),
        StatFamily::Shots => params("Total shots", 0.6, 1.0, 5.0, 1.0, 50.0, 24.5),
        StatFamily::ShotsOT => params("Shots on target", 1.5, 0.5, 3.0, 1.0, 50.0, 8.5),
        StatFamily::Corners => params("Corners", 2.0, 0.5, 3.5, 1.0, 50.0, 9.5),
        StatFamily::Cards => params("Yellow cards", 4.0, 0.3, 2.0, 1.0, 60.0, 4.5),
        StatFamily::Fouls => params("Fouls", 1.0, 1.0, 6.0, 1.0, 50.0, 24.5),
        StatFamily::Offsides => params("Offsides", 3.0, 0.4, 2.0, 1.0, 50.0, 3.5),
        StatFamily::Outcome => params("Match result", 1.0, 0.0, 0.0, 1.0, 50.0, 0.0),
    }
}

/// Thresholds behind the pressure index. The cutoffs are heuristic, so they
/// are configuration rather than code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureParams {
    /// Ratings at or above this mark a title-contention tier.
    pub top_rating: f64,
    /// Ratings at or below this mark a relegation tier.
    pub bottom_rating: f64,
    /// A top-tier side below this many points (of 15) is under-performing.
    pub top_crisis_points: u32,
    /// A bottom-tier side below this many points is in free fall.
    pub bottom_crisis_points: u32,
    /// A mid-table side below this many points feels the squeeze.
    pub mid_low_points: u32,
    pub top_baseline: f64,
    pub mid_baseline: f64,
    pub bottom_baseline: f64,
    pub mid_elevated: f64,
    pub top_crisis_pressure: f64,
    pub bottom_crisis_pressure: f64,
}

impl Default for PressureParams {
    fn default() -> Self {
        PressureParams {
            top_rating: 1600.0,
            bottom_rating: 1450.0,
            top_crisis_points: 7,
            bottom_crisis_points: 3,
            mid_low_points: 4,
            top_baseline: 70.0,
            mid_baseline: 50.0,
            bottom_baseline: 60.0,
            mid_elevated: 65.0,
            top_crisis_pressure: 90.0,
            bottom_crisis_pressure: 100.0,
        }
    }
}

impl PressureParams {
    /// Pressure index (0-100) from rating tier and points over the last
    /// five matches.
    pub fn index(&self, rating: f64, points: u32) -> f64 {
        if rating >= self.top_rating {
            if points < self.top_crisis_points {
                self.top_crisis_pressure
            } else {
                self.top_baseline
            }
        } else if rating <= self.bottom_rating {
            if points < self.bottom_crisis_points {
                self.bottom_crisis_pressure
            } else {
                self.bottom_baseline
            }
        } else if points < self.mid_low_points {
            self.mid_elevated
        } else {
            self.mid_baseline
        }
    }
}

fn default_min_confidence() -> f64 {
    60.0
}
fn default_slip_min_score() -> f64 {
    70.0
}
fn default_slip_size() -> usize {
    4
}
fn default_win_threshold() -> f64 {
    0.6
}
fn default_draw_threshold() -> f64 {
    0.3
}
fn default_value_edge() -> f64 {
    0.05
}

/// The betting strategy configuration. A single immutable document, loaded
/// once; absent fields and families fall back to hardcoded defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingConfig {
    /// Opportunities scoring below this are discarded.
    #[serde(default = "default_min_confidence")]
    pub min_confidence_score: f64,
    #[serde(default = "default_slip_min_score")]
    pub slip_min_score: f64,
    #[serde(default = "default_slip_size")]
    pub slip_size: usize,
    /// Predicted goal differential beyond this favors a winner.
    #[serde(default = "default_win_threshold")]
    pub win_threshold: f64,
    /// Predicted goal differential within this favors a draw.
    #[serde(default = "default_draw_threshold")]
    pub draw_threshold: f64,
    /// Minimum model edge over bookmaker odds for a value bet.
    #[serde(default = "default_value_edge")]
    pub value_edge_threshold: f64,
    #[serde(default)]
    pub pressure: PressureParams,
    #[serde(default)]
    pub markets: HashMap<StatFamily, MarketParams>,
}

impl Default for BettingConfig {
    fn default() -> Self {
        BettingConfig {
            min_confidence_score: default_min_confidence(),
            slip_min_score: default_slip_min_score(),
            slip_size: default_slip_size(),
            win_threshold: default_win_threshold(),
            draw_threshold: default_draw_threshold(),
            value_edge_threshold: default_value_edge(),
            pressure: PressureParams::default(),
            markets: HashMap::new(),
        }
    }
}

impl BettingConfig {
    /// Parameters for one family; falls back to the hardcoded default for
    /// that family only, so a partial config never leaves a silent gap.
    pub fn market(&self, family: StatFamily) -> MarketParams {
        self.markets
            .get(&family)
            .cloned()
            .unwrap_or_else(|| default_market_params(family))
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text).map_err(|source| ConfigError::Format {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Accuracy profiles keyed by (family, direction), with the score
/// multiplier lookup used during scoring.
#[derive(Debug, Clone, Default)]
pub struct AccuracyProfiles {
    map: HashMap<(StatFamily, MarketDirection), AccuracyProfile>,
}

impl AccuracyProfiles {
    pub fn from_profiles(profiles: Vec<AccuracyProfile>) -> Self {
        let map = profiles
            .into_iter()
            .map(|p| ((p.family, p.direction), p))
            .collect();
        AccuracyProfiles { map }
    }

    pub fn get(&self, family: StatFamily, direction: MarketDirection) -> Option<&AccuracyProfile> {
        self.map.get(&(family, direction))
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Historical-accuracy multiplier applied to raw opportunity scores.
    /// Unknown markets are neutral.
    pub fn multiplier(&self, family: StatFamily, direction: MarketDirection) -> f64 {
        match self.get(family, direction) {
            Some(profile) if profile.accuracy < 40.0 => 0.8,
            Some(profile) if profile.accuracy < 60.0 => 1.0,
            Some(profile) if profile.accuracy < 80.0 => 1.1,
            Some(_) => 1.25,
            None => 1.0,
        }
    }
}

/// Read-through cache over the accuracy-profile store.
///
/// The result-recording write path must call `invalidate`; a stale
/// multiplier silently biases every subsequent score, so the TTL is only a
/// backstop.
#[derive(Debug)]
pub struct AccuracyCache {
    ttl: Duration,
    loaded_at: Option<Instant>,
    profiles: AccuracyProfiles,
}

impl AccuracyCache {
    pub fn new(ttl: Duration) -> Self {
        AccuracyCache {
            ttl,
            loaded_at: None,
            profiles: AccuracyProfiles::default(),
        }
    }

    pub fn profiles<S: AccuracyStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> Result<&AccuracyProfiles, StoreError> {
        let stale = match self.loaded_at {
            Some(at) => at.elapsed() >= self.ttl,
            None => true,
        };
        if stale {
            self.profiles = AccuracyProfiles::from_profiles(store.load_profiles()?);
            self.loaded_at = Some(Instant::now());
            tracing::debug!("accuracy profiles reloaded");
        }
        Ok(&self.profiles)
    }

    pub fn invalidate(&mut self) {
        self.loaded_at = None;
    }
}
