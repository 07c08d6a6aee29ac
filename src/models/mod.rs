use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Every team enters the rating system at this value.
pub const DEFAULT_RATING: f64 = 1500.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub short_name: Option<String>,
    pub league: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn label(&self) -> &'static str {
        match self {
            Side::Home => "Home",
            Side::Away => "Away",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Home,
    Draw,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeamOutcome {
    Win,
    Draw,
    Loss,
}

impl TeamOutcome {
    pub fn as_char(&self) -> char {
        match self {
            TeamOutcome::Win => 'W',
            TeamOutcome::Draw => 'D',
            TeamOutcome::Loss => 'L',
        }
    }

    pub fn points(&self) -> u32 {
        match self {
            TeamOutcome::Win => 3,
            TeamOutcome::Draw => 1,
            TeamOutcome::Loss => 0,
        }
    }
}

/// Per-team statistics for one finished match, normalized at the ingestion
/// boundary. `None` means the stat was never recorded, not zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMatchStats {
    pub shots: Option<f64>,
    pub shots_on_target: Option<f64>,
    pub corners: Option<f64>,
    pub fouls: Option<f64>,
    pub yellow_cards: Option<f64>,
    pub offsides: Option<f64>,
    pub possession: Option<f64>,
    pub xg: Option<f64>,
}

impl TeamMatchStats {
    /// Normalize a raw scraped stat bag. Historical feeds used several key
    /// spellings per stat (Italian and English); this is the only place that
    /// knows about them.
    pub fn from_raw(raw: &HashMap<String, serde_json::Value>) -> Self {
        fn pick(raw: &HashMap<String, serde_json::Value>, keys: &[&str]) -> Option<f64> {
            for key in keys {
                match raw.get(*key) {
                    Some(serde_json::Value::Number(n)) => return n.as_f64(),
                    Some(serde_json::Value::String(s)) => {
                        if let Ok(v) = s.parse::<f64>() {
                            return Some(v);
                        }
                    }
                    _ => {}
                }
            }
            None
        }

        TeamMatchStats {
            shots: pick(raw, &["total_shots", "tiri_totali", "shots"]),
            shots_on_target: pick(raw, &["shots_on_target", "tiri_porta"]),
            corners: pick(raw, &["corners", "corner"]),
            fouls: pick(raw, &["fouls", "falli"]),
            yellow_cards: pick(raw, &["yellow_cards", "gialli"]),
            offsides: pick(raw, &["offsides", "fuorigioco"]),
            possession: pick(raw, &["possession", "possesso"]),
            xg: pick(raw, &["xg"]),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub home_goals: u32,
    pub away_goals: u32,
    pub winner: Winner,
    pub home_stats: TeamMatchStats,
    pub away_stats: TeamMatchStats,
}

impl MatchResult {
    pub fn new(
        home_goals: u32,
        away_goals: u32,
        home_stats: TeamMatchStats,
        away_stats: TeamMatchStats,
    ) -> Self {
        let winner = match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => Winner::Home,
            std::cmp::Ordering::Equal => Winner::Draw,
            std::cmp::Ordering::Less => Winner::Away,
        };
        MatchResult {
            home_goals,
            away_goals,
            winner,
            home_stats,
            away_stats,
        }
    }

    /// Realized match total for a stat family, or `None` when either side's
    /// value is unknown. Goals are always known on a finished match.
    pub fn total_stat(&self, family: StatFamily) -> Option<f64> {
        match family {
            StatFamily::Goal => Some((self.home_goals + self.away_goals) as f64),
            StatFamily::Shots => Some(self.home_stats.shots? + self.away_stats.shots?),
            StatFamily::ShotsOT => {
                Some(self.home_stats.shots_on_target? + self.away_stats.shots_on_target?)
            }
            StatFamily::Corners => Some(self.home_stats.corners? + self.away_stats.corners?),
            StatFamily::Cards => {
                Some(self.home_stats.yellow_cards? + self.away_stats.yellow_cards?)
            }
            StatFamily::Fouls => Some(self.home_stats.fouls? + self.away_stats.fouls?),
            StatFamily::Offsides => Some(self.home_stats.offsides? + self.away_stats.offsides?),
            StatFamily::Outcome => None,
        }
    }
}

/// "No result yet" is a state, not a missing attribute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MatchStatus {
    Scheduled,
    Postponed,
    Finished(MatchResult),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: String,
    pub season: String,
    pub round: u32,
    pub home_team_id: String,
    pub away_team_id: String,
    pub date_time: DateTime<Utc>,
    pub status: MatchStatus,
}

impl MatchRecord {
    pub fn result(&self) -> Option<&MatchResult> {
        match &self.status {
            MatchStatus::Finished(result) => Some(result),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, MatchStatus::Finished(_))
    }

    pub fn involves(&self, team_id: &str) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }

    pub fn side_of(&self, team_id: &str) -> Option<Side> {
        if self.home_team_id == team_id {
            Some(Side::Home)
        } else if self.away_team_id == team_id {
            Some(Side::Away)
        } else {
            None
        }
    }

    pub fn opponent_of(&self, team_id: &str) -> Option<&str> {
        match self.side_of(team_id)? {
            Side::Home => Some(&self.away_team_id),
            Side::Away => Some(&self.home_team_id),
        }
    }

    /// W/D/L from this team's perspective. `None` if the match is not
    /// finished or the team did not play in it.
    pub fn outcome_for(&self, team_id: &str) -> Option<TeamOutcome> {
        let side = self.side_of(team_id)?;
        let result = self.result()?;
        let outcome = match (result.winner, side) {
            (Winner::Draw, _) => TeamOutcome::Draw,
            (Winner::Home, Side::Home) | (Winner::Away, Side::Away) => TeamOutcome::Win,
            _ => TeamOutcome::Loss,
        };
        Some(outcome)
    }

    /// (goals for, goals against) from this team's perspective.
    pub fn goals_for(&self, team_id: &str) -> Option<(u32, u32)> {
        let side = self.side_of(team_id)?;
        let result = self.result()?;
        match side {
            Side::Home => Some((result.home_goals, result.away_goals)),
            Side::Away => Some((result.away_goals, result.home_goals)),
        }
    }

    pub fn stats_for(&self, team_id: &str) -> Option<&TeamMatchStats> {
        let side = self.side_of(team_id)?;
        let result = self.result()?;
        match side {
            Side::Home => Some(&result.home_stats),
            Side::Away => Some(&result.away_stats),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerPosition {
    Goalkeeper,
    Defender,
    Midfielder,
    Forward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    Available,
    Injured,
    Suspended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub team_id: String,
    pub position: PlayerPosition,
    pub status: PlayerStatus,
}

/// One player's line in one match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerMatchStat {
    pub player_id: String,
    pub match_id: String,
    pub team_id: String,
    pub date_time: DateTime<Utc>,
    pub position: PlayerPosition,
    pub is_starter: bool,
    pub minutes: u32,
    pub goals: u32,
    pub xg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineupProvenance {
    Official,
    Probable,
    Estimated,
}

/// Best-known starting eleven for a team in an upcoming match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredLineup {
    pub match_id: String,
    pub team_id: String,
    pub provenance: LineupProvenance,
    pub formation: String,
    pub starting_xi: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Absence {
    pub match_id: String,
    pub team_id: String,
    pub player_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rivalry {
    pub team_a: String,
    pub team_b: String,
    /// Rivalry intensity, 1 (mild) to 10 (city derby).
    pub intensity: u8,
    pub name: String,
}

/// "Team T's rolling form as of match M", cached per (match, team).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormSnapshot {
    pub match_id: String,
    pub team_id: String,
    pub points: u32,
    pub rest_days: i64,
    pub rating: f64,
    pub avg_xg: f64,
    pub avg_goals_for: f64,
    pub avg_goals_against: f64,
    pub xg_ratio: f64,
    pub attack_efficiency: f64,
    pub defense_efficiency: f64,
    pub goal_volatility: f64,
    pub derby_intensity: u8,
    pub pressure_index: f64,
    pub starters_xg: f64,
    /// Oldest-to-newest, e.g. "W,L,D,W,L".
    pub form_sequence: String,
}

/// The feature vector consumed by the forecast model. Field names are the
/// model contract; renaming one silently breaks trained artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    pub points: u32,
    pub rest_days: i64,
    pub elo: f64,
    pub avg_xg: f64,
    pub avg_gf: f64,
    pub avg_ga: f64,
    pub xg_ratio: f64,
    pub eff_att: f64,
    pub eff_def: f64,
    pub volatility: f64,
    pub is_derby: u8,
    pub pressure_index: f64,
    pub starters_xg: f64,
    pub form_sequence: String,
}

impl Default for ForecastRow {
    /// The documented fallback vector for teams with no usable history.
    fn default() -> Self {
        ForecastRow {
            points: 5,
            rest_days: 7,
            elo: DEFAULT_RATING,
            avg_xg: 1.0,
            avg_gf: 1.0,
            avg_ga: 1.0,
            xg_ratio: 0.5,
            eff_att: 0.0,
            eff_def: 0.0,
            volatility: 0.0,
            is_derby: 0,
            pressure_index: 50.0,
            starters_xg: 0.0,
            form_sequence: String::new(),
        }
    }
}

/// One side of a statistical forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SidePrediction {
    pub goals: f64,
    pub possession: f64,
    pub shots: f64,
    pub shots_on_target: f64,
    pub corners: f64,
    pub fouls: f64,
    pub yellow_cards: f64,
    pub offsides: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictedStats {
    pub home: SidePrediction,
    pub away: SidePrediction,
}

impl PredictedStats {
    pub fn side(&self, side: Side) -> &SidePrediction {
        match side {
            Side::Home => &self.home,
            Side::Away => &self.away,
        }
    }

    pub fn side_stat(&self, family: StatFamily, side: Side) -> f64 {
        let s = self.side(side);
        match family {
            StatFamily::Goal => s.goals,
            StatFamily::Shots => s.shots,
            StatFamily::ShotsOT => s.shots_on_target,
            StatFamily::Corners => s.corners,
            StatFamily::Cards => s.yellow_cards,
            StatFamily::Fouls => s.fouls,
            StatFamily::Offsides => s.offsides,
            StatFamily::Outcome => 0.0,
        }
    }

    pub fn total_stat(&self, family: StatFamily) -> f64 {
        self.side_stat(family, Side::Home) + self.side_stat(family, Side::Away)
    }
}

/// A persisted forecast for one match, kept so the accuracy tracker can
/// grade it once the result is in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub match_id: String,
    pub created_at: DateTime<Utc>,
    pub stats: PredictedStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatFamily {
    Goal,
    Shots,
    ShotsOT,
    Corners,
    Cards,
    Fouls,
    Offsides,
    /// 1X2 and related match-result markets.
    Outcome,
}

impl StatFamily {
    /// The seven families with a measurable per-match total.
    pub const MEASURABLE: [StatFamily; 7] = [
        StatFamily::Goal,
        StatFamily::Shots,
        StatFamily::ShotsOT,
        StatFamily::Corners,
        StatFamily::Cards,
        StatFamily::Fouls,
        StatFamily::Offsides,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatFamily::Goal => "Goal",
            StatFamily::Shots => "Shots",
            StatFamily::ShotsOT => "ShotsOT",
            StatFamily::Corners => "Corners",
            StatFamily::Cards => "Cards",
            StatFamily::Fouls => "Fouls",
            StatFamily::Offsides => "Offsides",
            StatFamily::Outcome => "Outcome",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketDirection {
    Over,
    Under,
    Home,
    Draw,
    Away,
}

impl MarketDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketDirection::Over => "Over",
            MarketDirection::Under => "Under",
            MarketDirection::Home => "1",
            MarketDirection::Draw => "X",
            MarketDirection::Away => "2",
        }
    }
}

/// Display grouping for opportunities. Deduplication runs on the stat
/// family, not on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpportunityCategory {
    Outcome,
    Goals,
    OverUnder,
    Dominance,
    Value,
}

impl OpportunityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityCategory::Outcome => "Outcome",
            OpportunityCategory::Goals => "Goals",
            OpportunityCategory::OverUnder => "Over/Under",
            OpportunityCategory::Dominance => "Dominance",
            OpportunityCategory::Value => "Value",
        }
    }
}

/// A scored candidate bet. Ephemeral: computed per request, never stored as
/// authoritative truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub label: String,
    pub category: OpportunityCategory,
    pub family: StatFamily,
    pub direction: MarketDirection,
    pub score: f64,
    pub reasoning: String,
}

/// Rolling historical success rate of the model on one market direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccuracyProfile {
    pub family: StatFamily,
    pub direction: MarketDirection,
    /// Success percentage, 0-100.
    pub accuracy: f64,
    pub sample_size: u32,
    pub last_updated: DateTime<Utc>,
}

/// Closing 1X2 odds from a bookmaker, decimal format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClosingOdds {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_stat_bag_normalization_legacy_keys() {
        let bag = raw(&[
            ("possesso", serde_json::json!(61)),
            ("corner", serde_json::json!(7)),
            ("gialli", serde_json::json!("3")),
            ("tiri_porta", serde_json::json!(5.0)),
            ("xg", serde_json::json!(1.42)),
        ]);
        let stats = TeamMatchStats::from_raw(&bag);
        assert_eq!(stats.possession, Some(61.0));
        assert_eq!(stats.corners, Some(7.0));
        assert_eq!(stats.yellow_cards, Some(3.0));
        assert_eq!(stats.shots_on_target, Some(5.0));
        assert_eq!(stats.xg, Some(1.42));
        assert_eq!(stats.shots, None); // never recorded, stays unknown
    }

    #[test]
    fn test_stat_bag_prefers_modern_keys() {
        let bag = raw(&[
            ("corners", serde_json::json!(9)),
            ("corner", serde_json::json!(2)),
        ]);
        assert_eq!(TeamMatchStats::from_raw(&bag).corners, Some(9.0));
    }

    #[test]
    fn test_total_stat_requires_both_sides() {
        let mut result = MatchResult::new(
            2,
            1,
            TeamMatchStats {
                corners: Some(5.0),
                ..Default::default()
            },
            TeamMatchStats::default(),
        );
        assert_eq!(result.total_stat(StatFamily::Goal), Some(3.0));
        assert_eq!(result.total_stat(StatFamily::Corners), None);
        result.away_stats.corners = Some(4.0);
        assert_eq!(result.total_stat(StatFamily::Corners), Some(9.0));
    }

    #[test]
    fn test_outcome_for_each_side() {
        let record = MatchRecord {
            id: "m1".into(),
            season: "2025/26".into(),
            round: 1,
            home_team_id: "t1".into(),
            away_team_id: "t2".into(),
            date_time: Utc::now(),
            status: MatchStatus::Finished(MatchResult::new(
                3,
                1,
                TeamMatchStats::default(),
                TeamMatchStats::default(),
            )),
        };
        assert_eq!(record.outcome_for("t1"), Some(TeamOutcome::Win));
        assert_eq!(record.outcome_for("t2"), Some(TeamOutcome::Loss));
        assert_eq!(record.goals_for("t2"), Some((1, 3)));
        assert_eq!(record.outcome_for("t3"), None);
    }

    #[test]
    fn test_default_forecast_row_is_the_documented_fallback() {
        let row = ForecastRow::default();
        assert_eq!(row.points, 5);
        assert_eq!(row.rest_days, 7);
        assert_eq!(row.elo, 1500.0);
        assert_eq!(row.avg_xg, 1.0);
        assert_eq!(row.avg_gf, 1.0);
        assert_eq!(row.avg_ga, 1.0);
        assert_eq!(row.xg_ratio, 0.5);
        assert_eq!(row.pressure_index, 50.0);
        assert_eq!(row.form_sequence, "");
    }
}
