use crate::config::{AccuracyProfiles, BettingConfig, MarketParams};
use crate::models::{
    ClosingOdds, MarketDirection, Opportunity, OpportunityCategory, PredictedStats, Side,
    StatFamily,
};
use crate::utils::{odds_to_probability, outcome_probabilities, probability_to_odds, smart_lines};

/// Opportunity scores are hard-capped here regardless of input magnitude.
pub const MAX_SCORE: f64 = 99.0;

/// Outcome and dominance scores stay below the value-bet ceiling.
const OUTCOME_CAP: f64 = 95.0;
const DRAW_CAP: f64 = 90.0;

/// Both-teams-score triggers when each side is predicted above this.
const BTTS_FLOOR: f64 = 0.9;
/// No-goal triggers when one side is predicted below this...
const NO_GOAL_LOW: f64 = 0.6;
/// ...while the other stays below this.
const NO_GOAL_HIGH: f64 = 1.0;

/// Families that get a head-to-head dominance market.
const DOMINANCE_FAMILIES: [StatFamily; 5] = [
    StatFamily::Shots,
    StatFamily::ShotsOT,
    StatFamily::Corners,
    StatFamily::Cards,
    StatFamily::Fouls,
];

/// Scores a statistical forecast into a ranked, deduplicated list of
/// betting opportunities.
///
/// Lines are generated adjacent to the prediction and lines the prediction
/// clears by more than `max_gap` are rejected: a bet that is trivially
/// one-sided carries no value, a bet too far from the prediction carries no
/// confidence.
pub struct MarketScorer<'a> {
    config: &'a BettingConfig,
    profiles: &'a AccuracyProfiles,
}

impl<'a> MarketScorer<'a> {
    pub fn new(config: &'a BettingConfig, profiles: &'a AccuracyProfiles) -> Self {
        MarketScorer { config, profiles }
    }

    /// Returns opportunities sorted by score descending. A missing forecast
    /// yields an empty list, never an error.
    pub fn score_opportunities(
        &self,
        predicted: Option<&PredictedStats>,
        odds: Option<&ClosingOdds>,
    ) -> Vec<Opportunity> {
        let Some(predicted) = predicted else {
            return Vec::new();
        };

        let mut candidates: Vec<Opportunity> = Vec::new();
        for family in StatFamily::MEASURABLE {
            let params = self.config.market(family);
            self.total_lines(predicted, family, &params, &mut candidates);
            self.side_overs(predicted, family, &params, &mut candidates);
        }
        self.outcome_markets(predicted, &mut candidates);
        self.dominance_markets(predicted, &mut candidates);
        self.goal_markets(predicted, &mut candidates);
        if let Some(odds) = odds {
            self.value_bets(predicted, odds, &mut candidates);
        }

        self.finalize(candidates)
    }

    /// Confidence of one over/under candidate: margins below the family's
    /// minimum score zero and are filtered out downstream.
    fn line_score(margin: f64, params: &MarketParams) -> f64 {
        if margin < params.min_margin {
            0.0
        } else {
            params.base_score + margin * params.volatility * 10.0
        }
    }

    fn goal_category(family: StatFamily) -> OpportunityCategory {
        if family == StatFamily::Goal {
            OpportunityCategory::Goals
        } else {
            OpportunityCategory::OverUnder
        }
    }

    /// Over and Under markets on the match total, at the two smart lines
    /// bracketing the prediction.
    fn total_lines(
        &self,
        predicted: &PredictedStats,
        family: StatFamily,
        params: &MarketParams,
        out: &mut Vec<Opportunity>,
    ) {
        let value = predicted.total_stat(family);
        let (lower, upper) = smart_lines(value, params.step);

        for line in [lower, upper] {
            if line <= 0.0 {
                continue;
            }
            let over_margin = value - line;
            if over_margin > 0.0 && over_margin <= params.max_gap {
                let score = Self::line_score(over_margin, params);
                if score > 0.0 {
                    out.push(Opportunity {
                        label: format!("Over {:.1} {}", line, params.label),
                        category: Self::goal_category(family),
                        family,
                        direction: MarketDirection::Over,
                        score,
                        reasoning: format!(
                            "Predicted total {:.1} clears the {:.1} line by {:.1}",
                            value, line, over_margin
                        ),
                    });
                }
            }
            let under_margin = line - value;
            if under_margin > 0.0 && under_margin <= params.max_gap {
                let score = Self::line_score(under_margin, params);
                if score > 0.0 {
                    out.push(Opportunity {
                        label: format!("Under {:.1} {}", line, params.label),
                        category: Self::goal_category(family),
                        family,
                        direction: MarketDirection::Under,
                        score,
                        reasoning: format!(
                            "Predicted total {:.1} sits {:.1} below the {:.1} line",
                            value, under_margin, line
                        ),
                    });
                }
            }
        }
    }

    /// Over markets on each side's individual value. Single-team unders are
    /// low-interest and not offered.
    fn side_overs(
        &self,
        predicted: &PredictedStats,
        family: StatFamily,
        params: &MarketParams,
        out: &mut Vec<Opportunity>,
    ) {
        for side in [Side::Home, Side::Away] {
            let value = predicted.side_stat(family, side);
            let (lower, upper) = smart_lines(value, params.step);
            for line in [lower, upper] {
                if line <= 0.0 {
                    continue;
                }
                let margin = value - line;
                if margin > 0.0 && margin <= params.max_gap {
                    let score = Self::line_score(margin, params);
                    if score > 0.0 {
                        out.push(Opportunity {
                            label: format!("{} Over {:.1} {}", side.label(), line, params.label),
                            category: Self::goal_category(family),
                            family,
                            direction: MarketDirection::Over,
                            score,
                            reasoning: format!(
                                "{} side predicted at {:.1}, {:.1} above the line",
                                side.label(),
                                value,
                                margin
                            ),
                        });
                    }
                }
            }
        }
    }

    /// 1/X/2 from the predicted goal differential, plus win-to-nil
    /// dominance when the beaten side is not expected to score.
    fn outcome_markets(&self, predicted: &PredictedStats, out: &mut Vec<Opportunity>) {
        let diff = predicted.home.goals - predicted.away.goals;
        let magnitude = diff.abs();

        if magnitude > self.config.win_threshold {
            let (direction, winner, loser) = if diff > 0.0 {
                (MarketDirection::Home, Side::Home, Side::Away)
            } else {
                (MarketDirection::Away, Side::Away, Side::Home)
            };
            out.push(Opportunity {
                label: direction.as_str().to_string(),
                category: OpportunityCategory::Outcome,
                family: StatFamily::Outcome,
                direction,
                score: (50.0 + magnitude * 15.0).min(OUTCOME_CAP),
                reasoning: format!(
                    "{} side predicted {:.1} goals ahead",
                    winner.label(),
                    magnitude
                ),
            });

            if predicted.side(loser).goals < 0.5 {
                let sot_gap = predicted.side(winner).shots_on_target
                    - predicted.side(loser).shots_on_target;
                out.push(Opportunity {
                    label: format!("{} wins to nil", winner.label()),
                    category: OpportunityCategory::Dominance,
                    family: StatFamily::Outcome,
                    direction,
                    score: (75.0 + 2.0 * sot_gap).clamp(0.0, OUTCOME_CAP),
                    reasoning: format!(
                        "{} keeps a clean sheet and leads shots on target by {:.1}",
                        winner.label(),
                        sot_gap
                    ),
                });
            }
        } else if magnitude <= self.config.draw_threshold {
            out.push(Opportunity {
                label: "X".to_string(),
                category: OpportunityCategory::Outcome,
                family: StatFamily::Outcome,
                direction: MarketDirection::Draw,
                score: (DRAW_CAP - magnitude * 100.0).clamp(0.0, DRAW_CAP),
                reasoning: format!("Predicted goal differential is only {:.2}", magnitude),
            });
        }
    }

    /// "This side dominates this stat" markets for clearly lopsided
    /// predictions.
    fn dominance_markets(&self, predicted: &PredictedStats, out: &mut Vec<Opportunity>) {
        for family in DOMINANCE_FAMILIES {
            let params = self.config.market(family);
            let home = predicted.side_stat(family, Side::Home);
            let away = predicted.side_stat(family, Side::Away);
            let gap = home - away;
            if gap.abs() <= 2.0 * params.min_margin {
                continue;
            }
            let (side, direction) = if gap > 0.0 {
                (Side::Home, MarketDirection::Over)
            } else {
                (Side::Away, MarketDirection::Under)
            };
            out.push(Opportunity {
                label: format!("{} dominates {}", side.label(), params.label.to_lowercase()),
                category: OpportunityCategory::Dominance,
                family,
                direction,
                score: (params.base_score + gap.abs() * params.volatility * 5.0).min(OUTCOME_CAP),
                reasoning: format!(
                    "{} predicted {:.1} vs {:.1} {}",
                    side.label(),
                    home.max(away),
                    home.min(away),
                    params.label.to_lowercase()
                ),
            });
        }
    }

    /// Both-teams-score and no-goal markets.
    fn goal_markets(&self, predicted: &PredictedStats, out: &mut Vec<Opportunity>) {
        let home = predicted.home.goals;
        let away = predicted.away.goals;
        let total = home + away;

        if home > BTTS_FLOOR && away > BTTS_FLOOR {
            let weaker = home.min(away);
            out.push(Opportunity {
                label: "Both teams score".to_string(),
                category: OpportunityCategory::Goals,
                family: StatFamily::Goal,
                direction: MarketDirection::Over,
                score: (60.0 + (weaker - BTTS_FLOOR) * 40.0).min(OUTCOME_CAP),
                reasoning: format!(
                    "Both sides predicted to score ({:.1} and {:.1})",
                    home, away
                ),
            });
        }

        let one_side_dry = (home < NO_GOAL_LOW && away < NO_GOAL_HIGH)
            || (away < NO_GOAL_LOW && home < NO_GOAL_HIGH);
        if one_side_dry {
            out.push(Opportunity {
                label: "No goal".to_string(),
                category: OpportunityCategory::Goals,
                family: StatFamily::Goal,
                direction: MarketDirection::Under,
                score: (55.0 + (2.0 - total).max(0.0) * 15.0).min(OUTCOME_CAP),
                reasoning: format!("Predicted total of {:.1} goals is starvation level", total),
            });
        }
    }

    /// Compare model-implied 1X2 probabilities against bookmaker odds and
    /// flag positive-edge outcomes. Skipped entirely when no odds exist.
    fn value_bets(
        &self,
        predicted: &PredictedStats,
        odds: &ClosingOdds,
        out: &mut Vec<Opportunity>,
    ) {
        let probs = outcome_probabilities(predicted.home.goals, predicted.away.goals);
        let outcomes = [
            (MarketDirection::Home, probs.home, odds.home),
            (MarketDirection::Draw, probs.draw, odds.draw),
            (MarketDirection::Away, probs.away, odds.away),
        ];
        for (direction, probability, odd) in outcomes {
            let edge = probability * odd - 1.0;
            if edge <= self.config.value_edge_threshold {
                continue;
            }
            out.push(Opportunity {
                label: format!("Value: {}", direction.as_str()),
                category: OpportunityCategory::Value,
                family: StatFamily::Outcome,
                direction,
                score: (70.0 + edge * 200.0).min(MAX_SCORE),
                reasoning: format!(
                    "Model gives {:.1}% (fair {:.2}) vs {:.1}% implied at {:.2} ({:+.1}% edge)",
                    probability * 100.0,
                    probability_to_odds(probability),
                    odds_to_probability(odd) * 100.0,
                    odd,
                    edge * 100.0
                ),
            });
        }
    }

    /// Accuracy re-weighting, the confidence floor, ranking, and the
    /// per-family deduplication pass.
    fn finalize(&self, mut candidates: Vec<Opportunity>) -> Vec<Opportunity> {
        for candidate in &mut candidates {
            let multiplier = self
                .profiles
                .multiplier(candidate.family, candidate.direction);
            candidate.score = (candidate.score * multiplier).min(MAX_SCORE);
        }
        candidates.retain(|c| c.score >= self.config.min_confidence_score);
        // stable: equal scores keep generation order
        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let mut kept: Vec<Opportunity> = Vec::with_capacity(candidates.len());
        let mut per_family: std::collections::HashMap<StatFamily, usize> =
            std::collections::HashMap::new();
        for candidate in candidates {
            let allowed = match candidate.family {
                StatFamily::Outcome | StatFamily::Goal => 2,
                _ => 1,
            };
            let count = per_family.entry(candidate.family).or_insert(0);
            if *count < allowed {
                *count += 1;
                kept.push(candidate);
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccuracyProfile, SidePrediction};
    use chrono::Utc;

    fn side(goals: f64, shots: f64, sot: f64, corners: f64) -> SidePrediction {
        SidePrediction {
            goals,
            possession: 50.0,
            shots,
            shots_on_target: sot,
            corners,
            fouls: 12.0,
            yellow_cards: 2.0,
            offsides: 1.5,
        }
    }

    fn scorer_defaults() -> (BettingConfig, AccuracyProfiles) {
        (BettingConfig::default(), AccuracyProfiles::default())
    }

    #[test]
    fn test_missing_forecast_yields_empty_list() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        assert!(scorer.score_opportunities(None, None).is_empty());
    }

    #[test]
    fn test_dominant_home_forecast() {
        // a 3-0 forecast with 8 vs 1 shots on target
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(3.0, 16.0, 8.0, 6.0),
            away: side(0.0, 5.0, 1.0, 3.0),
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), None);

        let home_win = opportunities.iter().find(|o| o.label == "1").unwrap();
        assert!(home_win.score >= 65.0);

        let to_nil = opportunities
            .iter()
            .find(|o| o.label == "Home wins to nil")
            .unwrap();
        assert_eq!(to_nil.category, OpportunityCategory::Dominance);
        // 75 + 2 × (8 − 1)
        assert!((to_nil.score - 89.0).abs() < 1e-9);

        assert!(!opportunities.iter().any(|o| o.label == "2"));
        assert!(!opportunities.iter().any(|o| o.label == "X"));
        // a shots-on-target dominance market fires on the 7-shot gap
        assert!(opportunities
            .iter()
            .any(|o| o.family == StatFamily::ShotsOT
                && o.category == OpportunityCategory::Dominance));
    }

    #[test]
    fn test_corner_smart_lines() {
        // 9.2 predicted corners against the default config
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(1.0, 10.0, 4.0, 5.0),
            away: side(1.0, 10.0, 4.0, 4.2),
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), None);

        let over = opportunities
            .iter()
            .find(|o| o.label == "Over 8.5 Corners")
            .unwrap();
        // 50 + 0.7 × 2.0 × 10
        assert!((over.score - 64.0).abs() < 1e-9);
        // Under 9.5 has margin 0.3, below the 0.5 minimum: scored zero and
        // discarded
        assert!(!opportunities.iter().any(|o| o.label == "Under 9.5 Corners"));
    }

    #[test]
    fn test_draw_forecast() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(1.1, 11.0, 4.0, 5.0),
            away: side(1.0, 10.0, 4.0, 5.0),
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), None);
        let draw = opportunities.iter().find(|o| o.label == "X").unwrap();
        assert!((draw.score - 80.0).abs() < 1e-6);
        assert!(!opportunities.iter().any(|o| o.label == "1"));
    }

    #[test]
    fn test_both_teams_score_and_no_goal_are_exclusive() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);

        let open_game = PredictedStats {
            home: side(1.8, 14.0, 6.0, 6.0),
            away: side(1.4, 11.0, 5.0, 4.0),
        };
        let opportunities = scorer.score_opportunities(Some(&open_game), None);
        assert!(opportunities.iter().any(|o| o.label == "Both teams score"));
        assert!(!opportunities.iter().any(|o| o.label == "No goal"));

        let dry_game = PredictedStats {
            home: side(0.4, 6.0, 2.0, 3.0),
            away: side(0.5, 7.0, 2.0, 3.0),
        };
        let opportunities = scorer.score_opportunities(Some(&dry_game), None);
        assert!(opportunities.iter().any(|o| o.label == "No goal"));
        assert!(!opportunities.iter().any(|o| o.label == "Both teams score"));
    }

    #[test]
    fn test_dedup_allows_two_goal_markets_one_per_other_family() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(2.2, 15.0, 7.0, 7.0),
            away: side(1.3, 12.0, 5.0, 5.2),
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), None);

        let mut per_family: std::collections::HashMap<StatFamily, usize> =
            std::collections::HashMap::new();
        for o in &opportunities {
            *per_family.entry(o.family).or_insert(0) += 1;
        }
        for (family, count) in per_family {
            let allowed = match family {
                StatFamily::Goal | StatFamily::Outcome => 2,
                _ => 1,
            };
            assert!(
                count <= allowed,
                "{:?} kept {} opportunities",
                family,
                count
            );
        }
    }

    #[test]
    fn test_scores_never_exceed_the_cap() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(6.0, 30.0, 18.0, 14.0),
            away: side(0.1, 2.0, 0.5, 1.0),
        };
        let odds = ClosingOdds {
            home: 4.0,
            draw: 9.0,
            away: 15.0,
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), Some(&odds));
        assert!(!opportunities.is_empty());
        for o in &opportunities {
            assert!(o.score >= 0.0 && o.score <= MAX_SCORE, "{} out of range", o.score);
        }
    }

    #[test]
    fn test_value_bet_requires_odds_and_edge() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(2.4, 15.0, 7.0, 6.0),
            away: side(0.8, 8.0, 3.0, 4.0),
        };

        // without odds the value stage is silently skipped
        let without = scorer.score_opportunities(Some(&predicted), None);
        assert!(!without
            .iter()
            .any(|o| o.category == OpportunityCategory::Value));

        // generous home odds against a strong home forecast: clear edge
        let odds = ClosingOdds {
            home: 2.4,
            draw: 3.4,
            away: 3.0,
        };
        let with = scorer.score_opportunities(Some(&predicted), Some(&odds));
        let value = with
            .iter()
            .find(|o| o.category == OpportunityCategory::Value)
            .unwrap();
        assert_eq!(value.direction, MarketDirection::Home);

        // short odds carry no edge
        let short = ClosingOdds {
            home: 1.3,
            draw: 3.4,
            away: 3.0,
        };
        let without_edge = scorer.score_opportunities(Some(&predicted), Some(&short));
        assert!(!without_edge
            .iter()
            .any(|o| o.direction == MarketDirection::Home
                && o.category == OpportunityCategory::Value));
    }

    #[test]
    fn test_accuracy_multiplier_reweights_scores() {
        let config = BettingConfig::default();
        let profiles = AccuracyProfiles::from_profiles(vec![AccuracyProfile {
            family: StatFamily::Corners,
            direction: MarketDirection::Over,
            accuracy: 85.0,
            sample_size: 60,
            last_updated: Utc::now(),
        }]);
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(1.0, 10.0, 4.0, 5.0),
            away: side(1.0, 10.0, 4.0, 4.2),
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), None);
        let over = opportunities
            .iter()
            .find(|o| o.label == "Over 8.5 Corners")
            .unwrap();
        // 64 raw × 1.25 for a market the model has been right on
        assert!((over.score - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_results_are_sorted_by_score() {
        let (config, profiles) = scorer_defaults();
        let scorer = MarketScorer::new(&config, &profiles);
        let predicted = PredictedStats {
            home: side(2.6, 16.0, 7.0, 7.0),
            away: side(0.4, 6.0, 2.0, 3.5),
        };
        let opportunities = scorer.score_opportunities(Some(&predicted), None);
        for pair in opportunities.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }
}
