use crate::models::{ForecastRow, PredictedStats, SidePrediction};

/// The trained statistical model, seen from the core as an opaque function.
/// Implementations live outside this crate; `BaselineModel` is the
/// in-process stand-in.
pub trait ForecastModel {
    fn predict(&self, home: &ForecastRow, away: &ForecastRow) -> PredictedStats;
}

/// Home sides outscore their blended rate slightly; away sides undershoot.
const HOME_LIFT: f64 = 1.1;
const AWAY_DRAG: f64 = 0.9;

/// A deliberately simple rate-blend model so the prediction pipeline can
/// run end to end without an external model artifact. Attack meets
/// opposing defence, adjusted for venue and the starters' xG signal. Smoke
/// tests and demos only; it makes no accuracy claims.
pub struct BaselineModel;

impl BaselineModel {
    fn side(
        attack: &ForecastRow,
        defence: &ForecastRow,
        venue_factor: f64,
        possession: f64,
    ) -> SidePrediction {
        let goal_rate = ((attack.avg_gf + defence.avg_ga) / 2.0) * venue_factor
            + attack.starters_xg * 0.25;
        let goals = goal_rate.max(0.0);
        let shots = 7.0 + goals * 4.0 + attack.xg_ratio * 4.0;
        let shots_on_target = shots * 0.38;
        let corners = 3.0 + shots * 0.2;
        // derbies get scrappier
        let fouls = 11.0 + attack.is_derby as f64 * 0.4;
        let yellow_cards = 1.3 + fouls * 0.06 + attack.pressure_index / 100.0;
        let offsides = 1.2 + goals * 0.4;

        SidePrediction {
            goals,
            possession,
            shots,
            shots_on_target,
            corners,
            fouls,
            yellow_cards,
            offsides,
        }
    }
}

impl ForecastModel for BaselineModel {
    fn predict(&self, home: &ForecastRow, away: &ForecastRow) -> PredictedStats {
        // possession follows the rating gap, clamped to a plausible band
        let home_possession = (50.0 + (home.elo - away.elo) / 20.0).clamp(30.0, 70.0);
        PredictedStats {
            home: Self::side(home, away, HOME_LIFT, home_possession),
            away: Self::side(away, home, AWAY_DRAG, 100.0 - home_possession),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(avg_gf: f64, avg_ga: f64, elo: f64) -> ForecastRow {
        ForecastRow {
            avg_gf,
            avg_ga,
            elo,
            ..Default::default()
        }
    }

    #[test]
    fn test_stronger_attack_scores_more() {
        let model = BaselineModel;
        let strong = row(2.4, 0.6, 1600.0);
        let weak = row(0.7, 1.9, 1420.0);
        let predicted = model.predict(&strong, &weak);
        assert!(predicted.home.goals > predicted.away.goals);
        assert!(predicted.home.possession > predicted.away.possession);
        assert!((predicted.home.possession + predicted.away.possession - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_outputs_are_non_negative() {
        let model = BaselineModel;
        let anaemic = row(0.0, 0.0, 1500.0);
        let predicted = model.predict(&anaemic, &anaemic);
        for side in [predicted.home, predicted.away] {
            assert!(side.goals >= 0.0);
            assert!(side.shots >= 0.0);
            assert!(side.yellow_cards >= 0.0);
        }
    }

    #[test]
    fn test_default_rows_give_home_edge() {
        // two unknown teams: the venue factor alone separates them
        let model = BaselineModel;
        let predicted = model.predict(&ForecastRow::default(), &ForecastRow::default());
        assert!(predicted.home.goals > predicted.away.goals);
    }
}
