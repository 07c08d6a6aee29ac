use crate::models::{Opportunity, PredictedStats};
use crate::services::markets::MarketScorer;

/// One slip entry: the single best opportunity of one match.
#[derive(Debug, Clone)]
pub struct SlipPick {
    pub match_id: String,
    pub opportunity: Opportunity,
}

/// Pick the top `slip_size` highest-confidence opportunities across
/// matches, at most one per match, dropping matches whose best opportunity
/// sits below `min_score`. Ties keep input order (stable sort).
pub fn select_slip(
    scorer: &MarketScorer<'_>,
    predictions: &[(String, PredictedStats)],
    slip_size: usize,
    min_score: f64,
) -> Vec<SlipPick> {
    let mut candidates: Vec<SlipPick> = Vec::new();
    let mut used_matches: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for (match_id, predicted) in predictions {
        if !used_matches.insert(match_id.as_str()) {
            continue;
        }
        let Some(best) = scorer
            .score_opportunities(Some(predicted), None)
            .into_iter()
            .next()
        else {
            continue;
        };
        if best.score >= min_score {
            candidates.push(SlipPick {
                match_id: match_id.clone(),
                opportunity: best,
            });
        }
    }

    candidates.sort_by(|a, b| {
        b.opportunity
            .score
            .partial_cmp(&a.opportunity.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(slip_size);
    candidates
}
