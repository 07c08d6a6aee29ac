use statrs::distribution::{Discrete, Poisson};

/// Goal counts above this per side carry negligible probability mass; the
/// outcome grid is truncated here and renormalized.
pub const MAX_GRID_GOALS: u64 = 10;

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n-1 denominator); 0.0 with fewer than two
/// data points.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// The two half-step lines bracketing a predicted value.
///
/// With step 1.0 a prediction of 2.8 yields (2.5, 3.5) and 9.2 yields
/// (8.5, 9.5): always the nearest line on each side, so neither market is
/// trivially one-sided. A prediction landing exactly on a line sits on the
/// lower bound of the pair.
pub fn smart_lines(value: f64, step: f64) -> (f64, f64) {
    let step = if step > 0.0 { step } else { 1.0 };
    let scaled = value / step;
    let base = scaled.floor();
    let lower = if scaled - base >= 0.5 {
        (base + 0.5) * step
    } else {
        (base - 0.5) * step
    };
    (lower, lower + step)
}

/// Convert probability to decimal odds
pub fn probability_to_odds(probability: f64) -> f64 {
    if probability <= 0.0 || probability >= 1.0 {
        return 1000.0; // Very high odds for impossible/certain events
    }
    1.0 / probability
}

/// Convert decimal odds to implied probability
pub fn odds_to_probability(odds: f64) -> f64 {
    if odds <= 1.0 {
        return 0.99; // Cap at 99%
    }
    (1.0 / odds).min(0.99)
}

/// Model-implied 1X2 probabilities from independent Poisson goal rates.
#[derive(Debug, Clone, Copy)]
pub struct OutcomeProbs {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    /// Probability mass inside the truncated grid, before renormalization.
    pub captured_mass: f64,
}

/// Walk the score grid 0..=10 × 0..=10 under independent Poisson rates,
/// classify each cell by which side scores more, and renormalize by the
/// captured mass (the grid is truncated).
pub fn outcome_probabilities(home_rate: f64, away_rate: f64) -> OutcomeProbs {
    // Poisson is undefined for non-positive rates; a forecast of 0 goals is
    // treated as a very low scoring rate instead.
    let home_dist = Poisson::new(home_rate.max(0.05)).expect("positive rate");
    let away_dist = Poisson::new(away_rate.max(0.05)).expect("positive rate");

    let mut home = 0.0;
    let mut draw = 0.0;
    let mut away = 0.0;
    for h in 0..=MAX_GRID_GOALS {
        let p_h = home_dist.pmf(h);
        for a in 0..=MAX_GRID_GOALS {
            let p = p_h * away_dist.pmf(a);
            match h.cmp(&a) {
                std::cmp::Ordering::Greater => home += p,
                std::cmp::Ordering::Equal => draw += p,
                std::cmp::Ordering::Less => away += p,
            }
        }
    }

    let captured_mass = home + draw + away;
    if captured_mass <= 0.0 {
        return OutcomeProbs {
            home: 0.0,
            draw: 0.0,
            away: 0.0,
            captured_mass: 0.0,
        };
    }
    OutcomeProbs {
        home: home / captured_mass,
        draw: draw / captured_mass,
        away: away / captured_mass,
        captured_mass,
    }
}
