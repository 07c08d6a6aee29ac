use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{AccuracyCache, BettingConfig};
use crate::models::{PredictionRecord, Team};
use crate::services::{
    dataset, select_slip, AccuracyTracker, BaselineModel, EloTracker, FeatureEngine,
    FeatureRequest, ForecastModel, LineupMode, MarketScorer,
};
use crate::store::{HistoryStore, MemoryStore, OddsSource};

/// Backstop TTL for the accuracy cache; explicit invalidation is the
/// primary mechanism.
const ACCURACY_CACHE_TTL: Duration = Duration::from_secs(300);

fn load_store(path: &Path) -> Result<MemoryStore> {
    MemoryStore::load(path).with_context(|| format!("loading dataset {}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<BettingConfig> {
    match path {
        Some(path) => {
            BettingConfig::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => Ok(BettingConfig::default()),
    }
}

fn parse_as_of(date: Option<&str>) -> Result<DateTime<Utc>> {
    let Some(date) = date else { return Ok(Utc::now()) };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("unrecognized date '{}' (want RFC3339 or YYYY-MM-DD)", date))?;
    let midnight = day
        .and_hms_opt(0, 0, 0)
        .context("invalid midnight timestamp")?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

/// Generate a synthetic demo dataset.
pub fn seed(out: &Path, seed_value: u64) -> Result<()> {
    let store = crate::store::seed::demo_store(seed_value);
    store.save(out)?;
    println!(
        "🌱 Seeded {} teams and {} matches into {}",
        store.teams.len(),
        store.matches.len(),
        out.display()
    );
    Ok(())
}

/// Replay the Elo ratings chronologically and persist the snapshots.
pub fn replay(dataset: &Path) -> Result<()> {
    let mut store = load_store(dataset)?;
    let tracker = EloTracker::new();
    let ratings = tracker.replay(&mut store)?;
    store.save(dataset)?;

    let mut table: Vec<(&String, &f64)> = ratings.iter().collect();
    table.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("📈 Elo replay complete. Current top 10:\n");
    for (i, (team_id, rating)) in table.iter().take(10).enumerate() {
        let name = store
            .team(team_id)
            .map(|t| t.name)
            .unwrap_or_else(|_| (*team_id).clone());
        println!("{:>2}. {:<18} {:7.1}", i + 1, name, rating);
    }
    Ok(())
}

/// Recompute every (match, team) form snapshot. Runs the Elo replay first
/// so rating snapshots are never stale.
pub fn snapshots(dataset: &Path) -> Result<()> {
    let mut store = load_store(dataset)?;
    EloTracker::new().replay(&mut store)?;

    let engine = FeatureEngine::default();
    let registry = store.derby_registry();
    let written = engine.snapshot_all(&mut store, &registry)?;
    store.save(dataset)?;
    println!("🧮 Wrote {} form snapshots", written);
    Ok(())
}

fn next_fixture_for(store: &MemoryStore, team: &Team) -> Result<Option<crate::models::MatchRecord>> {
    Ok(store
        .scheduled_matches()?
        .into_iter()
        .find(|m| m.involves(&team.id)))
}

/// Print a team's feature vector as of a date (default: now), in the
/// context of its next scheduled fixture.
pub fn features(dataset: &Path, team_name: &str, date: Option<&str>) -> Result<()> {
    let store = load_store(dataset)?;
    let Some(team) = store.team_by_name(team_name).cloned() else {
        println!("❌ No team matching '{}'", team_name);
        println!("\n💡 Known teams:");
        for t in store.teams.iter().take(20) {
            println!("   • {}", t.name);
        }
        return Ok(());
    };

    let Some(fixture) = next_fixture_for(&store, &team)? else {
        bail!("no scheduled fixture found for {}", team.name);
    };
    let home_team = store.team(&fixture.home_team_id)?;
    let away_team = store.team(&fixture.away_team_id)?;
    let as_of = match date {
        Some(_) => parse_as_of(date)?,
        None => fixture.date_time,
    };

    let engine = FeatureEngine::default();
    let registry = store.derby_registry();
    let row = engine.compute(
        &store,
        &registry,
        &FeatureRequest {
            team: &team,
            home_team: &home_team,
            away_team: &away_team,
            season: &fixture.season,
            as_of,
            lineup_mode: LineupMode::Probable,
            anchor_match_id: Some(&fixture.id),
        },
    )?;

    println!(
        "📊 {} ahead of {} vs {} (as of {})\n",
        team.name,
        home_team.name,
        away_team.name,
        as_of.format("%Y-%m-%d %H:%M")
    );
    println!("   Form:          {} ({} pts)", row.form_sequence, row.points);
    println!("   Rest days:     {}", row.rest_days);
    println!("   Elo:           {:.1}", row.elo);
    println!("   Avg xG:        {:.2}", row.avg_xg);
    println!("   Avg GF/GA:     {:.2} / {:.2}", row.avg_gf, row.avg_ga);
    println!("   xG ratio:      {:.2}", row.xg_ratio);
    println!("   Efficiency:    att {:+.2} / def {:+.2}", row.eff_att, row.eff_def);
    println!("   Volatility:    {:.2}", row.volatility);
    println!("   Derby:         {}/10", row.is_derby);
    println!("   Pressure:      {:.0}/100", row.pressure_index);
    println!("   Starters xG:   {:.2}", row.starters_xg);
    Ok(())
}

/// Run the baseline model over every scheduled match and store the
/// resulting prediction records.
pub fn predict(dataset: &Path) -> Result<()> {
    let mut store = load_store(dataset)?;
    let engine = FeatureEngine::default();
    let registry = store.derby_registry();
    let model = BaselineModel;

    let fixtures = store.scheduled_matches()?;
    if fixtures.is_empty() {
        println!("📭 No scheduled matches in the dataset.");
        return Ok(());
    }

    let mut count = 0usize;
    for fixture in &fixtures {
        let home_team = store.team(&fixture.home_team_id)?;
        let away_team = store.team(&fixture.away_team_id)?;

        let mut request = FeatureRequest {
            team: &home_team,
            home_team: &home_team,
            away_team: &away_team,
            season: &fixture.season,
            as_of: fixture.date_time,
            lineup_mode: LineupMode::Probable,
            anchor_match_id: Some(&fixture.id),
        };
        let home_row = engine.compute(&store, &registry, &request)?;
        request.team = &away_team;
        let away_row = engine.compute(&store, &registry, &request)?;

        let stats = model.predict(&home_row, &away_row);
        store.upsert_prediction(PredictionRecord {
            id: Uuid::new_v4().to_string(),
            match_id: fixture.id.clone(),
            created_at: Utc::now(),
            stats,
        });

        println!(
            "🔮 {} vs {}: {:.1}-{:.1} (shots {:.0}-{:.0}, corners {:.0}-{:.0})",
            home_team.name,
            away_team.name,
            stats.home.goals,
            stats.away.goals,
            stats.home.shots,
            stats.away.shots,
            stats.home.corners,
            stats.away.corners
        );
        count += 1;
    }

    store.save(dataset)?;
    println!("\n✅ Stored predictions for {} matches", count);
    Ok(())
}

/// Score betting opportunities for stored predictions.
pub fn score(dataset: &Path, match_id: Option<&str>, config_path: Option<&Path>) -> Result<()> {
    let store = load_store(dataset)?;
    let config = load_config(config_path)?;

    let mut cache = AccuracyCache::new(ACCURACY_CACHE_TTL);
    let profiles = cache.profiles(&store)?.clone();
    let scorer = MarketScorer::new(&config, &profiles);

    let fixtures: Vec<_> = match match_id {
        Some(id) => match store.match_by_id(id)? {
            Some(m) => vec![m],
            None => bail!("match '{}' not in dataset", id),
        },
        None => store.scheduled_matches()?,
    };

    let mut shown = 0usize;
    for fixture in &fixtures {
        let Some(prediction) = store.latest_prediction(&fixture.id)? else {
            continue;
        };
        let home = store.team(&fixture.home_team_id)?;
        let away = store.team(&fixture.away_team_id)?;
        let odds = store.closing_odds(&fixture.id);
        let opportunities = scorer.score_opportunities(Some(&prediction.stats), odds.as_ref());

        println!(
            "\n🎯 {} vs {} ({})",
            home.name,
            away.name,
            fixture.date_time.format("%Y-%m-%d %H:%M")
        );
        if opportunities.is_empty() {
            println!("   (nothing above the confidence floor)");
            continue;
        }
        for o in &opportunities {
            println!(
                "   {:>5.1}  {:<28} [{}] {}",
                o.score,
                o.label,
                o.category.as_str(),
                o.reasoning
            );
        }
        shown += 1;
    }

    if shown == 0 {
        println!("📭 No stored predictions to score. Run 'formforge predict' first.");
    }
    Ok(())
}

/// Build the best slip across all scheduled matches with predictions.
pub fn slip(dataset: &Path, config_path: Option<&Path>) -> Result<()> {
    let store = load_store(dataset)?;
    let config = load_config(config_path)?;

    let mut cache = AccuracyCache::new(ACCURACY_CACHE_TTL);
    let profiles = cache.profiles(&store)?.clone();
    let scorer = MarketScorer::new(&config, &profiles);

    let mut predictions = Vec::new();
    for fixture in store.scheduled_matches()? {
        if let Some(record) = store.latest_prediction(&fixture.id)? {
            predictions.push((fixture.id.clone(), record.stats));
        }
    }
    if predictions.is_empty() {
        println!("📭 No stored predictions. Run 'formforge predict' first.");
        return Ok(());
    }

    let picks = select_slip(&scorer, &predictions, config.slip_size, config.slip_min_score);
    if picks.is_empty() {
        println!("📭 Nothing confident enough for a slip today.");
        return Ok(());
    }

    println!("🎟️  Suggested slip:\n");
    for (i, pick) in picks.iter().enumerate() {
        let label = match store.match_by_id(&pick.match_id)? {
            Some(m) => {
                let home = store.team(&m.home_team_id)?;
                let away = store.team(&m.away_team_id)?;
                format!("{} vs {}", home.name, away.name)
            }
            None => pick.match_id.clone(),
        };
        println!(
            "{}. {:<38} {:<24} ({:.0})",
            i + 1,
            label,
            pick.opportunity.label,
            pick.opportunity.score
        );
    }
    Ok(())
}

/// Grade historical predictions and refresh the accuracy profiles.
pub fn accuracy(dataset: &Path, config_path: Option<&Path>) -> Result<()> {
    let mut store = load_store(dataset)?;
    let config = load_config(config_path)?;
    let mut cache = AccuracyCache::new(ACCURACY_CACHE_TTL);

    let tracker = AccuracyTracker::new(&config);
    let profiles = tracker.run_and_store(&mut store, &mut cache)?;
    store.save(dataset)?;

    if profiles.is_empty() {
        println!("📭 No graded predictions yet: nothing to profile.");
        return Ok(());
    }

    println!("📋 Market accuracy profiles:\n");
    println!("{:<10} {:<6} {:>9} {:>8}", "family", "dir", "accuracy", "sample");
    for p in &profiles {
        println!(
            "{:<10} {:<6} {:>8.1}% {:>8}",
            p.family.as_str(),
            p.direction.as_str(),
            p.accuracy,
            p.sample_size
        );
    }
    Ok(())
}

/// Export the training dataset as CSV.
pub fn export(dataset: &Path, out: &Path, season: Option<&str>) -> Result<()> {
    let store = load_store(dataset)?;
    let engine = FeatureEngine::default();
    let registry = store.derby_registry();

    let season = match season {
        Some(season) => season.to_string(),
        None => {
            // default to the most recent season on record
            let finished = store.finished_matches()?;
            match finished.last() {
                Some(m) => m.season.clone(),
                None => bail!("dataset has no finished matches to export"),
            }
        }
    };

    let rows = dataset::build_rows(&store, &engine, &registry, &season)?;
    dataset::export_csv(&rows, out)?;
    println!("📦 Exported {} training rows for {} to {}", rows.len(), season, out.display());
    Ok(())
}
