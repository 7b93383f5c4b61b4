//! Monte Carlo fan-out and scenario bands.
//!
//! Each trial is a fresh `SimEngine` with its own seed and its own users,
//! escorts and orders; nothing is shared between trials. Trials run on
//! the rayon pool and are reduced into P10/P50/P90 bands once all of them
//! are done. A trial that fails is reported and left out of the bands;
//! the others are unaffected.

use crate::{
    config::SimConfig,
    demand_subsystem::AcquisitionSummary,
    engine::SimEngine,
    error::{SimError, SimResult},
    event::EventLogEntry,
    matching_subsystem::MatchStats,
    order::Order,
    rng::trial_seed,
    snapshot::CohortSnapshot,
};
use rayon::prelude::*;
use serde::Serialize;

/// Documented sanity band for annualized GMV (currency units per year).
pub const ANNUALIZED_GMV_BAND: (f64, f64) = (0.20e8, 0.77e8);

pub const CONSERVATIVE_PERCENTILE: f64 = 0.10;
pub const NEUTRAL_PERCENTILE: f64 = 0.50;
pub const OPTIMISTIC_PERCENTILE: f64 = 0.90;

/// Everything one trial produced.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub trial:       u32,
    pub seed:        u64,
    pub snapshots:   Vec<CohortSnapshot>,
    pub order_log:   Vec<Order>,
    pub event_log:   Vec<EventLogEntry>,
    pub summary:     TrialSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialSummary {
    pub trial:              u32,
    pub seed:               u64,
    pub final_gmv:          f64,
    pub annualized_gmv:     f64,
    pub final_active_users: u32,
    pub final_churned_users: u32,
    pub mean_match_success: f64,
    pub final_nps:          f64,
    pub match_stats:        MatchStats,
    pub acquisition:        AcquisitionSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioBand {
    pub conservative: f64,
    pub neutral:      f64,
    pub optimistic:   f64,
}

impl ScenarioBand {
    pub fn from_values(values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            conservative: percentile(&sorted, CONSERVATIVE_PERCENTILE),
            neutral:      percentile(&sorted, NEUTRAL_PERCENTILE),
            optimistic:   percentile(&sorted, OPTIMISTIC_PERCENTILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioBands {
    pub final_gmv:           ScenarioBand,
    pub annualized_gmv:      ScenarioBand,
    pub final_active_users:  ScenarioBand,
    pub final_churned_users: ScenarioBand,
    pub mean_match_success:  ScenarioBand,
    pub final_nps:           ScenarioBand,
}

impl ScenarioBands {
    pub fn from_summaries(summaries: &[TrialSummary]) -> Self {
        let band = |f: fn(&TrialSummary) -> f64| {
            ScenarioBand::from_values(&summaries.iter().map(f).collect::<Vec<_>>())
        };
        Self {
            final_gmv:           band(|s| s.final_gmv),
            annualized_gmv:      band(|s| s.annualized_gmv),
            final_active_users:  band(|s| s.final_active_users as f64),
            final_churned_users: band(|s| s.final_churned_users as f64),
            mean_match_success:  band(|s| s.mean_match_success),
            final_nps:           band(|s| s.final_nps),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialFailure {
    pub trial: u32,
    pub error: String,
}

/// What the reporting layer consumes.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationOutput {
    /// Reference trial: the lowest-indexed trial that completed.
    pub reference_trial:  u32,
    pub snapshots:        Vec<CohortSnapshot>,
    pub order_log:        Vec<Order>,
    pub event_log:        Vec<EventLogEntry>,
    pub final_gmv:        f64,
    pub annualized_gmv:   f64,
    pub scenario_bands:   ScenarioBands,
    pub trials:           Vec<TrialSummary>,
    pub completed_trials: usize,
    pub failed_trials:    usize,
    pub failures:         Vec<TrialFailure>,
}

/// Nearest-rank percentile of already sorted values; 0.0 when empty.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// GMV over `days` simulated days of a `market_scale` sample, projected
/// to the full market and a 365-day year.
pub fn annualize_gmv(gmv: f64, market_scale: f64, days: u64) -> f64 {
    if days == 0 || market_scale <= 0.0 {
        return 0.0;
    }
    gmv / market_scale * 365.0 / days as f64
}

/// Primary entry point: validate, run every trial, aggregate.
pub fn run_simulation(config: &SimConfig) -> SimResult<SimulationOutput> {
    config.validate()?;
    let trials = config.trials();
    log::info!("simulation: trials={trials} days={} seed={}", config.total_days, config.random_seed);

    let results: Vec<(u32, SimResult<TrialOutcome>)> = (0..trials)
        .into_par_iter()
        .map(|trial| (trial, run_trial(config, trial)))
        .collect();

    aggregate_trials(results, config)
}

/// Run trial `trial` to the configured horizon.
pub fn run_trial(config: &SimConfig, trial: u32) -> SimResult<TrialOutcome> {
    let seed = trial_seed(config.random_seed, trial);
    let mut engine = SimEngine::new(config.clone(), trial, seed)?;
    engine.run_to_end()?;

    let snapshots = engine.snapshots();
    let final_gmv = engine.cumulative_gmv();
    let last = snapshots.last();
    let mean_match_success = if snapshots.is_empty() {
        0.0
    } else {
        snapshots.iter().map(|s| s.match_success_rate).sum::<f64>() / snapshots.len() as f64
    };
    let summary = TrialSummary {
        trial,
        seed,
        final_gmv,
        annualized_gmv: annualize_gmv(final_gmv, config.market_scale, config.days()),
        final_active_users: last.map_or(0, |s| s.active),
        final_churned_users: last.map_or(0, |s| s.churned),
        mean_match_success,
        final_nps: last.map_or(0.0, |s| s.nps),
        match_stats: engine.match_stats(),
        acquisition: engine.acquisition_summary(),
    };
    log::info!(
        "trial={trial} finished: gmv={:.0} annualized={:.0} active={} churned={}",
        summary.final_gmv, summary.annualized_gmv, summary.final_active_users, summary.final_churned_users
    );

    let (snapshots, order_log, event_log) = engine.into_logs();
    Ok(TrialOutcome { trial, seed, snapshots, order_log, event_log, summary })
}

/// Reduce per-trial results. Failed trials are counted and reported;
/// only when every trial failed is the whole run an error.
pub fn aggregate_trials(
    mut results: Vec<(u32, SimResult<TrialOutcome>)>,
    config: &SimConfig,
) -> SimResult<SimulationOutput> {
    results.sort_by_key(|(trial, _)| *trial);

    let mut outcomes = Vec::new();
    let mut failures = Vec::new();
    for (trial, result) in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                log::warn!("trial={trial} failed: {e}");
                failures.push(TrialFailure { trial, error: e.to_string() });
            }
        }
    }

    let mut outcomes = outcomes.into_iter();
    let Some(reference) = outcomes.next() else {
        return Err(SimError::NoSuccessfulTrials { failed: failures.len() });
    };
    let mut summaries = vec![reference.summary.clone()];
    summaries.extend(outcomes.map(|o| o.summary));

    let scenario_bands = ScenarioBands::from_summaries(&summaries);
    let final_gmv = reference.summary.final_gmv;
    let annualized_gmv = annualize_gmv(final_gmv, config.market_scale, config.days());
    Ok(SimulationOutput {
        reference_trial: reference.trial,
        snapshots: reference.snapshots,
        order_log: reference.order_log,
        event_log: reference.event_log,
        final_gmv,
        annualized_gmv,
        scenario_bands,
        completed_trials: summaries.len(),
        failed_trials: failures.len(),
        trials: summaries,
        failures,
    })
}
