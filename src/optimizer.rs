//! Parameter search
//!
//! Wraps one backtest run as a pure scoring objective and drives a bounded
//! random search over a quantized parameter domain, tracking the best win
//! rate seen across evaluations.

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backtest::Backtester;
use crate::{Candle, SimulationError, StrategyParams};

/// Bounded continuous value on a fixed step grid, e.g. 0.1..=2.0 by 0.02.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl StepRange {
    /// Draw uniformly from the grid points `min, min+step, ..` up to `max`.
    fn sample(&self, rng: &mut StdRng) -> f64 {
        // Nudge before flooring so an exactly-divisible span keeps its last
        // grid point despite inexact division.
        let steps = ((self.max - self.min) / self.step + 1e-9).floor() as u64;
        self.min + rng.random_range(0..=steps) as f64 * self.step
    }
}

/// The search space: trigger multipliers on step grids plus an integer
/// window-size range with an exclusive upper bound.
#[derive(Debug, Clone)]
pub struct SearchDomain {
    pub k1: StepRange,
    pub k2: StepRange,
    pub window_min: usize,
    pub window_max: usize,
}

impl SearchDomain {
    fn sample(&self, rng: &mut StdRng) -> StrategyParams {
        StrategyParams {
            k1: self.k1.sample(rng),
            k2: self.k2.sample(rng),
            window_size: rng.random_range(self.window_min..self.window_max),
        }
    }
}

/// Scoring function over one immutable candle history.
///
/// Each evaluation re-splits the shared history by the candidate's window
/// size and runs a fresh simulation; nothing leaks between calls, so scoring
/// the same parameters twice yields the same score.
pub struct Objective<'a> {
    history: &'a [Candle],
    warmup: usize,
    initial_capital: f64,
    fee: f64,
}

impl<'a> Objective<'a> {
    pub fn new(history: &'a [Candle], warmup: usize, initial_capital: f64, fee: f64) -> Self {
        Objective {
            history,
            warmup,
            initial_capital,
            fee,
        }
    }

    /// Minimization score for one candidate: the negated win rate.
    pub fn evaluate(&self, params: &StrategyParams) -> Result<f64, SimulationError> {
        let backtester =
            Backtester::new(self.initial_capital, self.fee, self.warmup, params.clone());
        let report = backtester.run(self.history)?;
        Ok(-report.win_rate_pct)
    }
}

/// Best candidate found by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best_params: StrategyParams,
    pub best_win_rate_pct: f64,
    pub evals: usize,
}

/// Random search over `domain`, bounded by `max_evals` trials.
///
/// A simulation error on any trial aborts the whole search; a failing
/// candidate is never silently scored as worst-case.
pub fn search(
    objective: &Objective,
    domain: &SearchDomain,
    max_evals: usize,
    seed: Option<u64>,
) -> Result<SearchOutcome, SimulationError> {
    search_inner(objective, domain, max_evals, seed, None)
}

/// Same search, feeding an indicatif progress bar per trial.
pub fn search_with_progress(
    objective: &Objective,
    domain: &SearchDomain,
    max_evals: usize,
    seed: Option<u64>,
    progress_bar: &ProgressBar,
) -> Result<SearchOutcome, SimulationError> {
    search_inner(objective, domain, max_evals, seed, Some(progress_bar))
}

fn search_inner(
    objective: &Objective,
    domain: &SearchDomain,
    max_evals: usize,
    seed: Option<u64>,
    progress_bar: Option<&ProgressBar>,
) -> Result<SearchOutcome, SimulationError> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut best: Option<(StrategyParams, f64)> = None;

    for trial in 0..max_evals {
        let params = domain.sample(&mut rng);
        let win_rate_pct = -objective.evaluate(&params)?;

        if best.as_ref().map_or(true, |(_, rate)| win_rate_pct > *rate) {
            info!(
                trial,
                %params,
                win_rate_pct,
                "new best win rate"
            );
            best = Some((params, win_rate_pct));
        }

        if let Some(pb) = progress_bar {
            pb.inc(1);
            if let Some((_, rate)) = &best {
                pb.set_message(format!("best {rate:.2}%"));
            }
        }
    }

    let (best_params, best_win_rate_pct) = best.expect("search budget validated non-zero");
    Ok(SearchOutcome {
        best_params,
        best_win_rate_pct,
        evals: max_evals,
    })
}
