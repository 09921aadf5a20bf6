use crate::config::SimulationConfig;
use crate::error::{Result, SimulationError};
use crate::results::{PortfolioSample, ResultTable};
use crate::stats::{AnnualizedReturns, CovarianceMatrix};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace};

// ──────────────────────────────────────────────────────────────────────────────
// Data Structures
// ──────────────────────────────────────────────────────────────────────────────

/// How a weight draw is turned into a (return, variance) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum EstimationModel {
    /// Return summed over every period; variance from repeated diagonal terms.
    #[default]
    Literal,
    /// Period-averaged return and the full quadratic form wᵀΣw.
    Textbook,
}

/// One iteration's random allocation: `weights[i]` goes to asset `permutation[i]`.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightDraw {
    pub permutation: Vec<usize>,
    pub weights: Vec<f64>,
}

// ──────────────────────────────────────────────────────────────────────────────
// Weight Sampling
// ──────────────────────────────────────────────────────────────────────────────

/// Divides every raw draw by their sum.
pub fn normalize_weights(raw: Vec<f64>) -> Result<Vec<f64>> {
    let sum: f64 = raw.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return Err(SimulationError::numeric_degeneracy("weight normalization", sum));
    }
    Ok(raw.into_iter().map(|v| v / sum).collect())
}

/// Shuffles the asset order, then draws `n` uniforms in [0, 1) and normalizes them.
///
/// The draw order on `rng` is part of the reproducibility contract.
pub fn sample_weights<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Result<WeightDraw> {
    if n == 0 {
        return Err(SimulationError::invalid_input("cannot sample weights for zero assets"));
    }

    let mut permutation: Vec<usize> = (0..n).collect();
    permutation.shuffle(rng);

    let raw: Vec<f64> = (0..n).map(|_| rng.r#gen::<f64>()).collect();
    let weights = normalize_weights(raw)?;

    Ok(WeightDraw { permutation, weights })
}

// ──────────────────────────────────────────────────────────────────────────────
// Evaluators
// ──────────────────────────────────────────────────────────────────────────────

pub fn portfolio_return(
    draw: &WeightDraw,
    universe: &[String],
    returns: &AnnualizedReturns,
    model: EstimationModel,
) -> Result<f64> {
    let mut total = 0.0;
    for (&asset_idx, &weight) in draw.permutation.iter().zip(draw.weights.iter()) {
        let asset = &universe[asset_idx];
        let series = returns
            .get(asset)
            .ok_or_else(|| SimulationError::invalid_input(format!("no returns for asset {}", asset)))?;

        match model {
            EstimationModel::Literal => {
                let mut weighted = 0.0;
                for r in series {
                    weighted += weight * r;
                }
                total += weighted;
            }
            EstimationModel::Textbook => {
                if series.is_empty() {
                    return Err(SimulationError::invalid_input(format!(
                        "empty return series for asset {}",
                        asset
                    )));
                }
                let mean = series.iter().sum::<f64>() / series.len() as f64;
                total += weight * mean;
            }
        }
    }
    Ok(total)
}

pub fn portfolio_variance(
    draw: &WeightDraw,
    universe: &[String],
    covariance: &CovarianceMatrix,
    model: EstimationModel,
) -> Result<f64> {
    let missing = |asset: &str| SimulationError::invalid_input(format!("no covariance column for asset {}", asset));
    let n = draw.weights.len();
    let mut var = 0.0;

    match model {
        EstimationModel::Literal => {
            // Position k indexes the universe directly; the permutation is not applied here.
            for j in 0..n {
                for k in 0..n {
                    let column = covariance.column(&universe[k]).ok_or_else(|| missing(&universe[k]))?;
                    let mut weighted = 0.0;
                    for _ in 0..column.len() {
                        weighted += draw.weights[j] * draw.weights[k] * column[k];
                    }
                    var += weighted;
                }
            }
        }
        EstimationModel::Textbook => {
            for j in 0..n {
                let row_asset = &universe[draw.permutation[j]];
                for k in 0..n {
                    let col_asset = &universe[draw.permutation[k]];
                    let cov = covariance
                        .get(row_asset, col_asset)
                        .ok_or_else(|| missing(col_asset))?;
                    var += draw.weights[j] * draw.weights[k] * cov;
                }
            }
        }
    }
    Ok(var)
}

// ──────────────────────────────────────────────────────────────────────────────
// Simulation Driver
// ──────────────────────────────────────────────────────────────────────────────

/// Fails fast before any sampling when the statistics do not cover the universe.
pub fn validate_inputs(
    universe: &[String],
    returns: &AnnualizedReturns,
    covariance: &CovarianceMatrix,
) -> Result<()> {
    if universe.is_empty() {
        return Err(SimulationError::invalid_input("asset universe is empty"));
    }
    if let Some(asset) = universe.iter().find(|a| !returns.contains_key(*a)) {
        return Err(SimulationError::invalid_input(format!(
            "annualized returns missing asset {}",
            asset
        )));
    }
    if let Some(asset) = universe.iter().find(|a| covariance.column(a).is_none()) {
        return Err(SimulationError::invalid_input(format!(
            "covariance matrix missing asset {}",
            asset
        )));
    }
    // The literal variance reads row k of column k for every universe position k.
    if covariance.len() < universe.len() {
        return Err(SimulationError::invalid_input(format!(
            "covariance matrix has {} rows for {} assets",
            covariance.len(),
            universe.len()
        )));
    }
    Ok(())
}

/// Samples `config.sample_count` random portfolios and evaluates each one.
pub fn run_simulation(
    universe: &[String],
    returns: &AnnualizedReturns,
    covariance: &CovarianceMatrix,
    config: &SimulationConfig,
) -> Result<ResultTable> {
    validate_inputs(universe, returns, covariance)?;

    info!(
        "Sampling {} portfolios over {} assets (seed={}, model={:?})",
        config.sample_count,
        universe.len(),
        config.seed,
        config.model
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut table = ResultTable::with_capacity(config.sample_count);

    for i in 0..config.sample_count {
        let draw = sample_weights(universe.len(), &mut rng)?;
        let ret = portfolio_return(&draw, universe, returns, config.model)?;
        let variance = portfolio_variance(&draw, universe, covariance, config.model)?;
        trace!("sample {}: weights={:?} return={} variance={}", i, draw.weights, ret, variance);
        table.push(PortfolioSample { ret, variance });
    }

    debug!("Collected {} samples", table.len());
    Ok(table)
}

// ──────────────────────────────────────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────────────────────────────────────
