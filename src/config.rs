use crate::portfolio::EstimationModel;
use rayon::ThreadPoolBuilder;
use std::sync::OnceLock;
use tracing::{info, warn};

static RAYON_INIT: OnceLock<()> = OnceLock::new();

/// Number of random portfolios sampled per run.
pub const DEFAULT_SAMPLE_COUNT: usize = 1000;

/// Fixed generator seed so that runs are reproducible.
pub const DEFAULT_SEED: u64 = 75;

/// Annual trading days for annualizing daily covariance.
pub const TRADING_DAYS: f64 = 252.0;

/// Range of historical data to download when symbols are given (e.g., "1y", "5y", "max").
pub const DATA_RANGE: &str = "5y";

/// Downloaded price responses younger than this are served from `.cache/`.
pub const CACHE_TTL_SECS: u64 = 86_400;

/// Parameters of one Monte Carlo run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationConfig {
    pub sample_count: usize,
    pub seed: u64,
    pub model: EstimationModel,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            sample_count: DEFAULT_SAMPLE_COUNT,
            seed: DEFAULT_SEED,
            model: EstimationModel::Literal,
        }
    }
}

impl SimulationConfig {
    /// Defaults overridden by `MARKOWITZ_SAMPLES`, `MARKOWITZ_SEED` and `MARKOWITZ_MODEL`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(raw) = lookup("MARKOWITZ_SAMPLES") {
            match raw.trim().parse::<usize>() {
                Ok(v) => cfg.sample_count = v,
                Err(_) => warn!(
                    "Invalid MARKOWITZ_SAMPLES={} ; keeping default {}",
                    raw, cfg.sample_count
                ),
            }
        }

        if let Some(raw) = lookup("MARKOWITZ_SEED") {
            match raw.trim().parse::<u64>() {
                Ok(v) => cfg.seed = v,
                Err(_) => warn!("Invalid MARKOWITZ_SEED={} ; keeping default {}", raw, cfg.seed),
            }
        }

        if let Some(raw) = lookup("MARKOWITZ_MODEL") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "literal" => cfg.model = EstimationModel::Literal,
                "textbook" => cfg.model = EstimationModel::Textbook,
                other => warn!(
                    "Unknown MARKOWITZ_MODEL={} ; defaulting to literal. Allowed values: literal | textbook",
                    other
                ),
            }
        }

        cfg
    }
}

pub fn init_cpu_parallelism() {
    RAYON_INIT.get_or_init(|| {
        let num_threads = num_cpus::get().max(1);
        match ThreadPoolBuilder::new().num_threads(num_threads).build_global() {
            Ok(_) => info!(
                "Initialized Rayon thread pool with {} threads (all logical CPU cores)",
                num_threads
            ),
            Err(e) => warn!(
                "Rayon thread pool already initialized or unavailable ({}). Using existing configuration.",
                e
            ),
        }
    });
}

pub fn cache_dir() -> std::path::PathBuf {
    std::env::var("MARKOWITZ_CACHE_DIR")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::path::PathBuf::from(".cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let cfg = SimulationConfig::from_lookup(lookup_from(&[]));
        assert_eq!(cfg, SimulationConfig::default());
        assert_eq!(cfg.sample_count, 1000);
        assert_eq!(cfg.seed, 75);
        assert_eq!(cfg.model, EstimationModel::Literal);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = SimulationConfig::from_lookup(lookup_from(&[
            ("MARKOWITZ_SAMPLES", "250"),
            ("MARKOWITZ_SEED", " 9 "),
            ("MARKOWITZ_MODEL", "Textbook"),
        ]));
        assert_eq!(cfg.sample_count, 250);
        assert_eq!(cfg.seed, 9);
        assert_eq!(cfg.model, EstimationModel::Textbook);
    }

    #[test]
    fn test_invalid_env_values_keep_defaults() {
        let cfg = SimulationConfig::from_lookup(lookup_from(&[
            ("MARKOWITZ_SAMPLES", "lots"),
            ("MARKOWITZ_SEED", "-1"),
            ("MARKOWITZ_MODEL", "quadratic"),
        ]));
        assert_eq!(cfg, SimulationConfig::default());
    }
}
