use crate::config::TRADING_DAYS;
use crate::data::PriceTable;
use crate::error::{Result, SimulationError};
use chrono::Datelike;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

/// Per-asset sequence of periodic (yearly) returns, keyed by asset name.
pub type AnnualizedReturns = HashMap<String, Vec<f64>>;

/// Square asset-by-asset covariance table.
///
/// Columns are looked up by asset name; rows are positional in `assets` order.
#[derive(Clone, Debug, PartialEq)]
pub struct CovarianceMatrix {
    assets: Vec<String>,
    /// `values[col][row]`
    values: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    pub fn new(assets: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        let n = assets.len();
        if values.len() != n {
            return Err(SimulationError::invalid_input(format!(
                "covariance matrix has {} assets but {} columns",
                n,
                values.len()
            )));
        }
        if let Some((asset, column)) = assets.iter().zip(values.iter()).find(|(_, c)| c.len() != n) {
            return Err(SimulationError::invalid_input(format!(
                "covariance column {} has {} rows, expected {}",
                asset,
                column.len(),
                n
            )));
        }
        Ok(Self { assets, values })
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn column(&self, asset: &str) -> Option<&[f64]> {
        self.assets
            .iter()
            .position(|a| a == asset)
            .map(|idx| self.values[idx].as_slice())
    }

    /// Entry for (row asset, column asset).
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.assets.iter().position(|a| a == row)?;
        self.column(col).map(|c| c[r])
    }
}

/// One simple return per calendar year, chained from the previous year's last price.
pub fn annualized_returns(table: &PriceTable) -> Result<AnnualizedReturns> {
    if table.rows() < 2 {
        return Err(SimulationError::invalid_input(format!(
            "annualized returns need at least 2 price rows, got {}",
            table.rows()
        )));
    }

    // Index of the last row in each calendar year.
    let mut year_ends = Vec::new();
    for (i, date) in table.dates.iter().enumerate() {
        let next_year = table.dates.get(i + 1).map(|d| d.year());
        if next_year != Some(date.year()) {
            year_ends.push(i);
        }
    }

    let mut out = AnnualizedReturns::with_capacity(table.assets.len());
    for (asset, column) in table.assets.iter().zip(table.prices.iter()) {
        let mut anchor = column[0];
        let mut yearly = Vec::with_capacity(year_ends.len());
        for &end in &year_ends {
            let close = column[end];
            yearly.push(close / anchor - 1.0);
            anchor = close;
        }
        debug!("{}: {} yearly returns", asset, yearly.len());
        out.insert(asset.clone(), yearly);
    }

    Ok(out)
}

fn daily_returns(column: &[f64]) -> Vec<f64> {
    column.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Annualized sample covariance of daily simple returns.
pub fn covariance_matrix(table: &PriceTable) -> Result<CovarianceMatrix> {
    if table.rows() < 3 {
        return Err(SimulationError::invalid_input(format!(
            "covariance needs at least 3 price rows, got {}",
            table.rows()
        )));
    }

    let returns: Vec<Vec<f64>> = table.prices.par_iter().map(|c| daily_returns(c)).collect();
    let num_obs = returns[0].len();
    let means: Vec<f64> = returns
        .iter()
        .map(|r| r.iter().sum::<f64>() / num_obs as f64)
        .collect();

    let n = returns.len();
    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect();
    let entries: Vec<((usize, usize), f64)> = pairs
        .into_par_iter()
        .map(|(i, j)| {
            let sum: f64 = returns[i]
                .iter()
                .zip(returns[j].iter())
                .map(|(ri, rj)| (ri - means[i]) * (rj - means[j]))
                .sum();
            ((i, j), sum / (num_obs as f64 - 1.0) * TRADING_DAYS)
        })
        .collect();

    let mut values = vec![vec![0.0; n]; n];
    for ((i, j), cov) in entries {
        values[i][j] = cov;
        values[j][i] = cov;
    }

    CovarianceMatrix::new(table.assets.clone(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_annualized_returns_chain_year_ends() {
        let table = PriceTable::new(
            vec![date(2021, 1, 4), date(2021, 12, 31), date(2022, 6, 1), date(2022, 12, 30)],
            vec!["A".into()],
            vec![vec![100.0, 110.0, 90.0, 121.0]],
        )
        .unwrap();

        let returns = annualized_returns(&table).unwrap();
        let a = &returns["A"];
        assert_eq!(a.len(), 2);
        assert!((a[0] - 0.10).abs() < 1e-12);
        assert!((a[1] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_annualized_returns_need_two_rows() {
        let table = PriceTable::new(vec![date(2021, 1, 4)], vec!["A".into()], vec![vec![1.0]]).unwrap();
        assert!(matches!(
            annualized_returns(&table),
            Err(SimulationError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_covariance_matrix_symmetry() {
        let table = PriceTable::new_mock(&["AAAA", "BBBB", "CCCC"], 120, 3);
        let cov = covariance_matrix(&table).unwrap();

        assert_eq!(cov.len(), 3);
        for i in &table.assets {
            for j in &table.assets {
                let a = cov.get(i, j).unwrap();
                let b = cov.get(j, i).unwrap();
                assert!((a - b).abs() < 1e-12, "Covariance matrix should be symmetric");
            }
            assert!(cov.get(i, i).unwrap() > 0.0, "Variance should be positive");
        }
    }

    #[test]
    fn test_covariance_of_known_series() {
        // Daily returns: A = [0.1, -0.1], B = [-0.1, 0.1]
        let table = PriceTable::new(
            vec![date(2023, 1, 2), date(2023, 1, 3), date(2023, 1, 4)],
            vec!["A".into(), "B".into()],
            vec![vec![100.0, 110.0, 99.0], vec![100.0, 90.0, 99.0]],
        )
        .unwrap();
        let cov = covariance_matrix(&table).unwrap();

        let var = 0.02 * TRADING_DAYS;
        assert!((cov.get("A", "A").unwrap() - var).abs() < 1e-9);
        assert!((cov.get("B", "B").unwrap() - var).abs() < 1e-9);
        assert!((cov.get("A", "B").unwrap() + var).abs() < 1e-9);
    }

    #[test]
    fn test_covariance_constructor_rejects_non_square() {
        let result = CovarianceMatrix::new(
            vec!["A".into(), "B".into()],
            vec![vec![1.0, 0.0], vec![0.0]],
        );
        assert!(matches!(result, Err(SimulationError::InvalidInput { .. })));
    }
}
