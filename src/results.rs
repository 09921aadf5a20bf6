use anyhow::{anyhow, Result};
use csv::Writer as CsvWriter;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// One sampled portfolio.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PortfolioSample {
    #[serde(rename = "Return")]
    pub ret: f64,
    #[serde(rename = "Variance")]
    pub variance: f64,
}

/// Sampled portfolios in generation order, kept as two parallel columns.
/// Only ever built through `push`, so both columns always have the same length.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultTable {
    #[serde(rename = "Return")]
    returns: Vec<f64>,
    #[serde(rename = "Variance")]
    variances: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub samples: usize,
    pub min_variance: Option<PortfolioSample>,
    pub max_return: Option<PortfolioSample>,
    pub frontier_len: usize,
}

impl ResultTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            returns: Vec::with_capacity(capacity),
            variances: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: PortfolioSample) {
        self.returns.push(sample.ret);
        self.variances.push(sample.variance);
    }

    /// The "Return" column.
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// The "Variance" column.
    pub fn variances(&self) -> &[f64] {
        &self.variances
    }

    pub fn len(&self) -> usize {
        self.returns().len()
    }

    pub fn is_empty(&self) -> bool {
        self.returns().is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = PortfolioSample> + '_ {
        self.returns()
            .iter()
            .zip(self.variances().iter())
            .map(|(&ret, &variance)| PortfolioSample { ret, variance })
    }

    /// Upper-left envelope of the cloud: by ascending variance, each kept sample
    /// has a strictly higher return than every lower-variance sample.
    pub fn efficient_frontier(&self) -> Vec<PortfolioSample> {
        let mut sorted: Vec<PortfolioSample> = self
            .rows()
            .filter(|s| s.ret.is_finite() && s.variance.is_finite())
            .collect();
        sorted.sort_by(|a, b| {
            a.variance
                .total_cmp(&b.variance)
                .then_with(|| b.ret.total_cmp(&a.ret))
        });

        let mut frontier: Vec<PortfolioSample> = Vec::new();
        for sample in sorted {
            let dominated = frontier.last().is_some_and(|best| sample.ret <= best.ret);
            if !dominated {
                frontier.push(sample);
            }
        }
        frontier
    }

    pub fn summary(&self) -> SimulationSummary {
        let min_variance = self.rows().min_by(|a, b| a.variance.total_cmp(&b.variance));
        let max_return = self.rows().max_by(|a, b| a.ret.total_cmp(&b.ret));
        SimulationSummary {
            samples: self.len(),
            min_variance,
            max_return,
            frontier_len: self.efficient_frontier().len(),
        }
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = CsvWriter::from_path(path.as_ref())?;
        for sample in self.rows() {
            wtr.serialize(sample)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Picks the format from the file extension (`.csv` or `.json`).
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv") => self.write_csv(path)?,
            Some("json") => self.write_json(path)?,
            _ => {
                return Err(anyhow!(
                    "Unsupported output format for {} (use .csv or .json)",
                    path.display()
                ))
            }
        }
        info!("Wrote {} samples to {}", self.len(), path.display());
        Ok(())
    }
}

/// Pretty-prints the sampled cloud summary to stdout.
pub fn print_summary(table: &ResultTable, universe: &[String]) {
    let summary = table.summary();

    println!("\n╔════════════════════════════════════════════════════════════╗");
    println!("║           Markowitz Monte Carlo Portfolio Cloud            ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Assets               : {:<35}║", truncate(&universe.join(","), 35));
    println!("║  Sampled Portfolios   : {:<35}║", summary.samples);
    println!("║  Frontier Portfolios  : {:<35}║", summary.frontier_len);
    println!("╠════════════════════════════════════════════════════════════╣");

    if table.is_empty() {
        println!("║  No portfolios sampled                                     ║");
        println!("╚════════════════════════════════════════════════════════════╝");
        return;
    }

    if let Some(s) = summary.min_variance {
        println!(
            "║  Min Variance         : var={:>10.6}  ret={:>+10.4}     ║",
            s.variance, s.ret
        );
    }
    if let Some(s) = summary.max_return {
        println!(
            "║  Max Return           : var={:>10.6}  ret={:>+10.4}     ║",
            s.variance, s.ret
        );
    }

    println!("╠════════════════════════════════════════════════════════════╣");
    println!("║  Approximate Efficient Frontier                            ║");
    println!("╠════════════════════════════════════════════════════════════╣");
    for s in table.efficient_frontier().iter().take(12) {
        println!(
            "║    Variance {:>12.6}   Return {:>+12.4}              ║",
            s.variance, s.ret
        );
    }
    println!("╚════════════════════════════════════════════════════════════╝");
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn table_from(pairs: &[(f64, f64)]) -> ResultTable {
        let mut table = ResultTable::default();
        for &(ret, variance) in pairs {
            table.push(PortfolioSample { ret, variance });
        }
        table
    }

    #[test]
    fn test_columns_keep_generation_order() {
        let table = table_from(&[(0.3, 0.2), (0.1, 0.05), (0.2, 0.1)]);
        assert_eq!(table.returns(), &[0.3, 0.1, 0.2]);
        assert_eq!(table.variances(), &[0.2, 0.05, 0.1]);
        assert_eq!(table.len(), 3);
        let rows: Vec<_> = table.rows().collect();
        assert_eq!(rows[1], PortfolioSample { ret: 0.1, variance: 0.05 });
    }

    #[test]
    fn test_efficient_frontier_envelope() {
        let table = table_from(&[
            (0.10, 0.05),
            (0.08, 0.06), // dominated
            (0.15, 0.08),
            (0.12, 0.09), // dominated
            (0.20, 0.20),
            (0.09, 0.05), // same variance, lower return
        ]);
        let frontier = table.efficient_frontier();
        let pairs: Vec<(f64, f64)> = frontier.iter().map(|s| (s.ret, s.variance)).collect();
        assert_eq!(pairs, vec![(0.10, 0.05), (0.15, 0.08), (0.20, 0.20)]);
        // The table itself is untouched.
        assert_eq!(table.len(), 6);
        assert_eq!(table.returns()[1], 0.08);
    }

    #[test]
    fn test_empty_table_reports_no_samples() {
        let table = ResultTable::with_capacity(8);
        assert!(table.is_empty());
        assert_eq!(table.rows().count(), 0);
        print_summary(&table, &["AAA".to_string()]);

        let table = table_from(&[(0.1, 0.3)]);
        assert!(!table.is_empty());
        assert_eq!(table.returns().len(), table.variances().len());
    }

    #[test]
    fn test_summary_of_empty_table() {
        let summary = ResultTable::default().summary();
        assert_eq!(summary.samples, 0);
        assert!(summary.min_variance.is_none());
        assert!(summary.max_return.is_none());
        assert_eq!(summary.frontier_len, 0);
    }

    #[test]
    fn test_summary_extremes() {
        let table = table_from(&[(0.1, 0.3), (0.4, 0.5), (0.2, 0.1)]);
        let summary = table.summary();
        assert_eq!(summary.min_variance.unwrap().ret, 0.2);
        assert_eq!(summary.max_return.unwrap().variance, 0.5);
    }

    #[test]
    fn test_json_has_return_and_variance_columns() {
        let table = table_from(&[(0.1, 0.3), (0.2, 0.4)]);
        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["Return"], serde_json::json!([0.1, 0.2]));
        assert_eq!(value["Variance"], serde_json::json!([0.3, 0.4]));
    }

    #[test]
    fn test_write_csv_and_json() -> Result<()> {
        let dir = tempdir()?;
        let table = table_from(&[(0.1, 0.3), (0.25, 0.5)]);

        let csv_path = dir.path().join("cloud.csv");
        table.write_to(&csv_path)?;
        let text = std::fs::read_to_string(&csv_path)?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Return,Variance"));
        assert_eq!(lines.next(), Some("0.1,0.3"));
        assert_eq!(lines.next(), Some("0.25,0.5"));

        let json_path = dir.path().join("cloud.json");
        table.write_to(&json_path)?;
        let loaded: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json_path)?)?;
        assert_eq!(loaded, serde_json::to_value(&table)?);
        assert_eq!(loaded["Return"], serde_json::json!([0.1, 0.25]));
        assert_eq!(loaded["Variance"], serde_json::json!([0.3, 0.5]));

        assert!(table.write_to(dir.path().join("cloud.parquet")).is_err());
        Ok(())
    }
}
