use crate::config::{cache_dir, CACHE_TTL_SECS};
use crate::error::SimulationError;
use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use csv::ReaderBuilder;
use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Raw time series: one date per row, one close-price column per asset.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTable {
    pub dates: Vec<NaiveDate>,
    pub assets: Vec<String>,
    /// `prices[a][t]` is the price of `assets[a]` on `dates[t]`.
    pub prices: Vec<Vec<f64>>,
}

impl PriceTable {
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        prices: Vec<Vec<f64>>,
    ) -> crate::error::Result<Self> {
        if assets.is_empty() {
            return Err(SimulationError::invalid_input("price table has no asset columns"));
        }
        if assets.len() != prices.len() {
            return Err(SimulationError::invalid_input(format!(
                "price table has {} asset names but {} price columns",
                assets.len(),
                prices.len()
            )));
        }
        if let Some((asset, column)) = assets
            .iter()
            .zip(prices.iter())
            .find(|(_, column)| column.len() != dates.len())
        {
            return Err(SimulationError::invalid_input(format!(
                "price column {} has {} rows, expected {}",
                asset,
                column.len(),
                dates.len()
            )));
        }

        Ok(Self { dates, assets, prices })
    }

    pub fn rows(&self) -> usize {
        self.dates.len()
    }

    /// Loads a CSV whose first column is the date and whose other columns are asset prices.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader.headers()?.clone();
        if headers.len() < 2 {
            return Err(anyhow!(
                "{}: expected a date column followed by at least one asset column",
                path.display()
            ));
        }
        let assets: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

        let mut dates = Vec::new();
        let mut prices: Vec<Vec<f64>> = vec![Vec::new(); assets.len()];

        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            // Header is line 1.
            let line = row_idx + 2;
            let date = parse_date(&record[0])
                .ok_or(anyhow!("{}:{}: unparsable date '{}'", path.display(), line, &record[0]))?;
            dates.push(date);

            for (col, asset) in assets.iter().enumerate() {
                let raw = record.get(col + 1).unwrap_or("");
                let value = raw.parse::<f64>().map_err(|_| {
                    anyhow!(
                        "{}:{}: invalid price '{}' for {}",
                        path.display(),
                        line,
                        raw,
                        asset
                    )
                })?;
                prices[col].push(value);
            }
        }

        info!(
            "Loaded {} rows x {} assets from {}",
            dates.len(),
            assets.len(),
            path.display()
        );
        Ok(Self::new(dates, assets, prices)?)
    }

    /// Deterministic random-walk table, used for `--demo` and tests.
    pub fn new_mock(assets: &[&str], days: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default();
        let dates: Vec<NaiveDate> = (0..days).map(|d| start + Duration::days(d as i64)).collect();

        let prices: Vec<Vec<f64>> = assets
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let mut price = 100.0 + i as f64 * 25.0;
                let drift = 0.0002 * (i as f64 + 1.0);
                (0..days)
                    .map(|_| {
                        let current = price;
                        let change: f64 = rng.gen_range(-0.02..0.02);
                        price *= 1.0 + drift + change;
                        current
                    })
                    .collect::<Vec<f64>>()
            })
            .collect();

        Self {
            dates,
            assets: assets.iter().map(|a| a.to_string()).collect(),
            prices,
        }
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|d| d.date_naive()))
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooChart {
    result: Vec<YahooResult>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooResult {
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Deserialize, Serialize, Debug)]
struct YahooQuote {
    close: Vec<Option<f64>>,
}

/// Downloads daily closes for every symbol and aligns them on the dates all symbols share.
pub async fn fetch_price_table(symbols: &[String], range: &str) -> Result<PriceTable> {
    let mut series: Vec<(String, BTreeMap<NaiveDate, f64>)> = Vec::with_capacity(symbols.len());

    for raw_symbol in symbols {
        let symbol = raw_symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(anyhow!("empty symbol in symbol list"));
        }
        if series.iter().any(|(s, _)| *s == symbol) {
            warn!("Duplicate symbol {} ignored", symbol);
            continue;
        }
        let response = fetch_range_with_cache(&symbol, range).await?;
        let closes = closes_by_date(&response)
            .map_err(|e| anyhow!("Failed to read closes for {}: {}", symbol, e))?;
        debug!("{}: {} daily closes", symbol, closes.len());
        series.push((symbol, closes));
    }

    align_series(series)
}

fn closes_by_date(response: &YahooChartResponse) -> Result<BTreeMap<NaiveDate, f64>> {
    let result = response.chart.result.first().ok_or(anyhow!("No data found"))?;
    let quotes = result.indicators.quote.first().ok_or(anyhow!("No quote block"))?;

    let mut closes = BTreeMap::new();
    for (i, &timestamp) in result.timestamp.iter().enumerate() {
        if let (Some(Some(close)), Some(date)) = (
            quotes.close.get(i),
            Utc.timestamp_opt(timestamp, 0).single(),
        ) {
            closes.insert(date.date_naive(), *close);
        }
    }
    Ok(closes)
}

fn align_series(series: Vec<(String, BTreeMap<NaiveDate, f64>)>) -> Result<PriceTable> {
    let Some((_, first)) = series.first() else {
        return Err(anyhow!("no symbols to align"));
    };

    let dates: Vec<NaiveDate> = first
        .keys()
        .filter(|d| series.iter().all(|(_, closes)| closes.contains_key(d)))
        .copied()
        .collect();

    if dates.is_empty() {
        return Err(anyhow!("symbols share no common trading dates"));
    }

    let mut assets = Vec::with_capacity(series.len());
    let mut prices = Vec::with_capacity(series.len());
    for (symbol, closes) in series {
        prices.push(dates.iter().filter_map(|d| closes.get(d).copied()).collect());
        assets.push(symbol);
    }

    info!("Aligned {} symbols on {} common dates", assets.len(), dates.len());
    Ok(PriceTable::new(dates, assets, prices)?)
}

async fn fetch_range_with_cache(symbol: &str, range: &str) -> Result<YahooChartResponse> {
    let cache_dir = cache_dir();
    if !cache_dir.exists() {
        std::fs::create_dir_all(&cache_dir)?;
    }

    let cache_file = cache_dir.join(format!("{}_{}.json", symbol, range));

    if cache_file.exists() {
        let metadata = std::fs::metadata(&cache_file)?;
        let modified = metadata.modified()?;
        let age = std::time::SystemTime::now().duration_since(modified)?;

        if age.as_secs() < CACHE_TTL_SECS {
            info!("Loading {} from cache...", symbol);
            let file = std::fs::File::open(&cache_file)?;
            let reader = std::io::BufReader::new(file);
            return Ok(serde_json::from_reader(reader)?);
        }
        info!("Cache expired for {}, fetching...", symbol);
    } else {
        info!("Cache miss for {}, fetching...", symbol);
    }

    fetch_from_api(symbol, range, &cache_file).await
}

async fn fetch_from_api(symbol: &str, range: &str, cache_path: &Path) -> Result<YahooChartResponse> {
    let url = format!(
        "https://query1.finance.yahoo.com/v8/finance/chart/{}?range={}&interval=1d",
        symbol, range
    );

    let mut attempts = 0;
    let max_attempts = 3;

    loop {
        attempts += 1;
        match reqwest::Client::new()
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .timeout(std::time::Duration::from_secs(15))
            .send()
            .await
        {
            Ok(resp) => match resp.json::<YahooChartResponse>().await {
                Ok(resp_json) => {
                    let file = std::fs::File::create(cache_path)?;
                    let writer = std::io::BufWriter::new(file);
                    serde_json::to_writer(writer, &resp_json)?;
                    return Ok(resp_json);
                }
                Err(e) => {
                    if attempts >= max_attempts {
                        return Err(e.into());
                    }
                    warn!("Failed to parse JSON for {} (attempt {}/{}): {}", symbol, attempts, max_attempts, e);
                }
            },
            Err(e) => {
                if attempts >= max_attempts {
                    return Err(e.into());
                }
                warn!("Failed to fetch data for {} (attempt {}/{}): {}", symbol, attempts, max_attempts, e);
            }
        }

        tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    }
}
