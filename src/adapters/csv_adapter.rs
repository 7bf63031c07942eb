//! CSV file market data adapter.
//!
//! Files are named `{symbol}_{interval}.csv` under a base directory, or a
//! single file is pinned with [`CsvAdapter::from_file`]. Columns are
//! `datetime,open,high,low,close,volume`.

use crate::domain::error::EdgefinderError;
use crate::domain::ohlcv::Candle;
use crate::ports::data_port::DataPort;
use chrono::NaiveDateTime;
use std::fs;
use std::path::PathBuf;

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

enum Source {
    Directory(PathBuf),
    File(PathBuf),
}

pub struct CsvAdapter {
    source: Source,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            source: Source::Directory(base_path),
        }
    }

    /// Serve every request from one file regardless of symbol and interval.
    pub fn from_file(path: PathBuf) -> Self {
        Self {
            source: Source::File(path),
        }
    }

    fn csv_path(&self, symbol: &str, interval: &str) -> PathBuf {
        match &self.source {
            Source::Directory(base) => base.join(format!("{}_{}.csv", symbol, interval)),
            Source::File(path) => path.clone(),
        }
    }
}

fn unavailable(reason: String) -> EdgefinderError {
    EdgefinderError::DataUnavailable { reason }
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, EdgefinderError> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| unavailable(format!("invalid datetime '{}'", raw)))
}

fn parse_field(
    record: &csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<f64, EdgefinderError> {
    record
        .get(index)
        .ok_or_else(|| unavailable(format!("missing {} column", name)))?
        .trim()
        .parse()
        .map_err(|e| unavailable(format!("invalid {} value: {}", name, e)))
}

impl DataPort for CsvAdapter {
    fn fetch_candles(&self, symbol: &str, interval: &str) -> Result<Vec<Candle>, EdgefinderError> {
        let path = self.csv_path(symbol, interval);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;

            let time = parse_datetime(
                record
                    .get(0)
                    .ok_or_else(|| unavailable("missing datetime column".into()))?,
            )?;
            let open = parse_field(&record, 1, "open")?;
            let high = parse_field(&record, 2, "high")?;
            let low = parse_field(&record, 3, "low")?;
            let close = parse_field(&record, 4, "close")?;
            let volume = parse_field(&record, 5, "volume")?;

            candles.push(Candle::new(time, open, high, low, close, volume));
        }

        candles.sort_by_key(|c| c.time);
        tracing::debug!(path = %path.display(), candles = candles.len(), "read csv candles");
        Ok(candles)
    }
}
