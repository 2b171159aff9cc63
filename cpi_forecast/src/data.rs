//! Monthly time series data and the CSV loader that produces it

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Dated observations, strictly increasing in time
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesData {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

/// A series cut into a training part and the held-out tail that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    /// Everything before the hold-out window
    pub train: TimeSeriesData,
    /// The last observations, used to score forecasts
    pub validation: TimeSeriesData,
}

impl TimeSeriesData {
    /// Create a new series from parallel date and value vectors.
    ///
    /// Dates must be strictly increasing and every value finite.
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Dates length ({}) doesn't match values length ({})",
                dates.len(),
                values.len()
            )));
        }

        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::DataError(format!(
                "Non-finite value at {}",
                dates[pos]
            )));
        }

        if let Some(w) = dates.windows(2).find(|w| w[1] <= w[0]) {
            let reason = if w[1] == w[0] {
                "duplicate date"
            } else {
                "dates out of order"
            };
            return Err(ForecastError::DataError(format!("{}: {}", reason, w[1])));
        }

        Ok(Self { dates, values })
    }

    /// Create a series of consecutive months starting at `start`
    pub fn from_monthly(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        let dates = (0..values.len())
            .map(|i| add_months(start, i))
            .collect::<Result<Vec<_>>>()?;
        Self::new(dates, values)
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Observation dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Observed values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Date of the first observation
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Most recent observation
    pub fn last(&self) -> Option<(NaiveDate, f64)> {
        self.dates.last().copied().zip(self.values.last().copied())
    }

    /// Get a slice of the data from start to end index
    pub fn slice(&self, start: usize, end: usize) -> Result<Self> {
        if start > end || end > self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Slice {}..{} out of range for series of length {}",
                start,
                end,
                self.len()
            )));
        }

        Ok(Self {
            dates: self.dates[start..end].to_vec(),
            values: self.values[start..end].to_vec(),
        })
    }

    /// The last `n` observations, or the whole series if it is shorter
    pub fn tail(&self, n: usize) -> Self {
        let start = self.len().saturating_sub(n);
        Self {
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    /// Hold out the last `holdout` observations
    pub fn split_holdout(&self, holdout: usize) -> Result<Split> {
        if holdout == 0 || holdout >= self.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Cannot hold out {} of {} observations",
                holdout,
                self.len()
            )));
        }

        let cut = self.len() - holdout;
        Ok(Split {
            train: self.slice(0, cut)?,
            validation: self.slice(cut, self.len())?,
        })
    }

    /// Reject series that skip a month or repeat one.
    ///
    /// The seasonal models index observations by position, so a gap would
    /// silently shift every seasonal factor after it.
    pub fn ensure_monthly(&self) -> Result<()> {
        for w in self.dates.windows(2) {
            let step = month_index(w[1]) - month_index(w[0]);
            if step == 0 {
                return Err(ForecastError::DataError(format!(
                    "More than one observation in month {}",
                    w[1].format("%Y-%m")
                )));
            }
            if step != 1 {
                return Err(ForecastError::DataError(format!(
                    "Missing months between {} and {}",
                    w[0].format("%Y-%m"),
                    w[1].format("%Y-%m")
                )));
            }
        }
        Ok(())
    }
}

fn month_index(date: NaiveDate) -> i64 {
    i64::from(date.year()) * 12 + i64::from(date.month0())
}

/// Shift a date forward by whole calendar months, clamping the day of month
pub fn add_months(date: NaiveDate, months: usize) -> Result<NaiveDate> {
    let months = u32::try_from(months).map_err(|_| {
        ForecastError::InvalidParameter(format!("Month offset {} is too large", months))
    })?;
    date.checked_add_months(Months::new(months)).ok_or_else(|| {
        ForecastError::DataError(format!("Date {} + {} months is out of range", date, months))
    })
}

/// The `count` month-steps following `last`
pub fn future_months(last: NaiveDate, count: usize) -> Result<Vec<NaiveDate>> {
    (1..=count).map(|i| add_months(last, i)).collect()
}

/// Column names and date format of the source CSV
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderOptions {
    /// Header of the date column
    pub date_column: String,
    /// Header of the numeric column
    pub value_column: String,
    /// `chrono` format string for the date column
    pub date_format: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            date_column: "Date".to_string(),
            value_column: "CPI".to_string(),
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

/// Data loader for time series data
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a `Date`/`CPI` series from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<TimeSeriesData> {
        Self::from_csv_with_options(path, &LoaderOptions::default())
    }

    /// Load a series from a CSV file with custom column names
    pub fn from_csv_with_options<P: AsRef<Path>>(
        path: P,
        options: &LoaderOptions,
    ) -> Result<TimeSeriesData> {
        let file = File::open(path)?;
        Self::from_reader(file, options)
    }

    /// Load a series from any CSV source.
    ///
    /// An unparseable date fails the whole load. Rows whose value is missing
    /// or not a number are dropped; how many is logged. The result is sorted by date.
    pub fn from_reader<R: Read>(mut reader: R, options: &LoaderOptions) -> Result<TimeSeriesData> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let content = content.trim_start_matches(BYTE_ORDER_MARK);

        let mut csv_reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers = csv_reader.headers()?.clone();
        let date_idx = Self::column_index(&headers, &options.date_column)?;
        let value_idx = Self::column_index(&headers, &options.value_column)?;

        let mut rows: Vec<(NaiveDate, f64)> = Vec::new();
        let mut dropped = 0usize;

        for (i, record) in csv_reader.records().enumerate() {
            let record = record?;
            // Header is line 1
            let line = i + 2;

            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, &options.date_format).map_err(|e| {
                ForecastError::DataError(format!(
                    "Line {}: cannot parse date '{}' with format '{}': {}",
                    line, raw_date, options.date_format, e
                ))
            })?;

            match record.get(value_idx).and_then(coerce_value) {
                Some(value) => rows.push((date, value)),
                None => dropped += 1,
            }
        }

        if dropped > 0 {
            warn!(
                dropped,
                column = %options.value_column,
                "Dropped rows with non-numeric values"
            );
        }

        rows.sort_by_key(|(date, _)| *date);
        let (dates, values): (Vec<_>, Vec<_>) = rows.into_iter().unzip();

        debug!(observations = dates.len(), "Loaded time series");
        TimeSeriesData::new(dates, values)
    }

    fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| ForecastError::DataError(format!("No '{}' column found in data", name)))
    }
}

/// Coerce a raw CSV field to a finite number.
///
/// Accepts a decimal comma when the field has no decimal point
/// (`"101,5"`). Empty, non-numeric and non-finite fields give `None`.
pub fn coerce_value(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = trimmed.parse::<f64>().ok().or_else(|| {
        if trimmed.contains(',') && !trimmed.contains('.') {
            trimmed.replacen(',', ".", 1).parse::<f64>().ok()
        } else {
            None
        }
    })?;

    parsed.is_finite().then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_month_index_spans_years() {
        assert_eq!(month_index(date(2021, 1, 1)) - month_index(date(2020, 12, 31)), 1);
    }

    #[test]
    fn test_add_months_clamps_day() {
        assert_eq!(add_months(date(2023, 1, 31), 1).unwrap(), date(2023, 2, 28));
        assert_eq!(add_months(date(2023, 11, 1), 2).unwrap(), date(2024, 1, 1));
    }

    #[test]
    fn test_future_months() {
        let months = future_months(date(2023, 11, 1), 3).unwrap();
        assert_eq!(months, vec![date(2023, 12, 1), date(2024, 1, 1), date(2024, 2, 1)]);
    }
}
