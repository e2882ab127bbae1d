// External crates
use chrono::NaiveDate;
use log::{info, warn};
use polars::prelude::*;
use std::path::Path;

// Internal modules
use crate::constants::{CLOSE_COLUMN_ALIASES, DATE_COLUMN_ALIASES, DATE_FORMAT};
use crate::error::{ForecastError, Result};

/// Close prices loaded from a file, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub closes: Vec<f64>,
    /// Date of the last observation, when the file has a parseable date column
    pub last_date: Option<NaiveDate>,
}

/// Finds the first column whose lowercase name matches one of `aliases`
fn find_column(df: &DataFrame, aliases: &[&str]) -> Option<String> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    aliases.iter().find_map(|alias| {
        names
            .iter()
            .find(|name| name.trim().to_lowercase() == *alias)
            .cloned()
    })
}

/// Parses the leading `YYYY-MM-DD` of a date or datetime string
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let head = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
}

/// Extracts the close series from a DataFrame
///
/// Close values are cast to floats first; rows whose close is missing or does
/// not parse (e.g. `N/A`) are dropped before the series and the last date are
/// read, and rows are sorted by the date column when one exists.
pub fn price_series_from_dataframe(df: DataFrame) -> Result<PriceSeries> {
    let close_name = find_column(&df, &CLOSE_COLUMN_ALIASES).ok_or_else(|| {
        ForecastError::input(format!(
            "No close column found among {:?}",
            df.get_column_names()
        ))
    })?;
    let date_name = find_column(&df, &DATE_COLUMN_ALIASES);

    let mut df = df;
    let closes_f64 = df.column(&close_name)?.cast(&DataType::Float64)?;
    df.with_column(closes_f64)?;

    let total_rows = df.height();
    let mut df = df.drop_nulls(Some(&[close_name.clone()]))?;
    let dropped = total_rows - df.height();
    if dropped > 0 {
        warn!(
            "Dropped {} of {} rows without a numeric {} value",
            dropped, total_rows, close_name
        );
    }
    if let Some(date) = &date_name {
        df = df.sort(vec![date.as_str()], SortMultipleOptions::default())?;
    }

    let closes: Vec<f64> = df
        .column(&close_name)?
        .f64()?
        .into_iter()
        .flatten()
        .collect();

    let last_date = match &date_name {
        Some(date) if df.height() > 0 => {
            let dates = df.column(date)?.cast(&DataType::String)?;
            let dates = dates.str()?;
            dates.get(dates.len() - 1).and_then(parse_date)
        }
        _ => None,
    };

    Ok(PriceSeries { closes, last_date })
}

/// Load a CSV of daily bars and return its close prices
///
/// # Arguments
///
/// * `file_path` - Path to a CSV with a header row
///
/// # Returns
///
/// Returns the close series and the date of the last row
pub fn load_price_series<P: AsRef<Path>>(file_path: P) -> Result<PriceSeries> {
    let path = file_path.as_ref();
    info!("Loading data from: {}", path.display());

    let file = std::fs::File::open(path)?;
    let df = CsvReader::new(file).finish()?;
    let series = price_series_from_dataframe(df)?;

    info!("Loaded {} close prices", series.closes.len());
    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_sorts_by_date_and_reads_close() {
        let file = write_csv(
            "Date,Open,High,Low,Close,Volume\n\
             2024-01-03,1,1,1,102.5,100\n\
             2024-01-01,1,1,1,100.0,100\n\
             2024-01-02,1,1,1,101.0,100\n",
        );
        let series = load_price_series(file.path()).unwrap();
        assert_eq!(series.closes, vec![100.0, 101.0, 102.5]);
        assert_eq!(series.last_date, NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn test_unparseable_trailing_close_is_dropped_with_its_date() {
        let file = write_csv(
            "date,close\n\
             2024-01-01,100.0\n\
             2024-01-02,101.0\n\
             2024-01-03,N/A\n",
        );
        let series = load_price_series(file.path()).unwrap();
        assert_eq!(series.closes, vec![100.0, 101.0]);
        assert_eq!(series.last_date, NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_empty_close_cells_are_dropped() {
        let file = write_csv("date,close\n2024-01-01,5\n2024-01-02,\n2024-01-03,7\n");
        let series = load_price_series(file.path()).unwrap();
        assert_eq!(series.closes, vec![5.0, 7.0]);
        assert_eq!(series.last_date, NaiveDate::from_ymd_opt(2024, 1, 3));
    }

    #[test]
    fn test_adjusted_close_alias_without_dates() {
        let file = write_csv("adj_close,volume\n10,5\n11,5\n12,5\n");
        let series = load_price_series(file.path()).unwrap();
        assert_eq!(series.closes, vec![10.0, 11.0, 12.0]);
        assert_eq!(series.last_date, None);
    }

    #[test]
    fn test_missing_close_column() {
        let file = write_csv("date,open\n2024-01-01,1.0\n");
        assert!(matches!(
            load_price_series(file.path()),
            Err(ForecastError::Input(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_price_series("non_existent_file.csv");
        assert!(matches!(result, Err(ForecastError::Io(_))));
    }

    #[test]
    fn test_parse_date_accepts_datetimes() {
        assert_eq!(
            parse_date("2024-05-06 09:30:00"),
            NaiveDate::from_ymd_opt(2024, 5, 6)
        );
        assert_eq!(parse_date("bad"), None);
    }
}
