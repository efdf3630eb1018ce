//! CSV wrangling: load a file, drop exact duplicate rows, promote a date column to the
//! row index, and fill missing values according to column type.
//!
//! Everything here is recomputed from the file on each call; no state is kept between calls.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::Path;
use tracing::debug;

use crate::config::WrangleConfig;

/// Column names tried, in order, when looking for a date column.
pub const DEFAULT_DATE_COLUMNS: [&str; 9] = [
    "date",
    "Date",
    "DATE",
    "timestamp",
    "Timestamp",
    "TIMESTAMP",
    "period",
    "Period",
    "PERIOD",
];

/// Cell values read as missing in addition to empty fields. Matches the usual pandas markers.
pub const DEFAULT_NULL_VALUES: [&str; 19] = [
    "",
    "#N/A",
    "#N/A N/A",
    "#NA",
    "-1.#IND",
    "-1.#QNAN",
    "-NaN",
    "-nan",
    "1.#IND",
    "1.#QNAN",
    "<NA>",
    "N/A",
    "NA",
    "NULL",
    "NaN",
    "None",
    "n/a",
    "nan",
    "null",
];

/// Options controlling how a file is read and cleaned
#[derive(Debug, Clone)]
pub struct WrangleOptions {
    pub date_columns: Vec<String>,
    pub null_values: Vec<String>,
    /// Rows sampled for type inference; `None` scans the whole file
    pub infer_schema_length: Option<usize>,
}

impl Default for WrangleOptions {
    fn default() -> Self {
        Self {
            date_columns: DEFAULT_DATE_COLUMNS.iter().map(|s| s.to_string()).collect(),
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            infer_schema_length: None,
        }
    }
}

impl From<&WrangleConfig> for WrangleOptions {
    fn from(config: &WrangleConfig) -> Self {
        Self {
            date_columns: config.date_columns.clone(),
            null_values: config.null_values.clone(),
            infer_schema_length: config.infer_schema_length,
        }
    }
}

/// How a column participates in missing-value imputation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Float,
    Integer,
    Categorical,
    Boolean,
    Temporal,
    Other,
}

impl ColumnKind {
    pub fn of(dtype: &DataType) -> Self {
        if dtype.is_float() {
            Self::Float
        } else if dtype.is_integer() {
            Self::Integer
        } else if matches!(dtype, DataType::String) {
            Self::Categorical
        } else if matches!(dtype, DataType::Boolean) {
            Self::Boolean
        } else if dtype.is_temporal() {
            Self::Temporal
        } else {
            Self::Other
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Float | Self::Integer)
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Integer => write!(f, "integer"),
            Self::Categorical => write!(f, "categorical"),
            Self::Boolean => write!(f, "boolean"),
            Self::Temporal => write!(f, "temporal"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Failures the wrangler reports as typed errors inside the eyre report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrangleError {
    /// Every value of an imputable column is missing, so there is no mean or mode to fill with.
    AllMissing { column: String, kind: ColumnKind },
}

impl fmt::Display for WrangleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllMissing { column, kind } => write!(
                f,
                "column '{}' ({}) has no values, so its missing values cannot be filled",
                column, kind
            ),
        }
    }
}

impl std::error::Error for WrangleError {}

/// Missing-value count for one column of the raw file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnNulls {
    pub column: String,
    pub nulls: usize,
}

/// Per-column missing-value counts, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct NullSummary(pub Vec<ColumnNulls>);

impl NullSummary {
    pub fn get(&self, column: &str) -> Option<usize> {
        self.0.iter().find(|c| c.column == column).map(|c| c.nulls)
    }

    pub fn total(&self) -> usize {
        self.0.iter().map(|c| c.nulls).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnNulls> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// What happened when looking for a date column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DateIndexOutcome {
    /// No column carried one of the date names.
    NotFound,
    /// The column parsed as dates and is now the index.
    Parsed { column: String, format: String },
    /// The column is the index but keeps its raw values.
    Unparsed { column: String, reason: String },
}

impl DateIndexOutcome {
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::NotFound => None,
            Self::Parsed { column, .. } | Self::Unparsed { column, .. } => Some(column),
        }
    }
}

/// Column promoted out of the ordinary columns to label rows.
#[derive(Debug, Clone)]
pub struct DateIndex {
    pub name: String,
    pub values: Series,
    pub parsed: bool,
}

/// Data after duplicate removal, date-index promotion and imputation.
#[derive(Debug, Clone)]
pub struct CleanedDataset {
    index: Option<DateIndex>,
    frame: DataFrame,
}

impl CleanedDataset {
    pub fn new(frame: DataFrame, index: Option<DateIndex>) -> Self {
        Self { index, frame }
    }

    /// Ordinary columns (the index is not included)
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn index(&self) -> Option<&DateIndex> {
        self.index.as_ref()
    }

    pub fn height(&self) -> usize {
        match &self.index {
            Some(index) => index.values.len(),
            None => self.frame.height(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    /// Names a chart control may select: the index first, then the ordinary columns.
    pub fn selectable_columns(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.frame.width() + 1);
        if let Some(index) = &self.index {
            names.push(index.name.clone());
        }
        names.extend(self.column_names());
        names
    }

    /// Look up a column by name, resolving the index as well as ordinary columns.
    pub fn series(&self, name: &str) -> Result<Series> {
        if let Some(index) = &self.index {
            if index.name == name {
                return Ok(index.values.clone());
            }
        }
        let column = self
            .frame
            .column(name)
            .map_err(|_| eyre!("column '{}' not found", name))?;
        Ok(column.as_materialized_series().clone())
    }

    /// Ordinary columns with the index put back as the first column.
    pub fn with_index_reset(&self) -> Result<DataFrame> {
        let mut df = self.frame.clone();
        if let Some(index) = &self.index {
            df.insert_column(0, index.values.clone())?;
        }
        Ok(df)
    }
}

/// Output of [`wrangle`].
#[derive(Debug, Clone)]
pub struct Wrangled {
    pub data: CleanedDataset,
    pub null_summary: NullSummary,
    pub duplicate_rows: usize,
    pub date_index: DateIndexOutcome,
}

/// Read a CSV file into a DataFrame using the header row for column names.
pub fn load_csv(path: &Path, options: &WrangleOptions) -> Result<DataFrame> {
    let mut read_options = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(options.infer_schema_length);
    if !options.null_values.is_empty() {
        let markers: Vec<_> = options
            .null_values
            .iter()
            .map(|v| v.as_str().into())
            .collect();
        read_options = read_options.map_parse_options(|opts| {
            opts.with_null_values(Some(NullValues::AllColumns(markers.clone())))
        });
    }
    let df = read_options
        .try_into_reader_with_file_path(Some(path.into()))?
        .finish()?;
    Ok(df)
}

/// Count missing cells per column.
pub fn null_summary(df: &DataFrame) -> NullSummary {
    NullSummary(
        df.get_columns()
            .iter()
            .map(|c| ColumnNulls {
                column: c.name().to_string(),
                nulls: c.null_count(),
            })
            .collect(),
    )
}

/// Remove rows equal to an earlier row, keeping the first occurrence and row order.
/// Returns the remaining rows and how many were removed.
pub fn drop_duplicates(df: DataFrame) -> Result<(DataFrame, usize)> {
    let before = df.height();
    if before == 0 {
        return Ok((df, 0));
    }
    let deduped = df
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    let removed = before - deduped.height();
    Ok((deduped, removed))
}

/// Date layouts tried against a text column, most specific first.
#[derive(Debug, Clone, Copy)]
enum DateFormat {
    Rfc3339,
    DateTime(&'static str),
    Date(&'static str),
}

const DATE_FORMATS: &[DateFormat] = &[
    DateFormat::Rfc3339,
    DateFormat::DateTime("%Y-%m-%d %H:%M:%S%.f"),
    DateFormat::DateTime("%Y-%m-%dT%H:%M:%S%.f"),
    DateFormat::DateTime("%Y-%m-%d %H:%M"),
    DateFormat::DateTime("%Y-%m-%dT%H:%M"),
    DateFormat::DateTime("%m/%d/%Y %H:%M:%S"),
    DateFormat::DateTime("%m/%d/%Y %H:%M"),
    DateFormat::Date("%Y-%m-%d"),
    DateFormat::Date("%Y/%m/%d"),
    // month first wins for ambiguous dd/mm vs mm/dd
    DateFormat::Date("%m/%d/%Y"),
    DateFormat::Date("%d/%m/%Y"),
    DateFormat::Date("%d-%m-%Y"),
    DateFormat::Date("%d.%m.%Y"),
    DateFormat::Date("%d %b %Y"),
    DateFormat::Date("%b %d %Y"),
];

impl DateFormat {
    fn label(self) -> &'static str {
        match self {
            Self::Rfc3339 => "rfc3339",
            Self::DateTime(fmt) | Self::Date(fmt) => fmt,
        }
    }

    /// Milliseconds since the Unix epoch, or None when `s` does not match.
    fn parse_millis(self, s: &str) -> Option<i64> {
        match self {
            Self::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_millis()),
            Self::DateTime(fmt) => NaiveDateTime::parse_from_str(s, fmt)
                .ok()
                .map(|dt| dt.and_utc().timestamp_millis()),
            Self::Date(fmt) => NaiveDate::parse_from_str(s, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc().timestamp_millis()),
        }
    }
}

/// Parse a column as datetimes. Every present value must match the same format.
/// On failure the error is the reason shown to the user.
fn parse_dates(series: &Series) -> std::result::Result<(Series, &'static str), String> {
    let dtype = series.dtype();
    if dtype.is_temporal() {
        return Ok((series.clone(), "native"));
    }
    if !matches!(dtype, DataType::String) {
        return Err(format!("column has type {}, expected text", dtype));
    }
    let ca = series.str().map_err(|e| e.to_string())?;
    let values: Vec<Option<&str>> = ca.iter().map(|v| v.map(str::trim)).collect();
    let sample = match values.iter().flatten().next() {
        Some(v) => *v,
        None => return Err("column has no values to parse".to_string()),
    };

    let format = DATE_FORMATS
        .iter()
        .copied()
        .filter(|f| f.parse_millis(sample).is_some())
        .find(|f| values.iter().flatten().all(|v| f.parse_millis(v).is_some()))
        .ok_or_else(|| format!("values such as '{}' are not in a recognised date format", sample))?;

    let millis: Vec<Option<i64>> = values
        .iter()
        .map(|v| v.and_then(|s| format.parse_millis(s)))
        .collect();
    let parsed = Series::new(series.name().clone(), millis)
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        .map_err(|e| e.to_string())?;
    Ok((parsed, format.label()))
}

/// Move the first column whose name is in `candidates` out of the frame and into the index.
/// Only one column is ever promoted. A column that does not parse as dates is still
/// promoted, with its raw values and an `Unparsed` outcome.
pub fn infer_date_index(
    mut df: DataFrame,
    candidates: &[String],
) -> Result<(DataFrame, Option<DateIndex>, DateIndexOutcome)> {
    let name = match candidates
        .iter()
        .find(|c| df.get_column_index(c.as_str()).is_some())
    {
        Some(name) => name.clone(),
        None => return Ok((df, None, DateIndexOutcome::NotFound)),
    };

    let raw = df.drop_in_place(&name)?.as_materialized_series().clone();
    let (index, outcome) = match parse_dates(&raw) {
        Ok((values, format)) => {
            debug!(column = %name, format, "date column parsed");
            (
                DateIndex {
                    name: name.clone(),
                    values,
                    parsed: true,
                },
                DateIndexOutcome::Parsed {
                    column: name,
                    format: format.to_string(),
                },
            )
        }
        Err(reason) => {
            debug!(column = %name, %reason, "date column kept as raw values");
            (
                DateIndex {
                    name: name.clone(),
                    values: raw,
                    parsed: false,
                },
                DateIndexOutcome::Unparsed {
                    column: name,
                    reason,
                },
            )
        }
    };
    Ok((df, Some(index), outcome))
}

/// Round half to even at the given number of decimals.
pub fn round_half_even(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Most frequent present value. Ties go to the lexicographically smallest value.
pub fn most_frequent(series: &Series) -> Result<Option<String>> {
    let strings = series.cast(&DataType::String)?;
    let ca = strings.str()?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in ca.iter().flatten() {
        *counts.entry(v).or_insert(0) += 1;
    }
    Ok(counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(v, _)| v.to_string()))
}

/// Most frequent present boolean. A tie goes to `false`.
fn most_frequent_flag(series: &Series) -> Result<Option<bool>> {
    let ca = series.bool()?;
    let trues = ca.iter().flatten().filter(|v| *v).count();
    let falses = ca.iter().flatten().count() - trues;
    Ok(match (trues, falses) {
        (0, 0) => None,
        (t, f) => Some(t > f),
    })
}

/// Fill value for one column, or an error when the column has nothing to compute it from.
fn fill_value(series: &Series, kind: ColumnKind) -> Result<Expr> {
    let all_missing = || {
        eyre!(WrangleError::AllMissing {
            column: series.name().to_string(),
            kind,
        })
    };
    match kind {
        ColumnKind::Float => {
            let mean = series.mean().ok_or_else(all_missing)?;
            Ok(lit(round_half_even(mean, 3)))
        }
        ColumnKind::Integer => {
            let mean = series.mean().ok_or_else(all_missing)?;
            Ok(lit(round_half_even(mean, 0) as i64))
        }
        ColumnKind::Categorical => {
            let mode = most_frequent(series)?.ok_or_else(all_missing)?;
            Ok(lit(mode))
        }
        ColumnKind::Boolean => {
            let mode = most_frequent_flag(series)?.ok_or_else(all_missing)?;
            Ok(lit(mode))
        }
        ColumnKind::Temporal | ColumnKind::Other => Err(eyre!(
            "column '{}' ({}) is not imputed",
            series.name(),
            kind
        )),
    }
}

/// Fill missing values: float columns with the mean rounded to 3 decimals, integer columns
/// with the mean rounded to a whole number, text and boolean columns with the most
/// frequent value.
/// Other column types are left untouched. An empty frame is returned unchanged.
pub fn impute_missing(df: DataFrame) -> Result<DataFrame> {
    if df.height() == 0 {
        return Ok(df);
    }

    let mut fills: Vec<Expr> = Vec::new();
    for kind in [
        ColumnKind::Float,
        ColumnKind::Integer,
        ColumnKind::Categorical,
        ColumnKind::Boolean,
    ] {
        for column in df.get_columns() {
            if ColumnKind::of(column.dtype()) != kind || column.null_count() == 0 {
                continue;
            }
            let series = column.as_materialized_series();
            let fill = fill_value(series, kind)?;
            debug!(column = %column.name(), %kind, nulls = column.null_count(), "filling missing values");
            fills.push(
                col(column.name().clone())
                    .fill_null(fill)
                    .cast(column.dtype().clone()),
            );
        }
    }

    if fills.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(fills).collect()?)
}

/// Run the full cleaning pipeline on an already loaded frame.
pub fn wrangle_frame(raw: DataFrame, options: &WrangleOptions) -> Result<Wrangled> {
    let null_summary = null_summary(&raw);
    let (deduped, duplicate_rows) = drop_duplicates(raw)?;
    let (frame, index, date_index) = infer_date_index(deduped, &options.date_columns)?;
    let frame = impute_missing(frame)?;
    debug!(
        rows = frame.height(),
        duplicate_rows,
        nulls = null_summary.total(),
        "wrangled dataset"
    );
    Ok(Wrangled {
        data: CleanedDataset::new(frame, index),
        null_summary,
        duplicate_rows,
        date_index,
    })
}

/// Load `path` and clean it. See [`wrangle_frame`].
pub fn wrangle(path: &Path, options: &WrangleOptions) -> Result<Wrangled> {
    let raw = load_csv(path, options)?;
    wrangle_frame(raw, options)
}

/// Write the cleaned data (index first) as CSV.
pub fn write_csv(data: &CleanedDataset, path: &Path) -> Result<()> {
    let mut df = data.with_index_reset()?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
