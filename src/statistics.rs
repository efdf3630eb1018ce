//! Summary statistics for the data overview and numeric helpers shared with the chart builders.

use color_eyre::Result;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::wrangle::{most_frequent, CleanedDataset, ColumnKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: f64,
    pub std: f64, // Sample std (ddof=1), NaN for fewer than two values
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoricalSummary {
    pub count: usize,
    pub unique: usize,
    pub top: Option<String>,
    pub freq: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SummaryStats {
    Numeric(NumericSummary),
    Categorical(CategoricalSummary),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub stats: SummaryStats,
}

/// Five-number summary with 1.5 IQR whiskers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxStats {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

/// Describe the ordinary columns of a cleaned dataset.
///
/// Numeric columns are described when there are any; otherwise text columns are,
/// so a file of only labels still gets a summary.
pub fn describe(data: &CleanedDataset) -> Result<Vec<ColumnSummary>> {
    let frame = data.frame();
    let numeric: Vec<&Column> = frame
        .get_columns()
        .iter()
        .filter(|c| ColumnKind::of(c.dtype()).is_numeric())
        .collect();

    let mut summaries = Vec::new();
    if !numeric.is_empty() {
        for column in numeric {
            let values = numeric_values(column.as_materialized_series())?;
            if let Some(stats) = numeric_summary(&values) {
                summaries.push(ColumnSummary {
                    name: column.name().to_string(),
                    kind: ColumnKind::of(column.dtype()),
                    stats: SummaryStats::Numeric(stats),
                });
            }
        }
        return Ok(summaries);
    }

    for column in frame.get_columns() {
        if ColumnKind::of(column.dtype()) != ColumnKind::Categorical {
            continue;
        }
        summaries.push(ColumnSummary {
            name: column.name().to_string(),
            kind: ColumnKind::Categorical,
            stats: SummaryStats::Categorical(categorical_summary(
                column.as_materialized_series(),
            )?),
        });
    }
    Ok(summaries)
}

/// Present values of a numeric (or temporal) series as f64, in row order.
pub fn numeric_values(series: &Series) -> Result<Vec<f64>> {
    let cast = match series.dtype() {
        DataType::Datetime(_, _) | DataType::Date => {
            series.cast(&DataType::Int64)?.cast(&DataType::Float64)?
        }
        _ => series.cast(&DataType::Float64)?,
    };
    Ok(cast.f64()?.iter().flatten().filter(|v| v.is_finite()).collect())
}

/// Linear-interpolated quantile of already sorted values. `sorted` must not be empty.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

pub fn numeric_summary(values: &[f64]) -> Option<NumericSummary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std = if values.len() > 1 {
        let ss: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (n - 1.0)).sqrt()
    } else {
        f64::NAN
    };
    let sorted = sorted_copy(values);
    Some(NumericSummary {
        count: values.len(),
        mean,
        std,
        min: sorted[0],
        q25: quantile(&sorted, 0.25),
        median: quantile(&sorted, 0.5),
        q75: quantile(&sorted, 0.75),
        max: sorted[sorted.len() - 1],
    })
}

pub fn categorical_summary(series: &Series) -> Result<CategoricalSummary> {
    let strings = series.cast(&DataType::String)?;
    let ca = strings.str()?;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in ca.iter().flatten() {
        *counts.entry(v).or_insert(0) += 1;
    }
    let top = most_frequent(series)?;
    let freq = top
        .as_deref()
        .and_then(|t| counts.get(t).copied())
        .unwrap_or(0);
    Ok(CategoricalSummary {
        count: ca.len() - ca.null_count(),
        unique: counts.len(),
        top,
        freq,
    })
}

/// Box-plot statistics; whiskers reach the furthest values within 1.5 IQR of the quartiles.
pub fn box_stats(values: &[f64]) -> Option<BoxStats> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    let q1 = quantile(&sorted, 0.25);
    let median = quantile(&sorted, 0.5);
    let q3 = quantile(&sorted, 0.75);
    let iqr = q3 - q1;
    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    let inside = sorted
        .iter()
        .copied()
        .filter(|v| *v >= lower_fence && *v <= upper_fence);
    let lower_whisker = inside.clone().next().unwrap_or(q1);
    let upper_whisker = inside.last().unwrap_or(q3);
    let outliers = sorted
        .iter()
        .copied()
        .filter(|v| *v < lower_fence || *v > upper_fence)
        .collect();

    Some(BoxStats {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    })
}

/// Pearson correlation of paired values; None when undefined (fewer than two pairs or zero variance).
pub fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
