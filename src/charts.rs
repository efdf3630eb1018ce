//! Chart builders: map a cleaned dataset and a column selection to a [`ChartSpec`].
//!
//! Builders are pure. They read at most `row_limit` rows, drop rows with a missing value in
//! any selected column, and report unknown or wrongly typed columns as errors.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::datatypes::{DataType, TimeUnit};
use polars::prelude::*;
use serde::Serialize;

use crate::config::DashboardConfig;
use crate::statistics::{box_stats, pearson, BoxStats};
use crate::wrangle::CleanedDataset;

/// Limits applied by every builder.
#[derive(Debug, Clone, Copy)]
pub struct ChartOptions {
    pub row_limit: usize,
    pub histogram_max_bins: usize,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            row_limit: 10_000,
            histogram_max_bins: 50,
        }
    }
}

impl From<&DashboardConfig> for ChartOptions {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            row_limit: config.chart_row_limit,
            histogram_max_bins: config.histogram_max_bins,
        }
    }
}

/// How x-axis values are to be labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Numeric,
    /// x = milliseconds since the Unix epoch
    Datetime,
    /// x = position into `x_labels`
    Category,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledBox {
    pub label: String,
    pub count: usize,
    pub stats: BoxStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "chart", rename_all = "snake_case")]
pub enum ChartBody {
    Histogram {
        bins: Vec<Bin>,
    },
    /// Histogram of a text column
    CategoryCounts {
        categories: Vec<CategoryCount>,
    },
    BoxPlot {
        boxes: Vec<LabeledBox>,
    },
    Line {
        x_axis: AxisKind,
        x_labels: Vec<String>,
        series: Vec<ChartSeries>,
    },
    Scatter {
        points: Vec<(f64, f64)>,
        correlation: Option<f64>,
    },
    Bar {
        x_axis: AxisKind,
        x_labels: Vec<String>,
        series: Vec<ChartSeries>,
    },
    Pie {
        slices: Vec<CategoryCount>,
    },
}

/// A renderable chart description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    #[serde(flatten)]
    pub body: ChartBody,
}

impl ChartSpec {
    /// True when there is nothing to draw
    pub fn is_empty(&self) -> bool {
        match &self.body {
            ChartBody::Histogram { bins } => bins.is_empty(),
            ChartBody::CategoryCounts { categories } => categories.is_empty(),
            ChartBody::BoxPlot { boxes } => boxes.is_empty(),
            ChartBody::Line { series, .. } | ChartBody::Bar { series, .. } => {
                series.iter().all(|s| s.points.is_empty())
            }
            ChartBody::Scatter { points, .. } => points.is_empty(),
            ChartBody::Pie { slices } => slices.is_empty(),
        }
    }
}

fn limited(data: &CleanedDataset, name: &str, options: &ChartOptions) -> Result<Series> {
    let series = data.series(name)?;
    Ok(series.slice(0, options.row_limit))
}

fn is_numeric(dtype: &DataType) -> bool {
    dtype.is_float() || dtype.is_integer()
}

/// Values of a numeric column; temporal columns are not accepted here.
fn numeric_values(series: &Series) -> Result<Vec<Option<f64>>> {
    if !is_numeric(series.dtype()) {
        return Err(eyre!(
            "column '{}' is not numeric ({})",
            series.name(),
            series.dtype()
        ));
    }
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast
        .f64()?
        .iter()
        .map(|v| v.filter(|f| f.is_finite()))
        .collect())
}

/// Any column as text labels; missing stays missing.
fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let cast = series.cast(&DataType::String)?;
    Ok(cast.str()?.iter().map(|v| v.map(str::to_string)).collect())
}

/// x values with their axis kind. Temporal columns become epoch milliseconds, numeric columns
/// are used as-is, anything else is placed by position with its text as labels.
fn x_values(series: &Series) -> Result<(AxisKind, Vec<Option<f64>>, Vec<String>)> {
    let dtype = series.dtype();
    if dtype.is_temporal() {
        let ms = match dtype {
            DataType::Date => series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?,
            DataType::Datetime(_, _) => series
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                .cast(&DataType::Int64)?,
            _ => {
                return Err(eyre!(
                    "column '{}' has unsupported type {} for an x axis",
                    series.name(),
                    dtype
                ))
            }
        };
        let values = ms.i64()?.iter().map(|v| v.map(|v| v as f64)).collect();
        return Ok((AxisKind::Datetime, values, Vec::new()));
    }
    if is_numeric(dtype) {
        return Ok((AxisKind::Numeric, numeric_values(series)?, Vec::new()));
    }
    let labels = text_values(series)?;
    let values = labels
        .iter()
        .enumerate()
        .map(|(i, l)| l.as_ref().map(|_| i as f64))
        .collect();
    let labels = labels.into_iter().map(|l| l.unwrap_or_default()).collect();
    Ok((AxisKind::Category, values, labels))
}

/// Counts per distinct value, in order of first appearance.
fn category_counts(labels: Vec<Option<String>>) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for label in labels.into_iter().flatten() {
        match counts.iter_mut().find(|c| c.label == label) {
            Some(c) => c.count += 1,
            None => counts.push(CategoryCount { label, count: 1 }),
        }
    }
    counts
}

/// Number of histogram bins by the Sturges rule, capped at `max_bins`.
pub fn sturges_bins(n: usize, max_bins: usize) -> usize {
    if n == 0 {
        return 1;
    }
    let k = (n as f64).log2().ceil() as usize + 1;
    k.clamp(1, max_bins.max(1))
}

/// Equal-width bins over the value range. Constant data gets one bin centred on the value.
pub fn bin_values(values: &[f64], max_bins: usize) -> Vec<Bin> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if min == max {
        return vec![Bin {
            start: min - 0.5,
            end: max + 0.5,
            count: values.len(),
        }];
    }
    let k = sturges_bins(values.len(), max_bins);
    let width = (max - min) / k as f64;
    let mut bins: Vec<Bin> = (0..k)
        .map(|i| Bin {
            start: min + width * i as f64,
            end: if i + 1 == k {
                max
            } else {
                min + width * (i + 1) as f64
            },
            count: 0,
        })
        .collect();
    for v in values {
        let idx = (((v - min) / width).floor() as usize).min(k - 1);
        bins[idx].count += 1;
    }
    bins
}

/// Distribution of one column: binned counts for numbers, value counts for text.
pub fn histogram(
    data: &CleanedDataset,
    x: &str,
    title: &str,
    options: &ChartOptions,
) -> Result<ChartSpec> {
    let series = limited(data, x, options)?;
    let body = if is_numeric(series.dtype()) {
        let values: Vec<f64> = numeric_values(&series)?.into_iter().flatten().collect();
        ChartBody::Histogram {
            bins: bin_values(&values, options.histogram_max_bins),
        }
    } else {
        ChartBody::CategoryCounts {
            categories: category_counts(text_values(&series)?),
        }
    };
    Ok(ChartSpec {
        title: title.to_string(),
        x_label: x.to_string(),
        y_label: "count".to_string(),
        body,
    })
}

/// One box per distinct x value summarising the numeric y values of its rows.
pub fn box_plot(
    data: &CleanedDataset,
    x: &str,
    y: &str,
    title: &str,
    options: &ChartOptions,
) -> Result<ChartSpec> {
    let groups_series = limited(data, x, options)?;
    let values_series = limited(data, y, options)?;
    let groups = text_values(&groups_series)?;
    let values = numeric_values(&values_series)?;

    let mut grouped: Vec<(String, Vec<f64>)> = Vec::new();
    for (group, value) in groups.into_iter().zip(values) {
        let (Some(group), Some(value)) = (group, value) else {
            continue;
        };
        match grouped.iter_mut().find(|(g, _)| *g == group) {
            Some((_, vs)) => vs.push(value),
            None => grouped.push((group, vec![value])),
        }
    }

    let boxes = grouped
        .into_iter()
        .filter_map(|(label, vs)| {
            box_stats(&vs).map(|stats| LabeledBox {
                label,
                count: vs.len(),
                stats,
            })
        })
        .collect();

    Ok(ChartSpec {
        title: title.to_string(),
        x_label: x.to_string(),
        y_label: y.to_string(),
        body: ChartBody::BoxPlot { boxes },
    })
}

/// y over x in row order.
pub fn line_chart(
    data: &CleanedDataset,
    x: &str,
    y: &str,
    title: &str,
    options: &ChartOptions,
) -> Result<ChartSpec> {
    let (x_axis, xs, x_labels) = x_values(&limited(data, x, options)?)?;
    let ys = numeric_values(&limited(data, y, options)?)?;
    let points = xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect();

    Ok(ChartSpec {
        title: title.to_string(),
        x_label: x.to_string(),
        y_label: y.to_string(),
        body: ChartBody::Line {
            x_axis,
            x_labels,
            series: vec![ChartSeries {
                name: y.to_string(),
                points,
            }],
        },
    })
}

/// Share of rows per distinct value, largest first (ties by value).
pub fn pie_chart(
    data: &CleanedDataset,
    feature: &str,
    title: &str,
    options: &ChartOptions,
) -> Result<ChartSpec> {
    let mut slices = category_counts(text_values(&limited(data, feature, options)?)?);
    slices.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));

    Ok(ChartSpec {
        title: title.to_string(),
        x_label: feature.to_string(),
        y_label: "count".to_string(),
        body: ChartBody::Pie { slices },
    })
}

/// Numeric x against numeric y with their Pearson correlation.
pub fn scatter(
    data: &CleanedDataset,
    x: &str,
    y: &str,
    title: &str,
    options: &ChartOptions,
) -> Result<ChartSpec> {
    let xs = numeric_values(&limited(data, x, options)?)?;
    let ys = numeric_values(&limited(data, y, options)?)?;
    let points: Vec<(f64, f64)> = xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect();
    let correlation = pearson(&points);

    Ok(ChartSpec {
        title: title.to_string(),
        x_label: x.to_string(),
        y_label: y.to_string(),
        body: ChartBody::Scatter {
            points,
            correlation,
        },
    })
}

/// One bar series per selected column against the row index: the date index when
/// there is one, row position otherwise.
pub fn bar_chart(
    data: &CleanedDataset,
    ys: &[String],
    title: &str,
    options: &ChartOptions,
) -> Result<ChartSpec> {
    if ys.is_empty() {
        return Err(eyre!("select at least one column for the bar chart"));
    }

    let (x_axis, xs, x_labels, x_label) = match data.index() {
        Some(index) => {
            let (kind, xs, labels) = x_values(&index.values.slice(0, options.row_limit))?;
            (kind, xs, labels, index.name.clone())
        }
        None => {
            let n = data.height().min(options.row_limit);
            let xs = (0..n).map(|i| Some(i as f64)).collect();
            (AxisKind::Numeric, xs, Vec::new(), "index".to_string())
        }
    };

    let mut series = Vec::with_capacity(ys.len());
    for y in ys {
        let values = numeric_values(&limited(data, y, options)?)?;
        let points = xs
            .iter()
            .zip(values)
            .filter_map(|(x, y)| Some(((*x)?, y?)))
            .collect();
        series.push(ChartSeries {
            name: y.clone(),
            points,
        });
    }

    Ok(ChartSpec {
        title: title.to_string(),
        x_label,
        y_label: ys.join(", "),
        body: ChartBody::Bar {
            x_axis,
            x_labels,
            series,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sturges_rule_is_capped() {
        assert_eq!(sturges_bins(0, 50), 1);
        assert_eq!(sturges_bins(1, 50), 1);
        assert_eq!(sturges_bins(8, 50), 4);
        assert_eq!(sturges_bins(100, 50), 8);
        assert_eq!(sturges_bins(1_000_000, 10), 10);
    }

    #[test]
    fn bins_cover_every_value() {
        let values = [1.0, 2.0, 2.0, 3.0, 4.0, 10.0];
        let bins = bin_values(&values, 50);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), values.len());
        assert_eq!(bins.first().unwrap().start, 1.0);
        assert_eq!(bins.last().unwrap().end, 10.0);
    }

    #[test]
    fn constant_values_get_one_bin() {
        let bins = bin_values(&[5.0, 5.0, 5.0], 50);
        assert_eq!(
            bins,
            vec![Bin {
                start: 4.5,
                end: 5.5,
                count: 3
            }]
        );
    }

    #[test]
    fn category_counts_keep_first_appearance_order() {
        let labels = vec![
            Some("b".to_string()),
            Some("a".to_string()),
            None,
            Some("b".to_string()),
        ];
        let counts = category_counts(labels);
        assert_eq!(
            counts,
            vec![
                CategoryCount {
                    label: "b".to_string(),
                    count: 2
                },
                CategoryCount {
                    label: "a".to_string(),
                    count: 1
                },
            ]
        );
    }
}
