//! Dashboard controller: turns the `file` reference and the current control selections into
//! wrangler and chart builder calls. Nothing is kept between requests.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use percent_encoding::percent_decode_str;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

use crate::charts::{self, ChartOptions, ChartSpec};
use crate::config::AppConfig;
use crate::statistics::{describe, SummaryStats};
use crate::wrangle::{
    null_summary, round_half_even, wrangle, ColumnKind, DateIndexOutcome, NullSummary,
    WrangleOptions, Wrangled,
};

/// Query parameters of the dashboard page and its panel endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardParams {
    pub file: Option<String>,
    pub rows: Option<usize>,
    pub corr_x: Option<String>,
    pub corr_y: Option<String>,
    /// Repeatable: `bar=a&bar=b`
    pub bar: Vec<String>,
    pub hist: Option<String>,
    pub box_x: Option<String>,
    pub box_y: Option<String>,
    pub line_x: Option<String>,
    pub line_y: Option<String>,
    pub pie: Option<String>,
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

impl DashboardParams {
    /// Parse a raw `application/x-www-form-urlencoded` query string. Unknown keys are ignored,
    /// empty values count as "not selected" and an unparseable `rows` is ignored.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(key);
            let value = decode_component(value);
            if value.is_empty() {
                continue;
            }
            match key.as_str() {
                "file" => params.file = Some(value),
                "rows" => params.rows = value.trim().parse().ok(),
                "corr_x" => params.corr_x = Some(value),
                "corr_y" => params.corr_y = Some(value),
                "bar" => params.bar.push(value),
                "hist" => params.hist = Some(value),
                "box_x" => params.box_x = Some(value),
                "box_y" => params.box_y = Some(value),
                "line_x" => params.line_x = Some(value),
                "line_y" => params.line_y = Some(value),
                "pie" => params.pie = Some(value),
                _ => {}
            }
        }
        params
    }

    /// Current value of a single-valued control
    pub fn value(&self, key: &str) -> Option<&str> {
        match key {
            "corr_x" => self.corr_x.as_deref(),
            "corr_y" => self.corr_y.as_deref(),
            "hist" => self.hist.as_deref(),
            "box_x" => self.box_x.as_deref(),
            "box_y" => self.box_y.as_deref(),
            "line_x" => self.line_x.as_deref(),
            "line_y" => self.line_y.as_deref(),
            "pie" => self.pie.as_deref(),
            _ => None,
        }
    }
}

/// One chart area of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Correlation,
    Bar,
    Histogram,
    #[serde(rename = "box")]
    BoxPlot,
    Line,
    Pie,
}

/// A control belonging to a panel: query key, label, and whether several values may be chosen.
#[derive(Debug, Clone, Copy)]
pub struct Control {
    pub key: &'static str,
    pub label: &'static str,
    pub multiple: bool,
}

const fn control(key: &'static str, label: &'static str) -> Control {
    Control {
        key,
        label,
        multiple: false,
    }
}

impl Panel {
    pub const ALL: [Self; 6] = [
        Self::Correlation,
        Self::Bar,
        Self::Histogram,
        Self::BoxPlot,
        Self::Line,
        Self::Pie,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Self::Correlation => "correlation",
            Self::Bar => "bar",
            Self::Histogram => "histogram",
            Self::BoxPlot => "box",
            Self::Line => "line",
            Self::Pie => "pie",
        }
    }

    pub fn heading(self) -> &'static str {
        match self {
            Self::Correlation => "Correlation Graph",
            Self::Bar => "Bar Chart",
            Self::Histogram => "Histogram",
            Self::BoxPlot => "Box Plot",
            Self::Line => "Line Chart",
            Self::Pie => "Pie Chart",
        }
    }

    pub fn controls(self) -> &'static [Control] {
        const CORRELATION: [Control; 2] = [control("corr_x", "X-axis"), control("corr_y", "Y-axis")];
        const BAR: [Control; 1] = [Control {
            key: "bar",
            label: "Columns",
            multiple: true,
        }];
        const HISTOGRAM: [Control; 1] = [control("hist", "Column")];
        const BOX: [Control; 2] = [control("box_x", "X-axis"), control("box_y", "Y-axis")];
        const LINE: [Control; 2] = [control("line_x", "X-axis"), control("line_y", "Y-axis")];
        const PIE: [Control; 1] = [control("pie", "Feature")];
        match self {
            Self::Correlation => &CORRELATION,
            Self::Bar => &BAR,
            Self::Histogram => &HISTOGRAM,
            Self::BoxPlot => &BOX,
            Self::Line => &LINE,
            Self::Pie => &PIE,
        }
    }

    /// Text shown until the panel's selections are complete
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Correlation => "Select x and y axes to display correlation graph",
            Self::Bar => "Select columns to display bar chart",
            Self::Histogram => "Select a column to display histogram",
            Self::BoxPlot => "Select x and y axes to display box plot",
            Self::Line => "Select x and y axes to display line chart",
            Self::Pie => "Select a column to display pie chart",
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Panel {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.slug() == s)
            .ok_or_else(|| eyre!("unknown panel '{}'", s))
    }
}

/// What a panel shows for the current selections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PanelOutcome {
    /// Selections are incomplete
    Prompt { message: String },
    Chart { spec: ChartSpec },
    /// The builder refused the selection (wrong column type, unknown column)
    Failed { message: String },
}

/// Plain text table for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell_text(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Float64(v) => format_number(v),
        AnyValue::Float32(v) => format_number(v as f64),
        other => other.to_string(),
    }
}

fn format_number(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else {
        round_half_even(v, 3).to_string()
    }
}

/// Render every cell of a frame as text.
pub fn table_from_frame(df: &DataFrame) -> Result<Table> {
    let headers = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    let mut rows = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let mut row = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            row.push(cell_text(column.get(i)?));
        }
        rows.push(row);
    }
    Ok(Table { headers, rows })
}

/// Content of the data overview section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub nulls: Table,
    pub summary: Table,
    pub observations: Table,
}

/// Column listing for `/api/summary`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataSummary {
    pub file: String,
    pub rows: usize,
    pub duplicate_rows: usize,
    pub null_summary: NullSummary,
    pub date_index: DateIndexOutcome,
    pub columns: Vec<ColumnInfo>,
}

/// One request's view of an uploaded file.
pub struct Dashboard {
    path: PathBuf,
    wrangled: Wrangled,
    chart_options: ChartOptions,
    default_rows: usize,
    max_rows: usize,
}

impl Dashboard {
    /// Re-read and wrangle the file.
    pub fn load(path: &Path, config: &AppConfig) -> Result<Self> {
        let wrangled = wrangle(path, &WrangleOptions::from(&config.wrangle))?;
        Ok(Self {
            path: path.to_path_buf(),
            wrangled,
            chart_options: ChartOptions::from(&config.dashboard),
            default_rows: config.dashboard.default_rows,
            max_rows: config.dashboard.max_rows,
        })
    }

    pub fn wrangled(&self) -> &Wrangled {
        &self.wrangled
    }

    /// Rows to show in the observations table, clamped to the configured maximum.
    pub fn rows(&self, params: &DashboardParams) -> usize {
        params.rows.unwrap_or(self.default_rows).min(self.max_rows)
    }

    /// Choices for the rows dropdown
    pub fn row_choices(&self) -> std::ops::RangeInclusive<usize> {
        0..=self.max_rows
    }

    pub fn duplicate_text(&self, rows: usize) -> String {
        format!(
            "Number of Duplicate Rows: {}, Displaying {} rows.",
            self.wrangled.duplicate_rows, rows
        )
    }

    /// Names offered by every column dropdown: the index first, then the ordinary columns.
    pub fn column_options(&self) -> Vec<String> {
        self.wrangled.data.selectable_columns()
    }

    /// Null counts, summary statistics and the first `rows` observations.
    /// None when the cleaned data has no rows.
    pub fn overview(&self, rows: usize) -> Result<Option<Overview>> {
        let data = &self.wrangled.data;
        if data.is_empty() {
            return Ok(None);
        }

        let nulls = Table {
            headers: vec!["Column".to_string(), "Null Values".to_string()],
            rows: null_summary(data.frame())
                .iter()
                .map(|c| vec![c.column.clone(), c.nulls.to_string()])
                .collect(),
        };

        Ok(Some(Overview {
            nulls,
            summary: summary_table(data)?,
            observations: table_from_frame(&observations(data, rows)?)?,
        }))
    }

    /// Build one panel from the current selections.
    pub fn panel(&self, panel: Panel, params: &DashboardParams) -> PanelOutcome {
        let data = &self.wrangled.data;
        let opts = &self.chart_options;
        let pair = |a: &Option<String>, b: &Option<String>| match (a, b) {
            (Some(a), Some(b)) => Some((a.clone(), b.clone())),
            _ => None,
        };

        let built = match panel {
            Panel::Correlation => pair(&params.corr_x, &params.corr_y).map(|(x, y)| {
                charts::scatter(
                    data,
                    &x,
                    &y,
                    &format!("Correlation between {} and {}", x, y),
                    opts,
                )
            }),
            Panel::Bar => {
                (!params.bar.is_empty()).then(|| charts::bar_chart(data, &params.bar, "Bar Chart", opts))
            }
            Panel::Histogram => params
                .hist
                .as_ref()
                .map(|x| charts::histogram(data, x, &format!("Histogram of {}", x), opts)),
            Panel::BoxPlot => pair(&params.box_x, &params.box_y).map(|(x, y)| {
                charts::box_plot(data, &x, &y, &format!("Box Plot of {} by {}", x, y), opts)
            }),
            Panel::Line => pair(&params.line_x, &params.line_y).map(|(x, y)| {
                charts::line_chart(data, &x, &y, &format!("Line Chart of {} over {}", y, x), opts)
            }),
            Panel::Pie => params
                .pie
                .as_ref()
                .map(|x| charts::pie_chart(data, x, &format!("Pie Chart of {}", x), opts)),
        };

        match built {
            None => PanelOutcome::Prompt {
                message: panel.prompt().to_string(),
            },
            Some(Ok(spec)) => PanelOutcome::Chart { spec },
            Some(Err(e)) => {
                warn!(%panel, file = %self.path.display(), error = %e, "panel failed");
                PanelOutcome::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    pub fn summary(&self, file: &str) -> DataSummary {
        let data = &self.wrangled.data;
        let columns = data
            .frame()
            .get_columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                kind: ColumnKind::of(c.dtype()),
            })
            .collect();
        DataSummary {
            file: file.to_string(),
            rows: data.height(),
            duplicate_rows: self.wrangled.duplicate_rows,
            null_summary: self.wrangled.null_summary.clone(),
            date_index: self.wrangled.date_index.clone(),
            columns,
        }
    }
}

/// First `rows` rows with the index as the first column. Without a date index, a row
/// position column named `index` is added when that name is free.
fn observations(data: &crate::wrangle::CleanedDataset, rows: usize) -> Result<DataFrame> {
    let mut df = data.with_index_reset()?.head(Some(rows));
    if data.index().is_none() && df.get_column_index("index").is_none() {
        let positions: Vec<u32> = (0..df.height() as u32).collect();
        df.insert_column(0, Series::new("index".into(), positions))?;
    }
    Ok(df)
}

/// Describe-style table, one row per column.
fn summary_table(data: &crate::wrangle::CleanedDataset) -> Result<Table> {
    let summaries = describe(data)?;
    let numeric = matches!(
        summaries.first().map(|s| &s.stats),
        Some(SummaryStats::Numeric(_)) | None
    );
    let headers: &[&str] = if numeric {
        &["index", "count", "mean", "std", "min", "25%", "50%", "75%", "max"]
    } else {
        &["index", "count", "unique", "top", "freq"]
    };
    let headers = headers.iter().map(|h| h.to_string()).collect();

    let rows = summaries
        .into_iter()
        .map(|s| match s.stats {
            SummaryStats::Numeric(n) => vec![
                s.name,
                n.count.to_string(),
                format_number(n.mean),
                format_number(n.std),
                format_number(n.min),
                format_number(n.q25),
                format_number(n.median),
                format_number(n.q75),
                format_number(n.max),
            ],
            SummaryStats::Categorical(c) => vec![
                s.name,
                c.count.to_string(),
                c.unique.to_string(),
                c.top.unwrap_or_default(),
                c.freq.to_string(),
            ],
        })
        .collect();
    Ok(Table { headers, rows })
}
