use datadash::charts::{
    bar_chart, box_plot, histogram, line_chart, pie_chart, scatter, AxisKind, ChartBody,
    ChartOptions,
};
use datadash::wrangle::{wrangle_frame, CleanedDataset, WrangleOptions};
use polars::prelude::*;

fn dataset(df: DataFrame) -> CleanedDataset {
    wrangle_frame(df, &WrangleOptions::default()).unwrap().data
}

fn sales() -> CleanedDataset {
    dataset(
        df!(
            "date" => &["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"],
            "region" => &["north", "south", "north", "east"],
            "units" => &[10i64, 20, 30, 40],
            "price" => &[1.0f64, 2.0, 3.0, 4.0]
        )
        .unwrap(),
    )
}

#[test]
fn test_numeric_histogram_counts_every_row() {
    let spec = histogram(&sales(), "units", "Histogram of units", &ChartOptions::default()).unwrap();
    assert_eq!(spec.title, "Histogram of units");
    match spec.body {
        ChartBody::Histogram { bins } => {
            assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 4);
            // Sturges: ceil(log2 4) + 1
            assert_eq!(bins.len(), 3);
        }
        other => panic!("expected histogram, got {:?}", other),
    }
}

#[test]
fn test_text_histogram_counts_categories() {
    let spec = histogram(&sales(), "region", "Histogram of region", &ChartOptions::default()).unwrap();
    match spec.body {
        ChartBody::CategoryCounts { categories } => {
            let pairs: Vec<(&str, usize)> = categories
                .iter()
                .map(|c| (c.label.as_str(), c.count))
                .collect();
            assert_eq!(pairs, vec![("north", 2), ("south", 1), ("east", 1)]);
        }
        other => panic!("expected category counts, got {:?}", other),
    }
}

#[test]
fn test_box_plot_groups_by_x() {
    let spec = box_plot(&sales(), "region", "units", "Box Plot of region by units", &ChartOptions::default())
        .unwrap();
    match spec.body {
        ChartBody::BoxPlot { boxes } => {
            assert_eq!(boxes.len(), 3);
            assert_eq!(boxes[0].label, "north");
            assert_eq!(boxes[0].count, 2);
            assert_eq!(boxes[0].stats.median, 20.0);
        }
        other => panic!("expected box plot, got {:?}", other),
    }
}

#[test]
fn test_box_plot_needs_numeric_y() {
    let err = box_plot(&sales(), "units", "region", "t", &ChartOptions::default()).unwrap_err();
    assert!(err.to_string().contains("not numeric"), "got {}", err);
}

#[test]
fn test_line_chart_over_date_index_uses_epoch_millis() {
    let spec = line_chart(&sales(), "date", "price", "Line Chart of price over date", &ChartOptions::default())
        .unwrap();
    match spec.body {
        ChartBody::Line { x_axis, series, .. } => {
            assert_eq!(x_axis, AxisKind::Datetime);
            assert_eq!(series.len(), 1);
            assert_eq!(series[0].points[0], (1_704_067_200_000.0, 1.0));
            assert_eq!(series[0].points.len(), 4);
        }
        other => panic!("expected line chart, got {:?}", other),
    }
}

#[test]
fn test_pie_slices_sorted_by_count_then_label() {
    let spec = pie_chart(&sales(), "region", "Pie Chart of region", &ChartOptions::default()).unwrap();
    match spec.body {
        ChartBody::Pie { slices } => {
            let labels: Vec<&str> = slices.iter().map(|s| s.label.as_str()).collect();
            assert_eq!(labels, vec!["north", "east", "south"]);
        }
        other => panic!("expected pie chart, got {:?}", other),
    }
}

#[test]
fn test_scatter_reports_correlation() {
    let spec = scatter(&sales(), "units", "price", "Correlation between units and price", &ChartOptions::default())
        .unwrap();
    match spec.body {
        ChartBody::Scatter { points, correlation } => {
            assert_eq!(points.len(), 4);
            assert!((correlation.unwrap() - 1.0).abs() < 1e-12);
        }
        other => panic!("expected scatter, got {:?}", other),
    }
}

#[test]
fn test_bar_chart_uses_date_index_for_x() {
    let ys = vec!["units".to_string(), "price".to_string()];
    let spec = bar_chart(&sales(), &ys, "Bar Chart", &ChartOptions::default()).unwrap();
    assert_eq!(spec.x_label, "date");
    match spec.body {
        ChartBody::Bar { x_axis, series, .. } => {
            assert_eq!(x_axis, AxisKind::Datetime);
            assert_eq!(series.len(), 2);
            assert_eq!(series[1].name, "price");
            assert_eq!(series[0].points[3].1, 40.0);
        }
        other => panic!("expected bar chart, got {:?}", other),
    }
}

#[test]
fn test_bar_chart_without_index_uses_row_position() {
    let data = dataset(df!("v" => &[5i64, 6, 7]).unwrap());
    let spec = bar_chart(&data, &["v".to_string()], "Bar Chart", &ChartOptions::default()).unwrap();
    match spec.body {
        ChartBody::Bar { x_axis, series, .. } => {
            assert_eq!(x_axis, AxisKind::Numeric);
            assert_eq!(series[0].points, vec![(0.0, 5.0), (1.0, 6.0), (2.0, 7.0)]);
        }
        other => panic!("expected bar chart, got {:?}", other),
    }
}

#[test]
fn test_unknown_column_is_an_error() {
    assert!(histogram(&sales(), "nope", "t", &ChartOptions::default()).is_err());
    assert!(bar_chart(&sales(), &[], "t", &ChartOptions::default()).is_err());
}

#[test]
fn test_row_limit_caps_points() {
    let options = ChartOptions {
        row_limit: 2,
        ..ChartOptions::default()
    };
    let spec = scatter(&sales(), "units", "price", "t", &options).unwrap();
    match spec.body {
        ChartBody::Scatter { points, .. } => assert_eq!(points.len(), 2),
        other => panic!("expected scatter, got {:?}", other),
    }
}

#[test]
fn test_spec_serializes_with_chart_tag() {
    let spec = pie_chart(&sales(), "region", "Pie Chart of region", &ChartOptions::default()).unwrap();
    let json = serde_json::to_value(&spec).unwrap();
    assert_eq!(json["chart"], "pie");
    assert_eq!(json["title"], "Pie Chart of region");
    assert_eq!(json["slices"][0]["label"], "north");
}
