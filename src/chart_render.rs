//! Chart rendering to SVG with the plotters SVG backend.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use plotters::prelude::*;

use crate::charts::{AxisKind, ChartBody, ChartSeries, ChartSpec};

const COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(23, 190, 207),
];

fn color(idx: usize) -> RGBColor {
    COLORS[idx % COLORS.len()]
}

/// Generate "nice" tick values in [min, max] with roughly max_ticks steps.
fn nice_ticks(min: f64, max: f64, max_ticks: usize) -> Vec<f64> {
    let range = if max > min { max - min } else { 1.0 };
    if range <= 0.0 || max_ticks == 0 {
        return vec![min];
    }
    let raw_step = range / (max_ticks as f64).max(1.0);
    let mag = 10.0_f64.powf(raw_step.log10().floor());
    let norm = if mag > 0.0 { raw_step / mag } else { raw_step };
    let step = if norm <= 1.0 {
        1.0 * mag
    } else if norm <= 2.0 {
        2.0 * mag
    } else if norm <= 5.0 {
        5.0 * mag
    } else {
        10.0 * mag
    };
    let step = step.max(f64::EPSILON);
    let start = (min / step).floor() * step;
    let mut ticks = Vec::new();
    let mut v = start;
    while v <= max + step * 0.001 {
        ticks.push(v);
        v += step;
        if ticks.len() > max_ticks + 2 {
            break;
        }
    }
    if ticks.is_empty() {
        ticks.push(min);
    }
    ticks
}

/// Axis range snapped outward to nice tick values; degenerate ranges are widened.
fn axis_bounds(min: f64, max: f64) -> (f64, f64) {
    let (min, max) = if max > min {
        (min, max)
    } else {
        (min - 1.0, max + 1.0)
    };
    let ticks = nice_ticks(min, max, 8);
    let step = if ticks.len() > 1 {
        ticks[1] - ticks[0]
    } else {
        0.0
    };
    let lo = ticks.first().copied().unwrap_or(min).min(min);
    let mut hi = ticks.last().copied().unwrap_or(max);
    if hi < max {
        hi += step;
    }
    (lo, hi.max(max))
}

/// Format a tick value for display (compact: integer when whole, else 1–2 decimals).
fn format_tick(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let abs = v.abs();
    if abs >= 1e6 || (abs <= 0.01 && abs > 0.0) {
        format!("{:e}", v)
    } else if (v - v.round()).abs() < 1e-10 {
        format!("{:.0}", v)
    } else if abs >= 1.0 {
        format!("{:.1}", v)
    } else {
        format!("{:.2}", v)
    }
}

/// Label for an x value given the axis kind.
fn format_x(kind: AxisKind, labels: &[String], v: f64) -> String {
    match kind {
        AxisKind::Numeric => format_tick(v),
        AxisKind::Datetime => chrono::DateTime::from_timestamp_millis(v as i64)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| format_tick(v)),
        AxisKind::Category => {
            let rounded = v.round();
            if (v - rounded).abs() > 1e-6 || rounded < 0.0 {
                return String::new();
            }
            labels.get(rounded as usize).cloned().unwrap_or_default()
        }
    }
}

fn category_label(labels: &[String], v: f64) -> String {
    format_x(AxisKind::Category, labels, v)
}

fn point_bounds<'a>(points: impl Iterator<Item = &'a (f64, f64)>) -> Option<(f64, f64, f64, f64)> {
    let mut bounds: Option<(f64, f64, f64, f64)> = None;
    for &(x, y) in points {
        bounds = Some(match bounds {
            None => (x, x, y, y),
            Some((x0, x1, y0, y1)) => (x0.min(x), x1.max(x), y0.min(y), y1.max(y)),
        });
    }
    bounds
}

/// Render a chart to an SVG document of the given size.
pub fn render_svg(spec: &ChartSpec, width: u32, height: u32) -> Result<String> {
    if spec.is_empty() {
        return Err(eyre!("No data to plot"));
    }
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;
        draw_body(&root, spec)?;
        root.present()?;
    }
    Ok(svg)
}

fn draw_body<DB: DrawingBackend>(root: &DrawingArea<DB, plotters::coord::Shift>, spec: &ChartSpec) -> Result<()>
where
    DB::ErrorType: 'static,
{
    match &spec.body {
        ChartBody::Histogram { bins } => {
            let x_min = bins.first().map(|b| b.start).unwrap_or(0.0);
            let x_max = bins.last().map(|b| b.end).unwrap_or(1.0);
            let y_max = bins.iter().map(|b| b.count).max().unwrap_or(1) as f64;
            let mut chart = ChartBuilder::on(root)
                .caption(spec.title.as_str(), ("sans-serif", 20))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(x_min..x_max, 0.0..y_max * 1.05)?;
            chart
                .configure_mesh()
                .x_desc(spec.x_label.as_str())
                .y_desc(spec.y_label.as_str())
                .x_label_formatter(&|v| format_tick(*v))
                .y_label_formatter(&|v| format_tick(*v))
                .draw()?;
            chart.draw_series(bins.iter().map(|b| {
                Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], color(0).filled())
            }))?;
            chart.draw_series(bins.iter().map(|b| {
                Rectangle::new([(b.start, 0.0), (b.end, b.count as f64)], WHITE.stroke_width(1))
            }))?;
        }
        ChartBody::CategoryCounts { categories } => {
            let labels: Vec<String> = categories.iter().map(|c| c.label.clone()).collect();
            let series = ChartSeries {
                name: spec.y_label.clone(),
                points: categories
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (i as f64, c.count as f64))
                    .collect(),
            };
            draw_bars(root, spec, AxisKind::Category, &labels, std::slice::from_ref(&series))?;
        }
        ChartBody::Bar {
            x_axis,
            x_labels,
            series,
        } => draw_bars(root, spec, *x_axis, x_labels, series)?,
        ChartBody::Line {
            x_axis,
            x_labels,
            series,
        } => {
            let (x0, x1, y0, y1) = point_bounds(series.iter().flat_map(|s| s.points.iter()))
                .ok_or_else(|| eyre!("No data to plot"))?;
            let (x0, x1) = axis_bounds(x0, x1);
            let (y0, y1) = axis_bounds(y0, y1);
            let mut chart = ChartBuilder::on(root)
                .caption(spec.title.as_str(), ("sans-serif", 20))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(x0..x1, y0..y1)?;
            chart
                .configure_mesh()
                .x_desc(spec.x_label.as_str())
                .y_desc(spec.y_label.as_str())
                .x_label_formatter(&|v| format_x(*x_axis, x_labels, *v))
                .y_label_formatter(&|v| format_tick(*v))
                .draw()?;
            for (idx, s) in series.iter().enumerate() {
                let c = color(idx);
                chart
                    .draw_series(LineSeries::new(s.points.iter().copied(), c.stroke_width(2)))?
                    .label(s.name.as_str())
                    .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c));
            }
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        ChartBody::Scatter {
            points,
            correlation,
        } => {
            let (x0, x1, y0, y1) =
                point_bounds(points.iter()).ok_or_else(|| eyre!("No data to plot"))?;
            let (x0, x1) = axis_bounds(x0, x1);
            let (y0, y1) = axis_bounds(y0, y1);
            let caption = match correlation {
                Some(r) => format!("{} (r = {:.3})", spec.title, r),
                None => spec.title.clone(),
            };
            let mut chart = ChartBuilder::on(root)
                .caption(caption.as_str(), ("sans-serif", 20))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(x0..x1, y0..y1)?;
            chart
                .configure_mesh()
                .x_desc(spec.x_label.as_str())
                .y_desc(spec.y_label.as_str())
                .x_label_formatter(&|v| format_tick(*v))
                .y_label_formatter(&|v| format_tick(*v))
                .draw()?;
            let c = color(0);
            chart.draw_series(PointSeries::of_element(
                points.iter().copied(),
                3,
                c,
                &|p, s, _| EmptyElement::at(p) + Circle::new((0, 0), s, c.mix(0.7).filled()),
            ))?;
        }
        ChartBody::BoxPlot { boxes } => {
            let labels: Vec<String> = boxes.iter().map(|b| b.label.clone()).collect();
            let lo = boxes
                .iter()
                .flat_map(|b| b.stats.outliers.iter().copied().chain([b.stats.lower_whisker]))
                .fold(f64::INFINITY, f64::min);
            let hi = boxes
                .iter()
                .flat_map(|b| b.stats.outliers.iter().copied().chain([b.stats.upper_whisker]))
                .fold(f64::NEG_INFINITY, f64::max);
            let (y0, y1) = axis_bounds(lo, hi);
            let mut chart = ChartBuilder::on(root)
                .caption(spec.title.as_str(), ("sans-serif", 20))
                .margin(20)
                .x_label_area_size(40)
                .y_label_area_size(50)
                .build_cartesian_2d(-0.5..(boxes.len() as f64 - 0.5), y0..y1)?;
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_labels(boxes.len().min(20))
                .x_desc(spec.x_label.as_str())
                .y_desc(spec.y_label.as_str())
                .x_label_formatter(&|v| category_label(&labels, *v))
                .y_label_formatter(&|v| format_tick(*v))
                .draw()?;
            for (i, b) in boxes.iter().enumerate() {
                let x = i as f64;
                let c = color(i);
                let s = &b.stats;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.3, s.q1), (x + 0.3, s.q3)],
                    c.mix(0.3).filled(),
                )))?;
                chart.draw_series(std::iter::once(Rectangle::new(
                    [(x - 0.3, s.q1), (x + 0.3, s.q3)],
                    c.stroke_width(2),
                )))?;
                chart.draw_series([
                    PathElement::new(vec![(x - 0.3, s.median), (x + 0.3, s.median)], c.stroke_width(2)),
                    PathElement::new(vec![(x, s.q3), (x, s.upper_whisker)], c.stroke_width(1)),
                    PathElement::new(vec![(x, s.q1), (x, s.lower_whisker)], c.stroke_width(1)),
                    PathElement::new(
                        vec![(x - 0.15, s.upper_whisker), (x + 0.15, s.upper_whisker)],
                        c.stroke_width(1),
                    ),
                    PathElement::new(
                        vec![(x - 0.15, s.lower_whisker), (x + 0.15, s.lower_whisker)],
                        c.stroke_width(1),
                    ),
                ])?;
                chart.draw_series(
                    s.outliers
                        .iter()
                        .map(|&o| Circle::new((x, o), 3, c.filled())),
                )?;
            }
        }
        ChartBody::Pie { slices } => {
            let total: usize = slices.iter().map(|s| s.count).sum();
            let mut chart = ChartBuilder::on(root)
                .caption(spec.title.as_str(), ("sans-serif", 20))
                .margin(20)
                .build_cartesian_2d(-1.6..1.6, -1.2..1.2)?;
            let mut start = std::f64::consts::FRAC_PI_2;
            for (idx, slice) in slices.iter().enumerate() {
                let sweep = std::f64::consts::TAU * slice.count as f64 / total.max(1) as f64;
                let steps = ((sweep / 0.05).ceil() as usize).max(2);
                let mut polygon = vec![(0.0, 0.0)];
                // Clockwise from twelve o'clock
                polygon.extend((0..=steps).map(|k| {
                    let a = start - sweep * k as f64 / steps as f64;
                    (a.cos(), a.sin())
                }));
                let c = color(idx);
                chart
                    .draw_series(std::iter::once(Polygon::new(polygon, c.filled())))?
                    .label(format!(
                        "{} ({:.1}%)",
                        slice.label,
                        100.0 * slice.count as f64 / total.max(1) as f64
                    ))
                    .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], c.filled()));
                start -= sweep;
            }
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
    }
    Ok(())
}

/// Grouped bars: each x position holds one bar per series.
fn draw_bars<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    spec: &ChartSpec,
    x_axis: AxisKind,
    x_labels: &[String],
    series: &[ChartSeries],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let (x0, x1, y0, y1) = point_bounds(series.iter().flat_map(|s| s.points.iter()))
        .ok_or_else(|| eyre!("No data to plot"))?;

    // Bar width from the closest pair of x positions
    let mut xs: Vec<f64> = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.0))
        .collect();
    xs.sort_by(|a, b| a.total_cmp(b));
    xs.dedup();
    let spacing = xs
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold(f64::INFINITY, f64::min);
    let spacing = if spacing.is_finite() && spacing > 0.0 {
        spacing
    } else {
        1.0
    };
    let group_width = spacing * 0.8;
    let bar_width = group_width / series.len().max(1) as f64;

    let (y0, y1) = axis_bounds(y0.min(0.0), y1.max(0.0));
    let x_formatter = |v: &f64| format_x(x_axis, x_labels, *v);
    let y_formatter = |v: &f64| format_tick(*v);
    let mut chart = ChartBuilder::on(root)
        .caption(spec.title.as_str(), ("sans-serif", 20))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((x0 - spacing / 2.0)..(x1 + spacing / 2.0), y0..y1)?;
    let mut mesh = chart.configure_mesh();
    mesh.x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter);
    if x_axis == AxisKind::Category {
        mesh.disable_x_mesh().x_labels(x_labels.len().clamp(1, 20));
    }
    mesh.draw()?;

    for (idx, s) in series.iter().enumerate() {
        let c = color(idx);
        let offset = -group_width / 2.0 + bar_width * idx as f64;
        chart
            .draw_series(s.points.iter().map(|&(x, y)| {
                Rectangle::new([(x + offset, 0.0), (x + offset + bar_width, y)], c.filled())
            }))?
            .label(s.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], c.filled()));
    }
    if series.len() > 1 {
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }
    Ok(())
}
