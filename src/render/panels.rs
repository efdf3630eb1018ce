use tracing::debug;

use super::escape_html;
use crate::chart_render::render_svg;
use crate::charts::{ChartBody, ChartSpec};
use crate::dashboard::{DashboardParams, Panel, PanelOutcome};

/// Id of the form every dashboard control belongs to.
pub const CONTROLS_FORM: &str = "controls";

fn chart_caption(spec: &ChartSpec) -> String {
    match &spec.body {
        ChartBody::Scatter {
            correlation: Some(r),
            ..
        } => format!("{} (r = {:.3})", spec.title, r),
        _ => spec.title.clone(),
    }
}

/// Inner HTML of a panel: the chart as inline SVG, or a message.
pub fn panel_body(outcome: &PanelOutcome, width: u32, height: u32) -> String {
    match outcome {
        PanelOutcome::Prompt { message } => {
            format!("<div class=\"notice\">{}</div>", escape_html(message))
        }
        PanelOutcome::Failed { message } => {
            format!("<div class=\"notice error\">{}</div>", escape_html(message))
        }
        PanelOutcome::Chart { spec } => {
            let caption = escape_html(&chart_caption(spec));
            match render_svg(spec, width, height) {
                Ok(svg) => format!(
                    "<figure class=\"chart\">{}<figcaption>{}</figcaption></figure>",
                    svg, caption
                ),
                Err(e) => {
                    debug!(title = %spec.title, error = %e, "chart not drawn");
                    format!(
                        "<figure class=\"chart\"><div class=\"notice\">{}</div><figcaption>{}</figcaption></figure>",
                        escape_html(&e.to_string()),
                        caption
                    )
                }
            }
        }
    }
}

fn select_html(
    panel: Panel,
    key: &str,
    multiple: bool,
    columns: &[String],
    params: &DashboardParams,
) -> String {
    let selected: Vec<&str> = if multiple {
        params.bar.iter().map(String::as_str).collect()
    } else {
        params.value(key).into_iter().collect()
    };

    let mut out = format!(
        "<select name=\"{key}\" id=\"{slug}-{key}\" form=\"{form}\"{multiple}>",
        key = key,
        slug = panel.slug(),
        form = CONTROLS_FORM,
        multiple = if multiple { " multiple" } else { "" }
    );
    if !multiple {
        out.push_str("<option value=\"\">Select...</option>");
    }
    for column in columns {
        let mark = if selected.contains(&column.as_str()) {
            " selected"
        } else {
            ""
        };
        out.push_str(&format!(
            "<option value=\"{v}\"{mark}>{v}</option>",
            v = escape_html(column),
            mark = mark
        ));
    }
    out.push_str("</select>");
    out
}

/// A full panel: heading, its controls, and the body container the page script refreshes.
pub fn panel_section(
    panel: Panel,
    columns: &[String],
    params: &DashboardParams,
    body: &str,
) -> String {
    let mut controls = String::new();
    for control in panel.controls() {
        controls.push_str(&format!(
            "<label for=\"{slug}-{key}\">{label}</label>{select}",
            slug = panel.slug(),
            key = control.key,
            label = control.label,
            select = select_html(panel, control.key, control.multiple, columns, params)
        ));
    }
    format!(
        "<section class=\"panel\" data-panel=\"{slug}\"><h2>{heading}</h2>\
         <div class=\"controls\">{controls}</div>\
         <div class=\"panel-body\" id=\"panel-{slug}\">{body}</div></section>",
        slug = panel.slug(),
        heading = panel.heading(),
        controls = controls,
        body = body
    )
}
