use std::ops::RangeInclusive;

use super::panels::{panel_section, CONTROLS_FORM};
use super::tables::table_html;
use super::{escape_html, flash_list, layout, APP_TITLE};
use crate::dashboard::{DashboardParams, Overview, Panel};
use crate::wrangle::DateIndexOutcome;

/// Home page with the upload form.
pub fn index_page(flashes: &[String]) -> String {
    let body = format!(
        "<h2>{title}</h2>\n{flashes}\n\
         <form method=\"post\" action=\"/upload\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"file\" id=\"file-input\" accept=\".csv\"> \
         <button type=\"submit\">Upload</button></form>",
        title = APP_TITLE,
        flashes = flash_list(flashes)
    );
    layout(APP_TITLE, &body)
}

/// Everything the dashboard page shows, already computed.
pub struct DashboardView<'a> {
    pub file: &'a str,
    pub flashes: &'a [String],
    pub duplicate_text: String,
    pub rows: usize,
    pub row_choices: RangeInclusive<usize>,
    pub date_index: &'a DateIndexOutcome,
    pub overview: Option<&'a Overview>,
    pub columns: &'a [String],
    pub params: &'a DashboardParams,
    /// Pre-rendered body of each panel, in display order
    pub panels: Vec<(Panel, String)>,
}

fn date_index_note(outcome: &DateIndexOutcome) -> String {
    match outcome {
        DateIndexOutcome::NotFound => String::new(),
        DateIndexOutcome::Parsed { column, .. } => format!(
            "<p class=\"notice\" id=\"date-index\">Rows are indexed by date column '{}'.</p>",
            escape_html(column)
        ),
        DateIndexOutcome::Unparsed { column, reason } => format!(
            "<p class=\"notice error\" id=\"date-index\">Column '{}' is used as the index but \
             could not be read as dates: {}</p>",
            escape_html(column),
            escape_html(reason)
        ),
    }
}

fn overview_html(overview: Option<&Overview>) -> String {
    match overview {
        Some(o) => format!(
            "<div class=\"overview\">\
             <div><h5>Null Values</h5>{}</div>\
             <div><h5>Summary Statistics</h5>{}</div>\
             <div><h5>Data Observations</h5>{}</div></div>",
            table_html("null-values-table", &o.nulls),
            table_html("summary-table", &o.summary),
            table_html("observations-table", &o.observations)
        ),
        None => "<div class=\"notice\" style=\"text-align: center\">No data available</div>"
            .to_string(),
    }
}

const SCRIPT: &str = r#"
(function () {
  const form = document.getElementById('controls');
  const file = form.querySelector('input[name=file]').value;
  const rows = document.getElementById('rows');
  rows.addEventListener('change', () => form.submit());
  document.querySelectorAll('section[data-panel] select').forEach((select) => {
    select.addEventListener('change', () => {
      const section = select.closest('section[data-panel]');
      const params = new URLSearchParams();
      params.set('file', file);
      section.querySelectorAll('select').forEach((s) => {
        for (const option of s.selectedOptions) {
          if (option.value) params.append(s.name, option.value);
        }
      });
      fetch('/dash/panel/' + section.dataset.panel + '?' + params.toString())
        .then((response) => response.text())
        .then((html) => { section.querySelector('.panel-body').innerHTML = html; });
      const state = new URLSearchParams(new FormData(form));
      history.replaceState(null, '', '/dash/?' + state.toString());
    });
  });
})();
"#;

pub fn dashboard_page(view: &DashboardView<'_>) -> String {
    let row_options: String = view
        .row_choices
        .clone()
        .map(|n| {
            let mark = if n == view.rows { " selected" } else { "" };
            format!("<option value=\"{n}\"{mark}>{n}</option>")
        })
        .collect();

    let panels: String = view
        .panels
        .iter()
        .map(|(panel, body)| panel_section(*panel, view.columns, view.params, body))
        .collect();

    let body = format!(
        "<h2>Summarized data analysis by {title}</h2>\n{flashes}\n\
         <form id=\"{form}\" method=\"get\" action=\"/dash/\">\
         <input type=\"hidden\" name=\"file\" value=\"{file}\">\
         <noscript><button type=\"submit\">Update</button></noscript></form>\n\
         <div class=\"controls\"><h6 id=\"duplicate-rows-text\">{duplicates}</h6>\
         <label for=\"rows\">Number of Rows to Display:</label>\
         <select name=\"rows\" id=\"rows\" form=\"{form}\">{row_options}</select></div>\n\
         {date_note}\n<div id=\"data-overview\">{overview}</div>\n\
         <div class=\"grid\">{panels}</div>\n<script>{script}</script>",
        title = APP_TITLE,
        flashes = flash_list(view.flashes),
        form = CONTROLS_FORM,
        file = escape_html(view.file),
        duplicates = escape_html(&view.duplicate_text),
        row_options = row_options,
        date_note = date_index_note(view.date_index),
        overview = overview_html(view.overview),
        panels = panels,
        script = SCRIPT
    );
    layout(&format!("{} dashboard", APP_TITLE), &body)
}

/// Standalone page for a request that could not be served.
pub fn error_page(heading: &str, message: &str) -> String {
    let body = format!(
        "<h2>{}</h2>\n<p class=\"error\">{}</p>\n<p><a href=\"/\">Upload another file</a></p>",
        escape_html(heading),
        escape_html(message)
    );
    layout(heading, &body)
}
