//! Server-side HTML rendering. Pages are built as strings; every piece of user or file
//! content goes through [`escape_html`].

pub mod pages;
pub mod panels;
pub mod tables;

pub use pages::{dashboard_page, error_page, index_page};
pub use panels::{panel_body, panel_section};
pub use tables::table_html;

pub const APP_TITLE: &str = "AnalytiCore";

/// Escape text for use in element content and quoted attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 0; background: #f7f8fa; color: #222; }
main { max-width: 1400px; margin: 0 auto; padding: 1.5rem; }
h2 { text-align: center; }
.flash { list-style: none; padding: 0; }
.flash li { background: #fff3cd; border: 1px solid #ffe69c; padding: .5rem 1rem; margin-bottom: .5rem; }
.overview { display: grid; grid-template-columns: 2fr 5fr 5fr; gap: 1rem; }
.grid { display: grid; grid-template-columns: 1fr 1fr; gap: 1.5rem; margin-top: 1.5rem; }
section.panel { background: #fff; border: 1px solid #ddd; padding: 1rem; }
.table-wrap { overflow-x: auto; }
table { border-collapse: collapse; font-size: .85rem; }
th, td { text-align: left; padding: .25rem .5rem; border-bottom: 1px solid #eee; min-width: 6rem; }
.notice { color: #555; padding: 1rem 0; }
.error { color: #a00; }
.controls label { margin-right: 1rem; }
"#;

/// Wrap page content in the common document skeleton.
pub fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{}</title>\n<style>{}</style>\n</head>\n<body>\n<main>\n{}\n</main>\n</body>\n</html>\n",
        escape_html(title),
        STYLE,
        body
    )
}

/// Flashed messages as a list, or nothing.
pub fn flash_list(messages: &[String]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let items: String = messages
        .iter()
        .map(|m| format!("<li>{}</li>", escape_html(m)))
        .collect();
    format!("<ul class=\"flash\">{}</ul>", items)
}
