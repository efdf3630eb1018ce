use super::escape_html;
use crate::dashboard::Table;

/// Render a table with an id for styling and scripting.
pub fn table_html(id: &str, table: &Table) -> String {
    let mut out = format!(
        "<div class=\"table-wrap\"><table id=\"{}\"><thead><tr>",
        escape_html(id)
    );
    for header in &table.headers {
        out.push_str(&format!("<th>{}</th>", escape_html(header)));
    }
    out.push_str("</tr></thead><tbody>");
    for row in &table.rows {
        out.push_str("<tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table></div>");
    out
}
