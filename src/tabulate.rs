// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Rendering result tables in multiple formats.
//!
//! The statistics tools emit one table in several serialisations at once, so
//! the table itself is format-agnostic: named columns over rows of JSON
//! values.

use std::str::FromStr;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Space-aligned plain text.
    Text,
    /// A standalone HTML table.
    Html,
    /// A LaTeX tabular environment.
    Latex,
    /// An array of row objects.
    Json,
}

impl TableFormat {
    /// All supported formats, in the order they are written out.
    pub const ALL: [TableFormat; 4] = [
        TableFormat::Text,
        TableFormat::Html,
        TableFormat::Latex,
        TableFormat::Json,
    ];

    pub fn extension(self) -> &'static str {
        match self {
            TableFormat::Text => "txt",
            TableFormat::Html => "html",
            TableFormat::Latex => "tex",
            TableFormat::Json => "json",
        }
    }
}

impl FromStr for TableFormat {
    type Err = TabulateError;

    fn from_str(s: &str) -> Result<TableFormat, TabulateError> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(TableFormat::Text),
            "html" => Ok(TableFormat::Html),
            "latex" | "tex" => Ok(TableFormat::Latex),
            "json" => Ok(TableFormat::Json),
            _ => Err(TabulateError::UnknownFormat(s.to_string())),
        }
    }
}

pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new<S: ToString>(columns: &[S]) -> Table {
        Table {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: vec![],
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<(), TabulateError> {
        if row.len() != self.columns.len() {
            return Err(TabulateError::BadRow {
                expected: self.columns.len(),
                got: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self, format: TableFormat) -> String {
        match format {
            TableFormat::Text => self.render_text(),
            TableFormat::Html => self.render_html(),
            TableFormat::Latex => self.render_latex(),
            TableFormat::Json => self.render_json(),
        }
    }

    fn render_text(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.len()).collect();
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row.iter()) {
                *width = (*width).max(cell.len());
            }
        }

        let mut out = String::new();
        let format_row = |cells: &[String]| -> String {
            let line = cells
                .iter()
                .zip(widths.iter())
                .map(|(cell, width)| format!("{cell:>width$}"))
                .collect::<Vec<_>>()
                .join(" ");
            format!("{}\n", line.trim_end())
        };
        out.push_str(&format_row(&self.columns));
        for row in &rows {
            out.push_str(&format_row(row));
        }
        out
    }

    fn render_html(&self) -> String {
        let mut out = String::from("<table>\n<thead>\n<tr>");
        for column in &self.columns {
            out.push_str(&format!("<th>{}</th>", escape_html(column)));
        }
        out.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in &self.rows {
            out.push_str("<tr>");
            for cell in row {
                out.push_str(&format!("<td>{}</td>", escape_html(&cell_to_string(cell))));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n");
        out
    }

    fn render_latex(&self) -> String {
        let spec = "l".repeat(self.columns.len());
        let mut out = format!("\\begin{{tabular}}{{{spec}}}\n\\hline\n");
        out.push_str(&format!(
            "{} \\\\\n\\hline\n",
            self.columns
                .iter()
                .map(|c| escape_latex(c))
                .collect::<Vec<_>>()
                .join(" & ")
        ));
        for row in &self.rows {
            out.push_str(&format!(
                "{} \\\\\n",
                row.iter()
                    .map(|cell| escape_latex(&cell_to_string(cell)))
                    .collect::<Vec<_>>()
                    .join(" & ")
            ));
        }
        out.push_str("\\hline\n\\end{tabular}\n");
        out
    }

    fn render_json(&self) -> String {
        let objects: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect();
                Value::Object(map)
            })
            .collect();
        // Vecs of Values always serialise.
        let mut out = serde_json::to_string_pretty(&objects).unwrap_or_else(|_| "[]".to_string());
        out.push('\n');
        out
    }
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn escape_latex(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '\\' => out.push_str("\\textbackslash{}"),
            _ => out.push(c),
        }
    }
    out
}

#[derive(Error, Debug)]
pub enum TabulateError {
    #[error("Unrecognised table format '{0}'; expected text, html, latex or json")]
    UnknownFormat(String),

    #[error("Row has {got} cells but the table has {expected} columns")]
    BadRow { expected: usize, got: usize },
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use serde_json::json;

    use super::*;

    fn example_table() -> Table {
        let mut table = Table::new(&["name", "peak", "rms"]);
        table
            .push_row(vec![json!("W51-E_B3"), json!(0.25), json!(1.5e-5)])
            .unwrap();
        table
            .push_row(vec![json!("W51-E_B6"), json!(1.0), json!(3.2e-5)])
            .unwrap();
        table
    }

    #[test]
    fn text_columns_are_aligned() {
        let expected = indoc! {"
                name peak    rms
            W51-E_B3 0.25 1.5e-5
            W51-E_B6  1.0 3.2e-5
        "};
        assert_eq!(example_table().render(TableFormat::Text), expected);
    }

    #[test]
    fn latex_is_a_tabular() {
        let rendered = example_table().render(TableFormat::Latex);
        assert!(rendered.starts_with("\\begin{tabular}{lll}"));
        assert!(rendered.contains("name & peak & rms \\\\"));
        assert!(rendered.contains("W51-E\\_B3 & 0.25 & 1.5e-5 \\\\"));
        assert!(rendered.ends_with("\\end{tabular}\n"));
    }

    #[test]
    fn html_escapes_cells() {
        let mut table = Table::new(&["a"]);
        table.push_row(vec![json!("x < y")]).unwrap();
        let rendered = table.render(TableFormat::Html);
        assert!(rendered.contains("<td>x &lt; y</td>"));
    }

    #[test]
    fn json_rows_are_objects() {
        let rendered = example_table().render(TableFormat::Json);
        let parsed: Vec<serde_json::Map<String, Value>> =
            serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0]["name"], json!("W51-E_B3"));
        assert_eq!(parsed[1]["rms"], json!(3.2e-5));
    }

    #[test]
    fn mismatched_row_is_an_error() {
        let mut table = Table::new(&["a", "b"]);
        assert!(table.push_row(vec![json!(1)]).is_err());
    }

    #[test]
    fn format_parsing() {
        assert_eq!("TEXT".parse::<TableFormat>().unwrap(), TableFormat::Text);
        assert_eq!("tex".parse::<TableFormat>().unwrap(), TableFormat::Latex);
        assert!("csv".parse::<TableFormat>().is_err());
    }
}
