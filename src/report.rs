//! Human-facing rendering of prediction results.

use std::io::{self, Write};

use crate::batch::LabeledTable;

/// Render the first `limit` rows of `table` as an aligned text table,
/// followed by a one-line summary.
pub fn render_preview(table: &LabeledTable, limit: usize) -> String {
    let shown = &table.rows()[..table.rows().len().min(limit)];

    let mut widths: Vec<usize> = table.headers().iter().map(|h| h.chars().count()).collect();
    for row in shown {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = String::new();
    out.push_str(&line(table.headers()));
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    out.push('\n');
    for row in shown {
        out.push_str(&line(row.as_slice()));
        out.push('\n');
    }
    if table.rows().len() > shown.len() {
        out.push_str(&format!("... {} more rows\n", table.rows().len() - shown.len()));
    }
    out.push_str(&format!(
        "{} clients, {} predicted to subscribe\n",
        table.rows().len(),
        table.subscribers()
    ));
    out
}

/// Print the results preview to stderr, keeping stdout free for CSV output.
pub fn print_preview(table: &LabeledTable, limit: usize) -> io::Result<()> {
    let mut stderr = io::stderr().lock();
    writeln!(stderr, "\nPrediction Results")?;
    write!(stderr, "{}", render_preview(table, limit))
}
