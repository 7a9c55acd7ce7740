//! Terminal output helpers.
//!
//! - `Table` - box-drawn table sized to its content and the terminal
//! - `format_age` - compact "3h 12m" style durations

use crate::build::BuildEntry;
use colored::*;
use std::time::Duration;

/// Narrowest a column is shrunk to when the terminal is too small.
const MIN_COLUMN: usize = 8;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Rows with the wrong number of cells are ignored.
    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn print(&self) {
        let (_, term_width) = console::Term::stdout().size();
        for line in self.render(term_width as usize) {
            println!("{}", line);
        }
    }

    fn render(&self, max_width: usize) -> Vec<String> {
        if self.headers.is_empty() {
            return Vec::new();
        }
        let widths = self.column_widths(max_width);

        let border = |left: &str, mid: &str, right: &str| {
            let inner: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}", left, inner.join(mid), right)
        };
        let row_line = |cells: &[String], bold: bool| {
            let mut line = String::from("  │");
            for (cell, &width) in cells.iter().zip(&widths) {
                let cell = console::truncate_str(&flatten(cell), width, "...").to_string();
                let padding = width.saturating_sub(console::measure_text_width(&cell));
                let cell = if bold { cell.bold().to_string() } else { cell };
                line.push_str(&format!(" {}{} │", cell, " ".repeat(padding)));
            }
            line
        };

        let mut lines = vec![border("┌", "┬", "┐"), row_line(&self.headers, true)];
        lines.push(border("├", "┼", "┤"));
        for row in &self.rows {
            lines.push(row_line(row, false));
        }
        lines.push(border("└", "┴", "┘"));
        lines
    }

    /// Content widths, shrinking the widest column until the table fits.
    fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|h| console::measure_text_width(h))
            .collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(console::measure_text_width(&flatten(cell)));
            }
        }

        let overhead = 3 + 3 * widths.len();
        let available = max_width.saturating_sub(overhead);
        while widths.iter().sum::<usize>() > available {
            let Some(widest) = widths.iter_mut().filter(|w| **w > MIN_COLUMN).max() else {
                break;
            };
            *widest -= 1;
        }
        widths
    }
}

fn flatten(s: &str) -> String {
    s.replace(['\n', '\r', '\t'], " ")
}

/// `45s`, `12m 3s`, `5h 20m`, `3d 4h`.
pub fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        0..60 => format!("{}s", secs),
        60..3600 => format!("{}m {}s", secs / 60, secs % 60),
        3600..86_400 => format!("{}h {}m", secs / 3600, (secs % 3600) / 60),
        _ => format!("{}d {}h", secs / 86_400, (secs % 86_400) / 3600),
    }
}

/// Print the builds of a project, marking the one `www` points at.
pub fn print_builds(builds: &[BuildEntry]) {
    if builds.is_empty() {
        println!("{} No builds found", "ℹ".blue());
        return;
    }
    let mut table = Table::new(&["Build", "Age", "Active"]);
    for build in builds {
        let active = if build.active {
            "✓".green().to_string()
        } else {
            String::new()
        };
        table.add_row(vec![build.name.clone(), format_age(build.age), active]);
    }
    table.print();
}
