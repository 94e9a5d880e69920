//! CLI output utilities: tables, TTY detection, JSON mode.
//!
//! Human output adapts to the terminal (bold headers and rules on a TTY,
//! plain columns when piped). `--json` switches to machine-readable JSON.

#![forbid(unsafe_code)]

use serde::Serialize;
use std::io::IsTerminal;

use dash_search_core::ReplayCommit;

/// Detect whether stdout is a TTY.
#[must_use]
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

// ── Simple table renderer ────────────────────────────────────────────────

/// A small auto-sizing table.
pub struct CliTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CliTable {
    #[must_use]
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|h| (*h).to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(String::len).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }
        widths
    }

    pub fn render(&self) {
        print!("{}", self.render_to_string(is_tty()));
    }

    /// Render with TTY decoration chosen by the caller.
    #[must_use]
    pub fn render_to_string(&self, tty: bool) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        let widths = self.column_widths();
        let mut out = String::new();

        let header_line = Self::format_row(&self.headers, &widths);
        if tty {
            out.push_str(&format!("\x1b[1m{header_line}\x1b[0m\n"));
            let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
            out.push_str(&sep.join("──"));
            out.push('\n');
        } else {
            out.push_str(&header_line);
            out.push('\n');
        }

        for row in &self.rows {
            out.push_str(&Self::format_row(row, &widths));
            out.push('\n');
        }
        out
    }

    fn format_row(cells: &[String], widths: &[usize]) -> String {
        let last = widths.len().saturating_sub(1);
        widths
            .iter()
            .enumerate()
            .map(|(i, width)| {
                let cell = cells.get(i).map_or("", String::as_str);
                if i == last {
                    cell.to_string()
                } else {
                    format!("{cell:<width$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    }
}

// ── JSON or human output ─────────────────────────────────────────────────

/// Print `data` as pretty JSON, or run `render` for human output.
pub fn json_or_table<T: Serialize, F>(json_mode: bool, data: &T, render: F) -> serde_json::Result<()>
where
    F: FnOnce(),
{
    if json_mode {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else {
        render();
    }
    Ok(())
}

/// One replay commit as a text line: `<ms>\t<query>`.
#[must_use]
pub fn commit_line(commit: &ReplayCommit) -> String {
    format!("{}\t{}", commit.at_ms, commit.query.query)
}

// ── Status line helpers ──────────────────────────────────────────────────

pub fn success(msg: &str) {
    if is_tty() {
        println!("\x1b[32m✓\x1b[0m {msg}");
    } else {
        println!("{msg}");
    }
}

pub fn warn(msg: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("\x1b[33m!\x1b[0m {msg}");
    } else {
        eprintln!("warning: {msg}");
    }
}

pub fn error(msg: &str) {
    if std::io::stderr().is_terminal() {
        eprintln!("\x1b[31merror:\x1b[0m {msg}");
    } else {
        eprintln!("error: {msg}");
    }
}

/// Print a key-value pair with aligned values.
pub fn kv(key: &str, value: &str) {
    println!("  {key:<20} {value}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dash_search_core::SearchQuery;

    #[test]
    fn column_widths_expand_for_data() {
        let mut table = CliTable::new(&["KEY", "VALUE"]);
        table.add_row(vec!["include-panels".into(), "true".into()]);
        assert_eq!(table.column_widths(), vec![14, 5]);
    }

    #[test]
    fn last_column_is_not_padded() {
        let line = CliTable::format_row(&["left".into(), "right".into()], &[10, 10]);
        assert_eq!(line, "left        right");
    }

    #[test]
    fn missing_cells_render_empty() {
        let line = CliTable::format_row(&["x".into()], &[3, 3, 3]);
        assert_eq!(line.trim_end(), "x");
        assert_eq!(line.len(), 3 + 2 + 3 + 2);
    }

    #[test]
    fn plain_render_has_header_and_rows() {
        let mut table = CliTable::new(&["KEY", "EFFECTIVE", "STORED"]);
        table.add_row(vec!["show-previews".into(), "false".into(), "unset".into()]);
        let text = table.render_to_string(false);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("KEY"));
        assert!(lines[1].ends_with("unset"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn tty_render_adds_rule() {
        let mut table = CliTable::new(&["A"]);
        table.add_row(vec!["1".into()]);
        let text = table.render_to_string(true);
        assert!(text.contains("\x1b[1m"));
        assert!(text.contains('─'));
    }

    #[test]
    fn empty_table_renders_nothing() {
        assert!(CliTable::new(&["A"]).render_to_string(true).is_empty());
    }

    #[test]
    fn commit_line_is_tab_separated() {
        let commit = ReplayCommit {
            at_ms: 300,
            query: SearchQuery::text("gra"),
            include_panels: true,
        };
        assert_eq!(commit_line(&commit), "300\tgra");
    }

    #[test]
    fn json_or_table_human_mode_calls_render() {
        let mut called = false;
        json_or_table(false, &["a"], || called = true).unwrap();
        assert!(called);
    }
}
