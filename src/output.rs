// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Rendering of query results

use anyhow::Result;
use owo_colors::OwoColorize;
use serde_json::Value;

use crate::sql::QueryResult;

/// How results are printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// JSON array of row objects
    Json,
}

/// Prints results and messages in the selected format
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    format: OutputFormat,
    color: bool,
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Printer {
    /// Printer for `format`; `color` enables bold headers
    #[must_use]
    pub fn new(format: OutputFormat, color: bool) -> Self {
        Self { format, color }
    }

    /// Selected format
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Render a result as text
    pub fn render(&self, result: &QueryResult) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&result.to_records())?),
            OutputFormat::Table => Ok(self.render_table(result)),
        }
    }

    /// Print a result to stdout
    pub fn print(&self, result: &QueryResult) -> Result<()> {
        println!("{}", self.render(result)?);
        Ok(())
    }

    /// Print a status message to stdout
    pub fn message(&self, text: &str) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "message": text }))?);
            }
            OutputFormat::Table => println!("{text}"),
        }
        Ok(())
    }

    fn render_table(&self, result: &QueryResult) -> String {
        if result.columns.is_empty() {
            return String::new();
        }

        let rows: Vec<Vec<String>> = result
            .rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();

        let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let pad = |text: &str, width: usize| {
            format!("{text}{}", " ".repeat(width.saturating_sub(text.chars().count())))
        };

        let header = result
            .columns
            .iter()
            .zip(&widths)
            .map(|(name, width)| {
                let cell = pad(name, *width);
                if self.color {
                    cell.bold().to_string()
                } else {
                    cell
                }
            })
            .collect::<Vec<_>>()
            .join(" | ");
        let separator = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");

        let mut lines = vec![header, separator];
        for row in &rows {
            let line = row
                .iter()
                .zip(&widths)
                .map(|(cell, width)| pad(cell, *width))
                .collect::<Vec<_>>()
                .join(" | ");
            lines.push(line.trim_end().to_string());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> QueryResult {
        QueryResult {
            columns: vec!["name".into(), "status".into()],
            rows: vec![
                vec!["echo".into(), "READY".into()],
                vec!["long_service".into(), Value::Null],
            ],
        }
    }

    #[test]
    fn test_table_alignment() {
        let table = Printer::new(OutputFormat::Table, false).render(&result()).unwrap();
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines[0], "name         | status");
        assert_eq!(lines[1], "-------------+-------");
        assert_eq!(lines[2], "echo         | READY");
        assert_eq!(lines[3], "long_service |");
    }

    #[test]
    fn test_json_rows() {
        let json = Printer::new(OutputFormat::Json, false).render(&result()).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed[0]["name"], "echo");
        assert_eq!(parsed[1]["status"], Value::Null);
    }
}
