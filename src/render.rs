//! View models for the two kinds of grid the studio shows: uploaded
//! datasets and solver assignments. Front ends draw these; `Display` gives a
//! plain-text rendering for logs and terminals.

use serde::Serialize;
use std::fmt;

use crate::models::{Assignment, DatasetTable, Metrics, SolveOutcome};

pub const PAGE_SIZES: [usize; 4] = [5, 10, 20, 50];
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const EMPTY_PLACEHOLDER: &str = "No data";
pub const NO_ASSIGNMENTS_MESSAGE: &str = "No assignments found.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub title: String,
    pub field: String,
    pub header_filter: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridView {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub page_size: usize,
    pub page_sizes: [usize; 4],
    pub placeholder: &'static str,
}

/// One page of a [`GridView`]. Pages are numbered from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPage<'a> {
    pub columns: &'a [Column],
    pub rows: &'a [Vec<String>],
    pub page: usize,
    pub page_count: usize,
    pub total_rows: usize,
}

impl GridView {
    /// Columns come from the table header, so any CSV layout renders.
    /// Returns `None` for a table with no records.
    pub fn from_dataset(table: &DatasetTable) -> Option<Self> {
        if table.is_empty() {
            return None;
        }

        let columns = table
            .columns()
            .iter()
            .map(|name| Column {
                title: name.clone(),
                field: name.clone(),
                header_filter: true,
            })
            .collect();
        let rows = table.records().map(|r| r.values().to_vec()).collect();

        Some(Self::with_rows(columns, rows))
    }

    pub fn from_assignments(assignments: &[Assignment]) -> Self {
        let columns = [("Aula", "aula"), ("Sala", "sala")]
            .into_iter()
            .map(|(title, field)| Column {
                title: title.to_string(),
                field: field.to_string(),
                header_filter: false,
            })
            .collect();
        let rows = assignments
            .iter()
            .map(|a| vec![a.aula.clone(), a.sala.clone()])
            .collect();

        Self::with_rows(columns, rows)
    }

    fn with_rows(columns: Vec<Column>, rows: Vec<Vec<String>>) -> Self {
        Self {
            columns,
            rows,
            page_size: DEFAULT_PAGE_SIZE,
            page_sizes: PAGE_SIZES,
            placeholder: EMPTY_PLACEHOLDER,
        }
    }

    pub fn page_count(&self, size: usize) -> usize {
        let size = size.max(1);
        self.rows.len().div_ceil(size).max(1)
    }

    /// Slice out page `page` of `size` rows. Out-of-range pages are clamped
    /// to the last page; a zero size falls back to the default.
    pub fn page(&self, page: usize, size: usize) -> GridPage<'_> {
        let size = if size == 0 { DEFAULT_PAGE_SIZE } else { size };
        let page_count = self.page_count(size);
        let page = page.clamp(1, page_count);
        let start = ((page - 1) * size).min(self.rows.len());
        let end = (start + size).min(self.rows.len());

        GridPage {
            columns: &self.columns,
            rows: &self.rows[start..end],
            page,
            page_count,
            total_rows: self.rows.len(),
        }
    }

    /// Keep rows whose `field` contains `needle`, ignoring case.
    /// Returns `None` if the field is not a column of this grid.
    pub fn filter(&self, field: &str, needle: &str) -> Option<GridView> {
        let index = self.columns.iter().position(|c| c.field == field)?;
        let needle = needle.to_lowercase();
        let rows = self
            .rows
            .iter()
            .filter(|row| row[index].to_lowercase().contains(&needle))
            .cloned()
            .collect();

        Some(GridView {
            rows,
            ..self.clone()
        })
    }
}

impl fmt::Display for GridView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self
            .columns
            .iter()
            .map(|c| c.title.chars().count())
            .collect();
        for row in &self.rows {
            for (w, cell) in widths.iter_mut().zip(row) {
                *w = (*w).max(cell.chars().count());
            }
        }

        let titles: Vec<&str> = self.columns.iter().map(|c| c.title.as_str()).collect();
        write_line(f, &titles, &widths)?;
        let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
        let rule: Vec<&str> = rule.iter().map(String::as_str).collect();
        write_line(f, &rule, &widths)?;

        if self.rows.is_empty() {
            return writeln!(f, "{}", self.placeholder);
        }
        for row in &self.rows {
            let cells: Vec<&str> = row.iter().map(String::as_str).collect();
            write_line(f, &cells, &widths)?;
        }
        Ok(())
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, cells: &[&str], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
        .collect();
    writeln!(f, "{}", padded.join(" | ").trim_end())
}

// ---------- solve results ----------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricLine {
    pub label: &'static str,
    pub field: &'static str,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SolveView {
    /// The solver reported an error, or found nothing to assign.
    Message { text: String },
    Table {
        table: GridView,
        metrics: Vec<MetricLine>,
    },
}

impl SolveView {
    pub fn from_outcome(outcome: &SolveOutcome) -> Self {
        match outcome {
            SolveOutcome::Failed { error } => SolveView::Message {
                text: error.clone(),
            },
            SolveOutcome::Solved(report) if report.assignments.is_empty() => SolveView::Message {
                text: NO_ASSIGNMENTS_MESSAGE.to_string(),
            },
            SolveOutcome::Solved(report) => SolveView::Table {
                table: GridView::from_assignments(&report.assignments),
                metrics: metric_lines(&report.metrics),
            },
        }
    }
}

fn metric_lines(m: &Metrics) -> Vec<MetricLine> {
    vec![
        MetricLine {
            label: "Total score (objective + penalty)",
            field: "score",
            value: m.score,
        },
        MetricLine {
            label: "Objective value",
            field: "objValue",
            value: m.obj_value,
        },
        MetricLine {
            label: "Penalty applied",
            field: "penalty",
            value: m.penalty,
        },
        MetricLine {
            label: "Violated constraints",
            field: "numPenal",
            value: m.num_penal,
        },
    ]
}

/// Whole numbers print without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

impl fmt::Display for SolveView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveView::Message { text } => writeln!(f, "{}", text),
            SolveView::Table { table, metrics } => {
                write!(f, "{}", table)?;
                writeln!(f)?;
                for line in metrics {
                    writeln!(f, "{}: {}", line.label, format_number(line.value))?;
                }
                Ok(())
            }
        }
    }
}
