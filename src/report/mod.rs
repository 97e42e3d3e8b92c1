//! Tabular reports over a snapshot.
//!
//! Every sheet is described once as a [`SheetSpec`]: an ordered list of
//! columns, each a header plus a derivation function. The full export and
//! the on-screen preview both build their rows from the same specs.

pub mod derive;
mod preview;
mod render;
mod sheets;

pub use preview::ExportPreview;
pub use render::{render_csv, render_xlsx};
pub use sheets::{category_stats, CategoryStats};

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::config::ReportConfig;
use crate::store::{Component, Snapshot};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build workbook: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Unknown sheet: {0}")]
    UnknownSheet(String),
}

/// A single spreadsheet cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(i64),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Text cell, or empty when `value` is `None`
    pub fn opt_text<S: AsRef<str>>(value: Option<S>) -> Self {
        match value {
            Some(v) => Self::Text(v.as_ref().to_string()),
            None => Self::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Self {
        Self::Number(value as i64)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Self {
        Self::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Self::Number(value as i64)
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Self::Empty, Self::Number)
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => write!(f, "{}", s),
            Self::Number(n) => write!(f, "{}", n),
        }
    }
}

/// A named grid of cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Append another table below this one as a titled section
    pub fn append_section(&mut self, title: &str, section: Table) {
        self.rows.push(Vec::new());
        self.rows.push(vec![Cell::text(title)]);
        self.rows
            .push(section.headers.into_iter().map(Cell::Text).collect());
        self.rows.extend(section.rows);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Lookups shared by every column derivation
pub struct ReportContext {
    pub now: DateTime<Utc>,
    components: HashMap<String, Component>,
    requests_by_student: HashMap<String, usize>,
}

impl ReportContext {
    pub fn new(snapshot: &Snapshot, now: DateTime<Utc>) -> Self {
        let components = snapshot
            .components
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();

        let mut requests_by_student = HashMap::new();
        for request in &snapshot.requests {
            *requests_by_student
                .entry(request.student_id.clone())
                .or_insert(0) += 1;
        }

        Self {
            now,
            components,
            requests_by_student,
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.get(name)
    }

    /// Category of the named component, `Unknown` once it has been removed
    pub fn category_of(&self, component_name: &str) -> &str {
        self.component(component_name)
            .map(|c| c.category.as_str())
            .unwrap_or("Unknown")
    }

    pub fn request_count(&self, student_id: &str) -> usize {
        self.requests_by_student.get(student_id).copied().unwrap_or(0)
    }
}

/// Derives one cell of a row
pub type Derive<R> = fn(&R, &ReportContext) -> Cell;

pub struct Column<R> {
    pub header: &'static str,
    pub derive: Derive<R>,
}

/// Sheet layout for records of type `R`
pub struct SheetSpec<R> {
    pub name: &'static str,
    pub columns: Vec<Column<R>>,
}

impl<R> SheetSpec<R> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, header: &'static str, derive: Derive<R>) -> Self {
        self.columns.push(Column { header, derive });
        self
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.header.to_string()).collect()
    }

    pub fn row(&self, record: &R, ctx: &ReportContext) -> Vec<Cell> {
        self.columns.iter().map(|c| (c.derive)(record, ctx)).collect()
    }

    pub fn build<'a, I>(&self, records: I, ctx: &ReportContext) -> Table
    where
        R: 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut table = Table::new(self.name, self.headers());
        table.rows = records.into_iter().map(|r| self.row(r, ctx)).collect();
        table
    }
}

/// Output container for an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(Self::Xlsx),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown export format: {} (expected xlsx or csv)", s)),
        }
    }
}

/// `<org>-Report-<YYYY-MM-DD>.<ext>`
pub fn report_file_name(org_name: &str, date: NaiveDate, format: ExportFormat) -> String {
    format!(
        "{}-Report-{}.{}",
        org_name,
        date.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Every sheet of a full export
#[derive(Debug, Clone)]
pub struct Report {
    pub generated_at: DateTime<Utc>,
    pub sheets: Vec<Table>,
}

impl Report {
    pub fn sheet(&self, name: &str) -> Option<&Table> {
        self.sheets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }
}

pub struct ReportGenerator {
    org_name: String,
    title: String,
    preview_requests: usize,
    preview_users: usize,
    preview_components: usize,
}

impl ReportGenerator {
    pub fn new(config: &ReportConfig) -> Self {
        Self {
            org_name: config.org_name.clone(),
            title: config.title.clone(),
            preview_requests: config.preview_requests,
            preview_users: config.preview_users,
            preview_components: config.preview_components,
        }
    }

    /// Build every sheet
    pub fn generate(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Report {
        let ctx = ReportContext::new(snapshot, now);
        let sheets = vec![
            sheets::summary_table(&self.title, snapshot, &ctx),
            sheets::requests_sheet().build(&snapshot.requests, &ctx),
            sheets::components_sheet().build(&snapshot.components, &ctx),
            sheets::users_sheet().build(&snapshot.users, &ctx),
            sheets::sessions_sheet().build(&snapshot.login_sessions, &ctx),
        ];
        Report {
            generated_at: now,
            sheets,
        }
    }

    /// Row-limited view of the same tables
    pub fn preview(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> ExportPreview {
        ExportPreview::build(
            snapshot,
            now,
            self.preview_requests,
            self.preview_users,
            self.preview_components,
        )
    }

    /// Write `report` into `dir`, returning the artifact path.
    ///
    /// `sheet` restricts a CSV export to one sheet; XLSX always carries
    /// the whole workbook.
    pub fn export(
        &self,
        report: &Report,
        format: ExportFormat,
        dir: &Path,
        sheet: Option<&str>,
    ) -> Result<PathBuf, ReportError> {
        let tables: Vec<&Table> = match sheet {
            Some(name) => vec![report
                .sheet(name)
                .ok_or_else(|| ReportError::UnknownSheet(name.to_string()))?],
            None => report.sheets.iter().collect(),
        };

        std::fs::create_dir_all(dir)?;
        let path = dir.join(report_file_name(
            &self.org_name,
            report.generated_at.date_naive(),
            format,
        ));

        match format {
            ExportFormat::Csv => std::fs::write(&path, render_csv(&tables))?,
            ExportFormat::Xlsx => std::fs::write(&path, render_xlsx(&report.sheets)?)?,
        }

        info!(
            path = %path.display(),
            format = %format,
            sheets = tables.len(),
            "Report exported"
        );
        Ok(path)
    }
}
