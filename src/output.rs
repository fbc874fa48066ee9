//! Console output for audit results.
//!
//! Results go to stdout, one entry per line or as pretty JSON. Everything
//! else (summaries, progress, errors) goes to stderr so stdout can be piped
//! straight into a filter file.

use crate::ident::{NpmPackageIdentifier, NpmPackageOrScope, PyPiPackageIdentifier};
use crate::registry::{NpmPackageInfo, NpmSearchHit};
use crate::types::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Report {
    Npm(Vec<NpmPackageIdentifier>),
    NpmOrScope(Vec<NpmPackageOrScope>),
    PyPi(Vec<PyPiPackageIdentifier>),
    Info(NpmPackageInfo),
    Search(Vec<NpmSearchHit>),
    Notice(String),
}

impl Report {
    /// Plain-text rendering, one line per entry.
    pub fn lines(&self) -> Vec<String> {
        match self {
            Report::Npm(ids) => ids.iter().map(|id| id.to_string()).collect(),
            Report::NpmOrScope(entries) => entries.iter().map(|e| e.to_string()).collect(),
            Report::PyPi(ids) => ids.iter().map(|id| id.to_string()).collect(),
            Report::Info(info) => info_lines(info),
            Report::Search(hits) => hits.iter().map(search_line).collect(),
            Report::Notice(message) => vec![message.clone()],
        }
    }

    /// Number of entries, for list-shaped reports.
    pub fn count(&self) -> Option<usize> {
        match self {
            Report::Npm(ids) => Some(ids.len()),
            Report::NpmOrScope(entries) => Some(entries.len()),
            Report::PyPi(ids) => Some(ids.len()),
            Report::Search(hits) => Some(hits.len()),
            Report::Info(_) | Report::Notice(_) => None,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn info_lines(info: &NpmPackageInfo) -> Vec<String> {
    let unknown = || "-".to_string();
    let mut lines = vec![
        format!("name:        {}", info.name),
        format!("created:     {}", info.created.clone().unwrap_or_else(unknown)),
        format!("modified:    {}", info.modified.clone().unwrap_or_else(unknown)),
        format!("latest:      {}", info.latest.clone().unwrap_or_else(unknown)),
        format!("maintainers: {}", info.maintainers.join(", ")),
        format!("versions:    {}", info.releases.len()),
    ];
    lines.extend(info.releases.iter().map(|release| {
        format!(
            "  {:<20} {}",
            release.version,
            release.published.as_deref().unwrap_or("-")
        )
    }));
    lines
}

fn search_line(hit: &NpmSearchHit) -> String {
    format!(
        "{}\t{}\t{}",
        hit.name,
        hit.date.as_deref().unwrap_or("-"),
        hit.description.as_deref().unwrap_or("")
    )
}

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    verbose: bool,
    json_mode: bool,
}

impl ConsoleOutput {
    pub fn new(verbose: bool, json_mode: bool) -> Self {
        Self { verbose, json_mode }
    }

    pub fn is_json(&self) -> bool {
        self.json_mode
    }

    /// Print progress (only in verbose mode).
    pub fn print_progress(&self, message: &str) {
        if self.json_mode || !self.verbose {
            return;
        }

        eprintln!("{} {}", "[.]".dimmed(), message.dimmed());
    }

    /// Print a report to stdout followed by a summary on stderr.
    pub fn print_report(&self, command: &str, report: &Report) -> Result<()> {
        if self.json_mode {
            println!("{}", report.to_json()?);
            return Ok(());
        }

        for line in report.lines() {
            println!("{}", line);
        }

        if let Some(count) = report.count() {
            let summary = format!("{}: {} found", command, count);
            if count == 0 {
                eprintln!("{} {}", "[*]".bright_blue(), summary.green());
            } else {
                eprintln!("{} {}", "[!]".yellow(), summary.bold());
            }
        }
        Ok(())
    }

    /// Print a fatal error.
    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", "[x]".red().bold(), message.red());
    }

    /// Progress bar for existence probes; hidden in JSON mode. The length is
    /// set by whoever drives it.
    pub fn create_progress_bar(&self, message: &str) -> ProgressBar {
        if self.json_mode {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb.set_message(message.to_string());
        pb
    }
}
