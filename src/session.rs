//! Interactive dashboard session.
//!
//! Holds the current selectors and the last loaded records explicitly; the
//! aggregation itself stays a pure function over that state.

use std::fmt::Write as _;
use std::io;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::config::Endpoints;
use crate::fetch::{CachedFetcher, RecordSource};
use crate::models::{AggregationResult, Cohort, InternType, Record, Thresholds};
use crate::pipeline::{self, Aggregation};
use crate::report::{self, ViewKind};

pub const HELP: &str = "\
commands:
  cohort <1|2>           select a cohort (clears the intern type)
  type <ai|techlead>     select an intern type and load its registrations
  top <5-50>             number of top colleges to rank
  search [text]          filter the full college list (empty clears)
  view <tabular|sankey|sunburst>
  refresh                drop cached data and reload
  show                   render the dashboard again
  help                   this text
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Cohort(Cohort),
    Type(InternType),
    Top(usize),
    Search(String),
    View(ViewKind),
    Refresh,
    Show,
    Help,
    Quit,
}

impl FromStr for SessionCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match verb.to_ascii_lowercase().as_str() {
            "cohort" => rest.parse().map(SessionCommand::Cohort),
            "type" => rest.parse().map(SessionCommand::Type),
            "top" => rest
                .parse::<usize>()
                .ok()
                .filter(|n| (pipeline::MIN_TOP_N..=pipeline::MAX_TOP_N).contains(n))
                .map(SessionCommand::Top)
                .ok_or_else(|| {
                    format!(
                        "top expects a number between {} and {}",
                        pipeline::MIN_TOP_N,
                        pipeline::MAX_TOP_N
                    )
                }),
            "search" => Ok(SessionCommand::Search(rest.to_string())),
            "view" => rest.parse().map(SessionCommand::View),
            "refresh" => Ok(SessionCommand::Refresh),
            "show" | "" => Ok(SessionCommand::Show),
            "help" | "?" => Ok(SessionCommand::Help),
            "quit" | "exit" => Ok(SessionCommand::Quit),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    SelectionRequired(&'static str),
    FetchFailed(String),
    DataUnavailable,
    Ready(AggregationResult),
}

pub struct Session<S> {
    fetcher: CachedFetcher<S>,
    endpoints: Endpoints,
    thresholds: Thresholds,
    cohort: Option<Cohort>,
    intern_type: Option<InternType>,
    top_n: usize,
    search: String,
    view: ViewKind,
    records: Option<Arc<Vec<Record>>>,
    last_error: Option<String>,
}

impl<S: RecordSource> Session<S> {
    pub fn new(fetcher: CachedFetcher<S>, endpoints: Endpoints, thresholds: Thresholds) -> Self {
        Self {
            fetcher,
            endpoints,
            thresholds,
            cohort: Some(Cohort::Cohort1),
            intern_type: None,
            top_n: 10,
            search: String::new(),
            view: ViewKind::Tabular,
            records: None,
            last_error: None,
        }
    }

    pub async fn apply(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Cohort(cohort) => {
                self.cohort = Some(cohort);
                self.intern_type = None;
                self.last_error = None;
            }
            SessionCommand::Type(intern_type) => {
                self.intern_type = Some(intern_type);
                self.load().await;
            }
            SessionCommand::Top(n) => self.top_n = pipeline::clamp_top_n(n),
            SessionCommand::Search(query) => self.search = query,
            SessionCommand::View(view) => self.view = view,
            SessionCommand::Refresh => {
                self.fetcher.invalidate();
                if self.intern_type.is_some() {
                    self.load().await;
                }
            }
            SessionCommand::Show | SessionCommand::Help | SessionCommand::Quit => {}
        }
    }

    async fn load(&mut self) {
        let Some(intern_type) = self.intern_type else {
            return;
        };
        let url = self.endpoints.url_for(intern_type);
        match self.fetcher.fetch(url).await {
            Ok(records) => {
                self.records = Some(records);
                self.last_error = None;
            }
            Err(err) => {
                self.records = None;
                self.last_error = Some(err.to_string());
            }
        }
    }

    pub fn view(&self) -> DashboardView {
        if self.cohort.is_none() {
            return DashboardView::SelectionRequired("Please select a cohort type.");
        }
        if self.intern_type.is_none() {
            return DashboardView::SelectionRequired("Please select an intern type to load data.");
        }
        if let Some(message) = &self.last_error {
            return DashboardView::FetchFailed(message.clone());
        }
        let records = match &self.records {
            Some(records) if !records.is_empty() => records,
            _ => return DashboardView::DataUnavailable,
        };

        match pipeline::aggregate(records, self.cohort, self.intern_type, &self.thresholds) {
            Aggregation::Ready(result) => DashboardView::Ready(result),
            Aggregation::SelectionRequired => {
                DashboardView::SelectionRequired("Please select intern type.")
            }
        }
    }

    pub fn render(&self) -> anyhow::Result<String> {
        let mut output = String::new();

        match self.view() {
            DashboardView::SelectionRequired(prompt) => {
                let _ = writeln!(output, "{prompt}");
            }
            DashboardView::FetchFailed(message) => {
                let _ = writeln!(output, "Could not load registrations: {message}");
                let _ = writeln!(output, "Use 'refresh' to try again.");
            }
            DashboardView::DataUnavailable => {
                let _ = writeln!(
                    output,
                    "No registration data available. Use 'refresh' or check the API configuration."
                );
            }
            DashboardView::Ready(result) => {
                let (Some(cohort), Some(intern_type)) = (self.cohort, self.intern_type) else {
                    return Ok(output);
                };
                let _ = writeln!(
                    output,
                    "Selected Cohort: {} ({})",
                    cohort.label().to_uppercase(),
                    intern_type.display_name()
                );
                if let Some(at) = self.fetcher.fetched_at(self.endpoints.url_for(intern_type)) {
                    let _ = writeln!(output, "Data as of {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
                }
                let _ = writeln!(output);

                match self.view {
                    ViewKind::Tabular => {
                        output.push_str(&report::summary_text(&result, self.top_n));
                        if !self.search.is_empty() {
                            let _ = writeln!(output);
                            let _ = writeln!(output, "Colleges matching '{}':", self.search);
                            output.push_str(&report::search_text(&result, &self.search));
                        }
                    }
                    view => {
                        let data = report::chart_data(&result, view, cohort, self.top_n);
                        output.push_str(
                            &serde_json::to_string_pretty(&data)
                                .context("failed to encode chart data")?,
                        );
                        output.push('\n');
                    }
                }
            }
        }

        Ok(output)
    }
}

/// Reads commands line by line until `quit` or end of input.
pub async fn run<S, R, W>(session: &mut Session<S>, input: R, mut out: W) -> anyhow::Result<()>
where
    S: RecordSource,
    R: AsyncBufRead + Unpin,
    W: io::Write,
{
    let mut lines = input.lines();
    write!(out, "{}", session.render()?)?;
    write!(out, "> ")?;
    out.flush()?;

    while let Some(line) = lines.next_line().await? {
        match line.parse::<SessionCommand>() {
            Ok(SessionCommand::Quit) => break,
            Ok(SessionCommand::Help) => writeln!(out, "{HELP}")?,
            Ok(command) => {
                tracing::debug!(?command, "applying command");
                session.apply(command).await;
                write!(out, "{}", session.render()?)?;
            }
            Err(message) => writeln!(out, "{message}")?,
        }
        write!(out, "> ")?;
        out.flush()?;
    }

    Ok(())
}
