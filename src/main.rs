use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod error;
mod fetch;
mod models;
mod pipeline;
mod report;
mod session;

use config::{ApiSettings, Endpoints, Settings};
use fetch::{api_headers, CachedFetcher, FileSource, HttpSource};
use models::{AggregationResult, Cohort, InternType, Record};
use report::{Table, ViewKind};

#[derive(Parser)]
#[command(name = "intern-dashboard")]
#[command(about = "Intern registrations dashboard: cohort, college, age and gender breakdowns", long_about = None)]
struct Cli {
    /// Read records from a local JSON array instead of the registrations API
    #[arg(long, global = true)]
    records_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    #[arg(long)]
    intern_type: InternType,
    #[arg(long, default_value = "cohort1")]
    cohort: Cohort,
}

#[derive(Subcommand)]
enum Commands {
    /// Print headline metrics and the top colleges, age and gender tables
    Summary {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(5..=50))]
        top: u16,
    },
    /// List every college, optionally filtered by a name fragment
    Colleges {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(5..=50))]
        top: u16,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export one aggregate table as CSV
    Export {
        #[command(flatten)]
        selection: Selection,
        #[arg(long)]
        table: Table,
        /// Defaults to stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Emit chart-ready JSON for an external renderer
    Chart {
        #[command(flatten)]
        selection: Selection,
        #[arg(long, default_value = "tabular")]
        view: ViewKind,
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(5..=50))]
        top: u16,
    },
    /// Interactive session reading commands from stdin
    Session,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env()?;

    match cli.records_file {
        Some(path) => {
            let path = path.display().to_string();
            tracing::info!(path = %path, "reading registrations from file");
            let fetcher = CachedFetcher::new(FileSource, Vec::new());
            run(cli.command, fetcher, Endpoints::shared(path), settings).await
        }
        None => {
            let api = ApiSettings::from_env()?;
            let source = HttpSource::new(settings.http_timeout)
                .context("failed to build HTTP client")?;
            let fetcher = CachedFetcher::new(source, api_headers(&api.token));
            run(cli.command, fetcher, api.endpoints, settings).await
        }
    }
}

async fn run<S: fetch::RecordSource>(
    command: Commands,
    fetcher: CachedFetcher<S>,
    endpoints: Endpoints,
    settings: Settings,
) -> anyhow::Result<()> {
    match command {
        Commands::Summary { selection, top } => {
            let Some(result) = load(&fetcher, &endpoints, &settings, &selection).await? else {
                return Ok(());
            };
            print_header(&selection);
            print!("{}", report::summary_text(&result, usize::from(top)));
        }
        Commands::Colleges { selection, search } => {
            let Some(result) = load(&fetcher, &endpoints, &settings, &selection).await? else {
                return Ok(());
            };
            print_header(&selection);
            print!("{}", report::search_text(&result, &search));
        }
        Commands::Report {
            selection,
            top,
            out,
        } => {
            let Some(result) = load(&fetcher, &endpoints, &settings, &selection).await? else {
                return Ok(());
            };
            let markdown = report::build_report(
                &result,
                selection.cohort,
                selection.intern_type,
                usize::from(top),
                chrono::Utc::now(),
            );
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            selection,
            table,
            out,
        } => {
            let Some(result) = load(&fetcher, &endpoints, &settings, &selection).await? else {
                return Ok(());
            };
            match out {
                Some(path) => {
                    let file = std::fs::File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    report::write_csv(&result, table, file)?;
                    println!("Table written to {}.", path.display());
                }
                None => report::write_csv(&result, table, std::io::stdout().lock())?,
            }
        }
        Commands::Chart {
            selection,
            view,
            top,
        } => {
            let Some(result) = load(&fetcher, &endpoints, &settings, &selection).await? else {
                return Ok(());
            };
            let data = report::chart_data(&result, view, selection.cohort, usize::from(top));
            println!("{}", serde_json::to_string_pretty(&data)?);
        }
        Commands::Session => {
            let mut session = session::Session::new(fetcher, endpoints, settings.thresholds);
            let stdin = BufReader::new(tokio::io::stdin());
            session::run(&mut session, stdin, std::io::stdout()).await?;
        }
    }

    Ok(())
}

/// Fetches and aggregates one selection; `None` when there is nothing to show.
async fn load<S: fetch::RecordSource>(
    fetcher: &CachedFetcher<S>,
    endpoints: &Endpoints,
    settings: &Settings,
    selection: &Selection,
) -> anyhow::Result<Option<AggregationResult>> {
    let url = endpoints.url_for(selection.intern_type);
    let records: Arc<Vec<Record>> = fetcher
        .fetch(url)
        .await
        .with_context(|| format!("failed to load {} registrations", selection.intern_type))?;

    if records.is_empty() {
        println!("No registration data available. Check the API configuration and try again.");
        return Ok(None);
    }

    Ok(Some(pipeline::aggregate_selection(
        &records,
        selection.cohort,
        selection.intern_type,
        &settings.thresholds,
    )))
}

fn print_header(selection: &Selection) {
    println!(
        "Selected Cohort: {} ({})",
        selection.cohort.label().to_uppercase(),
        selection.intern_type.display_name()
    );
    println!();
}
