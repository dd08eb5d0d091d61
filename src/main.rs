use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use colored::*;
use insight_core::chart::format_value;
use insight_core::{AnalysisReport, AnalysisRequest, BackendKind, ChartSpec, Config};
use tracing::{error, info};

mod app;
mod chart;
mod export;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "insight")]
#[command(about = "Terminal console for conversational data analysis")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Analysis backend to use (mock or http)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// Base URL of the analysis server
    #[arg(long, global = true)]
    url: Option<String>,

    /// Simulated latency of the mock backend, in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,

    /// Give up on a request after this many seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive console (default)
    Tui,
    /// Run a single analysis and print the result
    Ask {
        /// What to analyse, e.g. "销量分析"
        query: String,
        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check that the configured backend is reachable
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("{}: {} (using defaults)", "Could not read config".yellow(), e);
        Config::new()
    });
    apply_overrides(&mut config, &cli);

    match cli.command {
        None | Some(Commands::Tui) => run_tui(&config).await,
        Some(Commands::Ask { query, json }) => {
            logging::init_stderr();
            ask(&config, &query, json).await
        }
        Some(Commands::Health) => {
            logging::init_stderr();
            health(&config).await
        }
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(backend) = &cli.backend {
        config.backend = Some(backend.clone());
    }
    if let Some(url) = &cli.url {
        config.server_url = Some(url.clone());
    }
    if let Some(delay) = cli.delay_ms {
        config.mock_delay_ms = Some(delay);
    }
    if let Some(timeout) = cli.timeout_secs {
        config.request_timeout_secs = Some(timeout);
    }
}

async fn run_tui(config: &Config) -> Result<()> {
    let backend = config.build_backend()?;
    let _log_guard = logging::init_file(&logging::default_log_dir())?;
    info!(backend = %backend.describe(), "starting console");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let mut events = EventHandler::new();
    let mut app = App::new(
        backend,
        config.request_timeout(),
        events.sender(),
        export::default_export_dir(),
    );
    if let Ok(size) = terminal.size() {
        app.on_resize(size.width, size.height);
    }

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    app.shutdown();
    tui::restore()?;
    if let Err(e) = &result {
        error!(error = %e, "console exited with an error");
    }
    info!("console closed");
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}

async fn ask(config: &Config, query: &str, json: bool) -> Result<()> {
    let backend = config.build_backend()?;
    if query.trim().is_empty() {
        return Err(anyhow!("Query must not be empty"));
    }

    if !json {
        println!("🔍 Analysing: {}", query.trim().bold().cyan());
        println!("🤖 Backend: {}\n", backend.describe().magenta());
    }

    let request = AnalysisRequest::new(query.trim());
    let report = backend
        .analyze_within(&request, config.request_timeout())
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("{}", "Result:".bold().green());
    println!("{}", report.narrative);

    if let Some(chart) = &report.chart {
        println!("\n{} {}", chart.title.bold().blue(), format!("({})", chart.kind.as_str()).dimmed());
        for line in bar_summary(chart, 30) {
            println!("{}", line);
        }
    }
}

/// One text bar per category, scaled to the largest value
fn bar_summary(chart: &ChartSpec, width: usize) -> Vec<String> {
    let max = chart
        .points()
        .map(|(_, v)| v)
        .fold(0.0_f64, f64::max);
    let label_width = chart.points().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

    chart
        .points()
        .map(|(label, value)| {
            let filled = if max > 0.0 {
                ((value.max(0.0) / max) * width as f64).round() as usize
            } else {
                0
            };
            format!(
                "{:>pad$} {} {}",
                label,
                "█".repeat(filled).blue(),
                format_value(value).dimmed(),
                pad = label_width,
            )
        })
        .collect()
}

async fn health(config: &Config) -> Result<()> {
    let kind = config.backend_kind()?;
    let backend = config.build_backend()?;
    println!("Checking {} backend at {}", kind.display_name().bold(), backend.describe().cyan());

    match backend.health().await {
        Ok(status) => {
            println!("{} {}", "✓".green(), status);
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            if kind == BackendKind::Http {
                println!("Make sure the analysis server is running at {}", config.server_url().bold());
            }
            Err(e.into())
        }
    }
}
