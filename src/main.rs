use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::sync::mpsc::channel;
use std::time::Duration;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sheetview::config::ViewerConfig;
use sheetview::controller::Controller;
use sheetview::domain::{NO_RECORDS_TEXT, SVError};
use sheetview::fetch::SourceFetcher;
use sheetview::model::{Model, Status};
use sheetview::parser::PolarsCsvParser;
use sheetview::tabs::TabController;
use sheetview::ui::TableUI;

const EVENT_POLL_TIME: u64 = 100;

/// Tabbed, searchable viewer for a spreadsheet published as CSV sheets.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// TOML file describing the sheets, defaults to the built-in spreadsheet
    #[arg(short, long)]
    config: Option<String>,

    /// Where to write the log, filtered by RUST_LOG
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Viewport width units per terminal column
    #[arg(long, default_value_t = 10)]
    width_scale: usize,

    /// Print the given sheet to stdout instead of starting the viewer
    #[arg(long, value_name = "SHEET")]
    print: Option<String>,

    /// Search query applied in --print mode
    #[arg(long, default_value = "", requires = "print")]
    query: String,

    /// Viewport width used in --print mode
    #[arg(long, default_value_t = 1000, requires = "print")]
    width: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            error!("Fatal: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn setup_logging(path: &Path) -> Result<(), SVError> {
    let file = std::fs::File::create(path)?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sheetview=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), SVError> {
    let log_file = args
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("sheetview.log"));
    setup_logging(&log_file)?;
    info!("Starting sheetview, logging to {}", log_file.display());

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::builtin(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let fetcher = Arc::new(SourceFetcher::new(Duration::from_secs(args.timeout))?);
    let viewport_width = match &args.print {
        Some(_) => args.width,
        None => 0,
    };
    let mut tabs = TabController::new(
        Arc::new(config),
        fetcher,
        Arc::new(PolarsCsvParser),
        viewport_width,
    )?;

    if let Some(sheet) = &args.print {
        return runtime.block_on(print_sheet(&mut tabs, sheet, &args.query));
    }

    println!("Loading {} ...", tabs.active());
    runtime.block_on(tabs.initialize())?;

    let mut terminal = ratatui::init();
    let result = run_viewer(&mut terminal, tabs, &runtime, args.width_scale);
    ratatui::restore();
    result
}

fn run_viewer(
    terminal: &mut DefaultTerminal,
    tabs: TabController,
    runtime: &tokio::runtime::Runtime,
    width_scale: usize,
) -> Result<(), SVError> {
    let size = terminal.size()?;
    let (notifier, notifications) = channel();
    let mut model = Model::init(
        tabs,
        runtime.handle().clone(),
        notifier,
        width_scale,
        size.width as usize,
        size.height as usize,
    );
    let mut controller = Controller::new(EVENT_POLL_TIME, notifications);
    let mut ui = TableUI::new();

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message);
    }
    info!("Quitting");
    Ok(())
}

async fn print_sheet(tabs: &mut TabController, sheet: &str, query: &str) -> Result<(), SVError> {
    tabs.load_metadata().await;
    tabs.on_search_input(sheet, query)?;
    tabs.show(sheet).await?;

    let view = tabs.view();
    println!("{}", view.columns.join("\t"));
    for row in view.rows.iter() {
        let cells: Vec<&str> = row.cells.iter().map(|c| c.text.as_str()).collect();
        println!("{}", cells.join("\t"));
    }
    if view.shows_no_records() {
        println!("{NO_RECORDS_TEXT}");
    }
    if let Some(failure) = tabs.failure(sheet) {
        eprintln!("Loading {sheet} failed: {}", failure.message);
    }
    eprintln!(
        "{}/{} rows, last update: {}",
        view.rows.len(),
        view.total_rows,
        tabs.metadata().last_update().unwrap_or("unknown")
    );
    Ok(())
}
