use std::process::ExitCode;
use std::sync::{Arc, mpsc};

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{error, info};

mod api;
mod combo;
mod controller;
mod domain;
mod fetcher;
mod form;
mod inputter;
mod logging;
mod model;
mod query;
mod results;
mod ui;

use api::HttpBackend;
use controller::Controller;
use domain::{ASConfig, ASError, DEFAULT_BASE_URL, DEFAULT_FETCH_SIZE, DEFAULT_PAGE_GROUP, DEFAULT_PAGE_SIZE};
use fetcher::Fetcher;
use logging::{DEFAULT_LOG_FILE, expand_log_path, init_logging};
use model::{Model, Status};
use ui::SearchUI;

#[derive(Parser, Debug)]
#[command(name = "asearch", version, about = "Search the message archive for per-user counts")]
struct Cli {
    /// Base url of the archive backend
    #[arg(long, env = "ASEARCH_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Rows per pager page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Number of page links shown in the pager
    #[arg(long, default_value_t = DEFAULT_PAGE_GROUP)]
    page_group: usize,

    /// Rows requested from the backend per fetch
    #[arg(long, default_value_t = DEFAULT_FETCH_SIZE)]
    fetch_size: usize,

    #[arg(long, default_value_t = 10_000)]
    timeout_ms: u64,

    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,

    #[arg(long, default_value = DEFAULT_LOG_FILE)]
    log_file: String,

    /// Log level (error,warn,info,debug,trace), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn config(&self) -> ASConfig {
        ASConfig::default()
            .base_url(self.base_url.clone())
            .page_size(self.page_size)
            .page_group(self.page_group)
            .fetch_size(self.fetch_size)
            .timeout_ms(self.timeout_ms)
            .event_poll_time(self.event_poll_time)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Err(e) => {
            error!("Exiting with {e:?}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run(cli: Cli) -> Result<(), ASError> {
    init_logging(&expand_log_path(&cli.log_file)?, &cli.log_level)?;
    let cfg = cli.config();
    info!("Starting asearch against {}", cfg.base_url);

    let backend = Arc::new(HttpBackend::new(&cfg)?);
    let (tx, rx) = mpsc::channel();
    let fetcher = Fetcher::new(backend, tx);
    let controller = Controller::new(&cfg, rx);

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &cfg, &fetcher, &controller);
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    cfg: &ASConfig,
    fetcher: &Fetcher,
    controller: &Controller,
) -> Result<(), ASError> {
    let mut model = Model::init(cfg);
    let mut ui = SearchUI::new();

    while model.status != Status::QUITTING {
        for request in model.take_requests() {
            fetcher.submit(request);
        }

        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }
    info!("Bye");
    Ok(())
}
