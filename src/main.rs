mod cli;
mod endpoint;
mod params;
mod session;
mod terminal;
mod transport;
mod types;
mod ui;
mod utils;

use clap::Parser;
use std::io::IsTerminal;
use tokio::sync::mpsc;
use tracing::error;

use cli::Cli;
use params::ParamError;
use session::Outcome;
use terminal::CrosstermSurface;
use transport::WsConnector;
use types::SessionEvent;

const CONTAINER_NOTICE: &str =
    "Unable to locate the container. Please contact your administrator.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Determine if we'll take over the terminal (needed to configure logging appropriately)
    let use_tui = !cli.no_tui && std::io::stdout().is_terminal() && std::io::stdin().is_terminal();

    init_tracing(&cli, use_tui);

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(cli.buffer_size.max(1));
    let mut connector = WsConnector::new(event_tx.clone());
    let surface = CrosstermSurface::new(std::io::stdout(), use_tui);

    let session = match session::begin(&cli.page_url, surface, &mut connector) {
        Ok(session) => session,
        Err(e) if e.is::<ParamError>() => {
            error!("{}", e);
            let message = format!("{}\n({})", CONTAINER_NOTICE, e);
            if use_tui {
                ui::renderer::alert("k8shell-logs", &message).await?;
            } else {
                eprintln!("{}", message);
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e),
    };

    // Spawn input loop
    if use_tui {
        let detach_key = cli.detach_key;
        tokio::spawn(async move {
            ui::events::event_loop(event_tx, detach_key).await;
        });
    } else {
        ui::events::spawn_stdin_reader(event_tx);
    }

    // Full screen keeps a closed stream on display until the viewer detaches.
    match session::run(session, &mut event_rx, use_tui).await? {
        Outcome::Detached | Outcome::Closed => Ok(()),
        Outcome::Errored(message) => Err(anyhow::anyhow!("connection error: {}", message)),
        Outcome::Unsupported => Err(anyhow::anyhow!(session::UNSUPPORTED_NOTICE)),
    }
}

fn init_tracing(cli: &Cli, use_tui: bool) {
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter))
    };

    if use_tui {
        // In TUI mode: write logs to a file to avoid corrupting the display
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&cli.log_file)
        {
            Ok(log_file) => tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file))
                .init(),
            Err(e) => {
                eprintln!(
                    "Warning: Could not open {} for logging: {}",
                    cli.log_file.display(),
                    e
                );
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter())
                    .with_writer(std::io::sink)
                    .init();
            }
        }
    } else {
        // In plain mode: write logs to stderr, stdout carries the stream
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}
