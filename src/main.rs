use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use docchat::backend::BackendClient;
use docchat::ui::chat::{ChatAction, ChatManager};
use docchat::{Channel, Config};

#[derive(Parser)]
#[command(name = "docchat")]
#[command(version)]
#[command(about = "Streaming chat for a document question-answering backend", long_about = None)]
struct Cli {
    /// Backend base URL (overrides the configured value)
    #[arg(long)]
    server: Option<String>,

    /// Model to use for this session
    #[arg(long)]
    model: Option<String>,

    /// Name of the uploaded file the questions refer to
    #[arg(long)]
    file: Option<String>,

    /// Seconds of channel silence before a request counts as stalled
    #[arg(long)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the configured models
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(server) = cli.server {
        config.server_url = server;
    }
    if let Some(timeout) = cli.timeout {
        config.stall_timeout_secs = timeout;
    }
    if let Some(model) = cli.model {
        match config.resolve_model(&model) {
            Some(resolved) => config.default_model = resolved.to_string(),
            None => {
                println!("❌ Unknown model '{}'.", model);
                println!("Run 'docchat models' to see the configured models.");
                return Ok(());
            }
        }
    }

    match cli.command {
        Some(Commands::Models) => {
            list_models(&config);
            Ok(())
        }
        None => run_chat(config, cli.file).await,
    }
}

fn list_models(config: &Config) {
    println!("🧠 Configured models:\n");
    for model in &config.models {
        if *model == config.default_model {
            println!("  • {} (selected)", model);
        } else {
            println!("  • {}", model);
        }
    }
}

/// Route diagnostics to a log file so the TUI stays clean.
fn init_tracing(config: &Config) -> Result<()> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
        .context("Failed to open log file")?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docchat=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

async fn run_chat(config: Config, file: Option<String>) -> Result<()> {
    init_tracing(&config)?;

    let channel = BackendClient::new(config.server_url.clone())?;
    channel.probe();
    let mut manager = ChatManager::new(channel, config, file);

    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))
        .context("Failed to initialize terminal")?;

    let result = run_loop(&mut terminal, &mut manager);

    // restore the terminal on both the success and the error path
    manager.shutdown();
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();

    result
}

fn run_loop<C: Channel>(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    manager: &mut ChatManager<C>,
) -> Result<()> {
    loop {
        manager.pump_events();
        manager.tick();

        terminal.draw(|frame| {
            let area = frame.size();
            manager.render(area, frame.buffer_mut());
        })?;

        if event::poll(Duration::from_millis(50)).context("Failed to poll terminal events")? {
            if let Event::Key(key) = event::read().context("Failed to read terminal event")? {
                if manager.handle_key(key) == ChatAction::Exit {
                    return Ok(());
                }
            }
        }
    }
}
