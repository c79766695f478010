use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use chatdesk_core::lifecycle::{self, submit_chat, submit_upload};
use chatdesk_core::{
    ApiClient, ApiResult, Backend, BeginError, ChatSettings, Config, DisplayMessage, UiState,
    UploadOptions,
};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

const LOG_ENV: &str = "CHATDESK_LOG";

#[derive(Parser)]
#[command(name = "chatdesk", version)]
#[command(about = "Terminal client for a chat and document-analysis API")]
struct Cli {
    /// Backend base URL (default from config, then http://localhost:5000)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Model key sent with each request
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Answer mode sent with each chat request
    #[arg(long, global = true)]
    mode: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the backend is reachable
    Health,
    /// Send one chat message and print the reply
    Ask {
        message: String,
        /// Extra context sent along with the message
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Upload a PDF or TXT file
    Upload {
        path: PathBuf,
        /// Have the model analyze the extracted text
        #[arg(long)]
        ai: bool,
        /// Question for the analysis (implies --ai)
        #[arg(short, long)]
        question: Option<String>,
    },
    /// List the models the backend offers
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|err| {
        eprintln!("{}: {}", "Ignoring unreadable config".yellow(), err);
        Config::new()
    });
    if let Some(url) = cli.api_url {
        config.api_url = Some(url);
    }
    if let Some(model) = cli.model {
        config.default_model = Some(model);
    }
    if let Some(mode) = cli.mode {
        config.default_mode = Some(mode);
    }

    init_logging(cli.command.is_none())?;
    tracing::info!(api_url = %config.api_url(), "starting");

    let client = ApiClient::with_timeout(config.api_url(), config.request_timeout());

    match cli.command {
        None => run_tui(config, Arc::new(client)).await,
        Some(Commands::Health) => health(&client).await,
        Some(Commands::Ask { message, context }) => {
            ask(&config, &client, &message, context.as_deref().unwrap_or_default()).await
        }
        Some(Commands::Upload { path, ai, question }) => {
            upload(&config, &client, &path, ai || question.is_some(), question).await
        }
        Some(Commands::Models) => models(&config, &client).await,
    }
}

/// The TUI owns the terminal, so it logs to a file in the config directory;
/// subcommands log to stderr.
fn init_logging(to_file: bool) -> Result<()> {
    let default = if to_file { "info" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));

    if to_file {
        let dir = Config::config_dir()?;
        std::fs::create_dir_all(&dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("chatdesk.log"))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}

async fn run_tui(config: Config, backend: Arc<dyn Backend>) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    let (width, _) = crossterm::terminal::size()?;
    let mut app = App::new(config, backend, events.sender(), width);
    app.request_health();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event)?,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    tracing::info!("exiting");
    result
}

async fn health(client: &ApiClient) -> Result<()> {
    println!("🔌 Comprobando {}", client.base_url().cyan());
    match client.check_health().await {
        ApiResult::Success(status) => {
            let detail = status.message.unwrap_or_default();
            println!("{} {}", "● API disponible".green().bold(), detail.dimmed());
            Ok(())
        }
        ApiResult::Failure(message) => {
            println!("{}", format!("● {}", message).red().bold());
            bail!("{}", message)
        }
    }
}

async fn ask(config: &Config, client: &ApiClient, message: &str, context: &str) -> Result<()> {
    let settings = ChatSettings {
        model: config.model().to_string(),
        mode: config.mode().to_string(),
    };
    println!("🤖 Consultando {}...\n", settings.model.bold().magenta());

    let mut state = UiState::default();
    let outcome = submit_chat(&mut state, client, message, context, &settings).await;
    report(&state, outcome)
}

async fn upload(
    config: &Config,
    client: &ApiClient,
    path: &std::path::Path,
    process_with_ai: bool,
    question: Option<String>,
) -> Result<()> {
    let options = UploadOptions {
        process_with_ai,
        model: process_with_ai.then(|| config.model().to_string()),
        question,
    };
    println!("📎 Subiendo {}...\n", path.display().to_string().cyan());

    let mut state = UiState::default();
    let outcome = submit_upload(&mut state, client, path, options).await;
    report(&state, outcome)
}

/// Print the reply the lifecycle left in `state`, or its alerts on failure.
fn report(state: &UiState, outcome: Result<chatdesk_core::RequestToken, BeginError>) -> Result<()> {
    for alert in state.alerts.items() {
        eprintln!("{}", alert.message.red());
    }
    if let Err(err) = outcome {
        bail!("{}", err);
    }

    let Some(reply) = state.transcript.last_assistant() else {
        bail!("{}", lifecycle::READ_FAILED);
    };
    print_message(reply);
    if reply.is_error() {
        bail!("la solicitud falló");
    }
    Ok(())
}

fn print_message(message: &DisplayMessage) {
    let label = if message.is_error() {
        "Respuesta:".bold().red()
    } else {
        "Respuesta:".bold().green()
    };
    println!("{}", label);
    if message.is_file() {
        println!("{}", message.body);
    } else {
        println!("{}", bold_markup(&message.body));
    }

    if let Some(meta) = message.meta_line() {
        println!("\n{}", meta.dimmed());
    }
}

/// `**bold**` runs rendered with terminal bold; unpaired markers stay literal.
fn bold_markup(text: &str) -> String {
    text.lines()
        .map(|line| {
            let parts: Vec<&str> = line.split("**").collect();
            if parts.len() % 2 == 0 {
                return line.to_string();
            }
            parts
                .iter()
                .enumerate()
                .map(|(i, part)| {
                    if i % 2 == 1 && !part.is_empty() {
                        part.bold().to_string()
                    } else if i % 2 == 1 {
                        "****".to_string()
                    } else {
                        part.to_string()
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

async fn models(config: &Config, client: &ApiClient) -> Result<()> {
    println!("\n{}", "🤖 Modelos disponibles".bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    match client.list_models().await {
        ApiResult::Success(catalog) => {
            for (key, info) in &catalog.models {
                let marker = if Some(key.as_str()) == catalog.default_model.as_deref() {
                    " (predeterminado)".yellow().to_string()
                } else {
                    String::new()
                };
                let name = info.name.clone().unwrap_or_default();
                println!("  • {} {}{}", key.green(), name.dimmed(), marker);
            }
        }
        ApiResult::Failure(message) => {
            println!("{}: {}", "No se pudo consultar el backend".red(), message);
            println!("{}", "Modelos configurados:".yellow());
            for model in config.known_models() {
                println!("  • {}", model.green());
            }
        }
    }
    Ok(())
}
