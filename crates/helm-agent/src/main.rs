//! # helm-agent
//!
//! Terminal chat client over the Helm orchestration core. Wires settings →
//! Gemini gateway → session store → session controller, restores persisted
//! sessions, and runs a line-oriented loop: plain lines are sent to the
//! active session, `:`-commands manage sessions, journeys, driving,
//! attachments, and interaction answers.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use helm_core::events::SessionEvent;
use helm_core::personas::Mode;
use helm_llm::attachments::AttachedFile;
use helm_llm::gemini::{GeminiConfig, GeminiGateway};
use helm_runtime::journey::Direction;
use helm_runtime::session::{ControllerConfig, SessionController};
use helm_settings::{HelmSettings, load_settings, load_settings_from_path};
use helm_store::{JsonFileStore, SessionSnapshot, SessionStore};

/// Helm terminal chat client.
#[derive(Parser, Debug)]
#[command(name = "helm", about = "Multi-session AI chat with squad delegation")]
struct Cli {
    /// Settings file path (default `~/.helm/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model ID override.
    #[arg(long)]
    model: Option<String>,

    /// Session snapshot file override.
    #[arg(long)]
    sessions: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("helm=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = match &cli.config {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => load_settings().context("loading settings")?,
    };
    if let Some(model) = cli.model {
        settings.api.model = model;
    }
    if let Some(path) = cli.sessions {
        settings.storage.sessions_path = path;
    }

    let Some(api_key) = settings.api.api_key.clone() else {
        bail!("no API key configured; set GEMINI_API_KEY or api.apiKey in settings");
    };

    let controller = build_controller(&settings, api_key);
    let store = JsonFileStore::new(settings.storage.sessions_path.clone());
    restore_sessions(&controller, &store);

    print_events(&controller);
    repl(&controller).await?;

    save_sessions(&controller, &store)?;
    Ok(())
}

fn build_controller(settings: &HelmSettings, api_key: String) -> Arc<SessionController> {
    let mut config = GeminiConfig::new(settings.api.model.clone(), api_key);
    config.base_url = settings.api.base_url.clone();
    let gateway = Arc::new(GeminiGateway::new(config));
    SessionController::new(
        gateway,
        ControllerConfig {
            max_sessions: settings.session.max_sessions,
            drive_delay: Duration::from_millis(settings.session.drive_delay_ms),
            drive_excerpt_bytes: settings.session.drive_excerpt_bytes,
        },
    )
}

fn restore_sessions(controller: &Arc<SessionController>, store: &JsonFileStore) {
    let snapshots = store.load();
    if snapshots.is_empty() {
        return;
    }
    debug!(count = snapshots.len(), "restoring sessions");
    controller.restore_sessions(snapshots.into_iter().map(Into::into).collect());
}

fn save_sessions(controller: &Arc<SessionController>, store: &JsonFileStore) -> Result<()> {
    let snapshots: Vec<SessionSnapshot> = controller
        .export_sessions()
        .iter()
        .map(Into::into)
        .collect();
    store.save(&snapshots).context("saving sessions")?;
    Ok(())
}

/// Print streamed model output and lifecycle notices as they arrive.
fn print_events(controller: &Arc<SessionController>) {
    let mut rx = controller.subscribe();
    drop(tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                SessionEvent::MessageDelta { delta, .. } => {
                    print!("{delta}");
                    use std::io::Write as _;
                    let _ = std::io::stdout().flush();
                }
                SessionEvent::TurnCompleted { .. } => println!(),
                SessionEvent::InteractionRequested { prompt, .. } => {
                    println!("\n[the model asks: {prompt}]\n[reply with :answer <text>]");
                }
                SessionEvent::SpecialistUpdate {
                    specialist, status, ..
                } => {
                    println!("[{specialist}: {status:?}]");
                }
                SessionEvent::TurnFailed { error, .. } => {
                    println!("\n[turn failed: {error}]");
                }
                SessionEvent::DrivingStopped { .. } => println!("[driving stopped]"),
                SessionEvent::TurnOpened { .. } => {}
            }
        }
    }));
}

async fn repl(controller: &Arc<SessionController>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("helm — :new <mode> to start, :help for commands");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_owned();
        if line.is_empty() {
            continue;
        }
        if let Some(command) = line.strip_prefix(':') {
            if !handle_command(controller, command).await? {
                break;
            }
            continue;
        }
        let Some(active) = controller.active_session() else {
            println!("no active session; :new <mode> first");
            continue;
        };
        if let Err(e) = controller.send_message(&active, &line, false).await {
            println!("[{e}]");
        }
    }
    Ok(())
}

/// Handle one `:`-command. Returns `false` to exit the loop.
async fn handle_command(controller: &Arc<SessionController>, command: &str) -> Result<bool> {
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();
    match name {
        "quit" | "q" => return Ok(false),
        "help" => {
            println!(
                ":new <mode>  :list  :use <n>  :close  :attach <path>  :drive <goal>\n\
                 :answer <text>  :next  :prev  :quit"
            );
        }
        "new" => match parse_mode(rest) {
            Some(mode) => match controller.create_session(mode) {
                Ok(id) => println!("[session {} ({mode})]", short(&id.to_string())),
                Err(e) => println!("[{e}]"),
            },
            None => println!("unknown mode: {rest}"),
        },
        "list" => {
            for (index, entry) in controller.overview().iter().enumerate() {
                let marker = if Some(&entry.id) == controller.active_session().as_ref() {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{marker}{index}: {} ({}){}",
                    entry.name,
                    entry.mode,
                    if entry.driving { " [driving]" } else { "" }
                );
            }
        }
        "use" => {
            let overview = controller.overview();
            match rest.parse::<usize>().ok().and_then(|n| overview.get(n)) {
                Some(entry) => controller.set_active(&entry.id),
                None => println!("no such session: {rest}"),
            }
        }
        "close" => {
            if let Some(active) = controller.active_session() {
                controller.close_session(&active);
                println!("[closed]");
            }
        }
        "attach" => match std::fs::read(rest) {
            Ok(bytes) => {
                let name = PathBuf::from(rest)
                    .file_name()
                    .map_or_else(|| rest.to_owned(), |n| n.to_string_lossy().into_owned());
                controller.attach_file(AttachedFile::from_bytes(name, &bytes));
                println!("[staged: {}]", controller.staged_files().join(", "));
            }
            Err(e) => println!("cannot read {rest}: {e}"),
        },
        "drive" => {
            if let Some(active) = controller.active_session() {
                if let Err(e) = controller.toggle_driving(&active, rest).await {
                    println!("[{e}]");
                }
            }
        }
        "answer" => {
            if let Some(active) = controller.active_session() {
                let awaiting = controller
                    .message_log(&active)
                    .and_then(|log| log.iter().rev().find(|m| m.awaits_answer()).map(|m| m.id));
                match awaiting {
                    Some(message_id) => {
                        if let Err(e) = controller.submit_answer(&active, message_id, rest).await {
                            println!("[{e}]");
                        }
                    }
                    None => println!("nothing to answer"),
                }
            }
        }
        "next" | "prev" => {
            if let Some(active) = controller.active_session() {
                let direction = if name == "next" {
                    Direction::Next
                } else {
                    Direction::Prev
                };
                if let Err(e) = controller.navigate_lesson(&active, direction).await {
                    println!("[{e}]");
                }
            }
        }
        other => println!("unknown command: :{other}"),
    }
    Ok(true)
}

fn parse_mode(name: &str) -> Option<Mode> {
    serde_json::from_value(serde_json::Value::String(name.to_lowercase())).ok()
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
