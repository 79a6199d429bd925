use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;
use voltchat::config::{Config, HttpTimeouts};
use voltchat::render::{format_message, format_status};
use voltchat::responder::ResponderError;
use voltchat::responder::webhook::{build_http_client, test_connection};
use voltchat::store::file::FileStore;
use voltchat::store::{MemoryStore, StoreError};
use voltchat::{ChatController, ChatStorage, repl};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Responder(#[from] ResponderError),
    #[error("store failed: {0}")]
    Store(#[from] StoreError),
    #[error("io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "voltchat", about = "Chat with a demo bot or your own webhook")]
struct Cli {
    /// Directory for persisted settings and history.
    #[arg(long, env = "VOLTCHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Webhook to use; replaces the saved one and starts a new chat if it differs.
    #[arg(long, env = "VOLTCHAT_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Turn off streamed replies.
    #[arg(long)]
    no_streaming: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive chat (default).
    Chat,
    /// POST a connection test to a webhook and report the result.
    TestWebhook { url: String },
    /// Print the saved conversation.
    History,
    /// Erase the saved conversation.
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let Cli { data_dir, webhook_url, no_streaming, command } = Cli::parse();
    let mut config = Config::from_env();
    if let Some(dir) = data_dir {
        config.data_dir = dir;
    }

    match command.unwrap_or(Command::Chat) {
        Command::TestWebhook { url } => test_webhook(config.timeouts, &url).await?,
        Command::Chat => {
            let controller = open_controller(&config, webhook_url.as_deref(), no_streaming)?;
            println!("VoltChat. {}", format_status(&controller.snapshot()));
            println!("Type /help for commands.");
            repl::run(&controller, BufReader::new(tokio::io::stdin())).await?;
        }
        Command::History => {
            let controller = open_controller(&config, webhook_url.as_deref(), no_streaming)?;
            for message in &controller.messages() {
                println!("{}", format_message(message));
            }
        }
        Command::Clear => {
            let controller = open_controller(&config, webhook_url.as_deref(), no_streaming)?;
            controller.clear_all();
            println!("History cleared.");
        }
    }
    Ok(())
}

/// Open the stores under `config.data_dir` and apply startup flags.
fn open_controller(config: &Config, webhook_url: Option<&str>, no_streaming: bool) -> Result<ChatController, CliError> {
    let durable = FileStore::open(&config.data_dir)?;
    tracing::debug!(path = %durable.path().display(), "store opened");
    let storage = ChatStorage::new(Arc::new(MemoryStore::new()), Arc::new(durable));
    let controller = ChatController::new(storage, config)?;

    if let Some(url) = webhook_url {
        if url.trim() != controller.webhook().url() {
            controller.set_webhook_url(url);
        }
    }
    if no_streaming && controller.streaming_enabled() {
        controller.toggle_streaming();
    }
    Ok(controller)
}

async fn test_webhook(timeouts: HttpTimeouts, url: &str) -> Result<(), CliError> {
    let http = build_http_client(timeouts)?;
    test_connection(&http, url).await?;
    println!("Connection successful.");
    Ok(())
}
