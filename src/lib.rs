pub mod cli;
pub mod commands;
pub mod error;
pub mod models;
pub mod services;
pub mod terminal;

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use commands::{dispatch, parse_command, print_help, print_transcript, Flow};
use error::ChatError;
use services::chat_service::{ChatController, ChatInput};
use services::config_service::{get_config_path, get_effective_config, save_overrides};
use services::conversation_service::ConversationStore;
use services::llm_client::LlmClient;
use services::storage_service::{FileStore, KeyValueStore, MemoryStore, SessionStorage};
use terminal::TerminalView;

pub use error::{ChatResult, StorageError};

pub fn run() -> Result<(), ChatError> {
    let cli = Cli::parse();

    let directives = std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(&directives))
        .with_writer(std::io::stderr)
        .init();

    // One exchange at a time; a single-threaded runtime is all the REPL needs
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(session(cli))
}

/// `RUST_LOG`-style directives, falling back to `warn` when none are given
fn log_filter(directives: &str) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .parse_lossy(directives)
}

async fn session(cli: Cli) -> Result<(), ChatError> {
    let config_path = match (&cli.config, &cli.data_dir) {
        (Some(path), _) => path.clone(),
        (None, Some(dir)) => dir.join("config.json"),
        (None, None) => get_config_path()?,
    };

    let overrides = cli.overrides();
    if cli.save_config {
        save_overrides(&config_path, overrides.clone())?;
        info!("Saved settings to {}", config_path.display());
    }
    let client_config = get_effective_config(&config_path, overrides)?;

    let store: Box<dyn KeyValueStore> = if cli.ephemeral {
        Box::new(MemoryStore::new())
    } else if let Some(dir) = &cli.data_dir {
        Box::new(FileStore::new(dir.join("storage")))
    } else {
        Box::new(FileStore::in_app_data_dir()?)
    };

    let conversations = ConversationStore::open(SessionStorage::new(store));
    let client = LlmClient::new(client_config)?;
    debug!("Using endpoint {}", client.completions_url());

    let mut controller = ChatController::new(conversations, client, Box::new(TerminalView::new()));
    let mut input = ChatInput::default();

    print_help();
    print_transcript(controller.messages());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let Some(command) = parse_command(&line) else {
            continue;
        };

        match dispatch(command, &mut controller, &mut input).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("error: {}", e),
        }
    }

    Ok(())
}
