use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;

mod ask;
mod config;
mod guest;
mod lead;
mod render;
mod session;
mod suggestions;

use crate::config::{
    CliOverrides, ConfigError, ConnectionConfig, FileConfig, WidgetConfig, WidgetPaths,
};
use crate::session::WidgetSession;

#[derive(Parser)]
#[command(name = "chat-widget")]
#[command(about = "Chat with a real-estate project's AI agent from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.chat-widget)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Page the widget is mounted on; selects project-specific questions
    #[arg(long, global = true)]
    page_url: Option<String>,

    /// Chat WebSocket endpoint (ws:// or wss://)
    #[arg(long, global = true)]
    chat_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Ask a single question and print the reply
    Ask(AskArgs),
}

#[derive(Parser)]
struct AskArgs {
    /// The question to send
    question: String,
}

fn init_tracing(debug: bool) {
    let default_directive = if debug {
        "chat_widget=debug,chat_socket=debug,chat_protocol=debug"
    } else {
        "chat_widget=info,chat_socket=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    // stdout carries the conversation.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let paths = WidgetPaths::new(cli.data_dir.clone())?;
    let overrides = CliOverrides {
        page_url: cli.page_url.clone(),
        chat_url: cli.chat_url.clone(),
    };
    let file_config: FileConfig = overrides
        .apply(config::load_config(&paths.data_dir))
        .extract()
        .context("Failed to load configuration")?;

    let widget = WidgetConfig::from_file(&file_config.widget).map_err(|e| match e {
        ConfigError::Missing(_) => anyhow::anyhow!(
            "{e} (set it in {} or via WIDGET_WIDGET__* env vars)",
            paths.config_toml_path().display()
        ),
    })?;
    let connection = ConnectionConfig::from_file(&file_config.connection);
    let guest_id = guest::load_or_create(&paths.guest_id_path())?;
    let questions = suggestions::questions_for_page(&file_config.questions, &widget.page_url);

    info!(
        agent_key = %widget.agent_key,
        chat_url = %widget.chat_url,
        "starting chat widget"
    );

    let (session, events) =
        WidgetSession::connect(widget, connection, questions, guest_id, std::io::stdout());

    match cli.command {
        None | Some(Commands::Chat) => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            session::run(session, events, stdin).await
        }
        Some(Commands::Ask(args)) => ask::ask(session, events, &args.question).await,
    }
}
