use std::error::Error;
use std::io::Write;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rust_room_chat::config;
use rust_room_chat::error::PreconditionError;
use rust_room_chat::history::{HistoryPaginator, RestClient};
use rust_room_chat::ui::{ChatView, RoomTarget};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(
    name = "rust_room_chat",
    version,
    about = "Terminal client for room-based real-time chat"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Display name shown to other participants
    #[arg(long, env = "CHAT_NAME")]
    name: Option<String>,
    #[command(subcommand)]
    room: Option<RoomCommand>,
}

#[derive(Subcommand, Clone, PartialEq, Eq)]
enum RoomCommand {
    /// Join an existing room by its code
    Join { code: String },
    /// Create a room and join it
    Create { name: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let app_config = config::load_config(&cli.config).apply_env_overrides();
    let mut input = BufReader::new(tokio::io::stdin());

    let identity = match cli.name {
        Some(name) => name,
        None => prompt_display_name(&mut input).await?,
    };
    let identity = identity.trim().to_string();
    if identity.is_empty() {
        return Err(PreconditionError::MissingIdentity.into());
    }

    let rest = Arc::new(RestClient::new(&app_config.api_base_url)?);
    let paginator = HistoryPaginator::new(rest.clone(), app_config.page_size);
    log::info!(
        "Client started against {} / {} as {identity}",
        app_config.api_base_url,
        app_config.ws_url
    );

    let target = cli.room.map(|room| match room {
        RoomCommand::Join { code } => RoomTarget::Join(code),
        RoomCommand::Create { name } => RoomTarget::Create(name),
    });

    ChatView::new(&app_config, identity, rest, paginator)
        .run(target, input)
        .await;
    Ok(())
}

async fn prompt_display_name<R>(input: &mut R) -> Result<String, Box<dyn Error>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    print!("Display name: ");
    std::io::stdout().flush()?;
    let mut name = String::new();
    input.read_line(&mut name).await?;
    Ok(name)
}
