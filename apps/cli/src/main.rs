use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use direct_chat::{
    sink::render_message, ChannelEvent, ChannelSink, DirectChatClient, Endpoint, WsConnector,
    PRIVACY_NOTICE,
};
use shared::domain::ParticipantId;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, DEFAULT_CONFIG_PATH};

#[derive(Parser, Debug)]
#[command(name = "direct-chat", about = "Terminal client for a direct-message channel")]
struct Args {
    #[arg(long)]
    self_id: String,
    #[arg(long)]
    peer_id: String,
    /// Origin the chat page would be served from, e.g. https://learn.example.org
    #[arg(long)]
    origin: Option<String>,
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

/// Prints channel events to stdout as they arrive.
struct ConsoleSink;

impl ChannelSink for ConsoleSink {
    fn deliver(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => println!("* connected"),
            ChannelEvent::Disconnected => println!("* disconnected, reconnecting shortly"),
            ChannelEvent::Reset => println!("----------------------------------------"),
            ChannelEvent::PrivacyNotice => println!("-- {PRIVACY_NOTICE} --"),
            ChannelEvent::Message(message) => println!("{}", render_message(&message)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config);
    if let Some(origin) = args.origin {
        settings.page_origin = origin;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let endpoint = Endpoint::from_page_origin(&settings.page_origin)
        .with_context(|| format!("invalid page origin: {}", settings.page_origin))?;
    let client = DirectChatClient::new_with_dependencies(
        endpoint,
        Arc::new(WsConnector),
        settings.reconnect_delay,
    );

    let self_id = ParticipantId::new(args.self_id);
    let peer_id = ParticipantId::new(args.peer_id);
    client
        .open(&self_id, &peer_id, Arc::new(ConsoleSink))
        .context("failed to open direct chat channel")?;
    info!(%self_id, %peer_id, "cli: type a message and press enter; ctrl-d to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                let body = line.trim();
                if body.is_empty() {
                    continue;
                }
                // Reconnects replace the handle, so look it up per message.
                let sent = client
                    .handle(&self_id, &peer_id)
                    .is_some_and(|handle| handle.send(body));
                if !sent {
                    eprintln!("! not connected, message not sent");
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    client.close(&self_id, &peer_id);
    info!("cli: channel closed");
    Ok(())
}
