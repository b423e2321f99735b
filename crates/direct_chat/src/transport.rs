use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{
    net::TcpStream,
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    Text(String),
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    /// Non-fatal transmission problem. The connection may still be usable.
    Error(String),
    /// Always the last event of a link.
    Closed { clean: bool },
}

/// An established connection: commands go out, events come back in the
/// order the transport delivered them.
#[derive(Debug)]
pub struct TransportLink {
    pub commands: UnboundedSender<TransportCommand>,
    pub events: UnboundedReceiver<TransportEvent>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect websocket {url}: {reason}")]
    Connect { url: String, reason: String },
}

#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError>;
}

/// WebSocket transport backed by tokio-tungstenite.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<TransportLink, TransportError> {
        let (ws_stream, _) =
            connect_async(url.as_str())
                .await
                .map_err(|err| TransportError::Connect {
                    url: url.to_string(),
                    reason: err.to_string(),
                })?;
        info!(%url, "dm: websocket connected");

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        tokio::spawn(pump_websocket(ws_stream, commands_rx, events_tx));

        Ok(TransportLink { commands, events })
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn pump_websocket(
    mut ws: WsStream,
    mut commands: UnboundedReceiver<TransportCommand>,
    events: UnboundedSender<TransportEvent>,
) {
    let mut close_frame_seen = false;
    let mut commands_open = true;

    let clean = loop {
        tokio::select! {
            command = commands.recv(), if commands_open => match command {
                Some(TransportCommand::Text(text)) => {
                    if let Err(err) = ws.send(Message::Text(text)).await {
                        let _ = events.send(TransportEvent::Error(format!(
                            "websocket send failed: {err}"
                        )));
                    }
                }
                Some(TransportCommand::Close) | None => {
                    commands_open = false;
                    if let Err(err) = ws.close(None).await {
                        let _ = events.send(TransportEvent::Error(format!(
                            "websocket close failed: {err}"
                        )));
                    }
                }
            },
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let _ = events.send(TransportEvent::Text(text));
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "dm: close frame received");
                    close_frame_seen = true;
                }
                Some(Ok(_)) => {}
                Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => break true,
                Some(Err(err)) => {
                    let _ = events.send(TransportEvent::Error(format!(
                        "websocket receive failed: {err}"
                    )));
                    break false;
                }
                None => break close_frame_seen,
            },
        }
    };

    let _ = events.send(TransportEvent::Closed { clean });
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
