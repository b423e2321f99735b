use std::sync::{Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{Direction, ParticipantId},
    protocol::Timestamp,
};
use tokio::sync::{broadcast, mpsc};

/// Shown above the replayed history every time it is rendered.
pub const PRIVACY_NOTICE: &str =
    "Messages in this conversation are only visible to you and the other participant.";

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMessage {
    pub direction: Direction,
    pub sender_id: ParticipantId,
    pub body: String,
    pub timestamp: Timestamp,
}

impl RenderedMessage {
    pub fn new(
        self_id: &ParticipantId,
        sender_id: ParticipantId,
        body: String,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            direction: Direction::for_sender(&sender_id, self_id),
            sender_id,
            body,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    Disconnected,
    /// Discard everything rendered so far; a full history replay follows.
    Reset,
    PrivacyNotice,
    Message(RenderedMessage),
}

/// Receiver of one channel's events. The same sink survives reconnects.
pub trait ChannelSink: Send + Sync {
    fn deliver(&self, event: ChannelEvent);
}

impl ChannelSink for mpsc::UnboundedSender<ChannelEvent> {
    fn deliver(&self, event: ChannelEvent) {
        let _ = self.send(event);
    }
}

impl ChannelSink for broadcast::Sender<ChannelEvent> {
    fn deliver(&self, event: ChannelEvent) {
        let _ = self.send(event);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptEntry {
    Notice(String),
    Message(RenderedMessage),
}

#[derive(Debug, Default)]
struct TranscriptState {
    connected: bool,
    entries: Vec<TranscriptEntry>,
}

/// In-memory chat box: the rendered state a page would keep for a
/// conversation.
#[derive(Debug, Default)]
pub struct Transcript {
    state: Mutex<TranscriptState>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().connected
    }

    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().entries.clone()
    }

    pub fn render_lines(&self) -> Vec<String> {
        self.lock().entries.iter().map(render_entry).collect()
    }

    fn lock(&self) -> MutexGuard<'_, TranscriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ChannelSink for Transcript {
    fn deliver(&self, event: ChannelEvent) {
        let mut state = self.lock();
        match event {
            ChannelEvent::Connected => state.connected = true,
            ChannelEvent::Disconnected => state.connected = false,
            ChannelEvent::Reset => state.entries.clear(),
            ChannelEvent::PrivacyNotice => state
                .entries
                .push(TranscriptEntry::Notice(PRIVACY_NOTICE.to_string())),
            ChannelEvent::Message(message) => state.entries.push(TranscriptEntry::Message(message)),
        }
    }
}

pub fn render_entry(entry: &TranscriptEntry) -> String {
    match entry {
        TranscriptEntry::Notice(text) => format!("-- {text} --"),
        TranscriptEntry::Message(message) => render_message(message),
    }
}

pub fn render_message(message: &RenderedMessage) -> String {
    let who = match message.direction {
        Direction::Outgoing => "you".to_string(),
        Direction::Incoming => message.sender_id.to_string(),
    };
    let at = message.timestamp.to_string();
    if at.is_empty() {
        format!("{who}: {}", message.body)
    } else {
        format!("[{at}] {who}: {}", message.body)
    }
}

#[cfg(test)]
#[path = "tests/sink_tests.rs"]
mod tests;
