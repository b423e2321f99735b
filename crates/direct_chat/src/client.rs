use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError, Weak,
    },
    time::Duration,
};

use shared::{
    domain::{ChannelIdentity, ParticipantId},
    protocol::{InboundEnvelope, OutboundEnvelope},
};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    endpoint::Endpoint,
    error::DirectChatError,
    sink::{ChannelEvent, ChannelSink, RenderedMessage},
    transport::{TransportCommand, TransportConnector, TransportEvent, TransportLink, WsConnector},
};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

struct LinkSlot {
    state: ConnectionState,
    commands: Option<UnboundedSender<TransportCommand>>,
}

struct HandleInner {
    identity: ChannelIdentity,
    self_id: ParticipantId,
    peer_id: ParticipantId,
    link: Mutex<LinkSlot>,
    close_requested: AtomicBool,
}

/// One connection attempt for a pair of participants. Cloning shares the
/// same underlying connection.
#[derive(Clone)]
pub struct ChannelHandle {
    inner: Arc<HandleInner>,
}

impl std::fmt::Debug for ChannelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelHandle")
            .field("identity", &self.inner.identity)
            .field("state", &self.state())
            .finish()
    }
}

impl ChannelHandle {
    fn new(identity: ChannelIdentity, self_id: ParticipantId, peer_id: ParticipantId) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                identity,
                self_id,
                peer_id,
                link: Mutex::new(LinkSlot {
                    state: ConnectionState::Connecting,
                    commands: None,
                }),
                close_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn identity(&self) -> &ChannelIdentity {
        &self.inner.identity
    }

    pub fn self_id(&self) -> &ParticipantId {
        &self.inner.self_id
    }

    pub fn peer_id(&self) -> &ParticipantId {
        &self.inner.peer_id
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner.link).state
    }

    /// True when both handles refer to the same underlying connection.
    pub fn same_channel(&self, other: &ChannelHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queues a chat message. Returns false, without sending anything, unless
    /// the connection is open.
    pub fn send(&self, body: &str) -> bool {
        let slot = lock(&self.inner.link);
        let commands = match (&slot.state, &slot.commands) {
            (ConnectionState::Open, Some(commands)) => commands,
            _ => {
                debug!(channel = %self.inner.identity, state = ?slot.state, "dm: send rejected, channel not open");
                return false;
            }
        };

        let text = match OutboundEnvelope::message(body).encode() {
            Ok(text) => text,
            Err(err) => {
                warn!(channel = %self.inner.identity, error = %err, "dm: send failed");
                return false;
            }
        };

        if commands.send(TransportCommand::Text(text)).is_err() {
            warn!(channel = %self.inner.identity, "dm: send failed, transport gone");
            return false;
        }
        true
    }

    fn close_requested(&self) -> bool {
        self.inner.close_requested.load(Ordering::SeqCst)
    }

    /// The flag is raised before the transport is asked to close, so the
    /// resulting closure event never schedules a reconnect.
    fn request_close(&self) {
        self.inner.close_requested.store(true, Ordering::SeqCst);
        let slot = lock(&self.inner.link);
        if let Some(commands) = &slot.commands {
            let _ = commands.send(TransportCommand::Close);
        }
    }

    /// Returns false when the caller closed the channel while it was still
    /// connecting; the link is told to close instead.
    fn mark_open(&self, commands: UnboundedSender<TransportCommand>) -> bool {
        let mut slot = lock(&self.inner.link);
        if self.close_requested() {
            let _ = commands.send(TransportCommand::Close);
            return false;
        }
        slot.state = ConnectionState::Open;
        slot.commands = Some(commands);
        true
    }

    fn mark_closed(&self) {
        let mut slot = lock(&self.inner.link);
        slot.state = ConnectionState::Closed;
        slot.commands = None;
    }
}

struct PendingReconnect {
    token: u64,
    task: JoinHandle<()>,
}

pub struct DirectChatClient {
    endpoint: Endpoint,
    connector: Arc<dyn TransportConnector>,
    reconnect_delay: Duration,
    registry: Mutex<HashMap<ChannelIdentity, ChannelHandle>>,
    pending_reconnects: Mutex<HashMap<ChannelIdentity, PendingReconnect>>,
    next_reconnect_token: AtomicU64,
}

impl DirectChatClient {
    pub fn new(endpoint: Endpoint) -> Arc<Self> {
        Self::new_with_connector(endpoint, Arc::new(WsConnector))
    }

    pub fn new_with_connector(
        endpoint: Endpoint,
        connector: Arc<dyn TransportConnector>,
    ) -> Arc<Self> {
        Self::new_with_dependencies(endpoint, connector, DEFAULT_RECONNECT_DELAY)
    }

    pub fn new_with_dependencies(
        endpoint: Endpoint,
        connector: Arc<dyn TransportConnector>,
        reconnect_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            endpoint,
            connector,
            reconnect_delay,
            registry: Mutex::new(HashMap::new()),
            pending_reconnects: Mutex::new(HashMap::new()),
            next_reconnect_token: AtomicU64::new(0),
        })
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    /// Returns the live handle for the pair, or starts a new connection and
    /// returns its handle before the connection is established.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        self: &Arc<Self>,
        self_id: &ParticipantId,
        peer_id: &ParticipantId,
        sink: Arc<dyn ChannelSink>,
    ) -> Result<ChannelHandle, DirectChatError> {
        validate_participants(self_id, peer_id)?;
        let identity = ChannelIdentity::for_pair(self_id, peer_id);

        let handle = {
            let mut registry = lock(&self.registry);
            if let Some(existing) = registry.get(&identity) {
                debug!(channel = %identity, "dm: reusing registered channel");
                return Ok(existing.clone());
            }
            let handle = ChannelHandle::new(identity.clone(), self_id.clone(), peer_id.clone());
            registry.insert(identity.clone(), handle.clone());
            handle
        };

        let url = self.endpoint.url_for(self_id, peer_id);
        info!(channel = %identity, %url, "dm: opening channel");
        tokio::spawn(drive_channel(
            Arc::downgrade(self),
            Arc::clone(&self.connector),
            handle.clone(),
            url,
            sink,
        ));

        Ok(handle)
    }

    /// Caller-initiated close. Never followed by a reconnect.
    pub fn close(&self, self_id: &ParticipantId, peer_id: &ParticipantId) {
        let identity = ChannelIdentity::for_pair(self_id, peer_id);

        if let Some(pending) = lock(&self.pending_reconnects).remove(&identity) {
            pending.task.abort();
            debug!(channel = %identity, "dm: pending reconnect cancelled");
        }

        let removed = lock(&self.registry).remove(&identity);
        if let Some(handle) = removed {
            info!(channel = %identity, "dm: closing channel");
            handle.request_close();
        }
    }

    pub fn handle(&self, self_id: &ParticipantId, peer_id: &ParticipantId) -> Option<ChannelHandle> {
        let identity = ChannelIdentity::for_pair(self_id, peer_id);
        lock(&self.registry).get(&identity).cloned()
    }

    pub fn is_registered(&self, self_id: &ParticipantId, peer_id: &ParticipantId) -> bool {
        self.handle(self_id, peer_id).is_some()
    }

    pub fn channel_count(&self) -> usize {
        lock(&self.registry).len()
    }

    fn deregister(&self, handle: &ChannelHandle) {
        let mut registry = lock(&self.registry);
        if registry
            .get(handle.identity())
            .is_some_and(|registered| registered.same_channel(handle))
        {
            registry.remove(handle.identity());
        }
    }

    fn on_closed(self: &Arc<Self>, handle: &ChannelHandle, clean: bool, sink: Arc<dyn ChannelSink>) {
        handle.mark_closed();
        let identity = handle.identity();

        if handle.close_requested() {
            info!(channel = %identity, "dm: channel closed by caller");
            return;
        }

        self.deregister(handle);
        if clean {
            info!(channel = %identity, "dm: channel closed cleanly");
            return;
        }

        warn!(
            channel = %identity,
            delay_ms = self.reconnect_delay.as_millis() as u64,
            "dm: channel closed abnormally, reconnecting"
        );
        self.schedule_reconnect(handle, Arc::clone(&sink));
        sink.deliver(ChannelEvent::Disconnected);
    }

    fn schedule_reconnect(self: &Arc<Self>, handle: &ChannelHandle, sink: Arc<dyn ChannelSink>) {
        let client = Arc::downgrade(self);
        let identity = handle.identity().clone();
        let self_id = handle.self_id().clone();
        let peer_id = handle.peer_id().clone();
        let delay = self.reconnect_delay;
        let token = self.next_reconnect_token.fetch_add(1, Ordering::Relaxed);

        // Spawned under the lock so the entry exists before the task can look for it.
        let mut pending = lock(&self.pending_reconnects);
        let task_identity = identity.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(client) = client.upgrade() {
                client.fire_reconnect(&task_identity, token, &self_id, &peer_id, sink);
            }
        });

        if let Some(previous) = pending.insert(identity, PendingReconnect { token, task }) {
            previous.task.abort();
        }
    }

    /// Reopens the channel unless `close` cancelled this reconnect first. The
    /// pending-reconnect lock is held across `open`, so a concurrent `close`
    /// either removes the entry before this runs or finds the reopened handle
    /// in the registry.
    fn fire_reconnect(
        self: &Arc<Self>,
        identity: &ChannelIdentity,
        token: u64,
        self_id: &ParticipantId,
        peer_id: &ParticipantId,
        sink: Arc<dyn ChannelSink>,
    ) {
        let mut pending = lock(&self.pending_reconnects);
        match pending.get(identity) {
            Some(entry) if entry.token == token => {
                pending.remove(identity);
            }
            _ => {
                debug!(channel = %identity, "dm: reconnect cancelled or superseded");
                return;
            }
        }

        if let Err(err) = self.open(self_id, peer_id, sink) {
            warn!(channel = %identity, error = %err, "dm: reconnect failed");
        }
    }
}

fn validate_participants(
    self_id: &ParticipantId,
    peer_id: &ParticipantId,
) -> Result<(), DirectChatError> {
    if self_id.is_empty() {
        return Err(DirectChatError::EmptyParticipantId { role: "self" });
    }
    if peer_id.is_empty() {
        return Err(DirectChatError::EmptyParticipantId { role: "peer" });
    }
    Ok(())
}

async fn drive_channel(
    client: Weak<DirectChatClient>,
    connector: Arc<dyn TransportConnector>,
    handle: ChannelHandle,
    url: Url,
    sink: Arc<dyn ChannelSink>,
) {
    let clean = match connector.connect(&url).await {
        Ok(link) => run_link(&handle, link, sink.as_ref()).await,
        Err(err) => {
            warn!(channel = %handle.identity(), error = %err, "dm: connection attempt failed");
            false
        }
    };

    match client.upgrade() {
        Some(client) => client.on_closed(&handle, clean, sink),
        None => handle.mark_closed(),
    }
}

/// Pumps one established link until it closes and reports whether the
/// closure was clean.
async fn run_link(handle: &ChannelHandle, link: TransportLink, sink: &dyn ChannelSink) -> bool {
    let TransportLink {
        commands,
        mut events,
    } = link;

    if !handle.mark_open(commands) {
        return true;
    }
    info!(channel = %handle.identity(), "dm: channel connected");
    sink.deliver(ChannelEvent::Connected);

    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::Text(text) => {
                if handle.close_requested() {
                    continue;
                }
                dispatch_frame(handle, &text, sink);
            }
            TransportEvent::Error(reason) => {
                warn!(channel = %handle.identity(), %reason, "dm: transport error");
            }
            TransportEvent::Closed { clean } => return clean,
        }
    }
    false
}

fn dispatch_frame(handle: &ChannelHandle, text: &str, sink: &dyn ChannelSink) {
    let envelope = match InboundEnvelope::decode(text) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!(channel = %handle.identity(), error = %err, "dm: dropping malformed frame");
            return;
        }
    };

    match envelope {
        InboundEnvelope::Message {
            sender_id,
            message,
            timestamp,
        } => sink.deliver(ChannelEvent::Message(RenderedMessage::new(
            handle.self_id(),
            sender_id,
            message,
            timestamp,
        ))),
        InboundEnvelope::History { messages } => {
            debug!(channel = %handle.identity(), count = messages.len(), "dm: history replay");
            sink.deliver(ChannelEvent::Reset);
            sink.deliver(ChannelEvent::PrivacyNotice);
            for entry in messages {
                sink.deliver(ChannelEvent::Message(RenderedMessage::new(
                    handle.self_id(),
                    entry.sender_id,
                    entry.content,
                    entry.timestamp,
                )));
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/client_tests.rs"]
mod tests;
