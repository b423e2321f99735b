//! Client side of the platform's direct-message channel.
//!
//! A [`DirectChatClient`] owns a registry of live channels keyed by the
//! unordered pair of participants, forwards inbound envelopes to a
//! [`ChannelSink`], and reopens a channel after abnormal closure.

mod client;
pub mod endpoint;
pub mod error;
pub mod sink;
pub mod transport;

pub use client::{ChannelHandle, ConnectionState, DirectChatClient, DEFAULT_RECONNECT_DELAY};
pub use endpoint::Endpoint;
pub use error::DirectChatError;
pub use sink::{
    ChannelEvent, ChannelSink, RenderedMessage, Transcript, TranscriptEntry, PRIVACY_NOTICE,
};
pub use transport::{TransportConnector, WsConnector};
