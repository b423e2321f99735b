use shared::domain::ParticipantId;
use url::Url;

use crate::error::DirectChatError;

/// Base address of the direct-chat WebSocket route, derived from the origin
/// the hosting page was served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    base: Url,
}

impl Endpoint {
    pub fn from_page_origin(origin: &str) -> Result<Self, DirectChatError> {
        let invalid = |reason: &str| DirectChatError::InvalidOrigin {
            origin: origin.to_string(),
            reason: reason.to_string(),
        };

        let mut base = Url::parse(origin.trim()).map_err(|err| invalid(&err.to_string()))?;
        let scheme = match base.scheme() {
            "https" => "wss",
            "http" => "ws",
            _ => return Err(invalid("origin must start with http:// or https://")),
        };
        if base.host_str().is_none() {
            return Err(invalid("origin has no host"));
        }
        base.set_scheme(scheme)
            .map_err(|()| invalid("cannot switch origin to a websocket scheme"))?;
        base.set_path("");
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self { base })
    }

    pub fn is_secure(&self) -> bool {
        self.base.scheme() == "wss"
    }

    /// `{ws|wss}://{host}/ws/direct-chat/{self_id}/{peer_id}/`
    pub fn url_for(&self, self_id: &ParticipantId, peer_id: &ParticipantId) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .clear()
                .extend(["ws", "direct-chat", self_id.as_str(), peer_id.as_str(), ""]);
        }
        url
    }
}

#[cfg(test)]
#[path = "tests/endpoint_tests.rs"]
mod tests;
