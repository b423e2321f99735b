use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id_newtype!(ParticipantId);
string_id_newtype!(ChannelIdentity);

impl ParticipantId {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// User ids arrive as JSON strings or integers depending on the endpoint.
impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum WireId {
            Text(String),
            Integer(i64),
        }

        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(text) => Self(text),
            WireId::Integer(value) => Self(value.to_string()),
        })
    }
}

impl<'de> Deserialize<'de> for ChannelIdentity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self)
    }
}

impl ChannelIdentity {
    /// Key shared by both ends of a conversation: the two identifiers in
    /// byte order, concatenated.
    pub fn for_pair(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let mut key = String::with_capacity(first.0.len() + second.0.len());
        key.push_str(&first.0);
        key.push_str(&second.0);
        Self(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

impl Direction {
    pub fn for_sender(sender_id: &ParticipantId, self_id: &ParticipantId) -> Self {
        if sender_id == self_id {
            Self::Outgoing
        } else {
            Self::Incoming
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
