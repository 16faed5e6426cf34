use serde::{Deserialize, Serialize};

/// Fallback sender name for frames that omit one.
pub const ANONYMOUS: &str = "Anonymous";

/// One inbound WebSocket frame as clients send it. Every field is
/// optional; fields other than these three are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct InboundFrame {
    pub sender: Option<String>,
    pub content: Option<String>,
    pub timestamp: Option<String>,
}

/// The canonical chat message: exactly the three fields fanned out to
/// every connected client, no matter what else the sender included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: String,
}

impl ChatMessage {
    /// Decode a raw frame and normalize it. An absent or empty `sender`
    /// becomes "Anonymous"; absent `content` and `timestamp` become
    /// empty strings. The timestamp is passed through verbatim — the
    /// broadcast path never assigns one.
    pub fn from_frame(raw: &str) -> Result<Self, serde_json::Error> {
        let frame: InboundFrame = serde_json::from_str(raw)?;
        Ok(Self::from(frame))
    }

    /// Serialize to the outbound wire payload.
    pub fn to_payload(&self) -> String {
        // Three plain string fields; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<InboundFrame> for ChatMessage {
    fn from(frame: InboundFrame) -> Self {
        Self {
            sender: match frame.sender {
                Some(s) if !s.is_empty() => s,
                _ => ANONYMOUS.to_owned(),
            },
            content: frame.content.unwrap_or_default(),
            timestamp: frame.timestamp.unwrap_or_default(),
        }
    }
}
