//! Messages pushed to hot-reload clients.

use serde::{Deserialize, Serialize};

/// WebSocket endpoint the embedded client connects to.
pub const HMR_PATH: &str = "/__kiln_hmr";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HmrMessage {
    /// Sent once when a client connects.
    Connected,
    /// Output files whose content hash changed.
    Update { chunks: Vec<String> },
    /// The last rebuild failed; the previous output is still served.
    Error { message: String },
    /// Something changed that cannot be patched (e.g. the config file).
    Reload,
}

impl HmrMessage {
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(HmrMessage::Connected.to_json(), r#"{"type":"connected"}"#);
        assert_eq!(
            HmrMessage::Update {
                chunks: vec!["main.1a2b3c4d.js".to_string()]
            }
            .to_json(),
            r#"{"type":"update","chunks":["main.1a2b3c4d.js"]}"#
        );
        assert_eq!(
            HmrMessage::Error {
                message: "boom".to_string()
            }
            .to_json(),
            r#"{"type":"error","message":"boom"}"#
        );
    }

    #[test]
    fn test_parse() {
        let msg: HmrMessage = serde_json::from_str(r#"{"type":"reload"}"#).unwrap();
        assert_eq!(msg, HmrMessage::Reload);
    }
}
