/// Live reload wire messages
///
/// Encoded as JSON: `{"type": "change", "uid": "...", "src": "..."}`

use serde::{Deserialize, Serialize};

/// New processed source for one file identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// File identity, the same string used at build time
    pub uid: String,

    /// Processed source
    pub src: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LiveMessage {
    Change(ChangeEvent),
}

impl LiveMessage {
    pub fn change(uid: impl Into<String>, src: impl Into<String>) -> Self {
        LiveMessage::Change(ChangeEvent {
            uid: uid.into(),
            src: src.into(),
        })
    }

    /// Local event key the live client re-emits this message under.
    pub fn event_key(&self) -> String {
        match self {
            LiveMessage::Change(event) => change_key(&event.uid),
        }
    }
}

/// `change:<uid>`
pub fn change_key(uid: &str) -> String {
    format!("change:{}", uid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let message = LiveMessage::change("test/fixtures/basic/source.html", "<div>X</div>");
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "change",
                "uid": "test/fixtures/basic/source.html",
                "src": "<div>X</div>"
            })
        );
    }

    #[test]
    fn test_decode_and_event_key() {
        let raw = br#"{"type":"change","uid":"a.html","src":"<p></p>"}"#;
        let message: LiveMessage = serde_json::from_slice(raw).unwrap();
        assert_eq!(message, LiveMessage::change("a.html", "<p></p>"));
        assert_eq!(message.event_key(), "change:a.html");
    }

    #[test]
    fn test_unknown_type_rejected() {
        let raw = br#"{"type":"reload","uid":"a.html","src":""}"#;
        assert!(serde_json::from_slice::<LiveMessage>(raw).is_err());
    }
}
