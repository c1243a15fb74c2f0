use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::participant::ParticipantStatus;

/// One message on an agent run's event channel.
///
/// The wire form is a JSON object tagged by `type`. Types this client does
/// not know decode to [`StreamEvent::Unknown`] and are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        #[serde(default)]
        status: Option<ParticipantStatus>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    Log {
        #[serde(default)]
        message: Option<String>,
    },
    Error {
        #[serde(default)]
        message: Option<String>,
    },
    Result {
        #[serde(default, deserialize_with = "text_or_json")]
        result: Option<String>,
    },
    LiveUrl {
        #[serde(default)]
        url: Option<String>,
    },
    Complete,
    Message {
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// Decode the data of one SSE frame.
    ///
    /// When the JSON object carries no `type`, the frame's event name is
    /// used instead (`message` when the frame had none either).
    pub fn decode(event_name: Option<&str>, data: &str) -> Result<Self, serde_json::Error> {
        let mut value: Value = serde_json::from_str(data)?;
        if let Value::Object(map) = &mut value {
            if !map.contains_key("type") {
                let name = event_name.filter(|n| !n.is_empty()).unwrap_or("message");
                map.insert("type".to_string(), Value::String(name.to_string()));
            }
        }
        serde_json::from_value(value)
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::Status { .. } => "status",
            StreamEvent::Log { .. } => "log",
            StreamEvent::Error { .. } => "error",
            StreamEvent::Result { .. } => "result",
            StreamEvent::LiveUrl { .. } => "live_url",
            StreamEvent::Complete => "complete",
            StreamEvent::Message { .. } => "message",
            StreamEvent::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Complete)
    }

    pub fn status(status: impl Into<ParticipantStatus>) -> Self {
        StreamEvent::Status {
            status: Some(status.into()),
            message: None,
        }
    }

    pub fn log(message: impl Into<String>) -> Self {
        StreamEvent::Log {
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: Some(message.into()),
        }
    }

    pub fn result(result: impl Into<String>) -> Self {
        StreamEvent::Result {
            result: Some(result.into()),
        }
    }

    pub fn live_url(url: impl Into<String>) -> Self {
        StreamEvent::LiveUrl {
            url: Some(url.into()),
        }
    }
}

// Agent results are usually strings, but a structured result is kept as its
// JSON text rather than failing the whole event.
fn text_or_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text),
        Some(other) => Some(other.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_uses_event_name_when_type_missing() {
        let event = StreamEvent::decode(Some("live_url"), r#"{"url": "https://live.browser-use.com/x"}"#)
            .unwrap();
        assert_eq!(event, StreamEvent::live_url("https://live.browser-use.com/x"));
    }

    #[test]
    fn test_decode_unknown_type() {
        let event = StreamEvent::decode(None, r#"{"type": "heartbeat", "n": 3}"#).unwrap();
        assert_eq!(event, StreamEvent::Unknown);
    }

    #[test]
    fn test_decode_complete_with_extra_fields() {
        let event = StreamEvent::decode(Some("complete"), r#"{"type": "complete", "at": 1}"#).unwrap();
        assert!(event.is_terminal());
    }

    #[test]
    fn test_structured_result_kept_as_json_text() {
        let event = StreamEvent::decode(None, r#"{"type": "result", "result": {"answer": 42}}"#).unwrap();
        assert_eq!(event, StreamEvent::result(r#"{"answer":42}"#));
    }

    #[test]
    fn test_status_ignores_extra_fields() {
        let event =
            StreamEvent::decode(None, r#"{"type": "status", "status": "starting", "task": "find it"}"#)
                .unwrap();
        assert_eq!(event, StreamEvent::status("starting"));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(StreamEvent::decode(Some("log"), "not json").is_err());
    }
}
