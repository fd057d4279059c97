use serde::{Deserialize, Serialize};

/// Server-to-operator messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Status { message: String },
    Question { request_id: String, question: String },
}

impl OutboundMessage {
    pub fn to_json(&self) -> String {
        // Serializing a tagged enum of strings cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Operator-to-server messages.
///
/// Clients that predate request ids send bare text, see [`InboundMessage::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Answer { request_id: String, answer: String },
    #[serde(skip)]
    Text(String),
}

impl InboundMessage {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| InboundMessage::Text(raw.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_shapes() {
        let status = OutboundMessage::Status {
            message: "Task paused".into(),
        };
        let v: serde_json::Value = serde_json::from_str(&status.to_json()).unwrap();
        assert_eq!(v["type"], "status");
        assert_eq!(v["message"], "Task paused");

        let question = OutboundMessage::Question {
            request_id: "r1".into(),
            question: "confirm?".into(),
        };
        let v: serde_json::Value = serde_json::from_str(&question.to_json()).unwrap();
        assert_eq!(v["type"], "question");
        assert_eq!(v["request_id"], "r1");
    }

    #[test]
    fn test_inbound_falls_back_to_text() {
        assert_eq!(
            InboundMessage::parse(r#"{"type":"answer","request_id":"r1","answer":"yes"}"#),
            InboundMessage::Answer {
                request_id: "r1".into(),
                answer: "yes".into()
            }
        );
        assert_eq!(InboundMessage::parse(" yes \n"), InboundMessage::Text("yes".into()));
        assert_eq!(
            InboundMessage::parse(r#"{"foo":1}"#),
            InboundMessage::Text(r#"{"foo":1}"#.into())
        );
    }
}
