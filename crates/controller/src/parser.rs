//! Parser module for LLM response parsing.
//!
//! Extracts an [`AgentAction`] from raw LLM text. Recognised forms, checked
//! in this order:
//!
//! ```text
//! FINAL ANSWER: <text>
//! ASK HUMAN: <question>
//! ACTION: {"action": "navigate", "url": "https://..."}
//! ACTION: click
//! ARGS: {"selector": "#submit"}
//! {"action": "go_back"}
//! ```
//!
//! Anything else is a thought.

use browzee_core::types::{AgentAction, BrowserAction};
use serde_json::Value;

/// Parsed LLM turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    Action(AgentAction),
    /// No actionable instruction. Carries the reason when an action was
    /// attempted but malformed.
    Think { thought: String, error: Option<String> },
}

/// Parser for LLM responses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ActionParser;

impl ActionParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse an LLM response into a structured action.
    pub fn parse(&self, response: &str) -> ParsedResponse {
        let response_trimmed = response.trim();

        if let Some(answer) = Self::tagged_block(response_trimmed, "FINAL ANSWER:") {
            return ParsedResponse::Action(AgentAction::Done { text: answer });
        }

        if let Some(question) = Self::tagged_line(response_trimmed, "ASK HUMAN:") {
            if !question.is_empty() {
                return ParsedResponse::Action(AgentAction::AskHuman { question });
            }
        }

        match self.try_parse_browser_action(response_trimmed) {
            Some(Ok(action)) => ParsedResponse::Action(AgentAction::Browser(action)),
            Some(Err(error)) => ParsedResponse::Think {
                thought: response_trimmed.to_string(),
                error: Some(error),
            },
            None => ParsedResponse::Think {
                thought: response_trimmed
                    .strip_prefix("THOUGHT:")
                    .unwrap_or(response_trimmed)
                    .trim()
                    .to_string(),
                error: None,
            },
        }
    }

    /// Everything after the first line starting with `tag`, including
    /// following lines.
    fn tagged_block(response: &str, tag: &str) -> Option<String> {
        let mut offset = 0;
        for line in response.split_inclusive('\n') {
            if line.trim_start().starts_with(tag) {
                let start = offset + line.find(tag)? + tag.len();
                return Some(response[start..].trim().to_string());
            }
            offset += line.len();
        }
        None
    }

    fn tagged_line(response: &str, tag: &str) -> Option<String> {
        response
            .lines()
            .find_map(|line| line.trim_start().strip_prefix(tag))
            .map(|rest| rest.trim().to_string())
    }

    fn try_parse_browser_action(
        &self,
        response: &str,
    ) -> Option<std::result::Result<BrowserAction, String>> {
        // Bare JSON object
        if response.starts_with('{') {
            if let Ok(json) = serde_json::from_str::<Value>(response) {
                if json.get("action").is_some() {
                    return Some(Self::from_json(json));
                }
            }
        }

        let mut action_line = None;
        let mut args_line = None;
        for line in response.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("ACTION:") {
                action_line = Some(rest.trim());
            } else if let Some(rest) = line.strip_prefix("ARGS:") {
                args_line = Some(rest.trim());
            }
        }

        let action = action_line?;
        if action.starts_with('{') {
            return Some(
                serde_json::from_str::<Value>(action)
                    .map_err(|e| format!("ACTION is not valid JSON: {}", e))
                    .and_then(Self::from_json),
            );
        }

        // ACTION: <name> with optional ARGS: <json>
        let mut args = match args_line {
            Some(raw) => match serde_json::from_str::<Value>(raw) {
                Ok(v @ Value::Object(_)) => v,
                Ok(_) => return Some(Err("ARGS must be a JSON object".to_string())),
                Err(e) => return Some(Err(format!("ARGS is not valid JSON: {}", e))),
            },
            None => Value::Object(Default::default()),
        };
        args["action"] = Value::String(action.to_string());
        Some(Self::from_json(args))
    }

    fn from_json(json: Value) -> std::result::Result<BrowserAction, String> {
        serde_json::from_value(json).map_err(|e| format!("unsupported action: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use browzee_core::types::ScrollDirection;

    fn parse(s: &str) -> ParsedResponse {
        ActionParser::new().parse(s)
    }

    #[test]
    fn test_parse_final_answer() {
        match parse("THOUGHT: done.\nFINAL ANSWER: The flight is booked.\nConfirmation: X1") {
            ParsedResponse::Action(AgentAction::Done { text }) => {
                assert_eq!(text, "The flight is booked.\nConfirmation: X1")
            }
            other => panic!("Expected Done, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ask_human() {
        assert_eq!(
            parse("THOUGHT: need a date\nASK HUMAN: Which day do you want to fly?"),
            ParsedResponse::Action(AgentAction::AskHuman {
                question: "Which day do you want to fly?".into()
            })
        );
    }

    #[test]
    fn test_parse_inline_json_action() {
        assert_eq!(
            parse("THOUGHT: open the site\nACTION: {\"action\": \"navigate\", \"url\": \"https://example.com\"}"),
            ParsedResponse::Action(AgentAction::Browser(BrowserAction::Navigate {
                url: "https://example.com".into()
            }))
        );
    }

    #[test]
    fn test_parse_action_with_args() {
        assert_eq!(
            parse("ACTION: scroll\nARGS: {\"direction\": \"down\", \"amount\": 300}"),
            ParsedResponse::Action(AgentAction::Browser(BrowserAction::Scroll {
                direction: ScrollDirection::Down,
                amount: Some(300)
            }))
        );
        assert_eq!(
            parse("ACTION: go_back"),
            ParsedResponse::Action(AgentAction::Browser(BrowserAction::GoBack))
        );
    }

    #[test]
    fn test_parse_bare_json() {
        assert_eq!(
            parse(r##"{"action": "click", "selector": "#buy"}"##),
            ParsedResponse::Action(AgentAction::Browser(BrowserAction::Click {
                selector: "#buy".into()
            }))
        );
    }

    #[test]
    fn test_malformed_action_is_a_thought_with_error() {
        match parse("ACTION: teleport\nARGS: {}") {
            ParsedResponse::Think { error: Some(e), .. } => assert!(e.contains("unsupported")),
            other => panic!("Expected Think with error, got {:?}", other),
        }
        match parse("ACTION: {not json") {
            ParsedResponse::Think { error: Some(e), .. } => assert!(e.contains("JSON")),
            other => panic!("Expected Think with error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_think() {
        assert_eq!(
            parse("THOUGHT: I'm still thinking about this problem..."),
            ParsedResponse::Think {
                thought: "I'm still thinking about this problem...".into(),
                error: None
            }
        );
    }
}
