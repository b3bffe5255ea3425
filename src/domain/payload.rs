//! Recovery of structured payloads from free-text completion responses.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

pub const TREE_OPEN: &str = "<tree>";
pub const TREE_CLOSE: &str = "</tree>";

/// Returns the text between the first `<tree>` and the last `</tree>`.
///
/// A missing delimiter leaves that side of the text untouched.
pub fn strip_tree_delimiters(text: &str) -> &str {
    let start = text.find(TREE_OPEN).map(|i| i + TREE_OPEN.len()).unwrap_or(0);
    let end = text[start..]
        .rfind(TREE_CLOSE)
        .map(|i| start + i)
        .unwrap_or(text.len());
    text[start..end].trim()
}

fn surrounding_prose() -> &'static Regex {
    static PROSE: OnceLock<Regex> = OnceLock::new();
    PROSE.get_or_init(|| {
        Regex::new(r"(?s)^[^\{\[]*(?P<body>[\{\[].*[\]\}])[^\]\}]*$").expect("static regex is valid")
    })
}

/// Parses the JSON object or array embedded in `text`, ignoring any prose
/// before the first `{`/`[` and after the last `}`/`]`.
///
/// Returns `None` if nothing parses; callers decide what an absent payload means.
pub fn parse_structured(text: &str) -> Option<Value> {
    let body = surrounding_prose()
        .captures(text)
        .and_then(|caps| caps.name("body"))
        .map(|m| m.as_str())?;
    debug!("stripped payload: {} bytes", body.len());

    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("payload is not valid JSON: {}", e);
            None
        }
    }
}

/// Strips `<tree>` delimiters and parses the payload inside.
pub fn parse_tree_payload(text: &str) -> Option<Value> {
    parse_structured(strip_tree_delimiters(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn given_wrapped_tree_when_stripping_then_returns_inner_text() {
        let text = "Here you go:\n<tree>{\"name\": \"A\"}</tree>\nDone.";
        assert_eq!(strip_tree_delimiters(text), "{\"name\": \"A\"}");
    }

    #[test]
    fn given_unwrapped_text_when_stripping_then_unchanged() {
        assert_eq!(strip_tree_delimiters("{\"name\": \"A\"}"), "{\"name\": \"A\"}");
    }

    #[test]
    fn given_prose_around_json_when_parsing_then_extracts_object() {
        let text = "Sure! The expanded tree is {\"name\": \"A\", \"children\": []} hope it helps";
        assert_eq!(
            parse_structured(text),
            Some(json!({"name": "A", "children": []}))
        );
    }

    #[test]
    fn given_json_list_when_parsing_then_extracts_list() {
        assert_eq!(parse_structured("skills: [\"Rust\", \"Go\"]."), Some(json!(["Rust", "Go"])));
    }

    #[test]
    fn given_no_json_when_parsing_then_none() {
        assert_eq!(parse_structured("I cannot help with that."), None);
        assert_eq!(parse_structured("{ not json }"), None);
    }

    #[test]
    fn given_multiline_wrapped_payload_when_parsing_then_parses() {
        let text = "<tree>\n{\n  \"name\": \"A\",\n  \"children\": {\"name\": \"B\"}\n}\n</tree>";
        assert_eq!(
            parse_tree_payload(text),
            Some(json!({"name": "A", "children": {"name": "B"}}))
        );
    }
}
