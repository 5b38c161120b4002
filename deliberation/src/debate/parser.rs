//! Lenient parsing of untrusted model output.
//!
//! The model is prompted for JSON but routinely wraps it in markdown fences,
//! commentary, or truncates it. Parsing is total: every input yields a usable
//! result, and numeric fields are clamped to protocol bounds.

use serde::{Deserialize, Serialize};

/// Inclusive bounds for a per-round sentiment shift.
pub const SHIFT_MIN: i32 = -10;
pub const SHIFT_MAX: i32 = 10;

/// Outcome of parsing a negotiation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ParsedResponse {
    /// A structured object with a `message` field was found.
    Parsed { message: String, sentiment_shift: i32 },
    /// Nothing usable was found; the raw text is the message.
    Fallback { message: String, sentiment_shift: i32 },
}

impl ParsedResponse {
    pub fn message(&self) -> &str {
        match self {
            Self::Parsed { message, .. } | Self::Fallback { message, .. } => message,
        }
    }

    pub fn sentiment_shift(&self) -> i32 {
        match self {
            Self::Parsed {
                sentiment_shift, ..
            }
            | Self::Fallback {
                sentiment_shift, ..
            } => *sentiment_shift,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    /// Split into `(message, sentiment_shift)`.
    pub fn into_parts(self) -> (String, i32) {
        match self {
            Self::Parsed {
                message,
                sentiment_shift,
            }
            | Self::Fallback {
                message,
                sentiment_shift,
            } => (message, sentiment_shift),
        }
    }
}

/// Outcome of parsing a synthesis response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ParsedConsensus {
    Parsed { consensus: String },
    Fallback { consensus: String },
}

impl ParsedConsensus {
    pub fn into_consensus(self) -> String {
        match self {
            Self::Parsed { consensus } | Self::Fallback { consensus } => consensus,
        }
    }
}

/// Parse a negotiation turn. Never fails.
pub fn parse(raw: &str) -> ParsedResponse {
    let fallback = || ParsedResponse::Fallback {
        message: raw.to_string(),
        sentiment_shift: 0,
    };

    let Some(object) = extract_object(raw) else {
        return fallback();
    };
    let Some(message) = object.get("message").and_then(|v| v.as_str()) else {
        return fallback();
    };

    ParsedResponse::Parsed {
        message: message.to_string(),
        sentiment_shift: clamp_shift(object.get("sentimentShift")),
    }
}

/// Parse a synthesis response. Never fails.
pub fn parse_consensus(raw: &str) -> ParsedConsensus {
    let consensus = extract_object(raw).and_then(|object| {
        object
            .get("consensus")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    });

    match consensus {
        Some(consensus) => ParsedConsensus::Parsed { consensus },
        None => ParsedConsensus::Fallback {
            consensus: raw.trim().to_string(),
        },
    }
}

/// Coerce a JSON value into a bounded integer shift. Non-numbers become 0.
pub fn clamp_shift(value: Option<&serde_json::Value>) -> i32 {
    let Some(n) = value.and_then(|v| v.as_f64()) else {
        return 0;
    };
    if !n.is_finite() {
        return 0;
    }
    n.round().clamp(SHIFT_MIN as f64, SHIFT_MAX as f64) as i32
}

/// Parse the first balanced `{...}` span that is a JSON object.
///
/// A `{` that never closes, or whose span is not valid JSON, does not hide a
/// well-formed object further along; the scan resumes at the next `{`.
fn extract_object(raw: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    raw.match_indices('{').find_map(|(start, _)| {
        let span = balanced_span(&raw[start..])?;
        match serde_json::from_str::<serde_json::Value>(span) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            _ => None,
        }
    })
}

/// `text` starts with `{`; return it up to the matching `}`, skipping braces
/// inside strings.
fn balanced_span(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[..=offset]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_json() {
        let parsed = parse(r#"{"message": "Lights must be fixed", "sentimentShift": 4}"#);
        assert_eq!(
            parsed,
            ParsedResponse::Parsed {
                message: "Lights must be fixed".into(),
                sentiment_shift: 4
            }
        );
    }

    #[test]
    fn test_fenced_json_with_commentary() {
        let raw = "Sure! Here is my answer:\n```json\n{\"message\": \"We lack funds\", \"sentimentShift\": -3}\n```\nHope this helps.";
        let parsed = parse(raw);
        assert!(!parsed.is_fallback());
        assert_eq!(parsed.message(), "We lack funds");
        assert_eq!(parsed.sentiment_shift(), -3);
    }

    #[test]
    fn test_json_mid_sentence() {
        let raw = r#"My position is {"message": "act now", "sentimentShift": 2} and nothing else."#;
        let parsed = parse(raw);
        assert_eq!(parsed.message(), "act now");
        assert_eq!(parsed.sentiment_shift(), 2);
    }

    #[test]
    fn test_braces_inside_strings() {
        let raw = r#"{"message": "use {curly} braces } freely", "sentimentShift": 1}"#;
        let parsed = parse(raw);
        assert_eq!(parsed.message(), "use {curly} braces } freely");
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let raw = r#"{"message": "he said \"no {\" loudly", "sentimentShift": 1}"#;
        assert_eq!(parse(raw).message(), "he said \"no {\" loudly");
    }

    #[test]
    fn test_empty_input_falls_back() {
        assert_eq!(
            parse(""),
            ParsedResponse::Fallback {
                message: String::new(),
                sentiment_shift: 0
            }
        );
    }

    #[test]
    fn test_prose_falls_back_to_raw() {
        let raw = "The administration should respond within a week.";
        let parsed = parse(raw);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.message(), raw);
        assert_eq!(parsed.sentiment_shift(), 0);
    }

    #[test]
    fn test_truncated_json_falls_back() {
        let raw = r#"{"message": "The lighting near the hostel is"#;
        let parsed = parse(raw);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.message(), raw);
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let raw = "{message: unquoted, sentimentShift: 3}";
        assert!(parse(raw).is_fallback());
    }

    #[test]
    fn test_missing_message_falls_back() {
        let raw = r#"{"sentimentShift": 9}"#;
        let parsed = parse(raw);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.sentiment_shift(), 0);
    }

    #[test]
    fn test_shift_clamping() {
        assert_eq!(parse(r#"{"message":"m","sentimentShift":99}"#).sentiment_shift(), 10);
        assert_eq!(parse(r#"{"message":"m","sentimentShift":-42}"#).sentiment_shift(), -10);
        assert_eq!(parse(r#"{"message":"m","sentimentShift":3.6}"#).sentiment_shift(), 4);
        assert_eq!(parse(r#"{"message":"m","sentimentShift":1e300}"#).sentiment_shift(), 10);
    }

    #[test]
    fn test_non_numeric_shift_is_zero() {
        assert_eq!(parse(r#"{"message":"m","sentimentShift":"5"}"#).sentiment_shift(), 0);
        assert_eq!(parse(r#"{"message":"m","sentimentShift":null}"#).sentiment_shift(), 0);
        assert_eq!(parse(r#"{"message":"m"}"#).sentiment_shift(), 0);
    }

    #[test]
    fn test_unclosed_brace_in_prose_does_not_hide_object() {
        let parsed = parse("Priority {high\n{\"message\": \"Fix lights\", \"sentimentShift\": 7}");
        assert_eq!(
            parsed,
            ParsedResponse::Parsed {
                message: "Fix lights".into(),
                sentiment_shift: 7
            }
        );
    }

    #[test]
    fn test_non_json_braces_before_object_are_skipped() {
        let raw = r#"Budget {tight} but {"message": "phase it", "sentimentShift": -1}"#;
        assert_eq!(parse(raw).into_parts(), ("phase it".to_string(), -1));

        let consensus = parse_consensus(r#"Note {draft {"consensus": "Lamps by Friday"}"#);
        assert_eq!(consensus.into_consensus(), "Lamps by Friday");
    }

    #[test]
    fn test_object_inside_array_is_found() {
        let parsed = parse(r#"[{"message":"m","sentimentShift":-2}]"#);
        assert!(!parsed.is_fallback());
        assert_eq!(parsed.into_parts(), ("m".to_string(), -2));
    }

    #[test]
    fn test_arbitrary_inputs_never_escape_bounds() {
        let inputs = [
            "}}}{{{",
            "{",
            "}",
            "\u{0}\u{1}{\"message\":\"\u{fffd}\"",
            "{\"message\": 12, \"sentimentShift\": 4}",
            "{\"message\": \"ok\", \"sentimentShift\": -0.4}",
            "🙂 {\"message\": \"emoji\", \"sentimentShift\": 11} 🙂",
        ];
        for raw in inputs {
            let parsed = parse(raw);
            assert!((SHIFT_MIN..=SHIFT_MAX).contains(&parsed.sentiment_shift()), "{raw}");
        }
    }

    #[test]
    fn test_consensus_parsed() {
        let parsed = parse_consensus("```json\n{\"consensus\": \"  Install lights in 14 days \"}\n```");
        assert_eq!(
            parsed,
            ParsedConsensus::Parsed {
                consensus: "Install lights in 14 days".into()
            }
        );
    }

    #[test]
    fn test_consensus_fallback() {
        let parsed = parse_consensus("  Both parties agree to a phased rollout. ");
        assert_eq!(
            parsed,
            ParsedConsensus::Fallback {
                consensus: "Both parties agree to a phased rollout.".into()
            }
        );

        let parsed = parse_consensus(r#"{"consensus": ""}"#);
        assert!(matches!(parsed, ParsedConsensus::Fallback { .. }));
    }
}
