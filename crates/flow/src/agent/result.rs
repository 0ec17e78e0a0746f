//! Crew Result Structures
//!
//! Defines the payload a collaborator hands back to a stage.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, Result};

/// Result of one collaborator invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrewOutput {
    /// Raw text of the final task's answer
    pub raw: String,

    /// Parsed payload when the final task asked for JSON
    pub structured: Option<Value>,
}

/// Verdict produced by the editor crew
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub valid: bool,
    #[serde(default)]
    pub feedback: Option<String>,
}

impl CrewOutput {
    pub fn text(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            structured: None,
        }
    }

    pub fn with_structured(mut self, value: Value) -> Self {
        self.structured = Some(value);
        self
    }

    /// Convenience constructor for a verification verdict.
    pub fn verdict(valid: bool, feedback: Option<&str>) -> Self {
        let value = serde_json::json!({ "valid": valid, "feedback": feedback });
        Self::text(value.to_string()).with_structured(value)
    }

    /// Look up a named field of the structured payload.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.structured.as_ref().and_then(|value| value.get(name))
    }

    /// Read the `{valid, feedback}` payload.
    pub fn verification(&self) -> Result<Verification> {
        let value = self.structured.clone().ok_or_else(|| {
            Error::Execution("collaborator result carries no structured payload".to_string())
        })?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Pull the first JSON object out of an LLM reply.
///
/// Models often wrap JSON in prose or code fences. Starting at each `{` in
/// turn, the first complete object wins; whatever follows it is ignored.
pub fn extract_json(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()?
            .ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verification_from_structured() {
        let output = CrewOutput::verdict(false, Some("Too long"));
        let verdict = output.verification().unwrap();
        assert!(!verdict.valid);
        assert_eq!(verdict.feedback.as_deref(), Some("Too long"));
        assert_eq!(output.field("valid"), Some(&json!(false)));
    }

    #[test]
    fn test_verification_feedback_optional() {
        let output = CrewOutput::text("ok").with_structured(json!({ "valid": true }));
        let verdict = output.verification().unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.feedback, None);
    }

    #[test]
    fn test_verification_requires_payload() {
        assert!(CrewOutput::text("Valid: True").verification().is_err());
        let wrong = CrewOutput::text("").with_structured(json!({ "pass": true }));
        assert!(matches!(wrong.verification(), Err(Error::SerdeJson(_))));
    }

    #[test]
    fn test_extract_json() {
        let reply = "Here you go:\n```json\n{\"valid\": true, \"feedback\": null}\n```";
        assert_eq!(extract_json(reply), Some(json!({ "valid": true, "feedback": null })));
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_extract_json_ignores_trailing_braces() {
        let reply = "{\"valid\": false, \"feedback\": \"tighten intro\"}\nNote: avoid {jargon}.";
        assert_eq!(
            extract_json(reply),
            Some(json!({ "valid": false, "feedback": "tighten intro" }))
        );

        let reply = "Checked {the draft}:\n{\"valid\": true, \"feedback\": null}";
        assert_eq!(extract_json(reply), Some(json!({ "valid": true, "feedback": null })));
    }
}
