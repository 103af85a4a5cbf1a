//! Outbound command envelope and typed command trait.
//!
//! A command on the wire is `{"id": <integer>, "method": "<module>.<action>",
//! "params": {...}}` and nothing else. The envelope pairs a caller-built
//! parameter object with the correlation id assigned by the broker.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::identifiers::CommandId;

// ============================================================================
// CommandData
// ============================================================================

/// A typed command: parameter object plus its method name and result shape.
///
/// Domain modules implement this for each command pair they define. The
/// result shape is materialized only when the matching success frame
/// arrives, at the `execute_command` await site.
///
/// # Example
///
/// ```ignore
/// #[derive(Serialize)]
/// struct StatusParameters {}
///
/// impl CommandData for StatusParameters {
///     const METHOD: &'static str = "session.status";
///     type Result = StatusResult;
/// }
/// ```
pub trait CommandData: Serialize + Send + Sync {
    /// Method name in `module.methodName` format.
    const METHOD: &'static str;

    /// The result shape a success frame deserializes into.
    ///
    /// Result-less commands use [`EmptyResult`].
    type Result: DeserializeOwned + Send;
}

// ============================================================================
// CommandMessage
// ============================================================================

/// The serialized form of a command.
///
/// # Format
///
/// ```json
/// {
///   "id": 1,
///   "method": "browsingContext.close",
///   "params": { "contextId": "abc" }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct CommandMessage<'a, P: Serialize> {
    /// Correlation id for request/response matching.
    pub id: CommandId,

    /// Method name in `module.methodName` format.
    pub method: &'a str,

    /// Command parameters.
    pub params: &'a P,
}

impl<'a, P: Serialize> CommandMessage<'a, P> {
    /// Creates a command message.
    #[inline]
    #[must_use]
    pub fn new(id: CommandId, method: &'a str, params: &'a P) -> Self {
        Self { id, method, params }
    }
}

// ============================================================================
// CommandOptions
// ============================================================================

/// Per-command execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandOptions {
    /// Maximum time to wait for the response.
    ///
    /// `None` uses the broker default (30s).
    pub timeout: Option<Duration>,
}

impl CommandOptions {
    /// Creates options with a specific timeout.
    #[inline]
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

// ============================================================================
// EmptyResult
// ============================================================================

/// Result shape for commands whose success frame carries no useful payload.
///
/// Accepts `{}`, `null`, or any object with extension fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmptyResult;

impl<'de> Deserialize<'de> for EmptyResult {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde::de::IgnoredAny::deserialize(deserializer)?;
        Ok(Self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::{Value, json};

    #[test]
    fn test_command_serialization_top_level_keys() {
        let params = json!({ "contextId": "abc" });
        let message = CommandMessage::new(CommandId::new(5), "browsingContext.close", &params);

        let value: Value = serde_json::to_value(&message).expect("serialize");
        let object = value.as_object().expect("object");

        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["id", "method", "params"]);

        assert_eq!(value["id"], json!(5));
        assert_eq!(value["method"], json!("browsingContext.close"));
        assert_eq!(value["params"], json!({ "contextId": "abc" }));
    }

    #[test]
    fn test_empty_result_accepts_empty_object() {
        let result: EmptyResult = serde_json::from_str("{}").expect("parse");
        assert_eq!(result, EmptyResult);
    }

    #[test]
    fn test_empty_result_accepts_null() {
        let result: EmptyResult = serde_json::from_str("null").expect("parse");
        assert_eq!(result, EmptyResult);
    }

    #[test]
    fn test_empty_result_ignores_extension_fields() {
        let result: EmptyResult = serde_json::from_str(r#"{"vendor:extra": 1}"#).expect("parse");
        assert_eq!(result, EmptyResult);
    }

    #[test]
    fn test_command_options_default_has_no_timeout() {
        assert!(CommandOptions::default().timeout.is_none());
    }
}
