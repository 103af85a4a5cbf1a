//! Inbound frame classification.
//!
//! Every inbound message is one JSON document classified by a small set of
//! top-level fields (`id`, `type`, `method`, `result`, `params`, `error`,
//! `message`), in any order. Payloads (`result`, `params`) can be large —
//! DOM snapshots, serialized script values — so they are kept as raw JSON
//! and only materialized once the target type is known. Classification cost
//! is proportional to the number of top-level fields, not the payload size.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde_json::value::RawValue;

use crate::error::{Error, Result};
use crate::identifiers::CommandId;

// ============================================================================
// RawFrame
// ============================================================================

/// One-pass view of a frame's top-level fields.
///
/// `result` and `params` stay unparsed raw JSON.
#[derive(Debug, Deserialize)]
struct RawFrame {
    id: Option<u64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    method: Option<String>,
    result: Option<Box<RawValue>>,
    params: Option<Box<RawValue>>,
    error: Option<String>,
    message: Option<String>,
}

// ============================================================================
// Message
// ============================================================================

/// A classified inbound frame.
#[derive(Debug)]
pub enum Message {
    /// Command succeeded.
    Success {
        /// Matches the command id.
        id: CommandId,
        /// Raw result payload, decoded at the command's await site.
        result: Box<RawValue>,
    },

    /// Command rejected by the remote end.
    Error {
        /// Matches the command id.
        id: CommandId,
        /// Machine-readable error code.
        error: String,
        /// Human-readable error text.
        message: String,
    },

    /// Unsolicited event notification.
    Event(EventMessage),
}

/// An event notification frame.
#[derive(Debug)]
pub struct EventMessage {
    /// Event name in `module.eventName` format.
    pub method: String,

    /// Raw event payload, decoded once a typed handler wants it.
    pub params: Arc<RawValue>,
}

impl Message {
    /// Classifies a raw frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] when a required field is absent
    /// (`id` for success/error frames, `method` for event frames), when
    /// `type` is missing, or when `type` carries an unrecognized value.
    /// Returns [`Error::Json`] when the document itself does not parse.
    pub fn parse(text: &str) -> Result<Self> {
        let frame: RawFrame = serde_json::from_str(text)?;

        match frame.kind.as_deref() {
            Some("success") => {
                let id = frame.id.ok_or_else(|| {
                    Error::protocol("success frame missing required 'id' field")
                })?;

                Ok(Self::Success {
                    id: CommandId::new(id),
                    result: frame.result.unwrap_or_else(null_raw),
                })
            }

            Some("error") => {
                let id = frame
                    .id
                    .ok_or_else(|| Error::protocol("error frame missing required 'id' field"))?;

                Ok(Self::Error {
                    id: CommandId::new(id),
                    error: frame.error.unwrap_or_default(),
                    message: frame.message.unwrap_or_default(),
                })
            }

            Some("event") => {
                let method = frame.method.ok_or_else(|| {
                    Error::protocol("event frame missing required 'method' field")
                })?;

                Ok(Self::Event(EventMessage {
                    method,
                    params: Arc::from(frame.params.unwrap_or_else(null_raw)),
                }))
            }

            Some(other) => Err(Error::protocol(format!(
                "unrecognized frame type: {other:?}"
            ))),

            None => Err(Error::protocol("frame missing required 'type' field")),
        }
    }
}

/// Raw JSON `null`, used when an optional payload field is absent.
fn null_raw() -> Box<RawValue> {
    RawValue::from_string("null".to_string()).expect("null is valid JSON")
}

// ============================================================================
// Tests
// ============================================================================
