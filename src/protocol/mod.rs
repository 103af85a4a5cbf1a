//! BiDi wire protocol message types.
//!
//! This module defines the message format for communication between the
//! local end (this crate) and the remote end (the browser).
//!
//! # Protocol Overview
//!
//! Every message is a single JSON document. Four shapes exist:
//!
//! | Message | Direction | Shape |
//! |---------|-----------|-------|
//! | Command | Local → Remote | `{"id", "method", "params"}` |
//! | Success | Remote → Local | `{"id", "type": "success", "result"}` |
//! | Error | Remote → Local | `{"id", "type": "error", "error", "message"}` |
//! | Event | Remote → Local | `{"type": "event", "method", "params"}` |
//!
//! # Command Naming
//!
//! Commands and events follow `module.methodName` format:
//!
//! - `session.subscribe`
//! - `browsingContext.navigate`
//! - `log.entryAdded`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command envelope and typed command trait |
//! | `message` | Inbound frame classification |
//! | `numbers` | Special floating-point literal handling |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command envelope and options.
pub mod command;

/// Inbound frame classification.
pub mod message;

/// Special floating-point literal handling.
pub mod numbers;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{CommandData, CommandMessage, CommandOptions, EmptyResult};
pub use message::{EventMessage, Message};
pub use numbers::{JsFloat, special_float};
