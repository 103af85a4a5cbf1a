//! Session module command and result shapes.
//!
//! The session module owns connection-global concerns: capability
//! negotiation (`session.new`), readiness (`session.status`), event
//! subscription bookkeeping (`session.subscribe` / `session.unsubscribe`),
//! and teardown (`session.end`).

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::{BrowsingContext, SubscriptionId};
use crate::protocol::{CommandData, EmptyResult};

// ============================================================================
// session.status
// ============================================================================

/// Parameters for `session.status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusParameters {}

impl CommandData for StatusParameters {
    const METHOD: &'static str = "session.status";
    type Result = StatusResult;
}

/// Result of `session.status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResult {
    /// Whether the remote end can create a new session.
    pub ready: bool,
    /// Implementation-defined readiness detail.
    pub message: String,
}

// ============================================================================
// session.new
// ============================================================================

/// A single capability match entry.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityRequest {
    /// Requested browser name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_name: Option<String>,

    /// Requested browser version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser_version: Option<String>,

    /// Requested platform name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_name: Option<String>,

    /// Whether untrusted TLS certificates are acceptable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_insecure_certs: Option<bool>,
}

/// Capabilities requested at session creation.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilitiesRequest {
    /// Capabilities every match must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub always_match: Option<CapabilityRequest>,

    /// Alternative capability sets, tried in order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub first_match: Vec<CapabilityRequest>,
}

/// Parameters for `session.new`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParameters {
    /// Requested capabilities.
    pub capabilities: CapabilitiesRequest,
}

impl CommandData for NewParameters {
    const METHOD: &'static str = "session.new";
    type Result = NewResult;
}

/// Result of `session.new`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewResult {
    /// The created session's id.
    pub session_id: String,
    /// Capabilities the remote end actually granted.
    pub capabilities: Capabilities,
}

/// Capabilities granted by the remote end.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Browser name.
    pub browser_name: String,

    /// Browser version.
    pub browser_version: String,

    /// Platform name.
    #[serde(default)]
    pub platform_name: Option<String>,

    /// Whether untrusted TLS certificates are accepted.
    #[serde(default)]
    pub accept_insecure_certs: bool,

    /// Whether window placement commands are supported.
    #[serde(default)]
    pub set_window_rect: bool,

    /// The browser's user agent string.
    #[serde(default)]
    pub user_agent: Option<String>,

    /// WebSocket endpoint of this session, when advertised.
    #[serde(default)]
    pub web_socket_url: Option<String>,
}

// ============================================================================
// session.subscribe
// ============================================================================

/// Parameters for `session.subscribe`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeParameters {
    /// Event names to subscribe to.
    pub events: Vec<String>,

    /// Browsing contexts restricting the subscription; absent = global.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<BrowsingContext>>,
}

impl SubscribeParameters {
    /// Creates subscribe parameters.
    pub fn new(
        events: impl IntoIterator<Item = impl Into<String>>,
        contexts: Option<Vec<BrowsingContext>>,
    ) -> Self {
        Self {
            events: events.into_iter().map(Into::into).collect(),
            contexts,
        }
    }
}

impl CommandData for SubscribeParameters {
    const METHOD: &'static str = "session.subscribe";
    type Result = SubscribeResult;
}

/// Result of `session.subscribe`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeResult {
    /// Remote handle for unsubscribe-by-id; absent on older remote ends.
    #[serde(default)]
    pub subscription: Option<SubscriptionId>,
}

// ============================================================================
// session.unsubscribe
// ============================================================================

/// Parameters for `session.unsubscribe` targeting subscription ids.
#[derive(Debug, Clone, Serialize)]
pub struct UnsubscribeByIdParameters {
    /// Remote subscription ids to tear down.
    pub subscriptions: Vec<SubscriptionId>,
}

impl UnsubscribeByIdParameters {
    /// Creates unsubscribe-by-id parameters.
    pub fn new(subscriptions: impl IntoIterator<Item = SubscriptionId>) -> Self {
        Self {
            subscriptions: subscriptions.into_iter().collect(),
        }
    }
}

impl CommandData for UnsubscribeByIdParameters {
    const METHOD: &'static str = "session.unsubscribe";
    type Result = EmptyResult;
}

/// Parameters for `session.unsubscribe` targeting event attributes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsubscribeByAttributesParameters {
    /// Event names to unsubscribe from.
    pub events: Vec<String>,

    /// Browsing contexts the original subscription named; absent = global.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<BrowsingContext>>,
}

impl UnsubscribeByAttributesParameters {
    /// Creates unsubscribe-by-attributes parameters.
    pub fn new(
        events: impl IntoIterator<Item = impl Into<String>>,
        contexts: Option<Vec<BrowsingContext>>,
    ) -> Self {
        Self {
            events: events.into_iter().map(Into::into).collect(),
            contexts,
        }
    }
}

impl CommandData for UnsubscribeByAttributesParameters {
    const METHOD: &'static str = "session.unsubscribe";
    type Result = EmptyResult;
}

// ============================================================================
// session.end
// ============================================================================

/// Parameters for `session.end`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EndParameters {}

impl CommandData for EndParameters {
    const METHOD: &'static str = "session.end";
    type Result = EmptyResult;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_subscribe_parameters_global_omits_contexts() {
        let params = SubscribeParameters::new(["log.entryAdded"], None);
        let value = serde_json::to_value(&params).expect("serialize");

        assert_eq!(value, json!({ "events": ["log.entryAdded"] }));
    }

    #[test]
    fn test_subscribe_parameters_with_contexts() {
        let params = SubscribeParameters::new(
            ["browsingContext.load"],
            Some(vec![BrowsingContext::from("ctx-1")]),
        );
        let value = serde_json::to_value(&params).expect("serialize");

        assert_eq!(
            value,
            json!({ "events": ["browsingContext.load"], "contexts": ["ctx-1"] })
        );
    }

    #[test]
    fn test_unsubscribe_by_id_serialization() {
        let params = UnsubscribeByIdParameters::new([SubscriptionId::from("sub-1")]);
        let value = serde_json::to_value(&params).expect("serialize");

        assert_eq!(value, json!({ "subscriptions": ["sub-1"] }));
    }

    #[test]
    fn test_status_result_deserialization() {
        let result: StatusResult =
            serde_json::from_str(r#"{"ready":true,"message":"ok"}"#).expect("parse");

        assert!(result.ready);
        assert_eq!(result.message, "ok");
    }

    #[test]
    fn test_new_result_deserialization() {
        let text = r#"{
            "sessionId": "7a3e",
            "capabilities": {
                "browserName": "firefox",
                "browserVersion": "142.0",
                "acceptInsecureCerts": false,
                "userAgent": "Mozilla/5.0"
            }
        }"#;

        let result: NewResult = serde_json::from_str(text).expect("parse");
        assert_eq!(result.session_id, "7a3e");
        assert_eq!(result.capabilities.browser_name, "firefox");
        assert_eq!(result.capabilities.user_agent.as_deref(), Some("Mozilla/5.0"));
        assert!(!result.capabilities.set_window_rect);
    }

    #[test]
    fn test_capabilities_request_skips_empty_fields() {
        let request = CapabilitiesRequest {
            always_match: Some(CapabilityRequest {
                browser_name: Some("firefox".to_string()),
                ..CapabilityRequest::default()
            }),
            first_match: Vec::new(),
        };

        let value = serde_json::to_value(&request).expect("serialize");
        assert_eq!(value, json!({ "alwaysMatch": { "browserName": "firefox" } }));
    }
}
