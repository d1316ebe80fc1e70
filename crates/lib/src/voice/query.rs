//! Inbound fulfillment query.

use serde::{Deserialize, Serialize};

use super::intent::Intent;
use super::session::Session;

/// Name of the platform webhook handler that produced the request (diagnostic only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handler {
    #[serde(default)]
    pub name: String,
}

/// One fulfillment request from the voice platform. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<Handler>,
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub scene: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub device: serde_json::Value,
}

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("invalid request body: {0}")]
    Json(#[from] serde_json::Error),
    #[error("request has no intent name")]
    MissingIntentName,
}

impl VoiceQuery {
    /// Parse a request body and check that it names an intent.
    pub fn from_slice(body: &[u8]) -> Result<Self, QueryError> {
        let query: VoiceQuery = serde_json::from_slice(body)?;
        query.validate()?;
        Ok(query)
    }

    pub fn validate(&self) -> Result<(), QueryError> {
        if self.intent.name.trim().is_empty() {
            return Err(QueryError::MissingIntentName);
        }
        Ok(())
    }

    pub fn handler_name(&self) -> Option<&str> {
        self.handler.as_ref().map(|h| h.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_minimal_turn() {
        let body = br#"{"intent":{"name":"TurnLeft","params":{},"query":"turn left"},"session":{"id":"s1","params":{}}}"#;
        let query = VoiceQuery::from_slice(body).unwrap();
        assert_eq!(query.intent.name, "TurnLeft");
        assert_eq!(query.intent.query, "turn left");
        assert_eq!(query.session.as_ref().map(|s| s.id.as_str()), Some("s1"));
        assert!(query.scene.is_null());
        assert!(query.handler_name().is_none());
    }

    #[test]
    fn parses_full_turn_with_params() {
        let body = json!({
            "handler": { "name": "fulfill" },
            "intent": {
                "name": "GoForward",
                "params": { "distance": { "original": "two meters", "resolved": { "amount": 2, "unit": "m" } } },
                "query": "go forward two meters"
            },
            "scene": { "name": "Drive", "slotFillingStatus": "UNSPECIFIED", "slots": {} },
            "session": { "id": "abc", "params": {}, "typeOverrides": [], "languageCode": "" },
            "device": { "capabilities": ["SPEECH", "RICH_RESPONSE"] }
        });
        let query = VoiceQuery::from_slice(body.to_string().as_bytes()).unwrap();
        assert_eq!(query.handler_name(), Some("fulfill"));
        let distance = &query.intent.params["distance"];
        assert_eq!(distance.original, "two meters");
        assert_eq!(distance.resolved["amount"], json!(2));
        assert_eq!(query.scene["name"], json!("Drive"));
        assert_eq!(query.device["capabilities"][1], json!("RICH_RESPONSE"));
    }

    #[test]
    fn missing_intent_is_malformed() {
        let err = VoiceQuery::from_slice(br#"{"session":{"id":"s1"}}"#).unwrap_err();
        assert!(matches!(err, QueryError::Json(_)));
    }

    #[test]
    fn empty_intent_name_is_malformed() {
        let err = VoiceQuery::from_slice(br#"{"intent":{"name":"  "}}"#).unwrap_err();
        assert!(matches!(err, QueryError::MissingIntentName));
        let err = VoiceQuery::from_slice(br#"{"intent":{}}"#).unwrap_err();
        assert!(matches!(err, QueryError::MissingIntentName));
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(VoiceQuery::from_slice(b"turn left").is_err());
    }
}
