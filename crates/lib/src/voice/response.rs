//! Outbound fulfillment response.

use serde::Serialize;

use super::prompt::Prompt;
use super::query::VoiceQuery;
use super::session::Session;

/// Response to exactly one query. Borrows the query's session and scene for
/// echoing; only the prompt is owned and mutable. A query without a session gets
/// a response without one.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceResponse<'q> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<&'q Session>,
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    scene: &'q serde_json::Value,
    pub prompt: Prompt,
}

impl<'q> VoiceResponse<'q> {
    pub fn from_query(query: &'q VoiceQuery) -> Self {
        Self {
            session: query.session.as_ref(),
            scene: &query.scene,
            prompt: Prompt::default(),
        }
    }

    pub fn session(&self) -> Option<&Session> {
        self.session
    }

    pub fn scene(&self) -> &serde_json::Value {
        self.scene
    }
}
