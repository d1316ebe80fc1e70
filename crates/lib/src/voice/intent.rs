//! Intent matched by the voice platform.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One extracted intent parameter: the utterance fragment and the platform's resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentParameter {
    #[serde(default)]
    pub original: String,
    /// Platform-defined shape (string, number, object...). Never interpreted here.
    #[serde(default)]
    pub resolved: serde_json::Value,
}

/// The intent the platform resolved for this turn. `name` is the dispatch key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub params: HashMap<String, IntentParameter>,
    /// Raw utterance, e.g. "turn left".
    #[serde(default)]
    pub query: String,
}
