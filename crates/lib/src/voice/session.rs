//! Conversation session and vocabulary type overrides.
//!
//! Everything here is platform-owned state. The webhook echoes it back in the
//! response and never reads or mutates it during dispatch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    type_overrides: Vec<TypeOverride>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: HashMap::new(),
            type_overrides: Vec::new(),
        }
    }

    /// Type overrides in the order they were supplied.
    pub fn type_overrides(&self) -> &[TypeOverride] {
        &self.type_overrides
    }

    pub fn add_type_override(&mut self, item: TypeOverride) {
        self.type_overrides.push(item);
    }
}

/// Runtime vocabulary override for a platform type (e.g. mode "TYPE_REPLACE").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOverride {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub type_override_mode: String,
    #[serde(default)]
    pub synonym: TypeOverrideSynonym,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeOverrideSynonym {
    #[serde(default)]
    pub entries: Vec<SynonymEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynonymEntry {
    /// Canonical value.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<SynonymEntryDisplay>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynonymEntryDisplay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<SynonymEntryDisplayImage>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynonymEntryDisplayImage {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub alt: String,
}
