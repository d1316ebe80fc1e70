//! Prompt: the spoken/visual reply sent back to the voice platform.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Short spoken and displayed fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Simple {
    pub speech: String,
    /// Display text; the platform falls back to `speech` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Simple {
    pub fn speech(speech: impl Into<String>) -> Self {
        Self {
            speech: speech.into(),
            text: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListItem {
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponseContent {
    pub title: String,
    pub sub_title: String,
    pub items: Vec<ListItem>,
}

/// Rich content block attached to a prompt under a named key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseContent {
    List(ListResponseContent),
}

impl From<ListResponseContent> for ResponseContent {
    fn from(list: ListResponseContent) -> Self {
        ResponseContent::List(list)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("prompt already has content under key {0:?}")]
    DuplicateKey(String),
}

/// Outbound prompt. `override` decides whether it replaces or appends to prompts
/// the platform already queued for this turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    #[serde(default)]
    pub r#override: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_simple: Option<Simple>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_simple: Option<Simple>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    content: IndexMap<String, ResponseContent>,
}

impl Prompt {
    /// Content blocks in insertion order.
    pub fn content(&self) -> &IndexMap<String, ResponseContent> {
        &self.content
    }

    /// Append a content block. Keys are unique; an existing key is left untouched.
    pub fn add_content(
        &mut self,
        key: impl Into<String>,
        item: impl Into<ResponseContent>,
    ) -> Result<(), PromptError> {
        let key = key.into();
        if self.content.contains_key(&key) {
            return Err(PromptError::DuplicateKey(key));
        }
        self.content.insert(key, item.into());
        Ok(())
    }
}
