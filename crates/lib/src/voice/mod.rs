//! Voice-platform conversation payloads: the inbound fulfillment query and the
//! outbound prompt response.
//!
//! Field names follow the platform's camelCase wire format. Values the platform
//! owns (scene, device capabilities, parameter resolutions, session params) are
//! carried as opaque `serde_json::Value` and echoed back untouched.

mod intent;
mod prompt;
mod query;
mod response;
mod session;

pub use intent::{Intent, IntentParameter};
pub use prompt::{ListItem, ListResponseContent, Prompt, PromptError, ResponseContent, Simple};
pub use query::{Handler, QueryError, VoiceQuery};
pub use response::VoiceResponse;
pub use session::{
    Session, SynonymEntry, SynonymEntryDisplay, SynonymEntryDisplayImage, TypeOverride,
    TypeOverrideSynonym,
};
