//! Webhook: HTTP endpoint the voice platform calls for fulfillment.
//!
//! One POST route takes a fulfillment query and answers with a prompt; `GET /`
//! is a health check. Requests are independent and stateless.

mod server;

pub use server::{router, run_webhook, run_webhook_with, WebhookState, FULFILLMENT_PATH};
