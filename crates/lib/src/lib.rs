//! Rover core library: voice fulfillment payloads, intent dispatch, the device
//! connectivity guard and registry gateway, and the webhook server used by the CLI.

pub mod config;
pub mod device;
pub mod dispatch;
pub mod init;
pub mod voice;
pub mod webhook;
