//! Remote device access: the gateway capability, the per-request connectivity
//! guard, and the cloud registry implementation of the gateway.

mod gateway;
mod guard;
mod iothub;

pub use gateway::{ConnectionState, Device, DeviceGateway, GatewayError};
pub use guard::{ConnectivityGuard, GuardError};
pub use iothub::{ConnectionStringError, HubConnectionString, IotHubGateway, IotHubOptions};
