//! Gateway capability: look a device up and invoke a named direct method on it.

use async_trait::async_trait;

/// Connectivity reported by the registry for a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connected,
    Disconnected,
}

/// A device as known to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub connection_state: ConnectionState,
}

impl Device {
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("device {0} is not present in the registry")]
    NotFound(String),
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("registry api error: {0}")]
    Api(String),
}

/// Access to remote devices through the device-management channel. Shared by
/// concurrent requests; implementations hold no per-request state.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// Fetch the device and its current connectivity. `NotFound` when the id is unknown.
    async fn get_device(&self, device_id: &str) -> Result<Device, GatewayError>;

    /// Invoke a direct method with no payload. The method's own result is not inspected.
    async fn invoke_command(&self, device_id: &str, command: &str) -> Result<(), GatewayError>;
}
