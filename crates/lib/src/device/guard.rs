//! Connectivity guard: no command goes out unless the device was resolved from
//! the registry and reported connected.
//!
//! States: unresolved -> resolved -> ready. Resolution and the connectivity check
//! happen together in `ensure_ready`; a guard lives for one request only.

use super::gateway::{Device, DeviceGateway, GatewayError};

#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("device {0} is not present in the registry")]
    NotFound(String),
    #[error("device {0} is not connected")]
    NotConnected(String),
    #[error(transparent)]
    Gateway(GatewayError),
}

pub struct ConnectivityGuard<'g> {
    gateway: &'g dyn DeviceGateway,
    /// `None` while unresolved; `Some` once the device is resolved and connected.
    ready: Option<Device>,
}

impl<'g> ConnectivityGuard<'g> {
    pub fn new(gateway: &'g dyn DeviceGateway) -> Self {
        Self {
            gateway,
            ready: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready.is_some()
    }

    /// Resolve the device and check it is connected. Once ready, later calls for
    /// the same device return the resolved device without asking the registry again.
    /// Connectivity is not re-checked after that.
    pub async fn ensure_ready(&mut self, device_id: &str) -> Result<&Device, GuardError> {
        let device = match self.ready.take() {
            Some(device) if device.id == device_id => device,
            _ => self.resolve(device_id).await?,
        };
        Ok(self.ready.insert(device))
    }

    async fn resolve(&self, device_id: &str) -> Result<Device, GuardError> {
        let device = match self.gateway.get_device(device_id).await {
            Ok(device) => device,
            Err(GatewayError::NotFound(id)) => {
                log::warn!("device {} is not present in the registry", id);
                return Err(GuardError::NotFound(id));
            }
            Err(e) => return Err(GuardError::Gateway(e)),
        };
        log::debug!(
            "device {} resolved, connection state {:?}",
            device.id,
            device.connection_state
        );
        if !device.is_connected() {
            log::warn!("device {} is not connected", device.id);
            return Err(GuardError::NotConnected(device.id));
        }
        Ok(device)
    }
}
