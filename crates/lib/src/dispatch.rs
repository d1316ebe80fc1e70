//! Intent dispatch: map a voice intent to a device command, pass the
//! connectivity guard, invoke the command, and build the spoken reply.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::device::{ConnectivityGuard, Device, DeviceGateway, GatewayError, GuardError};
use crate::voice::{Simple, VoiceQuery, VoiceResponse};

/// Platform intent that opens the conversation; no device command is sent for it.
pub const WELCOME_INTENT: &str = "actions.intent.MAIN";

/// Reply spoken on every handled turn, whichever command ran.
const ACKNOWLEDGEMENT: &str = "Ok";

/// Direct methods the rover firmware understands. The method name on the wire is
/// the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    GoForward,
    GoBackward,
    TurnLeft,
    TurnRight,
    Break,
}

impl DeviceCommand {
    pub const ALL: [DeviceCommand; 5] = [
        DeviceCommand::GoForward,
        DeviceCommand::GoBackward,
        DeviceCommand::TurnLeft,
        DeviceCommand::TurnRight,
        DeviceCommand::Break,
    ];

    pub fn method_name(self) -> &'static str {
        match self {
            DeviceCommand::GoForward => "GoForward",
            DeviceCommand::GoBackward => "GoBackward",
            DeviceCommand::TurnLeft => "TurnLeft",
            DeviceCommand::TurnRight => "TurnRight",
            DeviceCommand::Break => "Break",
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

impl FromStr for DeviceCommand {
    type Err = String;

    /// Exact, case-sensitive match on the method name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceCommand::ALL
            .into_iter()
            .find(|c| c.method_name() == s)
            .ok_or_else(|| format!("unknown device command: {}", s))
    }
}

/// What a recognized intent does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentAction {
    Welcome,
    Command(DeviceCommand),
}

impl IntentAction {
    /// Look up the command table. `None` for any intent outside it.
    pub fn resolve(intent_name: &str) -> Option<Self> {
        if intent_name == WELCOME_INTENT {
            return Some(IntentAction::Welcome);
        }
        intent_name.parse().ok().map(IntentAction::Command)
    }
}

/// Result of a dispatch that did not fail.
#[derive(Debug)]
pub enum DispatchOutcome<'q> {
    Handled(VoiceResponse<'q>),
    /// Intent name not in the command table; nothing was sent.
    Unhandled(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("device {0} is not present in the registry")]
    DeviceNotFound(String),
    #[error("device {0} is not connected")]
    DeviceNotConnected(String),
    #[error("device command failed: {0}")]
    Transport(GatewayError),
}

impl From<GuardError> for DispatchError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::NotFound(id) => DispatchError::DeviceNotFound(id),
            GuardError::NotConnected(id) => DispatchError::DeviceNotConnected(id),
            GuardError::Gateway(e) => DispatchError::Transport(e),
        }
    }
}

/// Dispatcher for the single configured device. Holds no per-request state, so one
/// instance serves concurrent requests; each dispatch gets its own guard.
#[derive(Clone)]
pub struct IntentDispatcher {
    device_id: String,
    gateway: Arc<dyn DeviceGateway>,
}

impl IntentDispatcher {
    pub fn new(device_id: impl Into<String>, gateway: Arc<dyn DeviceGateway>) -> Self {
        Self {
            device_id: device_id.into(),
            gateway,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Handle one query. Unknown intents come back as `Unhandled` without touching
    /// the device; the welcome intent skips the guard entirely.
    pub async fn dispatch<'q>(
        &self,
        query: &'q VoiceQuery,
    ) -> Result<DispatchOutcome<'q>, DispatchError> {
        let name = query.intent.name.as_str();
        let Some(action) = IntentAction::resolve(name) else {
            log::info!("intent {} is not handled", name);
            return Ok(DispatchOutcome::Unhandled(name.to_string()));
        };
        log::info!(
            "intent {} (handler {}) -> {:?}",
            name,
            query.handler_name().unwrap_or("-"),
            action
        );

        if let IntentAction::Command(command) = action {
            let mut guard = ConnectivityGuard::new(self.gateway.as_ref());
            self.run(&mut guard, command).await?;
        }

        let mut response = VoiceResponse::from_query(query);
        response.prompt.first_simple = Some(Simple::speech(ACKNOWLEDGEMENT));
        response.prompt.r#override = false;
        Ok(DispatchOutcome::Handled(response))
    }

    /// Send one command outside a voice turn (same guard and gateway path).
    pub async fn send(&self, command: DeviceCommand) -> Result<(), DispatchError> {
        let mut guard = ConnectivityGuard::new(self.gateway.as_ref());
        self.run(&mut guard, command).await
    }

    /// Resolve the device and check connectivity without sending anything.
    pub async fn check(&self) -> Result<Device, DispatchError> {
        let mut guard = ConnectivityGuard::new(self.gateway.as_ref());
        let device = guard.ensure_ready(&self.device_id).await?;
        Ok(device.clone())
    }

    async fn run(
        &self,
        guard: &mut ConnectivityGuard<'_>,
        command: DeviceCommand,
    ) -> Result<(), DispatchError> {
        guard.ensure_ready(&self.device_id).await?;
        self.gateway
            .invoke_command(&self.device_id, command.method_name())
            .await
            .map_err(|e| {
                log::warn!("command {} to device {} failed: {}", command, self.device_id, e);
                DispatchError::Transport(e)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ConnectionState;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const DEVICE_ID: &str = "rover-1";

    /// Registry state for the configured device.
    #[derive(Clone, Copy)]
    enum Registry {
        Connected,
        Disconnected,
        Missing,
        /// Registry answers with a server error.
        Unreachable,
    }

    struct RecordingGateway {
        registry: Registry,
        fail_invoke: bool,
        lookups: Mutex<Vec<String>>,
        invocations: Mutex<Vec<(String, String)>>,
    }

    impl RecordingGateway {
        fn new(registry: Registry) -> Arc<Self> {
            Arc::new(Self {
                registry,
                fail_invoke: false,
                lookups: Mutex::new(Vec::new()),
                invocations: Mutex::new(Vec::new()),
            })
        }

        fn failing_invoke() -> Arc<Self> {
            Arc::new(Self {
                registry: Registry::Connected,
                fail_invoke: true,
                lookups: Mutex::new(Vec::new()),
                invocations: Mutex::new(Vec::new()),
            })
        }

        fn lookups(&self) -> usize {
            self.lookups.lock().unwrap().len()
        }

        fn invocations(&self) -> Vec<(String, String)> {
            self.invocations.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DeviceGateway for RecordingGateway {
        async fn get_device(&self, device_id: &str) -> Result<Device, GatewayError> {
            self.lookups.lock().unwrap().push(device_id.to_string());
            let connection_state = match self.registry {
                Registry::Connected => ConnectionState::Connected,
                Registry::Disconnected => ConnectionState::Disconnected,
                Registry::Missing => return Err(GatewayError::NotFound(device_id.to_string())),
                Registry::Unreachable => {
                    return Err(GatewayError::Api("get device: 500".to_string()))
                }
            };
            Ok(Device {
                id: device_id.to_string(),
                connection_state,
            })
        }

        async fn invoke_command(&self, device_id: &str, command: &str) -> Result<(), GatewayError> {
            self.invocations
                .lock()
                .unwrap()
                .push((device_id.to_string(), command.to_string()));
            if self.fail_invoke {
                return Err(GatewayError::Api("504 Gateway Timeout".to_string()));
            }
            Ok(())
        }
    }

    fn dispatcher(gateway: &Arc<RecordingGateway>) -> IntentDispatcher {
        IntentDispatcher::new(DEVICE_ID, gateway.clone())
    }

    fn query(intent: &str) -> VoiceQuery {
        serde_json::from_value(json!({
            "intent": { "name": intent, "params": {}, "query": "" },
            "session": { "id": "s1", "params": {} }
        }))
        .unwrap()
    }

    #[test]
    fn command_table_is_exact_and_case_sensitive() {
        assert_eq!(IntentAction::resolve(WELCOME_INTENT), Some(IntentAction::Welcome));
        for command in DeviceCommand::ALL {
            assert_eq!(
                IntentAction::resolve(command.method_name()),
                Some(IntentAction::Command(command))
            );
        }
        for name in ["turnleft", "TURNLEFT", " TurnLeft", "Brake", "", "actions.intent.main"] {
            assert_eq!(IntentAction::resolve(name), None, "{:?}", name);
        }
    }

    #[tokio::test]
    async fn unknown_intents_are_unhandled_without_device_traffic() {
        let gateway = RecordingGateway::new(Registry::Connected);
        let d = dispatcher(&gateway);
        for name in ["DoBackflip", "goforward", "actions.intent.NO_MATCH"] {
            let q = query(name);
            match d.dispatch(&q).await.unwrap() {
                DispatchOutcome::Unhandled(n) => assert_eq!(n, name),
                other => panic!("expected unhandled, got {:?}", other),
            }
        }
        assert_eq!(gateway.lookups(), 0);
        assert!(gateway.invocations().is_empty());
    }

    #[tokio::test]
    async fn welcome_skips_guard_and_gateway() {
        // Even a missing device does not matter for the welcome turn.
        let gateway = RecordingGateway::new(Registry::Missing);
        let d = dispatcher(&gateway);
        let q = query(WELCOME_INTENT);
        let DispatchOutcome::Handled(response) = d.dispatch(&q).await.unwrap() else {
            panic!("welcome must be handled");
        };
        assert_eq!(response.prompt.first_simple, Some(Simple::speech("Ok")));
        assert!(!response.prompt.r#override);
        assert_eq!(gateway.lookups(), 0);
        assert!(gateway.invocations().is_empty());
    }

    #[tokio::test]
    async fn each_command_is_invoked_once_by_name() {
        for command in DeviceCommand::ALL {
            let gateway = RecordingGateway::new(Registry::Connected);
            let d = dispatcher(&gateway);
            let q = query(command.method_name());
            let DispatchOutcome::Handled(response) = d.dispatch(&q).await.unwrap() else {
                panic!("{} must be handled", command);
            };
            assert_eq!(
                gateway.invocations(),
                vec![(DEVICE_ID.to_string(), command.method_name().to_string())]
            );
            assert_eq!(gateway.lookups(), 1);
            assert_eq!(response.prompt.first_simple.as_ref().unwrap().speech, "Ok");
            assert_eq!(response.session().map(|s| s.id.as_str()), Some("s1"));
        }
    }

    #[tokio::test]
    async fn missing_device_blocks_every_command() {
        for command in DeviceCommand::ALL {
            let gateway = RecordingGateway::new(Registry::Missing);
            let q = query(command.method_name());
            let err = dispatcher(&gateway).dispatch(&q).await.unwrap_err();
            assert!(matches!(err, DispatchError::DeviceNotFound(ref id) if id == DEVICE_ID));
            assert!(gateway.invocations().is_empty());
        }
    }

    #[tokio::test]
    async fn disconnected_device_blocks_every_command() {
        for command in DeviceCommand::ALL {
            let gateway = RecordingGateway::new(Registry::Disconnected);
            let q = query(command.method_name());
            let err = dispatcher(&gateway).dispatch(&q).await.unwrap_err();
            assert!(matches!(err, DispatchError::DeviceNotConnected(_)));
            assert!(gateway.invocations().is_empty());
        }
    }

    #[tokio::test]
    async fn transport_failure_is_reported_once() {
        let gateway = RecordingGateway::failing_invoke();
        let q = query("GoForward");
        let err = dispatcher(&gateway).dispatch(&q).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(GatewayError::Api(_))));
        assert_eq!(gateway.invocations().len(), 1);
    }

    #[tokio::test]
    async fn registry_failure_is_transport_and_nothing_is_sent() {
        let gateway = RecordingGateway::new(Registry::Unreachable);
        let q = query("TurnLeft");
        let err = dispatcher(&gateway).dispatch(&q).await.unwrap_err();
        assert!(matches!(err, DispatchError::Transport(GatewayError::Api(_))));
        assert_eq!(gateway.lookups(), 1);
        assert!(gateway.invocations().is_empty());
    }

    #[tokio::test]
    async fn send_and_check_use_the_guard() {
        let gateway = RecordingGateway::new(Registry::Connected);
        let d = dispatcher(&gateway);
        let device = d.check().await.unwrap();
        assert!(device.is_connected());
        assert!(gateway.invocations().is_empty());
        d.send(DeviceCommand::Break).await.unwrap();
        assert_eq!(
            gateway.invocations(),
            vec![(DEVICE_ID.to_string(), "Break".to_string())]
        );

        let offline = RecordingGateway::new(Registry::Disconnected);
        let err = dispatcher(&offline).send(DeviceCommand::TurnRight).await.unwrap_err();
        assert!(matches!(err, DispatchError::DeviceNotConnected(_)));
        assert!(offline.invocations().is_empty());
    }

    #[test]
    fn command_parses_from_method_name() {
        assert_eq!("TurnRight".parse::<DeviceCommand>(), Ok(DeviceCommand::TurnRight));
        assert!("turnright".parse::<DeviceCommand>().is_err());
        assert_eq!(DeviceCommand::GoBackward.to_string(), "GoBackward");
    }
}
