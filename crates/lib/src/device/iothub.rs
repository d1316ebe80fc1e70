//! Device gateway over the cloud device registry's REST API.
//!
//! Device lookup: `GET /devices/{id}`. Direct method: `POST /twins/{id}/methods`.
//! Requests are signed with a shared-access-signature token derived from the
//! service connection string.

use async_trait::async_trait;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::gateway::{ConnectionState, Device, DeviceGateway, GatewayError};

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_API_VERSION: &str = "2021-04-12";
const DEFAULT_METHOD_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionStringError {
    #[error("connection string is missing {0}")]
    Missing(&'static str),
    #[error("SharedAccessKey is not valid base64")]
    InvalidKey,
}

/// Parsed service connection string:
/// `HostName=<host>;SharedAccessKeyName=<policy>;SharedAccessKey=<base64 key>`.
#[derive(Clone)]
pub struct HubConnectionString {
    pub host_name: String,
    pub shared_access_key_name: String,
    mac: HmacSha256,
}

impl std::fmt::Debug for HubConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubConnectionString")
            .field("host_name", &self.host_name)
            .field("shared_access_key_name", &self.shared_access_key_name)
            .finish_non_exhaustive()
    }
}

impl HubConnectionString {
    pub fn parse(s: &str) -> Result<Self, ConnectionStringError> {
        let mut host_name = None;
        let mut key_name = None;
        let mut key = None;
        for part in s.split(';') {
            let Some((k, v)) = part.split_once('=') else {
                continue;
            };
            let v = v.trim();
            if v.is_empty() {
                continue;
            }
            match k.trim() {
                k if k.eq_ignore_ascii_case("HostName") => host_name = Some(v.to_string()),
                k if k.eq_ignore_ascii_case("SharedAccessKeyName") => key_name = Some(v.to_string()),
                k if k.eq_ignore_ascii_case("SharedAccessKey") => key = Some(v.to_string()),
                _ => {}
            }
        }
        let host_name = host_name.ok_or(ConnectionStringError::Missing("HostName"))?;
        let shared_access_key_name =
            key_name.ok_or(ConnectionStringError::Missing("SharedAccessKeyName"))?;
        let key = key.ok_or(ConnectionStringError::Missing("SharedAccessKey"))?;
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(key.as_bytes())
            .map_err(|_| ConnectionStringError::InvalidKey)?;
        let mac = HmacSha256::new_from_slice(&key_bytes)
            .map_err(|_| ConnectionStringError::InvalidKey)?;
        Ok(Self {
            host_name,
            shared_access_key_name,
            mac,
        })
    }

    /// SAS token for the hub, valid until `expiry` (Unix seconds).
    pub fn sas_token(&self, expiry: i64) -> String {
        let resource = urlencoding::encode(&self.host_name.to_lowercase()).into_owned();
        let mut mac = self.mac.clone();
        mac.update(format!("{}\n{}", resource, expiry).as_bytes());
        let signature =
            base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes());
        format!(
            "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
            resource,
            urlencoding::encode(&signature),
            expiry,
            self.shared_access_key_name
        )
    }
}

/// Registry API knobs.
#[derive(Debug, Clone)]
pub struct IotHubOptions {
    pub api_version: String,
    /// How long the registry waits for the device to answer a direct method.
    pub method_timeout_secs: u64,
    pub token_ttl_secs: i64,
}

impl Default for IotHubOptions {
    fn default() -> Self {
        Self {
            api_version: DEFAULT_API_VERSION.to_string(),
            method_timeout_secs: DEFAULT_METHOD_TIMEOUT_SECS,
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceRecord {
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    connection_state: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MethodRequest<'a> {
    method_name: &'a str,
    response_timeout_in_seconds: u64,
    payload: Option<serde_json::Value>,
}

/// Registry-backed gateway. Cheap to clone; the HTTP client is shared.
#[derive(Clone)]
pub struct IotHubGateway {
    base_url: String,
    credentials: HubConnectionString,
    options: IotHubOptions,
    client: reqwest::Client,
}

impl IotHubGateway {
    pub fn new(credentials: HubConnectionString, options: IotHubOptions) -> Self {
        Self {
            base_url: format!("https://{}", credentials.host_name),
            credentials,
            options,
            client: reqwest::Client::new(),
        }
    }

    /// Point the gateway at another endpoint (local registry emulator, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn host_name(&self) -> &str {
        &self.credentials.host_name
    }

    fn authorization(&self) -> String {
        let expiry = chrono::Utc::now().timestamp() + self.options.token_ttl_secs;
        self.credentials.sas_token(expiry)
    }
}

/// Body of a failed registry response, for the error message. An unreadable body is logged and left empty.
async fn error_body(res: reqwest::Response) -> String {
    match res.text().await {
        Ok(body) => body,
        Err(e) => {
            log::debug!("could not read registry error body: {}", e);
            String::new()
        }
    }
}

#[async_trait]
impl DeviceGateway for IotHubGateway {
    async fn get_device(&self, device_id: &str) -> Result<Device, GatewayError> {
        let url = format!(
            "{}/devices/{}?api-version={}",
            self.base_url,
            urlencoding::encode(device_id),
            self.options.api_version
        );
        let res = self
            .client
            .get(&url)
            .header(AUTHORIZATION, self.authorization())
            .send()
            .await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(device_id.to_string()));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = error_body(res).await;
            return Err(GatewayError::Api(format!("get device: {} {}", status, body)));
        }
        let record: DeviceRecord = res.json().await?;
        let connection_state = if record.connection_state.eq_ignore_ascii_case("Connected") {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        let id = if record.device_id.is_empty() {
            device_id.to_string()
        } else {
            record.device_id
        };
        Ok(Device {
            id,
            connection_state,
        })
    }

    async fn invoke_command(&self, device_id: &str, command: &str) -> Result<(), GatewayError> {
        let url = format!(
            "{}/twins/{}/methods?api-version={}",
            self.base_url,
            urlencoding::encode(device_id),
            self.options.api_version
        );
        let body = MethodRequest {
            method_name: command,
            response_timeout_in_seconds: self.options.method_timeout_secs,
            payload: None,
        };
        let res = self
            .client
            .post(&url)
            .header(AUTHORIZATION, self.authorization())
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = error_body(res).await;
            return Err(GatewayError::Api(format!(
                "invoke {}: {} {}",
                command, status, body
            )));
        }
        log::debug!("direct method {} accepted for device {}", command, device_id);
        Ok(())
    }
}
