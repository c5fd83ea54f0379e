use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{AppError, Result};

/// Usage for a single channel as reported by the vendor. `usage` can be
/// null when the channel has no sample for the requested instant.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelUsage {
    pub channel_num: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub usage: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceUsage {
    pub device_gid: u64,
    /// The vendor occasionally emits null entries in this list.
    #[serde(default)]
    pub channel_usages: Vec<Option<ChannelUsage>>,
}

/// Nested device -> channel -> usage mapping returned by
/// `getDeviceListUsage`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListUsage {
    pub instant: String,
    pub scale: String,
    pub energy_unit: String,
    #[serde(default)]
    pub devices: Vec<DeviceUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceListUsageResponse {
    device_list_usages: DeviceListUsage,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationProperties {
    #[serde(default)]
    pub device_name: Option<String>,
}

/// A monitor registered to the customer account. Sub-devices (e.g. smart
/// plugs paired through a hub) appear under `devices`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_gid: u64,
    #[serde(default)]
    pub location_properties: Option<LocationProperties>,
    #[serde(default)]
    pub devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerDevicesResponse {
    #[serde(default)]
    devices: Vec<Device>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    id_token: String,
}

/// The vendor API surface the poller depends on. Kept behind a trait so
/// the orchestration logic can be tested without network access.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnergyApi {
    /// Lightweight reachability check against the API base endpoint.
    async fn probe(&self) -> Result<()>;

    async fn login(&self, email: &str, password: &str) -> Result<()>;

    async fn get_devices(&self) -> Result<Vec<Device>>;

    async fn get_device_list_usage(
        &self,
        device_gids: &[u64],
        instant: DateTime<Utc>,
        scale: &str,
        unit: &str,
    ) -> Result<DeviceListUsage>;
}

/// Thin HTTP client for the Emporia cloud API. Authentication goes
/// through the vendor's Cognito user pool; subsequent calls carry the id
/// token in the `authtoken` header.
pub struct EmporiaClient {
    http: reqwest::Client,
    base_url: String,
    auth_url: String,
    client_id: String,
    probe_timeout: Duration,
    token: RwLock<Option<String>>,
}

impl EmporiaClient {
    pub fn new(cfg: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            auth_url: cfg.auth_url.clone(),
            client_id: cfg.client_id.clone(),
            probe_timeout: Duration::from_secs(cfg.probe_timeout_secs),
            token: RwLock::new(None),
        })
    }

    async fn auth_token(&self) -> Result<String> {
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::Auth("not logged in".into()))
    }
}

#[async_trait]
impl EnergyApi for EmporiaClient {
    async fn probe(&self) -> Result<()> {
        // Any HTTP response counts as reachable, even an error status;
        // only transport failures (timeout, DNS, refused) matter here.
        self.http
            .get(&self.base_url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| AppError::Connectivity(e.to_string()))
    }

    async fn login(&self, email: &str, password: &str) -> Result<()> {
        let body = serde_json::json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": email,
                "PASSWORD": password,
            },
        });

        let response = self
            .http
            .post(&self.auth_url)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", "AWSCognitoIdentityProviderService.InitiateAuth")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| AppError::Auth(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::Auth(format!(
                "login rejected with status {}",
                response.status()
            )));
        }

        let auth: InitiateAuthResponse = response
            .json()
            .await
            .map_err(|e| AppError::Auth(format!("malformed login response: {}", e)))?;

        let result = auth.authentication_result.ok_or_else(|| {
            AppError::Auth("login response carried no authentication result".into())
        })?;

        *self.token.write().await = Some(result.id_token);
        debug!("login succeeded");
        Ok(())
    }

    async fn get_devices(&self) -> Result<Vec<Device>> {
        let token = self.auth_token().await?;
        let url = format!("{}/customers/devices", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("authtoken", token)
            .send()
            .await
            .map_err(|e| AppError::Api(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Api(e.to_string()))?;

        let parsed: CustomerDevicesResponse = response
            .json()
            .await
            .map_err(|e| AppError::Api(format!("malformed device list: {}", e)))?;

        Ok(parsed.devices)
    }

    async fn get_device_list_usage(
        &self,
        device_gids: &[u64],
        instant: DateTime<Utc>,
        scale: &str,
        unit: &str,
    ) -> Result<DeviceListUsage> {
        let token = self.auth_token().await?;
        let gids = device_gids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("+");
        // The vendor expects the '+'-joined GID list and the instant
        // formatted without sub-second precision.
        let url = format!(
            "{}/AppAPI?apiMethod=getDeviceListUsage&deviceGids={}&instant={}&scale={}&energyUnit={}",
            self.base_url,
            gids,
            instant.format("%Y-%m-%dT%H:%M:%SZ"),
            scale,
            unit
        );
        debug!(%gids, %scale, %unit, "requesting device list usage");

        let response = self
            .http
            .get(&url)
            .header("authtoken", token)
            .send()
            .await
            .map_err(|e| AppError::Api(e.to_string()))?
            .error_for_status()
            .map_err(|e| AppError::Api(e.to_string()))?;

        let parsed: DeviceListUsageResponse = response
            .json()
            .await
            .map_err(|e| AppError::Api(format!("malformed usage response: {}", e)))?;

        Ok(parsed.device_list_usages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_usage_response_parses_vendor_payload() {
        let payload = r#"{
            "deviceListUsages": {
                "instant": "2024-05-01T10:00:00Z",
                "scale": "1S",
                "energyUnit": "KilowattHours",
                "devices": [
                    {
                        "deviceGid": 464590,
                        "channelUsages": [
                            {"channelNum": "1,2,3", "name": "Mains", "usage": 0.00042},
                            null,
                            {"channelNum": "4", "name": "Heater", "usage": null}
                        ]
                    }
                ]
            }
        }"#;

        let parsed: DeviceListUsageResponse = serde_json::from_str(payload).unwrap();
        let usage = parsed.device_list_usages;
        assert_eq!(usage.scale, "1S");
        assert_eq!(usage.devices.len(), 1);
        assert_eq!(usage.devices[0].device_gid, 464590);
        assert_eq!(usage.devices[0].channel_usages.len(), 3);
        assert!(usage.devices[0].channel_usages[1].is_none());
        let heater = usage.devices[0].channel_usages[2].as_ref().unwrap();
        assert_eq!(heater.usage, None);
    }

    #[test]
    fn test_device_response_parses_nested_devices() {
        let payload = r#"{
            "customerGid": 1234,
            "devices": [
                {
                    "deviceGid": 464590,
                    "locationProperties": {"deviceName": "Main Panel"},
                    "devices": [
                        {"deviceGid": 464591, "locationProperties": {"deviceName": "Outlet"}}
                    ]
                }
            ]
        }"#;

        let parsed: CustomerDevicesResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.devices.len(), 1);
        assert_eq!(parsed.devices[0].devices.len(), 1);
        assert_eq!(
            parsed.devices[0]
                .location_properties
                .as_ref()
                .unwrap()
                .device_name
                .as_deref(),
            Some("Main Panel")
        );
    }

    #[test]
    fn test_auth_response_parses_id_token() {
        let payload = r#"{
            "AuthenticationResult": {
                "IdToken": "token-abc",
                "AccessToken": "access",
                "ExpiresIn": 3600
            },
            "ChallengeParameters": {}
        }"#;

        let parsed: InitiateAuthResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(
            parsed.authentication_result.unwrap().id_token,
            "token-abc"
        );
    }
}
