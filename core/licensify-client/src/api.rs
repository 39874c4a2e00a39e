//! HTTP client for the license server.
//!
//! Endpoints, relative to the configured base URL:
//! - `POST /validate`: `{license_key, device_id, app_version, ...}`
//! - `POST /activate`: `{license_key, device_id, device_name, os, app_version}`
//! - `POST /deactivate`: `{license_key, device_id}`
//!
//! Successful verdicts and rejections both arrive as a JSON body; the
//! `reason` discriminant tells them apart. Only transport-level problems
//! (connect errors, timeouts, 429/5xx, undecodable bodies) surface as
//! [`LicenseError::Network`] from this layer.

use crate::config::LicenseConfig;
use crate::error::{LicenseError, LicenseResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use licensify_types::{LicenseSnapshot, LicenseType, ProductInfo};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Request body for the /validate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidateRequest {
    pub license_key: String,
    pub device_id: String,
    pub app_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_info: Option<String>,
}

/// Request body for the /activate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateRequest {
    pub license_key: String,
    pub device_id: String,
    pub device_name: String,
    pub os: String,
    pub app_version: String,
}

/// Request body for the /deactivate endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeactivateRequest {
    pub license_key: String,
    pub device_id: String,
}

/// Response from the /validate and /activate endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServerResponse {
    #[serde(default)]
    pub valid: bool,
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_datetime")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub days_remaining: Option<i64>,
    #[serde(default)]
    pub current_devices: Option<u32>,
    #[serde(default)]
    pub max_devices: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub product: Option<ProductInfo>,
    /// Rejection discriminant.
    #[serde(default, alias = "error")]
    pub reason: Option<String>,
}

impl ServerResponse {
    /// A positive verdict, for tests and fakes.
    #[must_use]
    pub fn granted(license: &LicenseSnapshot) -> Self {
        Self {
            valid: true,
            license_type: Some(license.license_type.as_str().to_string()),
            expires_at: license.expires_at,
            days_remaining: license.days_remaining.map(i64::from),
            current_devices: Some(license.current_devices),
            max_devices: Some(license.max_devices),
            features: license.features.clone(),
            product: license.product.clone(),
            reason: None,
        }
    }

    /// A rejection with the given reason, for tests and fakes.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    /// Interprets the verdict.
    ///
    /// # Errors
    ///
    /// Maps each rejection reason to its [`LicenseError`] kind. A positive
    /// verdict without a usable license type is reported as
    /// [`LicenseError::Network`] (malformed response).
    pub fn into_snapshot(self) -> LicenseResult<LicenseSnapshot> {
        if !self.valid || self.reason.is_some() {
            return Err(self.rejection());
        }

        let license_type: LicenseType = self
            .license_type
            .as_deref()
            .ok_or_else(|| malformed("missing license_type"))?
            .parse()
            .map_err(|e: licensify_types::Error| malformed(&e.to_string()))?;

        Ok(LicenseSnapshot {
            license_type,
            expires_at: self.expires_at,
            days_remaining: self
                .days_remaining
                .map(|d| u32::try_from(d.max(0)).unwrap_or(u32::MAX)),
            current_devices: self.current_devices.unwrap_or(0),
            max_devices: self.max_devices.unwrap_or(0),
            features: self.features,
            product: self.product,
        })
    }

    fn rejection(&self) -> LicenseError {
        match self.reason.as_deref().unwrap_or("unknown") {
            "invalid_key" | "malformed_request" => LicenseError::InvalidLicenseKey,
            "expired" | "license_expired" => LicenseError::LicenseExpired {
                expires_at: self.expires_at,
            },
            "device_limit_exceeded" => LicenseError::DeviceCountExceeded {
                current_devices: self.current_devices,
                max_devices: self.max_devices,
            },
            "revoked" | "license_revoked" => LicenseError::Revoked,
            "device_blocked" => LicenseError::DeviceBlocked,
            other => LicenseError::Rejected(other.to_string()),
        }
    }
}

fn malformed(detail: &str) -> LicenseError {
    LicenseError::Network(format!("malformed response from license server: {detail}"))
}

/// Accepts RFC 3339 timestamps and naive ISO-8601 ones (taken as UTC).
fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

/// The remote licensing service.
///
/// Implementations only fail with [`LicenseError::Network`]; verdicts,
/// positive or negative, are returned as a [`ServerResponse`].
#[async_trait]
pub trait LicenseApi: Send + Sync {
    async fn validate(&self, request: &ValidateRequest) -> LicenseResult<ServerResponse>;

    async fn activate(&self, request: &ActivateRequest) -> LicenseResult<ServerResponse>;

    async fn deactivate(&self, request: &DeactivateRequest) -> LicenseResult<()>;
}

/// [`LicenseApi`] over HTTP with JSON bodies.
#[derive(Debug, Clone)]
pub struct HttpLicenseApi {
    client: Client,
    base_url: String,
}

impl HttpLicenseApi {
    /// Creates a client using the timeout and TLS settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Config`] if the HTTP client cannot be built.
    pub fn new(config: &LicenseConfig) -> LicenseResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .danger_accept_invalid_certs(!config.verify_tls)
            .user_agent(concat!("licensify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    async fn post<T: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> LicenseResult<(StatusCode, String)> {
        let url = self.url(endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        debug!(%url, %status, "license server responded");

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(LicenseError::Network(
                "rate limit exceeded, try again later".to_string(),
            ));
        }
        if status.is_server_error() {
            return Err(LicenseError::Network(format!(
                "server returned status {status}"
            )));
        }

        let text = response.text().await.map_err(transport_error)?;
        Ok((status, text))
    }

    async fn verdict<T: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> LicenseResult<ServerResponse> {
        let (status, text) = self.post(endpoint, body).await?;
        let parsed: ServerResponse =
            serde_json::from_str(&text).map_err(|e| malformed(&e.to_string()))?;

        if !status.is_success() && parsed.reason.is_none() {
            return Err(LicenseError::Network(format!(
                "server returned status {status}"
            )));
        }
        Ok(parsed)
    }
}

#[async_trait]
impl LicenseApi for HttpLicenseApi {
    async fn validate(&self, request: &ValidateRequest) -> LicenseResult<ServerResponse> {
        self.verdict("validate", request).await
    }

    async fn activate(&self, request: &ActivateRequest) -> LicenseResult<ServerResponse> {
        self.verdict("activate", request).await
    }

    async fn deactivate(&self, request: &DeactivateRequest) -> LicenseResult<()> {
        let (status, text) = self.post("deactivate", request).await?;
        if status.is_success() {
            return Ok(());
        }
        match serde_json::from_str::<ServerResponse>(&text) {
            Ok(parsed) if parsed.reason.is_some() => Err(parsed.rejection()),
            _ => Err(LicenseError::Network(format!(
                "server returned status {status}"
            ))),
        }
    }
}

fn transport_error(err: reqwest::Error) -> LicenseError {
    if err.is_timeout() {
        LicenseError::Network("request timed out".to_string())
    } else if err.is_connect() {
        LicenseError::Network("could not connect to license server".to_string())
    } else {
        LicenseError::Network(err.to_string())
    }
}
