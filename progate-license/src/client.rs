//! License authority protocol client.
//!
//! Each call is one request with a short timeout. Failures are reported,
//! never retried: the right fallback differs per operation and belongs to
//! the caller.

use crate::device::MachineIdentity;
use crate::error::{ActivationErrorCode, LicenseError, LicenseResult};
use crate::key::LicenseKey;
use crate::record::LicenseRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Answer to a validate request.
///
/// `valid: false` is a normal, authoritative answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResponse {
    pub valid: bool,
    /// Authority's reason when invalid.
    pub reason: Option<String>,
    /// Refreshed record when valid.
    pub record: Option<LicenseRecord>,
}

/// The remote license authority.
#[async_trait]
pub trait LicenseAuthority: Send + Sync {
    /// Activates `key` for this machine.
    async fn activate(
        &self,
        key: &LicenseKey,
        machine: &MachineIdentity,
        host_version: &str,
    ) -> LicenseResult<LicenseRecord>;

    /// Confirms `key` is still usable on this machine.
    async fn validate(
        &self,
        key: &LicenseKey,
        machine: &MachineIdentity,
    ) -> LicenseResult<ValidationResponse>;

    /// Releases this machine's seat.
    async fn deactivate(&self, key: &LicenseKey, machine: &MachineIdentity) -> LicenseResult<()>;

    /// Best-effort reachability probe. Only used to pick a deactivation path.
    async fn is_online(&self) -> bool;
}

/// Request body shared by all three operations.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthorityRequest<'a> {
    key: &'a str,
    machine_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    host_version: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    device: Option<&'a crate::device::DeviceInfo>,
}

/// Error body returned with 4xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: ActivationErrorCode,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl ErrorBody {
    fn into_error(self) -> LicenseError {
        let mut details = self.message.unwrap_or_default();
        if let Some(extra) = self.details.filter(|v| !v.is_null()) {
            if !details.is_empty() {
                details.push(' ');
            }
            details.push_str(&extra.to_string());
        }
        LicenseError::Activation {
            code: self.code,
            details,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawValidation {
    valid: bool,
    #[serde(default)]
    reason: Option<String>,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

impl RawValidation {
    fn into_response(self) -> LicenseResult<ValidationResponse> {
        let record = if self.valid {
            Some(serde_json::from_value(serde_json::Value::Object(self.rest))?)
        } else {
            None
        };
        Ok(ValidationResponse {
            valid: self.valid,
            reason: self.reason,
            record,
        })
    }
}

#[cfg(feature = "online")]
pub use http::HttpAuthority;

#[cfg(feature = "online")]
mod http {
    use super::*;
    use crate::config::LicenseConfig;
    use crate::device::DeviceInfo;
    use reqwest::{Client, Response, StatusCode};
    use std::time::Duration;
    use tracing::{debug, info, warn};

    /// HTTPS JSON client for the license authority.
    #[derive(Debug, Clone)]
    pub struct HttpAuthority {
        base_url: String,
        client: Client,
        request_timeout: Duration,
        probe_timeout: Duration,
        device: DeviceInfo,
    }

    impl HttpAuthority {
        /// Builds a client from config.
        ///
        /// # Errors
        ///
        /// Returns [`LicenseError::Config`] if the HTTP client cannot be built.
        pub fn new(config: &LicenseConfig) -> LicenseResult<Self> {
            let client = Client::builder()
                .timeout(config.request_timeout())
                .connect_timeout(config.probe_timeout())
                .user_agent(format!("progate/{}", config.host_version))
                .build()
                .map_err(|e| LicenseError::Config(format!("failed to create HTTP client: {e}")))?;

            Ok(Self {
                base_url: config.authority_url.trim_end_matches('/').to_string(),
                client,
                request_timeout: config.request_timeout(),
                probe_timeout: config.probe_timeout(),
                device: DeviceInfo::collect(),
            })
        }

        /// Base URL requests are sent to.
        pub fn base_url(&self) -> &str {
            &self.base_url
        }

        fn endpoint(&self, path: &str) -> String {
            format!("{}/v1/{}", self.base_url, path)
        }

        async fn post(&self, path: &str, body: &AuthorityRequest<'_>) -> LicenseResult<Response> {
            let url = self.endpoint(path);
            debug!("POST {}", url);

            let response = self
                .client
                .post(&url)
                .json(body)
                .send()
                .await
                .map_err(|e| self.network_error(path, &e))?;

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }
            if status.is_server_error() {
                warn!("License authority returned {} for {}", status, path);
                return Err(LicenseError::Network(format!(
                    "license authority unavailable ({status})"
                )));
            }

            let text = response.text().await.unwrap_or_default();
            Err(match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => body.into_error(),
                Err(_) => LicenseError::Activation {
                    code: fallback_code(status),
                    details: format!("{status}: {text}"),
                },
            })
        }

        fn network_error(&self, path: &str, err: &reqwest::Error) -> LicenseError {
            if err.is_timeout() {
                LicenseError::Network(format!(
                    "{path} timed out after {}s",
                    self.request_timeout.as_secs()
                ))
            } else {
                LicenseError::Network(format!("{path} failed: {err}"))
            }
        }
    }

    fn fallback_code(status: StatusCode) -> ActivationErrorCode {
        match status {
            StatusCode::NOT_FOUND => ActivationErrorCode::NotFound,
            StatusCode::TOO_MANY_REQUESTS => ActivationErrorCode::RateLimited,
            StatusCode::CONFLICT => ActivationErrorCode::SeatLimitReached,
            _ => ActivationErrorCode::Unknown,
        }
    }

    #[async_trait]
    impl LicenseAuthority for HttpAuthority {
        async fn activate(
            &self,
            key: &LicenseKey,
            machine: &MachineIdentity,
            host_version: &str,
        ) -> LicenseResult<LicenseRecord> {
            let body = AuthorityRequest {
                key: key.raw(),
                machine_id: machine.as_str(),
                host_version: Some(host_version),
                device: Some(&self.device),
            };
            let response = self.post("licenses/activate", &body).await?;
            let text = response
                .text()
                .await
                .map_err(|e| self.network_error("licenses/activate", &e))?;
            let record: LicenseRecord = serde_json::from_str(&text)?;
            info!("License {} activated ({} features)", key, record.features.len());
            Ok(record)
        }

        async fn validate(
            &self,
            key: &LicenseKey,
            machine: &MachineIdentity,
        ) -> LicenseResult<ValidationResponse> {
            let body = AuthorityRequest {
                key: key.raw(),
                machine_id: machine.as_str(),
                host_version: None,
                device: None,
            };
            let response = self.post("licenses/validate", &body).await?;
            let text = response
                .text()
                .await
                .map_err(|e| self.network_error("licenses/validate", &e))?;
            let raw: RawValidation = serde_json::from_str(&text)?;
            let validation = raw.into_response()?;
            debug!("License {} validated: valid={}", key, validation.valid);
            Ok(validation)
        }

        async fn deactivate(
            &self,
            key: &LicenseKey,
            machine: &MachineIdentity,
        ) -> LicenseResult<()> {
            let body = AuthorityRequest {
                key: key.raw(),
                machine_id: machine.as_str(),
                host_version: None,
                device: None,
            };
            self.post("licenses/deactivate", &body).await?;
            info!("License {} deactivated at authority", key);
            Ok(())
        }

        async fn is_online(&self) -> bool {
            let result = self
                .client
                .get(self.endpoint("health"))
                .timeout(self.probe_timeout)
                .send()
                .await;
            match result {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    debug!("License authority unreachable: {}", e);
                    false
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_validation_has_no_record() {
        let raw: RawValidation =
            serde_json::from_str(r#"{"valid": false, "reason": "revoked"}"#).unwrap();
        let response = raw.into_response().unwrap();
        assert!(!response.valid);
        assert_eq!(response.reason.as_deref(), Some("revoked"));
        assert!(response.record.is_none());
    }

    #[test]
    fn valid_validation_carries_record() {
        let raw: RawValidation = serde_json::from_str(
            r#"{
                "valid": true,
                "key": "PRO-AAAA-BBBB-CCCC-DDDD",
                "activatedAt": "2026-01-01T00:00:00Z",
                "expiresAt": "2027-01-01T00:00:00Z",
                "features": ["pro.memory.*"],
                "seats": {"used": 2, "max": 5}
            }"#,
        )
        .unwrap();
        let record = raw.into_response().unwrap().record.unwrap();
        assert_eq!(record.seats.used, 2);
        assert_eq!(record.features, vec!["pro.memory.*".to_string()]);
    }

    #[test]
    fn error_body_joins_message_and_details() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"code": "seat_limit_reached", "message": "5 of 5 seats used", "details": {"max": 5}}"#,
        )
        .unwrap();
        match body.into_error() {
            LicenseError::Activation { code, details } => {
                assert_eq!(code, ActivationErrorCode::SeatLimitReached);
                assert!(details.contains("5 of 5"));
                assert!(details.contains("\"max\":5"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_code_maps_to_unknown() {
        let body: ErrorBody = serde_json::from_str(r#"{"code": "brand_new_code"}"#).unwrap();
        assert_eq!(body.code, ActivationErrorCode::Unknown);
    }
}
