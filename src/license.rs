//! License gate client
//!
//! The credit counter lives in a remote database behind two stored
//! procedures; this module only speaks their RPC surface. Atomicity of
//! decrement-with-check is the remote side's guarantee, so the gate is
//! called exactly once per conversion and never retried on ambiguous
//! failure (a retry could double-charge).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{ConvertError, Result};

/// Result of a credit-decrement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreditOutcome {
    /// Credit consumed; `remaining` is the balance after the decrement
    Granted { remaining: Option<i64> },
    /// Key invalid or no credits left; `message` is safe to show the client
    Denied { message: String },
}

/// Read-only license status for /api/check-license.
#[derive(Debug, Clone, Serialize)]
pub struct LicenseStatus {
    #[serde(rename = "isValid")]
    pub is_valid: bool,
    pub credits: Option<i64>,
    pub message: String,
}

/// Remote credit-decrement service, injected into the orchestrator.
#[async_trait]
pub trait LicenseGate: Send + Sync {
    /// Atomically consume one credit for `license_key`.
    ///
    /// Transport or protocol failures surface as
    /// [`ConvertError::LicenseUnavailable`]; a clean "no" is
    /// [`CreditOutcome::Denied`].
    async fn use_credit(&self, license_key: &str) -> Result<CreditOutcome>;

    /// Look up the key's validity and remaining credits without charging.
    /// Returns `Ok(None)` when the key is unknown.
    async fn status(&self, license_key: &str) -> Result<Option<LicenseStatus>>;
}

/// Wire shape of the `use_one_credit` stored procedure response.
#[derive(Debug, Deserialize)]
struct UseCreditRow {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    credits_remaining: Option<i64>,
}

/// Wire shape of the `get_license_status` stored procedure response.
#[derive(Debug, Deserialize)]
struct StatusRow {
    is_valid: bool,
    #[serde(default)]
    sessions_remaining: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Production gate speaking the Supabase-style REST RPC protocol.
pub struct HttpLicenseGate {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl HttpLicenseGate {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    async fn rpc(&self, procedure: &str, license_key: &str) -> Result<reqwest::Response> {
        let url = format!("{}/rest/v1/rpc/{}", self.base_url, procedure);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .json(&serde_json::json!({ "p_license_key": license_key }))
            .send()
            .await
            .map_err(|e| ConvertError::LicenseUnavailable(format!("{}: {}", procedure, e)))?;

        if response.status().is_server_error() {
            return Err(ConvertError::LicenseUnavailable(format!(
                "{} returned {}",
                procedure,
                response.status()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LicenseGate for HttpLicenseGate {
    async fn use_credit(&self, license_key: &str) -> Result<CreditOutcome> {
        let response = self.rpc("use_one_credit", license_key).await?;

        let rows: Vec<UseCreditRow> = response
            .json()
            .await
            .map_err(|e| ConvertError::LicenseUnavailable(format!("use_one_credit body: {}", e)))?;

        let Some(row) = rows.into_iter().next() else {
            warn!("use_one_credit returned no rows");
            return Ok(CreditOutcome::Denied {
                message: "Invalid license or no credits remaining.".to_string(),
            });
        };

        if row.success {
            debug!(remaining = ?row.credits_remaining, "credit consumed");
            Ok(CreditOutcome::Granted {
                remaining: row.credits_remaining,
            })
        } else {
            Ok(CreditOutcome::Denied {
                message: row
                    .message
                    .unwrap_or_else(|| "Invalid license or no credits remaining.".to_string()),
            })
        }
    }

    async fn status(&self, license_key: &str) -> Result<Option<LicenseStatus>> {
        let response = self.rpc("get_license_status", license_key).await?;

        let rows: Vec<StatusRow> = response.json().await.map_err(|e| {
            ConvertError::LicenseUnavailable(format!("get_license_status body: {}", e))
        })?;

        Ok(rows.into_iter().next().map(|row| LicenseStatus {
            is_valid: row.is_valid,
            credits: row.sessions_remaining,
            message: row.message.unwrap_or_default(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn use_credit_row_parses_minimal_payload() {
        let rows: Vec<UseCreditRow> = serde_json::from_str(r#"[{"success": true}]"#).unwrap();
        assert!(rows[0].success);
        assert!(rows[0].credits_remaining.is_none());
    }

    #[test]
    fn status_row_parses_full_payload() {
        let rows: Vec<StatusRow> = serde_json::from_str(
            r#"[{"is_valid": true, "sessions_remaining": 3, "message": "ok"}]"#,
        )
        .unwrap();
        assert!(rows[0].is_valid);
        assert_eq!(rows[0].sessions_remaining, Some(3));
    }

    #[test]
    fn license_status_serializes_camel_case() {
        let status = LicenseStatus {
            is_valid: true,
            credits: Some(2),
            message: "ok".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["credits"], 2);
    }
}
