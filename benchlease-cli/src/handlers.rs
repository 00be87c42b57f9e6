use benchlease_core::types::Lease;
use benchlease_core::{BrokerError, ErrorKind};
use serde::Serialize;
use std::time::Duration;

// ─── Request Types ──────────────────────────────────────────────────────────

pub struct CreateLeaseRequest {
    pub selector: String,
    pub name: Option<String>,
    pub duration_minutes: u64,
}

impl CreateLeaseRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.selector.trim().is_empty() {
            return Err(
                "selector is required for creating a lease (e.g. 'board-type=j784s4evm,enabled=true')"
                    .to_string(),
            );
        }
        if self.duration_minutes == 0 {
            return Err("duration_minutes must be greater than 0".to_string());
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name must not be blank when given".to_string());
        }
        Ok(())
    }

    /// Requested duration; absurdly large values saturate and are then
    /// rejected by the broker's bounds check.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_minutes.saturating_mul(60))
    }
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            kind: None,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn err(kind: Option<ErrorKind>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            kind,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize)]
pub struct LeaseResponse {
    pub lease_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_name: Option<String>,
    pub selector: String,
    pub exporter: String,
    pub state: String,
    pub duration_minutes: u64,
    pub created_at: u64,
    pub expires_at: u64,
}

impl From<Lease> for LeaseResponse {
    fn from(lease: Lease) -> Self {
        Self {
            duration_minutes: lease.duration().as_secs() / 60,
            lease_id: lease.id,
            lease_name: lease.name,
            selector: lease.selector,
            exporter: lease.resource_id,
            state: lease.state.to_string(),
            created_at: lease.created_at,
            expires_at: lease.expires_at,
        }
    }
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub expired: usize,
}

#[derive(Serialize)]
pub struct VersionResponse {
    pub name: String,
    pub version: String,
}

// ─── Output ─────────────────────────────────────────────────────────────────

pub fn emit<T: Serialize>(data: T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&ApiResponse::ok(data))?);
    Ok(())
}

/// Print a failure envelope, carrying the broker error kind when there is one.
pub fn print_failure(err: &anyhow::Error) {
    let kind = err.downcast_ref::<BrokerError>().map(BrokerError::kind);
    tracing::debug!(error = ?err, "Command failed");
    let body = ApiResponse::<()>::err(kind, format!("{:#}", err));
    match serde_json::to_string_pretty(&body) {
        Ok(json) => println!("{}", json),
        Err(_) => eprintln!("{:#}", err),
    }
}
