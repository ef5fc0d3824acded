//! C6 Provisioner Adapter: thin async seam over an external IaaS control
//! API. Credentials for a launch come from `credential_store`, never from
//! this module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("provisioner request failed: {0}")]
    Request(String),
    #[error("cluster handle not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub instance_type: String,
    pub gpu_type: String,
    pub spot: bool,
    pub region: String,
    pub model_id: uuid::Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchResult {
    pub cluster_handle: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudStatus {
    Up,
    Running,
    Pending,
    Stopped,
    Unknown,
}

impl CloudStatus {
    /// CloudAPI signal is healthy iff status is `Up` or `Running`.
    pub fn is_healthy(self) -> bool {
        matches!(self, CloudStatus::Up | CloudStatus::Running)
    }
}

#[async_trait]
pub trait ProvisionerAdapter: Send + Sync {
    async fn launch(&self, spec: LaunchSpec) -> Result<LaunchResult, ProvisionerError>;
    async fn terminate(&self, cluster_handle: &str) -> Result<(), ProvisionerError>;
    async fn status(&self, cluster_handle: &str) -> Result<CloudStatus, ProvisionerError>;
}

/// In-process fake used by tests and by deployments without a real IaaS
/// integration configured yet.
#[derive(Default)]
pub struct MockProvisioner {
    clusters: Mutex<HashMap<String, CloudStatus>>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, cluster_handle: &str, status: CloudStatus) {
        self.clusters.lock().unwrap().insert(cluster_handle.to_string(), status);
    }
}

#[async_trait]
impl ProvisionerAdapter for MockProvisioner {
    async fn launch(&self, spec: LaunchSpec) -> Result<LaunchResult, ProvisionerError> {
        let handle = format!("mock-{}-{}", spec.region, uuid::Uuid::new_v4());
        self.clusters.lock().unwrap().insert(handle.clone(), CloudStatus::Pending);
        Ok(LaunchResult { cluster_handle: handle })
    }

    async fn terminate(&self, cluster_handle: &str) -> Result<(), ProvisionerError> {
        self.clusters.lock().unwrap().insert(cluster_handle.to_string(), CloudStatus::Stopped);
        Ok(())
    }

    async fn status(&self, cluster_handle: &str) -> Result<CloudStatus, ProvisionerError> {
        self.clusters
            .lock()
            .unwrap()
            .get(cluster_handle)
            .copied()
            .ok_or_else(|| ProvisionerError::NotFound(cluster_handle.to_string()))
    }
}

/// A generic HTTP-backed IaaS control API. The wire shape is intentionally
/// minimal JSON; concrete vendors are expected to sit behind a gateway that
/// normalizes to this contract.
pub struct HttpProvisioner {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpProvisioner {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder().timeout(Duration::from_secs(30)).build().expect("reqwest client"),
            base_url: base_url.into(),
            api_token: api_token.into(),
        }
    }
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
}

fn parse_cloud_status(raw: &str) -> CloudStatus {
    match raw.to_ascii_uppercase().as_str() {
        "UP" => CloudStatus::Up,
        "RUNNING" => CloudStatus::Running,
        "PENDING" => CloudStatus::Pending,
        "STOPPED" | "TERMINATED" => CloudStatus::Stopped,
        _ => CloudStatus::Unknown,
    }
}

#[async_trait]
impl ProvisionerAdapter for HttpProvisioner {
    async fn launch(&self, spec: LaunchSpec) -> Result<LaunchResult, ProvisionerError> {
        let resp = self
            .client
            .post(format!("{}/clusters", self.base_url))
            .bearer_auth(&self.api_token)
            .json(&spec)
            .send()
            .await
            .map_err(|e| ProvisionerError::Request(e.to_string()))?;
        resp.json::<LaunchResult>().await.map_err(|e| ProvisionerError::Request(e.to_string()))
    }

    async fn terminate(&self, cluster_handle: &str) -> Result<(), ProvisionerError> {
        self.client
            .delete(format!("{}/clusters/{}", self.base_url, cluster_handle))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| ProvisionerError::Request(e.to_string()))?;
        Ok(())
    }

    async fn status(&self, cluster_handle: &str) -> Result<CloudStatus, ProvisionerError> {
        let resp = self
            .client
            .get(format!("{}/clusters/{}/status", self.base_url, cluster_handle))
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| ProvisionerError::Request(e.to_string()))?;
        let parsed: StatusResponse = resp.json().await.map_err(|e| ProvisionerError::Request(e.to_string()))?;
        Ok(parse_cloud_status(&parsed.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provisioner_launch_then_status_round_trips() {
        let provisioner = MockProvisioner::new();
        let result = provisioner
            .launch(LaunchSpec { instance_type: "a10g.xlarge".into(), gpu_type: "a10g".into(), spot: false, region: "us-east-1".into(), model_id: uuid::Uuid::new_v4() })
            .await
            .unwrap();
        provisioner.set_status(&result.cluster_handle, CloudStatus::Running);
        assert_eq!(provisioner.status(&result.cluster_handle).await.unwrap(), CloudStatus::Running);
    }

    #[test]
    fn cloud_status_healthy_set_matches_spec() {
        assert!(CloudStatus::Up.is_healthy());
        assert!(CloudStatus::Running.is_healthy());
        assert!(!CloudStatus::Pending.is_healthy());
    }
}
