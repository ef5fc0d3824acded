use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::key_info::KeyInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Active,
    Suspended,
    Revoked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TenantStatus {
    Active,
    Suspended,
    Canceled,
    Deleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentStatus {
    Active,
    Disabled,
}

/// A row as read from the store, before the Authenticator applies the
/// liveness checks in step 3 of `Validate`.
#[derive(Debug, Clone)]
pub struct StoredKey {
    pub info: KeyInfo,
    pub secret_hash: String,
    pub status: KeyStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub tenant_status: TenantStatus,
    pub environment_status: EnvironmentStatus,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Backing store for API key lookups. `lookup_digest` is the deterministic
/// HMAC of the presented secret (see `crate::lookup::digest`); rows are
/// indexed by it so validation never needs to scan every active key.
#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn find_by_lookup_digest(&self, digest: &[u8]) -> Result<Option<StoredKey>, StoreError>;

    /// Best-effort, bounded update of `last_used_at`. Implementations must
    /// never let this block or fail the caller's admission path.
    async fn touch_last_used(&self, key_id: Uuid);
}

/// In-memory `KeyStore` used by tests and by `Authenticator` unit tests
/// exercising the cache-then-revalidate flow without a database.
#[derive(Default, Clone)]
pub struct InMemoryKeyStore {
    rows: std::sync::Arc<std::sync::RwLock<std::collections::HashMap<Vec<u8>, StoredKey>>>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, digest: Vec<u8>, row: StoredKey) {
        self.rows.write().expect("rwlock poisoned").insert(digest, row);
    }

    pub fn set_tenant_status(&self, tenant_id: Uuid, status: TenantStatus) {
        let mut guard = self.rows.write().expect("rwlock poisoned");
        for row in guard.values_mut() {
            if row.info.tenant_id == tenant_id {
                row.tenant_status = status;
            }
        }
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn find_by_lookup_digest(&self, digest: &[u8]) -> Result<Option<StoredKey>, StoreError> {
        Ok(self.rows.read().expect("rwlock poisoned").get(digest).cloned())
    }

    async fn touch_last_used(&self, _key_id: Uuid) {}
}
