use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::hashing::verify_secret;
use crate::key_info::KeyInfo;
use crate::lookup;
use crate::store::{EnvironmentStatus, KeyStatus, KeyStore, StoredKey, TenantStatus};

/// Validates presented bearer secrets and resolves `(tenant, environment,
/// key)`, with a short-TTL positive-only cache in front of the store.
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn KeyStore>,
    cache: moka::future::Cache<Vec<u8>, Arc<StoredKey>>,
    config: AuthConfig,
}

impl Authenticator {
    pub fn new(store: Arc<dyn KeyStore>, config: AuthConfig) -> Self {
        let cache = moka::future::Cache::builder()
            .time_to_live(Duration::from_secs(config.cache_ttl_secs))
            .build();
        Self { store, cache, config }
    }

    pub async fn validate(&self, secret: &str) -> AuthResult<KeyInfo> {
        let digest = lookup::digest(secret);

        if let Some(cached) = self.cache.get(&digest).await {
            if verify_secret(secret, &cached.secret_hash) && check_live(&cached).is_ok() {
                self.touch(cached.info.key_id);
                return Ok(cached.info.clone());
            }
            self.cache.invalidate(&digest).await;
        }

        let row = self
            .store
            .find_by_lookup_digest(&digest)
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?
            .ok_or(AuthError::InvalidKey)?;

        if !verify_secret(secret, &row.secret_hash) {
            return Err(AuthError::InvalidKey);
        }
        check_live(&row)?;

        let info = row.info.clone();
        self.cache.insert(digest, Arc::new(row)).await;
        self.touch(info.key_id);
        Ok(info)
    }

    fn touch(&self, key_id: Uuid) {
        let store = self.store.clone();
        let timeout = Duration::from_secs(self.config.touch_timeout_secs);
        tokio::spawn(async move {
            let _ = tokio::time::timeout(timeout, store.touch_last_used(key_id)).await;
        });
    }
}

fn check_live(row: &StoredKey) -> AuthResult<()> {
    match row.status {
        KeyStatus::Active => {}
        KeyStatus::Suspended | KeyStatus::Revoked => return Err(AuthError::DisabledKey),
    }
    if let Some(expires_at) = row.expires_at {
        if expires_at <= Utc::now() {
            return Err(AuthError::ExpiredKey);
        }
    }
    if row.tenant_status != TenantStatus::Active {
        return Err(AuthError::DisabledTenant);
    }
    if row.environment_status != EnvironmentStatus::Active {
        return Err(AuthError::DisabledEnvironment);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::hash_secret;
    use crate::key_info::{KeyInfo, Tier};
    use crate::store::InMemoryKeyStore;

    fn stored_key(secret: &str, tenant_status: TenantStatus) -> StoredKey {
        StoredKey {
            info: KeyInfo {
                key_id: Uuid::new_v4(),
                key_prefix: "sk_test".into(),
                tenant_id: Uuid::new_v4(),
                environment_id: Uuid::new_v4(),
                tier: Tier::Pro,
                requests_per_min: 60,
                tokens_per_min: 60_000,
                concurrency: 10,
            },
            secret_hash: hash_secret(secret).unwrap(),
            status: KeyStatus::Active,
            expires_at: None,
            tenant_status,
            environment_status: EnvironmentStatus::Active,
        }
    }

    #[tokio::test]
    async fn validates_an_active_key() {
        let secret = "sk_live_abc123";
        let store = InMemoryKeyStore::new();
        let row = stored_key(secret, TenantStatus::Active);
        store.insert(lookup::digest(secret), row);
        let auth = Authenticator::new(Arc::new(store), AuthConfig::default());

        let info = auth.validate(secret).await.expect("should validate");
        assert_eq!(info.tier, Tier::Pro);
    }

    #[tokio::test]
    async fn rejects_unknown_secret() {
        let auth = Authenticator::new(Arc::new(InMemoryKeyStore::new()), AuthConfig::default());
        let err = auth.validate("sk_live_nope").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidKey));
    }

    #[tokio::test]
    async fn suspended_tenant_is_caught_once_the_cache_entry_expires() {
        let secret = "sk_live_def456";
        let store = InMemoryKeyStore::new();
        let row = stored_key(secret, TenantStatus::Active);
        let tenant_id = row.info.tenant_id;
        store.insert(lookup::digest(secret), row);
        let auth = Authenticator::new(Arc::new(store.clone()), AuthConfig { cache_ttl_secs: 1, touch_timeout_secs: 5 });

        auth.validate(secret).await.expect("first call populates cache");
        store.set_tenant_status(tenant_id, TenantStatus::Suspended);

        // Within the TTL the cached (pre-suspension) copy still answers cheaply.
        auth.validate(secret).await.expect("still within cache TTL");

        tokio::time::sleep(Duration::from_millis(1100)).await;

        let err = auth.validate(secret).await.unwrap_err();
        assert!(matches!(err, AuthError::DisabledTenant));
    }
}
