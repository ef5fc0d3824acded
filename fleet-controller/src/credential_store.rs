//! C1 Credential Store: encrypts/decrypts per-tenant cloud credentials so
//! the provisioner never touches plaintext secrets at rest. Envelope
//! encryption: a per-tenant DEK is generated once, encrypted under the
//! deployment's `MasterKey`, and stored alongside the credential blob
//! (itself encrypted under the DEK).

use common_crypto::{decrypt_field, encrypt_field, generate_dek, CryptoError, MasterKey};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("no credentials on file for tenant {0}")]
    NotFound(Uuid),
}

pub struct CredentialStore {
    pool: PgPool,
    master_key: MasterKey,
}

impl CredentialStore {
    pub fn new(pool: PgPool, master_key: MasterKey) -> Self {
        Self { pool, master_key }
    }

    /// Encrypts `plaintext_credential` under a fresh per-tenant DEK and
    /// persists both the DEK (sealed under the master key) and the
    /// credential blob. Overwrites any prior row for `(tenant_id, provider)`.
    pub async fn store(&self, tenant_id: Uuid, provider: &str, plaintext_credential: &[u8]) -> Result<(), CredentialStoreError> {
        let dek = generate_dek();
        let sealed_dek = self.master_key.encrypt_tenant_dek(&dek)?;
        let sealed_credential = encrypt_field(&dek, plaintext_credential)?;

        sqlx::query(
            "INSERT INTO tenant_cloud_credentials (tenant_id, provider, sealed_dek, sealed_credential, updated_at)
             VALUES ($1, $2, $3, $4, now())
             ON CONFLICT (tenant_id, provider)
             DO UPDATE SET sealed_dek = EXCLUDED.sealed_dek, sealed_credential = EXCLUDED.sealed_credential, updated_at = now()",
        )
        .bind(tenant_id)
        .bind(provider)
        .bind(sealed_dek)
        .bind(sealed_credential)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Decrypts and returns the credential for `(tenant_id, provider)`, for
    /// hand-off to the provisioner at launch time. Never logged, never
    /// cached beyond the caller's stack frame.
    pub async fn fetch(&self, tenant_id: Uuid, provider: &str) -> Result<Vec<u8>, CredentialStoreError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = sqlx::query_as(
            "SELECT sealed_dek, sealed_credential FROM tenant_cloud_credentials WHERE tenant_id = $1 AND provider = $2",
        )
        .bind(tenant_id)
        .bind(provider)
        .fetch_optional(&self.pool)
        .await?;

        let (sealed_dek, sealed_credential) = row.ok_or(CredentialStoreError::NotFound(tenant_id))?;
        let dek = self.master_key.decrypt_tenant_dek(&sealed_dek)?;
        let plaintext = decrypt_field(&dek, &sealed_credential)?;
        Ok(plaintext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_master_key() -> MasterKey {
        MasterKey::from_bytes([3u8; 32]).unwrap()
    }

    #[test]
    fn encrypt_field_round_trips_through_a_fresh_dek() {
        let dek = generate_dek();
        let sealed = encrypt_field(&dek, b"aws-secret-access-key").unwrap();
        let recovered = decrypt_field(&dek, &sealed).unwrap();
        assert_eq!(recovered, b"aws-secret-access-key");
    }

    #[test]
    fn master_key_seals_and_unseals_the_dek() {
        let master = test_master_key();
        let dek = generate_dek();
        let sealed = master.encrypt_tenant_dek(&dek).unwrap();
        assert_eq!(master.decrypt_tenant_dek(&sealed).unwrap(), dek);
    }
}
