pub mod authenticator;
pub mod config;
pub mod error;
pub mod hashing;
pub mod key_info;
pub mod lookup;
pub mod store;

pub use authenticator::Authenticator;
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use key_info::{KeyInfo, Tier};
pub use store::{EnvironmentStatus, InMemoryKeyStore, KeyStatus, KeyStore, StoreError, StoredKey, TenantStatus};
