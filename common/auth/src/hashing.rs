use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use rand::RngCore;

/// Hashes a presented secret with Argon2id. Only this hash is ever persisted.
pub fn hash_secret(secret: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(secret.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| format!("failed to hash secret: {err}"))
}

pub fn verify_secret(secret: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else { return false };
    Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
}

/// Generates a user-visible API key of the form `<scheme>_<env>_<32 opaque chars>`.
/// The caller persists only `hash_secret(&result)`; the plaintext is returned
/// exactly once.
pub fn generate_api_key(scheme: &str, env_tag: &str) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let opaque: String = bytes.iter().map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char).collect();
    format!("{scheme}_{env_tag}_{opaque}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let secret = generate_api_key("sk", "live");
        let hash = hash_secret(&secret).expect("hash");
        assert!(verify_secret(&secret, &hash));
        assert!(!verify_secret("wrong", &hash));
    }

    #[test]
    fn generated_keys_have_expected_shape() {
        let key = generate_api_key("sk", "test");
        let parts: Vec<&str> = key.splitn(3, '_').collect();
        assert_eq!(parts[0], "sk");
        assert_eq!(parts[1], "test");
        assert_eq!(parts[2].len(), 32);
    }
}
