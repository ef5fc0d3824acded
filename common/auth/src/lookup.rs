use common_crypto::deterministic_hash;

/// Server-wide pepper for the API-key lookup digest. Distinct from any
/// tenant DEK: this key never protects tenant data, only indexes key rows.
fn pepper() -> [u8; 32] {
    let raw = std::env::var("AUTH_LOOKUP_PEPPER").unwrap_or_else(|_| "insecure-dev-pepper-do-not-use-in-prod".to_string());
    let mut out = [0u8; 32];
    let bytes = raw.as_bytes();
    for (i, b) in bytes.iter().take(32).enumerate() {
        out[i] = *b;
    }
    out
}

/// Deterministic digest used to index API key rows by their plaintext
/// secret. Not a substitute for `hashing::verify_secret`, which confirms the
/// match after lookup.
pub fn digest(secret: &str) -> Vec<u8> {
    deterministic_hash(&pepper(), secret.as_bytes()).expect("hmac key is always 32 bytes")
}
