//! Stripe signature verification: HMAC-SHA256 over the canonical
//! `"{timestamp}.{body}"` string, compared against the `v1` field of a
//! `Stripe-Signature: t=...,v1=...` header.

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing Stripe-Signature header")]
    MissingHeader,
    #[error("malformed Stripe-Signature header")]
    Malformed,
    #[error("signature mismatch")]
    Mismatch,
    #[error("timestamp outside allowed skew")]
    Skew,
}

struct ParsedHeader {
    timestamp: i64,
    v1: String,
}

fn parse_header(raw: &str) -> Result<ParsedHeader, SignatureError> {
    let mut timestamp = None;
    let mut v1 = None;
    for part in raw.split(',') {
        let (k, v) = part.split_once('=').ok_or(SignatureError::Malformed)?;
        match k.trim() {
            "t" => timestamp = v.trim().parse::<i64>().ok(),
            "v1" => v1 = Some(v.trim().to_string()),
            _ => {}
        }
    }
    match (timestamp, v1) {
        (Some(timestamp), Some(v1)) => Ok(ParsedHeader { timestamp, v1 }),
        _ => Err(SignatureError::Malformed),
    }
}

/// Verifies `header` against `payload` under `secret`, rejecting requests
/// signed outside `max_skew_secs` of now. Returns `Ok(())` only when both
/// the timestamp and the HMAC check pass.
pub fn verify_signature(secret: &str, payload: &[u8], header: Option<&str>, max_skew_secs: i64, now: chrono::DateTime<Utc>) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header)?;

    if (now.timestamp() - parsed.timestamp).unsigned_abs() as i64 > max_skew_secs {
        return Err(SignatureError::Skew);
    }

    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Malformed)?;
    mac.update(parsed.timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let eq = expected.as_bytes().ct_eq(parsed.v1.as_bytes()).unwrap_u8();
    if eq != 1 {
        return Err(SignatureError::Mismatch);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, timestamp: i64, payload: &[u8]) -> String {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        let v1 = hex::encode(mac.finalize().into_bytes());
        format!("t={},v1={}", timestamp, v1)
    }

    #[test]
    fn valid_signature_within_skew_passes() {
        let now = Utc::now();
        let header = sign("whsec_test", now.timestamp(), b"{\"id\":\"evt_1\"}");
        assert!(verify_signature("whsec_test", b"{\"id\":\"evt_1\"}", Some(&header), 300, now).is_ok());
    }

    #[test]
    fn tampered_payload_fails() {
        let now = Utc::now();
        let header = sign("whsec_test", now.timestamp(), b"{\"id\":\"evt_1\"}");
        assert_eq!(verify_signature("whsec_test", b"{\"id\":\"evt_2\"}", Some(&header), 300, now).unwrap_err(), SignatureError::Mismatch);
    }

    #[test]
    fn stale_timestamp_fails() {
        let now = Utc::now();
        let old = now - chrono::Duration::seconds(600);
        let header = sign("whsec_test", old.timestamp(), b"{\"id\":\"evt_1\"}");
        assert_eq!(verify_signature("whsec_test", b"{\"id\":\"evt_1\"}", Some(&header), 300, now).unwrap_err(), SignatureError::Skew);
    }

    #[test]
    fn missing_header_fails() {
        let now = Utc::now();
        assert_eq!(verify_signature("whsec_test", b"{}", None, 300, now).unwrap_err(), SignatureError::MissingHeader);
    }
}
