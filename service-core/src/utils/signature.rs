use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256 over `payload` and return the hex-encoded digest.
///
/// Used for Stripe-style signatures, where the signed payload is
/// `"{timestamp}.{raw_body}"` and the digest is lowercase hex.
pub fn hmac_sha256_hex(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Compute HMAC-SHA256 over `payload` and return the base64-encoded digest.
///
/// Used for Cashfree-style signatures, where the signed payload is a
/// concatenation of order fields and the digest is base64.
pub fn hmac_sha256_base64(secret: &str, payload: &str) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;
    mac.update(payload.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Verify a hex-encoded HMAC-SHA256 signature using constant-time comparison.
pub fn verify_hex(secret: &str, payload: &str, signature: &str) -> Result<bool, anyhow::Error> {
    let expected = hmac_sha256_hex(secret, payload)?;
    Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}

/// Verify a base64-encoded HMAC-SHA256 signature using constant-time comparison.
pub fn verify_base64(secret: &str, payload: &str, signature: &str) -> Result<bool, anyhow::Error> {
    let expected = hmac_sha256_base64(secret, payload)?;
    Ok(constant_time_eq(expected.as_bytes(), signature.as_bytes()))
}

fn constant_time_eq(expected: &[u8], supplied: &[u8]) -> bool {
    if expected.len() != supplied.len() {
        return false;
    }
    expected.ct_eq(supplied).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_signature_roundtrip() {
        let secret = "whsec_test_secret";
        let payload = r#"1678886400.{"type":"checkout.session.completed"}"#;

        let signature = hmac_sha256_hex(secret, payload).unwrap();
        assert!(verify_hex(secret, payload, &signature).unwrap());
    }

    #[test]
    fn base64_signature_roundtrip() {
        let secret = "cf_test_secret";
        let payload = "order_123100.00ref_9SUCCESSUPI2024-01-01T10:00:00+05:30";

        let signature = hmac_sha256_base64(secret, payload).unwrap();
        assert!(verify_base64(secret, payload, &signature).unwrap());
    }

    #[test]
    fn tampered_payload_rejected() {
        let secret = "whsec_test_secret";
        let signature = hmac_sha256_hex(secret, "payload-a").unwrap();
        assert!(!verify_hex(secret, "payload-b", &signature).unwrap());
    }

    #[test]
    fn tampered_signature_rejected() {
        let secret = "whsec_test_secret";
        let payload = "payload";
        let signature = hmac_sha256_hex(secret, payload).unwrap();

        let mut bytes = signature.into_bytes();
        bytes[0] = if bytes[0] == b'a' { b'b' } else { b'a' };
        let mutated = String::from_utf8(bytes).unwrap();

        assert!(!verify_hex(secret, payload, &mutated).unwrap());
    }

    #[test]
    fn length_mismatch_rejected() {
        let secret = "whsec_test_secret";
        let payload = "payload";
        let signature = hmac_sha256_hex(secret, payload).unwrap();
        assert!(!verify_hex(secret, payload, &signature[1..]).unwrap());
    }
}
