//! Request signing: canonical payload encoding and keyed message digests.

use error_stack::ResultExt;
use masking::{PeekInterface, Secret};
use ring::hmac;

use crate::errors::{CryptoError, CustomResult};

/// Trait for cryptographically signing messages
pub trait SignMessage {
    /// Takes in a secret and a message and returns the calculated signature as bytes
    fn sign_message(&self, secret: &[u8], msg: &[u8]) -> CustomResult<Vec<u8>, CryptoError>;
}

/// Trait for cryptographically verifying a message against a signature
pub trait VerifySignature {
    /// Takes in a secret, the signature and the message and verifies the message
    /// against the signature
    fn verify_signature(
        &self,
        secret: &[u8],
        signature: &[u8],
        msg: &[u8],
    ) -> CustomResult<bool, CryptoError>;
}

/// Represents the HMAC-SHA-256 algorithm
#[derive(Debug)]
pub struct HmacSha256;

impl SignMessage for HmacSha256 {
    fn sign_message(&self, secret: &[u8], msg: &[u8]) -> CustomResult<Vec<u8>, CryptoError> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
        Ok(hmac::sign(&key, msg).as_ref().to_vec())
    }
}

impl VerifySignature for HmacSha256 {
    fn verify_signature(
        &self,
        secret: &[u8],
        signature: &[u8],
        msg: &[u8],
    ) -> CustomResult<bool, CryptoError> {
        let key = hmac::Key::new(hmac::HMAC_SHA256, secret);
        Ok(hmac::verify(&key, msg, signature).is_ok())
    }
}

/// Renders the canonical string a request signature is computed over.
///
/// The payload's top-level fields are sorted by key and their rendered values
/// concatenated without a separator. Booleans render as their literal text,
/// scalars via their display form, and nested objects or arrays as their
/// compact JSON text. This mirrors the verification algorithm on the gateway
/// side bit for bit, so the rendering must not change.
pub fn signature_base(payload: &serde_json::Value) -> CustomResult<String, CryptoError> {
    let fields = payload
        .as_object()
        .ok_or(CryptoError::EncodingFailed)
        .attach_printable("signature payload must be a JSON object")?;

    let sorted = fields
        .iter()
        .collect::<std::collections::BTreeMap<&String, &serde_json::Value>>();

    let mut base = String::new();
    for value in sorted.into_values() {
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Bool(value) => base.push_str(if *value { "true" } else { "false" }),
            serde_json::Value::Number(value) => base.push_str(&value.to_string()),
            serde_json::Value::String(value) => base.push_str(value),
            nested @ (serde_json::Value::Object(_) | serde_json::Value::Array(_)) => {
                base.push_str(&nested.to_string())
            }
        }
    }
    Ok(base)
}

/// Signs a request payload with the caller's secret.
///
/// Computes an HMAC-SHA-256 over the UTF-8 bytes of the canonical encoding
/// and renders the digest as lowercase hex. Pure function of its inputs.
pub fn generate_signature(
    secret: &Secret<String>,
    payload: &impl serde::Serialize,
) -> CustomResult<String, CryptoError> {
    let value = serde_json::to_value(payload)
        .change_context(CryptoError::EncodingFailed)
        .attach_printable("failed to serialize signature payload")?;
    let base = signature_base(&value)?;
    let digest = HmacSha256
        .sign_message(secret.peek().as_bytes(), base.as_bytes())
        .change_context(CryptoError::MessageSigningFailed)?;
    Ok(hex::encode(digest))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn base_concatenates_values_in_sorted_key_order() {
        let base = signature_base(&json!({
            "currency": "UAH",
            "amount": 100,
            "confirm": true,
        }))
        .unwrap();
        assert_eq!(base, "100trueUAH");
    }

    #[test]
    fn base_is_independent_of_field_declaration_order() {
        let first = signature_base(&json!({"amount": 100, "currency": "UAH"})).unwrap();
        let second = signature_base(&json!({"currency": "UAH", "amount": 100})).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn nested_values_flatten_to_their_json_text() {
        let base = signature_base(&json!({
            "amount": 100,
            "orders": [{"id": "a"}, {"id": "b"}],
        }))
        .unwrap();
        assert_eq!(base, r#"100[{"id":"a"},{"id":"b"}]"#);
    }

    #[test]
    fn null_fields_do_not_contribute() {
        let with_null = signature_base(&json!({"amount": 100, "tax": null})).unwrap();
        let without = signature_base(&json!({"amount": 100})).unwrap();
        assert_eq!(with_null, without);
    }

    #[test]
    fn signature_is_deterministic_and_lowercase_hex() {
        let secret = Secret::new("test_secret".to_string());
        let payload = json!({"amount": 100, "currency": "UAH"});
        let first = generate_signature(&secret, &payload).unwrap();
        let second = generate_signature(&secret, &payload).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_ignores_field_order_but_not_values() {
        let secret = Secret::new("test_secret".to_string());
        let ordered = generate_signature(&secret, &json!({"amount": 100, "currency": "UAH"})).unwrap();
        let reordered =
            generate_signature(&secret, &json!({"currency": "UAH", "amount": 100})).unwrap();
        let changed = generate_signature(&secret, &json!({"amount": 101, "currency": "UAH"})).unwrap();
        assert_eq!(ordered, reordered);
        assert_ne!(ordered, changed);
    }

    #[test]
    fn signature_changes_with_the_secret() {
        let payload = json!({"amount": 100});
        let first = generate_signature(&Secret::new("one".to_string()), &payload).unwrap();
        let second = generate_signature(&Secret::new("two".to_string()), &payload).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(signature_base(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn digest_verifies_against_its_own_signature() {
        let digest = HmacSha256.sign_message(b"secret", b"message").unwrap();
        assert!(HmacSha256.verify_signature(b"secret", &digest, b"message").unwrap());
        assert!(!HmacSha256.verify_signature(b"secret", &digest, b"other").unwrap());
    }
}
