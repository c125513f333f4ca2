//! Shared Ed25519 primitives and opaque-identifier generation.
//!
//! Every identifier on the wire (`registration_id`, `challenge`, `api_key`,
//! bearer tokens) is CSPRNG-random bytes, URL-safe base64-encoded — the
//! same encoding the teacher gateway uses for its own bearer tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;

/// Generate a fresh Ed25519 keypair.
///
/// Returns `(public_key_b64, secret_key_b64)`: the 32-byte raw public key
/// and 32-byte seed, each URL-safe base64-encoded.
#[must_use]
pub fn generate_keypair() -> (String, String) {
    let signing_key = SigningKey::generate(&mut rand::rng());
    let public = URL_SAFE_NO_PAD.encode(signing_key.verifying_key().as_bytes());
    let secret = URL_SAFE_NO_PAD.encode(signing_key.to_bytes());
    (public, secret)
}

/// Sign the UTF-8 bytes of `message` with a base64-encoded Ed25519 secret key.
///
/// # Errors
///
/// Returns `None` if `secret_b64` does not decode to a valid 32-byte seed.
#[must_use]
pub fn sign(message: &str, secret_b64: &str) -> Option<String> {
    let secret_bytes = URL_SAFE_NO_PAD.decode(secret_b64).ok()?;
    let seed: [u8; 32] = secret_bytes.try_into().ok()?;
    let signing_key = SigningKey::from_bytes(&seed);
    let signature = signing_key.sign(message.as_bytes());
    Some(URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// Verify an Ed25519 signature over the UTF-8 bytes of `message`.
///
/// Never panics or raises — any decoding or verification failure simply
/// returns `false`.
#[must_use]
pub fn verify(message: &str, signature_b64: &str, public_b64: &str) -> bool {
    let Ok(public_bytes) = URL_SAFE_NO_PAD.decode(public_b64) else {
        return false;
    };
    let Ok(public_bytes): Result<[u8; 32], _> = public_bytes.try_into() else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&public_bytes) else {
        return false;
    };
    let Ok(signature_bytes) = URL_SAFE_NO_PAD.decode(signature_b64) else {
        return false;
    };
    let Ok(signature_bytes): Result<[u8; 64], _> = signature_bytes.try_into() else {
        return false;
    };
    let signature = Signature::from_bytes(&signature_bytes);
    verifying_key.verify(message.as_bytes(), &signature).is_ok()
}

/// Check whether a signed timestamp string is within `max_drift` seconds of `now`.
///
/// Returns `false` on non-integer input.
#[must_use]
pub fn is_timestamp_valid(s: &str, now: u64, max_drift: u64) -> bool {
    let Ok(ts) = s.parse::<i64>() else {
        return false;
    };
    let now = i64::try_from(now).unwrap_or(i64::MAX);
    (now - ts).unsigned_abs() <= max_drift
}

/// Generate `n` bytes of CSPRNG entropy, URL-safe base64-encoded.
fn random_token(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque identifier with a human-readable prefix.
///
/// `entropy_bytes` must be at least 32 to satisfy the "≥ 32 bytes of
/// entropy" invariant on `registration_id`, `challenge`, and bearer tokens.
#[must_use]
pub fn prefixed_id(prefix: &str, entropy_bytes: usize) -> String {
    format!("{prefix}{}", random_token(entropy_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let (public, secret) = generate_keypair();
        let sig = sign("hello", &secret).unwrap();
        assert!(verify("hello", &sig, &public));
    }

    #[test]
    fn verify_rejects_altered_message() {
        let (public, secret) = generate_keypair();
        let sig = sign("hello", &secret).unwrap();
        assert!(!verify("goodbye", &sig, &public));
    }

    #[test]
    fn verify_rejects_altered_signature() {
        let (public, secret) = generate_keypair();
        let mut sig = sign("hello", &secret).unwrap();
        sig.push('x');
        assert!(!verify("hello", &sig, &public));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let (_public, secret) = generate_keypair();
        let (other_public, _) = generate_keypair();
        let sig = sign("hello", &secret).unwrap();
        assert!(!verify("hello", &sig, &other_public));
    }

    #[test]
    fn verify_never_panics_on_garbage() {
        assert!(!verify("hello", "not-base64!!", "also-not-base64!!"));
        assert!(!verify("hello", "", ""));
    }

    #[test]
    fn timestamp_valid_within_drift() {
        assert!(is_timestamp_valid("1000", 1000, 300));
        assert!(is_timestamp_valid("700", 1000, 300));
        assert!(is_timestamp_valid("1300", 1000, 300));
    }

    #[test]
    fn timestamp_invalid_outside_drift() {
        assert!(!is_timestamp_valid("699", 1000, 300));
        assert!(!is_timestamp_valid("1301", 1000, 300));
    }

    #[test]
    fn timestamp_invalid_non_integer() {
        assert!(!is_timestamp_valid("not-a-number", 1000, 300));
    }

    #[test]
    fn prefixed_id_has_prefix_and_entropy() {
        let id = prefixed_id("reg_", 32);
        assert!(id.starts_with("reg_"));
        assert!(id.len() > 40);
    }
}
