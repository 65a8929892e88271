//! HMAC-SHA256 request signing.
//!
//! Every delivery carries an `X-Request-Signature` header: the hex-encoded
//! HMAC-SHA256 of the raw request body under the shared secret. The cloud
//! side recomputes the signature over the bytes it received and compares in
//! constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 signature of a payload.
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded signature against a payload, in constant time.
pub fn verify_signature(expected_hex: &str, secret: &str, payload: &[u8]) -> bool {
    let computed = sign_payload(secret, payload);
    expected_hex.as_bytes().ct_eq(computed.as_bytes()).into()
}
