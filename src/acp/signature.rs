//! HMAC-SHA256 signing for protocol messages.
//!
//! Every message that crosses the router carries a hex-encoded HMAC over
//! its canonical bytes, keyed by the sending agent's secret. Verification
//! never reveals which byte diverged.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Generate a fresh 256-bit agent secret, hex encoded.
pub fn generate_secret() -> String {
    let mut buf = [0u8; 32];
    rand::rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// Sign `bytes` with `secret`, returning the hex-encoded MAC.
pub fn sign(secret: &str, bytes: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(bytes);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex-encoded MAC against `bytes`. Malformed hex, a wrong key,
/// or a wrong MAC all come back `false`.
pub fn verify(secret: &str, bytes: &[u8], signature_hex: &str) -> bool {
    let Ok(expected) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(bytes);
    mac.verify_slice(&expected).is_ok()
}

/// Constant-time string comparison for secrets.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
