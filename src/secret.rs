//! Runtime secret generation.
//!
//! A fresh secret is generated on every provisioning run and embedded in the
//! service unit. Re-running the provisioner therefore rotates the secret even
//! when nothing else changed; the provision command warns about this.

use rand::RngCore;
use rand::rngs::OsRng;

const SECRET_BYTES: usize = 32;

/// Generate a fresh hex-encoded secret from the OS entropy source
pub fn generate() -> String {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex_encode(&bytes)
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
