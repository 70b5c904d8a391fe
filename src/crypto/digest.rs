//! Keyed integrity digest (HMAC-SHA2), hex encoded.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

use super::methods::HashMethod;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Compute the hex-encoded keyed digest of `data`.
pub fn hash(method: HashMethod, data: &[u8], secret: &[u8]) -> String {
    hex::encode(raw_digest(method, data, secret))
}

/// Compare `digest_hex` against the digest of `data` in constant time.
///
/// Malformed hex is simply a mismatch.
pub fn verify_hash(method: HashMethod, data: &[u8], secret: &[u8], digest_hex: &str) -> bool {
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };
    match method {
        HashMethod::Sha256 => {
            let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
                return false;
            };
            mac.update(data);
            mac.verify_slice(&expected).is_ok()
        }
        HashMethod::Sha512 => {
            let Ok(mut mac) = HmacSha512::new_from_slice(secret) else {
                return false;
            };
            mac.update(data);
            mac.verify_slice(&expected).is_ok()
        }
    }
}

pub(crate) fn raw_digest(method: HashMethod, data: &[u8], secret: &[u8]) -> Vec<u8> {
    // HMAC accepts keys of any length, new_from_slice cannot fail here
    match method {
        HashMethod::Sha256 => match HmacSha256::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Err(_) => Vec::new(),
        },
        HashMethod::Sha512 => match HmacSha512::new_from_slice(secret) {
            Ok(mut mac) => {
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            Err(_) => Vec::new(),
        },
    }
}
