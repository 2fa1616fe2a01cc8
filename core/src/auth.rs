use std::fmt::Write;

use rand::Rng;
use sha2::{Digest, Sha256};

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, b| {
            let _ = write!(acc, "{b:02x}");
            acc
        })
}

#[must_use]
pub fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    to_hex(&bytes)
}

#[must_use]
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    to_hex(&hasher.finalize())
}

#[must_use]
pub fn verify_password(password: &str, salt: &str, expected_hash: &str) -> bool {
    let actual = hash_password(password, salt);
    // Compare every byte so timing does not reveal the matching prefix.
    actual.len() == expected_hash.len()
        && actual
            .bytes()
            .zip(expected_hash.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic_per_salt() {
        let a = hash_password("hunter2", "abc");
        assert_eq!(a, hash_password("hunter2", "abc"));
        assert_ne!(a, hash_password("hunter2", "abd"));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_verify() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 32);
        let hash = hash_password("correct horse", &salt);
        assert!(verify_password("correct horse", &salt, &hash));
        assert!(!verify_password("correct horse ", &salt, &hash));
        assert!(!verify_password("correct horse", &salt, "short"));
    }
}
