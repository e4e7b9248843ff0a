//! Salted password hashes for members and list administrators.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const SCHEME: &str = "sha256";
const SALT_LEN: usize = 16;

/// A stored password secret: `sha256$<salt-hex>$<digest-hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash `secret` with a fresh random salt.
    pub fn new(secret: &str) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::with_salt(secret, &salt)
    }

    fn with_salt(secret: &str, salt: &[u8]) -> Self {
        let digest = salted_digest(secret, salt);
        Self(format!("{SCHEME}${}${}", hex::encode(salt), hex::encode(digest)))
    }

    /// Check `secret` against this hash. Malformed hashes never match.
    pub fn verify(&self, secret: &str) -> bool {
        let mut parts = self.0.splitn(3, '$');
        let (Some(scheme), Some(salt_hex), Some(digest_hex)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return false;
        };
        if scheme != SCHEME {
            return false;
        }
        let (Ok(salt), Ok(digest)) = (hex::decode(salt_hex), hex::decode(digest_hex)) else {
            return false;
        };
        salted_digest(secret, &salt).as_slice() == digest.as_slice()
    }

    /// The encoded form, suitable for deriving session credentials.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Generate a random member password (used for batch subscriptions).
pub fn random_password() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn salted_digest(secret: &str, salt: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret.as_bytes());
    hasher.finalize().into()
}
