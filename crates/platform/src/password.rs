//! Salted PBKDF2-HMAC-SHA256 password hashes.
//!
//! Stored form: `pbkdf2_sha256$<iterations>$<salt_b64>$<hash_b64>`.
//! Older rows hold a bare base64 digest derived with the pepper as salt;
//! those still verify.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "pbkdf2_sha256";
const SALT_LEN: usize = 16;
const LEGACY_ITERATIONS: u32 = 200_000;

/// PBKDF2 with a single 32-byte output block.
pub fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    let prf = HmacSha256::new_from_slice(password).expect("HMAC accepts any key length");

    let mut mac = prf.clone();
    mac.update(salt);
    mac.update(&1u32.to_be_bytes());
    let mut u = [0u8; 32];
    u.copy_from_slice(&mac.finalize().into_bytes());
    let mut out = u;

    for _ in 1..iterations.max(1) {
        let mut mac = prf.clone();
        mac.update(&u);
        u.copy_from_slice(&mac.finalize().into_bytes());
        for (o, b) in out.iter_mut().zip(u.iter()) {
            *o ^= b;
        }
    }
    out
}

#[derive(Clone)]
pub struct PasswordHasher {
    pepper: String,
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(pepper: impl Into<String>, iterations: u32) -> Self {
        Self {
            pepper: pepper.into(),
            iterations: iterations.max(1),
        }
    }

    pub fn hash(&self, password: &str) -> String {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);
        let digest = pbkdf2_sha256(&self.peppered(password), &salt, self.iterations);
        format!(
            "{SCHEME}${}${}${}",
            self.iterations,
            STANDARD.encode(salt),
            STANDARD.encode(digest)
        )
    }

    pub fn verify(&self, password: &str, stored: &str) -> bool {
        if !stored.starts_with(SCHEME) {
            return self.verify_legacy(password, stored);
        }

        let parts: Vec<&str> = stored.split('$').collect();
        let [_, iterations, salt, expected] = parts.as_slice() else {
            return false;
        };
        let Ok(iterations) = iterations.parse::<u32>() else {
            return false;
        };
        let (Ok(salt), Ok(expected)) = (STANDARD.decode(salt), STANDARD.decode(expected)) else {
            return false;
        };

        let digest = pbkdf2_sha256(&self.peppered(password), &salt, iterations);
        digest[..].ct_eq(&expected[..]).into()
    }

    fn verify_legacy(&self, password: &str, stored: &str) -> bool {
        let digest = pbkdf2_sha256(password.as_bytes(), self.pepper.as_bytes(), LEGACY_ITERATIONS);
        let encoded = STANDARD.encode(digest);
        encoded.as_bytes().ct_eq(stored.as_bytes()).into()
    }

    fn peppered(&self, password: &str) -> Vec<u8> {
        let mut input = Vec::with_capacity(password.len() + 1 + self.pepper.len());
        input.extend_from_slice(password.as_bytes());
        input.push(0);
        input.extend_from_slice(self.pepper.as_bytes());
        input
    }
}
