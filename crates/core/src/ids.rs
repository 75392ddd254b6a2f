//! Random tokens, short-link slugs, and tenant slug normalisation.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};

use crate::error::{TlxError, TlxResult};

/// URL-safe random token built from `len_bytes` of OS randomness
/// (32 bytes gives 43 characters).
pub fn secure_token(len_bytes: usize) -> String {
    let mut buf = vec![0u8; len_bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Random ASCII alphanumeric slug.
pub fn generate_slug(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Lowercase, replace spaces with `-`, and allow only alphanumerics, `-`
/// and `_`.
pub fn normalize_slug(value: &str) -> TlxResult<String> {
    let v = value.trim().to_lowercase().replace(' ', "-");
    let ok = v
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if v.is_empty() || !ok {
        return Err(TlxError::bad_request("invalid tenant slug"));
    }
    Ok(v)
}
