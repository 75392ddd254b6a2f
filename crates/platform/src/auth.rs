//! Bearer tokens: compact HS256 JWTs signed with HMAC-SHA256.
//!
//! Tokens are `<b64url(header)>.<b64url(claims)>.<b64url(signature)>`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tlx_core::TlxError;

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("unsupported token algorithm")]
    Algorithm,
    #[error("signature mismatch")]
    Signature,
    #[error("token expired")]
    Expired,
    #[error("issuer mismatch")]
    Issuer,
    #[error("missing claim: {0}")]
    MissingClaim(&'static str),
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("claims are not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<TokenError> for TlxError {
    fn from(_: TokenError) -> Self {
        TlxError::Unauthorized("Invalid token".into())
    }
}

/// Signed claims. `tid`, `email`, and `iss` are only present on tenant tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<i64>,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

impl Claims {
    /// Numeric subject. Tokens with a non-numeric `sub` are rejected.
    pub fn user_id(&self) -> Result<i64, TokenError> {
        self.sub
            .parse()
            .map_err(|_| TokenError::MissingClaim("sub"))
    }
}

/// What goes into a freshly issued token.
#[derive(Debug, Clone)]
pub struct TokenSubject<'a> {
    pub user_id: i64,
    pub tenant_id: Option<i64>,
    pub email: Option<&'a str>,
    pub role: &'a str,
}

#[derive(Deserialize)]
struct Header {
    alg: String,
}

/// Issues and verifies HS256 tokens for one secret/issuer pair.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    issuer: Option<String>,
    ttl: Duration,
}

impl TokenIssuer {
    /// `issuer` is stamped into and required on every token when set.
    pub fn new(secret: impl AsRef<[u8]>, issuer: Option<String>, ttl_minutes: i64) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            issuer,
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    pub fn issue(&self, subject: &TokenSubject<'_>) -> Result<String, TokenError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: subject.user_id.to_string(),
            tid: subject.tenant_id,
            role: subject.role.to_string(),
            email: subject.email.map(str::to_string),
            iat: now,
            exp: now + self.ttl.num_seconds(),
            iss: self.issuer.clone(),
        };
        self.encode(&claims)
    }

    /// Sign arbitrary claims.
    pub fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = URL_SAFE_NO_PAD.encode(HEADER);
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let signing_input = format!("{header}.{payload}");
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Check signature, algorithm, expiry and issuer.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(sig_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64)?)?;
        if header.alg != "HS256" {
            return Err(TokenError::Algorithm);
        }

        let signature = URL_SAFE_NO_PAD.decode(sig_b64)?;
        let mut mac = self.mac();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::Signature)?;

        let claims: Claims = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload_b64)?)?;
        if claims.sub.is_empty() {
            return Err(TokenError::MissingClaim("sub"));
        }
        if claims.exp <= Utc::now().timestamp() {
            return Err(TokenError::Expired);
        }
        if let Some(expected) = &self.issuer {
            match &claims.iss {
                Some(iss) if iss == expected => {}
                Some(_) => return Err(TokenError::Issuer),
                None => return Err(TokenError::MissingClaim("iss")),
            }
        }
        Ok(claims)
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length")
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("dev-test", Some("tlx-ads".into()), 120)
    }

    fn subject() -> TokenSubject<'static> {
        TokenSubject {
            user_id: 7,
            tenant_id: Some(3),
            email: Some("ana@tlxads.local"),
            role: "editor",
        }
    }

    #[test]
    fn issue_then_verify() {
        let iss = issuer();
        let token = iss.issue(&subject()).unwrap();
        let claims = iss.verify(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 7);
        assert_eq!(claims.tid, Some(3));
        assert_eq!(claims.role, "editor");
        assert_eq!(claims.iss.as_deref(), Some("tlx-ads"));
        assert_eq!(claims.exp - claims.iat, 120 * 60);
    }

    #[test]
    fn rejects_other_secret() {
        let token = issuer().issue(&subject()).unwrap();
        let other = TokenIssuer::new("other", Some("tlx-ads".into()), 120);
        assert!(matches!(other.verify(&token), Err(TokenError::Signature)));
    }

    #[test]
    fn rejects_expired_and_wrong_issuer() {
        let iss = issuer();
        let now = Utc::now().timestamp();
        let expired = Claims {
            sub: "1".into(),
            tid: Some(1),
            role: "admin".into(),
            email: None,
            iat: now - 7200,
            exp: now - 10,
            iss: Some("tlx-ads".into()),
        };
        let token = iss.encode(&expired).unwrap();
        assert!(matches!(iss.verify(&token), Err(TokenError::Expired)));

        let foreign = Claims {
            exp: now + 60,
            iss: Some("someone-else".into()),
            ..expired
        };
        let token = iss.encode(&foreign).unwrap();
        assert!(matches!(iss.verify(&token), Err(TokenError::Issuer)));
    }

    #[test]
    fn issuerless_profile_skips_iss_check() {
        let shop = TokenIssuer::new("shop", None, 720);
        let token = shop
            .issue(&TokenSubject {
                user_id: 1,
                tenant_id: None,
                email: None,
                role: "operator",
            })
            .unwrap();
        let claims = shop.verify(&token).unwrap();
        assert_eq!(claims.iss, None);
        assert_eq!(claims.tid, None);
    }

    #[test]
    fn rejects_garbage() {
        let iss = issuer();
        assert!(matches!(iss.verify("abc"), Err(TokenError::Malformed)));
        assert!(iss.verify("a.b.c").is_err());
        let err: TlxError = TokenError::Malformed.into();
        assert_eq!(err.status_code(), 401);
    }

    #[test]
    fn accepts_externally_signed_token() {
        // header {"alg":"HS256","typ":"JWT"}, claims with exp far in the future,
        // signed with "dev-test".
        let token = concat!(
            "eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9.",
            "eyJzdWIiOiI0MiIsInRpZCI6MSwicm9sZSI6ImFkbWluIiwiZW1haWwiOiJ4QHkueiIsImlhdCI6MTcwMDAwMDAwMCwiZXhwIjo0MTAyNDQ0ODAwLCJpc3MiOiJ0bHgtYWRzIn0.",
            "9Gxn757dajko2pbe_T_U_NxEKYMe8Uq1mYMia-G_LwM"
        );
        let claims = issuer().verify(token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.email.as_deref(), Some("x@y.z"));
    }
}
