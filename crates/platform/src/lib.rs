//! Platform capabilities shared by both APIs: bearer tokens, password
//! hashing, role checks, rate limiting, and audit logging.

pub mod audit;
pub mod auth;
pub mod password;
pub mod rate_limit;
pub mod rbac;

pub use audit::{AuditEntry, AuditLogger};
pub use auth::{Claims, TokenError, TokenIssuer, TokenSubject};
pub use password::PasswordHasher;
pub use rate_limit::RateLimiter;
pub use rbac::require_role;
