use std::sync::Arc;

use serde_json::Value;
use tlx_billing::{BillingService, PlanRegistry, UsageMeter};
use tlx_core::{AppConfig, TlxResult};
use tlx_platform::{AuditLogger, PasswordHasher, RateLimiter, TokenIssuer};

use crate::auth::AuthUser;
use crate::store::ManagementStore;

/// Shared state of the ads/CRM API.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ManagementStore>,
    pub audit: Arc<AuditLogger>,
    pub limiter: Arc<RateLimiter>,
    pub tokens: TokenIssuer,
    pub passwords: PasswordHasher,
    pub meter: Arc<UsageMeter>,
    pub billing: Arc<BillingService>,
}

impl AppState {
    pub fn new(config: AppConfig, limiter: RateLimiter) -> TlxResult<Self> {
        let registry = Arc::new(PlanRegistry::new());
        let billing = BillingService::new(&config.billing, &config.web, registry.clone())?;
        let tokens = TokenIssuer::new(
            &config.auth.jwt_secret,
            Some(config.auth.jwt_issuer.clone()),
            config.auth.jwt_expires_min,
        );
        let passwords = PasswordHasher::new(config.auth.pwd_pepper.clone(), config.auth.pwd_iterations);

        Ok(Self {
            store: Arc::new(ManagementStore::new()),
            audit: Arc::new(AuditLogger::new()),
            limiter: Arc::new(limiter),
            tokens,
            passwords,
            meter: Arc::new(UsageMeter::new(registry)),
            billing: Arc::new(billing),
            config: Arc::new(config),
        })
    }

    /// State with the in-process rate limiter.
    pub fn in_memory(config: AppConfig) -> TlxResult<Self> {
        let limiter = RateLimiter::in_memory(&config.rate_limit);
        Self::new(config, limiter)
    }

    /// Hash on the blocking pool; PBKDF2 with a production iteration count
    /// takes tens of milliseconds.
    pub async fn hash_password(&self, password: &str) -> TlxResult<String> {
        let hasher = self.passwords.clone();
        let password = password.to_string();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(hash)
    }

    pub async fn verify_password(&self, password: &str, stored: &str) -> TlxResult<bool> {
        let hasher = self.passwords.clone();
        let (password, stored) = (password.to_string(), stored.to_string());
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(anyhow::Error::from)?;
        Ok(ok)
    }

    /// Audit a mutation performed by `user` on their tenant.
    pub fn log_audit(&self, user: &AuthUser, action: &str, entity: &str, entity_id: impl ToString, meta: Value) {
        self.audit.log_action(
            user.tenant_id,
            Some(user.user_id),
            action,
            entity,
            Some(entity_id.to_string()),
            meta,
        );
    }
}
