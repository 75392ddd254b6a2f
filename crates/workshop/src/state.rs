use std::sync::Arc;

use tlx_core::config::WorkshopConfig;
use tlx_core::{AppConfig, TlxResult};
use tlx_platform::{PasswordHasher, TokenIssuer};
use tracing::info;

use crate::store::WorkshopStore;

/// Shared state of the service-shop API.
#[derive(Clone)]
pub struct WorkshopState {
    pub config: Arc<WorkshopConfig>,
    pub store: Arc<WorkshopStore>,
    pub tokens: TokenIssuer,
    pub passwords: PasswordHasher,
}

impl WorkshopState {
    /// Build the state and create the bootstrap admin on an empty store.
    pub fn new(config: &AppConfig) -> Self {
        let shop = config.workshop.clone();
        let state = Self {
            store: Arc::new(WorkshopStore::new()),
            tokens: TokenIssuer::new(&shop.jwt_secret, None, shop.token_expire_minutes),
            passwords: PasswordHasher::new(String::new(), config.auth.pwd_iterations),
            config: Arc::new(shop),
        };
        let hash = state.passwords.hash(&state.config.admin_password);
        if state.store.bootstrap_admin(&state.config.admin_email, hash) {
            info!(email = %state.config.admin_email, "Bootstrap admin created");
        }
        state
    }

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
}
