use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `TLX__` (sections separated by `__`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub workshop: WorkshopConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_workshop_port")]
    pub workshop_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Token signing and password hashing parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_jwt_issuer")]
    pub jwt_issuer: String,
    #[serde(default = "default_jwt_expires_min")]
    pub jwt_expires_min: i64,
    /// Appended to every password before hashing.
    #[serde(default = "default_pwd_pepper")]
    pub pwd_pepper: String,
    #[serde(default = "default_pwd_iterations")]
    pub pwd_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_per_minute")]
    pub per_minute: u64,
    #[serde(default = "default_rate_limit_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// When unset the in-memory limiter is used.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_public_base")]
    pub public_base: String,
    /// Echo invite/reset tokens in API responses. Development only.
    #[serde(default)]
    pub dev_return_token_links: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default)]
    pub stripe_secret_key: Option<String>,
    #[serde(default)]
    pub stripe_webhook_secret: Option<String>,
    #[serde(default)]
    pub price_free: Option<String>,
    #[serde(default)]
    pub price_pro: Option<String>,
    #[serde(default)]
    pub price_business: Option<String>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
    #[serde(default)]
    pub portal_return_url: Option<String>,
    #[serde(default = "default_stripe_api_base")]
    pub stripe_api_base: String,
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TrackingConfig {
    /// Origins allowed to record pixel impressions. Empty allows every origin.
    #[serde(default)]
    pub pixel_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_admin_key")]
    pub admin_key: String,
    #[serde(default = "default_worker_enabled")]
    pub worker_enabled: bool,
    #[serde(default = "default_worker_interval_secs")]
    pub worker_interval_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

/// Service-shop backend settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkshopConfig {
    #[serde(default = "default_workshop_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_workshop_expire_minutes")]
    pub token_expire_minutes: i64,
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

// Default functions
fn default_service_name() -> String {
    "tlx-ads".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8000
}
fn default_workshop_port() -> u16 {
    8001
}
fn default_metrics_port() -> u16 {
    9091
}
fn default_jwt_secret() -> String {
    "CHANGE_ME_SUPER_SECRET".to_string()
}
fn default_jwt_issuer() -> String {
    "tlx-ads".to_string()
}
fn default_jwt_expires_min() -> i64 {
    120
}
fn default_pwd_pepper() -> String {
    "CHANGE_ME_SALT".to_string()
}
fn default_pwd_iterations() -> u32 {
    200_000
}
fn default_per_minute() -> u64 {
    60
}
fn default_rate_limit_prefix() -> String {
    "auth".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_public_base() -> String {
    "http://localhost:5173".to_string()
}
fn default_stripe_api_base() -> String {
    "https://api.stripe.com".to_string()
}
fn default_webhook_tolerance_secs() -> i64 {
    300
}
fn default_admin_key() -> String {
    "CHANGE_ME_ADMIN_KEY".to_string()
}
fn default_worker_enabled() -> bool {
    true
}
fn default_worker_interval_secs() -> u64 {
    60
}
fn default_batch_size() -> usize {
    50
}
fn default_workshop_secret() -> String {
    "dev-insecure-change-me-please".to_string()
}
fn default_workshop_expire_minutes() -> i64 {
    720
}
fn default_admin_email() -> String {
    "admin@tlxauto.local".to_string()
}
fn default_admin_password() -> String {
    "admin123".to_string()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:5173".to_string(),
        "http://127.0.0.1:5173".to_string(),
    ]
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            workshop_port: default_workshop_port(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            jwt_issuer: default_jwt_issuer(),
            jwt_expires_min: default_jwt_expires_min(),
            pwd_pepper: default_pwd_pepper(),
            pwd_iterations: default_pwd_iterations(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            prefix: default_rate_limit_prefix(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            public_base: default_public_base(),
            dev_return_token_links: false,
        }
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            price_free: None,
            price_pro: None,
            price_business: None,
            success_url: None,
            cancel_url: None,
            portal_return_url: None,
            stripe_api_base: default_stripe_api_base(),
            webhook_tolerance_secs: default_webhook_tolerance_secs(),
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            admin_key: default_admin_key(),
            worker_enabled: default_worker_enabled(),
            worker_interval_secs: default_worker_interval_secs(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_workshop_secret(),
            token_expire_minutes: default_workshop_expire_minutes(),
            admin_email: default_admin_email(),
            admin_password: default_admin_password(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitSettings::default(),
            redis: RedisConfig::default(),
            web: WebConfig::default(),
            billing: BillingConfig::default(),
            tracking: TrackingConfig::default(),
            jobs: JobsConfig::default(),
            workshop: WorkshopConfig::default(),
        }
    }
}

impl WebConfig {
    /// Public frontend base without a trailing slash.
    pub fn base(&self) -> &str {
        self.public_base.trim_end_matches('/')
    }
}

impl BillingConfig {
    /// Stripe is usable only with a non-empty secret key.
    pub fn stripe_enabled(&self) -> bool {
        self.stripe_secret_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("TLX")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("tracking.pixel_allowed_origins")
                .with_list_parse_key("workshop.cors_origins"),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
