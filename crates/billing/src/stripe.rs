//! Minimal Stripe REST client: checkout sessions, billing portal sessions,
//! and subscription retrieval/modification.
//!
//! Stripe takes `application/x-www-form-urlencoded` bodies with bracketed
//! keys (`line_items[0][price]`), so requests are built as flat pairs.

use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tlx_core::TlxError;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StripeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Stripe API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Stripe response missing {0}")]
    Missing(&'static str),
}

impl From<StripeError> for TlxError {
    fn from(e: StripeError) -> Self {
        TlxError::Upstream(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Price {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    pub id: String,
    #[serde(default)]
    pub price: Price,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemList {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub items: ItemList,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Subscription {
    pub fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.data.first()
    }

    pub fn first_price_id(&self) -> Option<&str> {
        self.first_item()
            .map(|i| i.price.id.as_str())
            .filter(|p| !p.is_empty())
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Parameters for a subscription checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest<'a> {
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub tenant_id: i64,
    pub user_id: i64,
    pub plan: &'a str,
    pub customer_id: Option<&'a str>,
    pub customer_email: Option<&'a str>,
}

impl CheckoutRequest<'_> {
    fn form(&self) -> Vec<(String, String)> {
        let tenant = self.tenant_id.to_string();
        let user = self.user_id.to_string();
        let mut form = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("line_items[0][price]".to_string(), self.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), self.success_url.to_string()),
            ("cancel_url".to_string(), self.cancel_url.to_string()),
            ("client_reference_id".to_string(), format!("tenant:{tenant}")),
            ("allow_promotion_codes".to_string(), "true".to_string()),
        ];
        for prefix in ["metadata", "subscription_data[metadata]"] {
            form.push((format!("{prefix}[tenant_id]"), tenant.clone()));
            form.push((format!("{prefix}[user_id]"), user.clone()));
            form.push((format!("{prefix}[plan]"), self.plan.to_string()));
        }
        match self.customer_id {
            Some(customer) => form.push(("customer".to_string(), customer.to_string())),
            None => form.push((
                "customer_email".to_string(),
                self.customer_email.unwrap_or_default().to_string(),
            )),
        }
        form
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(api_base: impl Into<String>, secret_key: impl Into<String>) -> Result<Self, StripeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
        })
    }

    pub async fn create_checkout_session(&self, req: &CheckoutRequest<'_>) -> Result<Session, StripeError> {
        self.post("/v1/checkout/sessions", &req.form()).await
    }

    pub async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<Session, StripeError> {
        let form = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("return_url".to_string(), return_url.to_string()),
        ];
        self.post("/v1/billing_portal/sessions", &form).await
    }

    pub async fn retrieve_subscription(&self, subscription_id: &str) -> Result<Subscription, StripeError> {
        let url = format!("{}/v1/subscriptions/{}", self.api_base, subscription_id);
        debug!(subscription_id = subscription_id, "Retrieving Stripe subscription");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::decode(resp).await
    }

    /// Swap the price on `item_id`, prorating, and undo any pending cancel.
    pub async fn change_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &str,
    ) -> Result<Subscription, StripeError> {
        let form = vec![
            ("cancel_at_period_end".to_string(), "false".to_string()),
            ("proration_behavior".to_string(), "create_prorations".to_string()),
            ("items[0][id]".to_string(), item_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
        ];
        self.post(&format!("/v1/subscriptions/{subscription_id}"), &form)
            .await
    }

    pub async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<Subscription, StripeError> {
        let form = vec![("cancel_at_period_end".to_string(), "true".to_string())];
        self.post(&format!("/v1/subscriptions/{subscription_id}"), &form)
            .await
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, StripeError> {
        let url = format!("{}{}", self.api_base, path);
        debug!(path = path, "Stripe request");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, StripeError> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp
                .json::<ApiErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.to_string());
            warn!(status = status.as_u16(), message = %message, "Stripe API error");
            metrics::counter!("billing.stripe.errors").increment(1);
            return Err(StripeError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp.json().await?)
    }
}
