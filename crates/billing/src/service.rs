//! Billing flows behind the `/billing/*` and `/stripe/webhook` endpoints.

use std::sync::Arc;
use tlx_core::config::{BillingConfig, WebConfig};
use tlx_core::time::unix_to_iso;
use tlx_core::{TlxError, TlxResult};
use tracing::{info, warn};

use crate::plans::{PlanName, PlanStatus};
use crate::prices::PriceBook;
use crate::stripe::{CheckoutRequest, StripeClient};
use crate::subscriptions::{PlanChange, PlanRegistry};
use crate::webhook::{apply_event, verify_signature, WebhookOutcome};

/// Who is asking for a checkout session.
#[derive(Debug, Clone, Copy)]
pub struct Purchaser<'a> {
    pub tenant_id: i64,
    pub user_id: i64,
    pub email: Option<&'a str>,
}

pub struct BillingService {
    config: BillingConfig,
    public_base: String,
    prices: PriceBook,
    registry: Arc<PlanRegistry>,
    stripe: Option<StripeClient>,
}

impl BillingService {
    pub fn new(config: &BillingConfig, web: &WebConfig, registry: Arc<PlanRegistry>) -> TlxResult<Self> {
        let stripe = match config.stripe_secret_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Some(StripeClient::new(&config.stripe_api_base, key)?),
            _ => None,
        };
        info!(stripe_enabled = stripe.is_some(), "Billing service initialized");
        Ok(Self {
            config: config.clone(),
            public_base: web.base().to_string(),
            prices: PriceBook::from_config(config),
            registry,
            stripe,
        })
    }

    pub fn registry(&self) -> &Arc<PlanRegistry> {
        &self.registry
    }

    pub fn stripe_enabled(&self) -> bool {
        self.stripe.is_some()
    }

    fn stripe(&self) -> TlxResult<&StripeClient> {
        self.stripe
            .as_ref()
            .ok_or_else(|| TlxError::bad_request("Stripe not configured"))
    }

    fn plans_url(&self, query: &str) -> String {
        format!("{}/planos{query}", self.public_base)
    }

    fn resolve_price(&self, plan: &str) -> TlxResult<(PlanName, String)> {
        let plan = PlanName::purchasable(plan).ok_or_else(|| TlxError::bad_request("Invalid plan"))?;
        self.stripe()?;
        let price = self
            .prices
            .price_for(plan)
            .ok_or_else(|| TlxError::bad_request("Stripe price id not configured"))?;
        Ok((plan, price.to_string()))
    }

    /// Start a subscription checkout and return its hosted URL.
    pub async fn checkout(&self, who: Purchaser<'_>, plan: &str) -> TlxResult<String> {
        let (plan, price_id) = self.resolve_price(plan)?;
        let stripe = self.stripe()?;
        let (customer, _) = self.registry.stripe_refs(who.tenant_id);

        let success_url = self
            .config
            .success_url
            .clone()
            .unwrap_or_else(|| self.plans_url("?success=1"));
        let cancel_url = self
            .config
            .cancel_url
            .clone()
            .unwrap_or_else(|| self.plans_url("?canceled=1"));

        let session = stripe
            .create_checkout_session(&CheckoutRequest {
                price_id: &price_id,
                success_url: success_url.trim(),
                cancel_url: cancel_url.trim(),
                tenant_id: who.tenant_id,
                user_id: who.user_id,
                plan: plan.as_str(),
                customer_id: customer.as_deref(),
                customer_email: who.email,
            })
            .await?;

        info!(tenant_id = who.tenant_id, plan = %plan, "Checkout session created");
        session
            .url
            .ok_or_else(|| TlxError::Upstream("Stripe checkout unavailable".into()))
    }

    pub async fn portal(&self, tenant_id: i64) -> TlxResult<String> {
        let stripe = self.stripe()?;
        let (customer, _) = self.registry.stripe_refs(tenant_id);
        let customer = customer.ok_or_else(|| TlxError::bad_request("Stripe customer not found"))?;
        let return_url = self
            .config
            .portal_return_url
            .clone()
            .unwrap_or_else(|| self.plans_url(""));

        let session = stripe.create_portal_session(&customer, return_url.trim()).await?;
        session
            .url
            .ok_or_else(|| TlxError::Upstream("Stripe portal unavailable".into()))
    }

    /// Move an existing subscription to another price. Tenants without a
    /// subscription are sent through checkout instead.
    pub async fn change_plan(&self, who: Purchaser<'_>, plan: &str) -> TlxResult<String> {
        let (plan_name, price_id) = self.resolve_price(plan)?;
        let stripe = self.stripe()?;
        let (customer, subscription) = self.registry.stripe_refs(who.tenant_id);
        let Some(subscription_id) = subscription else {
            return self.checkout(who, plan).await;
        };

        let sub = stripe.retrieve_subscription(&subscription_id).await?;
        let item = sub
            .first_item()
            .ok_or_else(|| TlxError::bad_request("Subscription has no items"))?;
        stripe
            .change_subscription_price(&subscription_id, &item.id, &price_id)
            .await?;

        self.registry.set_plan(
            who.tenant_id,
            plan_name,
            PlanStatus::Active,
            PlanChange {
                current_period_end: unix_to_iso(sub.current_period_end),
                stripe_customer_id: customer,
                stripe_subscription_id: Some(subscription_id),
            },
        );
        Ok(self.plans_url("?success=1"))
    }

    /// Cancel at period end and mark the tenant plan canceled.
    pub async fn cancel(&self, tenant_id: i64) -> TlxResult<String> {
        let stripe = self.stripe()?;
        let (customer, subscription) = self.registry.stripe_refs(tenant_id);
        let subscription_id = subscription.ok_or_else(|| TlxError::bad_request("Subscription not found"))?;

        let sub = stripe.cancel_at_period_end(&subscription_id).await?;
        let plan = sub
            .first_price_id()
            .and_then(|p| self.prices.plan_for(p))
            .unwrap_or(PlanName::Free);
        self.registry.set_plan(
            tenant_id,
            plan,
            PlanStatus::Canceled,
            PlanChange {
                current_period_end: unix_to_iso(sub.current_period_end),
                stripe_customer_id: customer,
                stripe_subscription_id: Some(subscription_id),
            },
        );
        Ok(self.plans_url("?canceled=1"))
    }

    /// Verify and apply a webhook delivery.
    pub fn handle_webhook(&self, payload: &[u8], signature: Option<&str>) -> TlxResult<WebhookOutcome> {
        if !self.stripe_enabled() {
            return Err(TlxError::bad_request("Stripe webhook not configured"));
        }
        let secret = self
            .config
            .stripe_webhook_secret
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TlxError::bad_request("Stripe webhook secret missing"))?;
        let signature = signature.ok_or_else(|| TlxError::bad_request("Missing stripe-signature"))?;

        let now = chrono::Utc::now().timestamp();
        verify_signature(payload, signature, secret, self.config.webhook_tolerance_secs, now).map_err(|e| {
            warn!(error = %e, "Rejected Stripe webhook");
            TlxError::bad_request("Invalid Stripe signature")
        })?;

        let event: serde_json::Value =
            serde_json::from_slice(payload).map_err(|_| TlxError::bad_request("Invalid Stripe payload"))?;
        Ok(apply_event(&self.registry, &self.prices, &event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(api_base: &str, key: Option<&str>) -> BillingService {
        let config = BillingConfig {
            stripe_secret_key: key.map(str::to_string),
            stripe_webhook_secret: Some("whsec_test".into()),
            price_pro: Some("price_pro".into()),
            price_business: Some("price_biz".into()),
            stripe_api_base: api_base.to_string(),
            ..Default::default()
        };
        let web = WebConfig {
            public_base: "https://app.tlx.test/".into(),
            dev_return_token_links: false,
        };
        BillingService::new(&config, &web, Arc::new(PlanRegistry::new())).unwrap()
    }

    fn who() -> Purchaser<'static> {
        Purchaser {
            tenant_id: 1,
            user_id: 1,
            email: Some("a@b.c"),
        }
    }

    #[tokio::test]
    async fn rejects_unknown_plan_and_missing_stripe() {
        let svc = service("http://unused", None);
        let err = svc.checkout(who(), "gold").await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid plan");
        let err = svc.checkout(who(), "pro").await.unwrap_err();
        assert_eq!(err.to_string(), "Stripe not configured");
        let err = svc.handle_webhook(b"{}", Some("t=1,v1=x")).unwrap_err();
        assert_eq!(err.to_string(), "Stripe webhook not configured");
    }

    #[tokio::test]
    async fn missing_price_is_bad_request() {
        let svc = service("http://unused", Some("sk_test"));
        let err = svc.checkout(who(), "free").await.unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.to_string(), "Stripe price id not configured");
    }

    #[tokio::test]
    async fn change_plan_without_subscription_falls_back_to_checkout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(body_string_contains("price_biz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "cs_1", "url": "https://checkout.stripe.test/cs_1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server.uri(), Some("sk_test"));
        let url = svc.change_plan(who(), "business").await.unwrap();
        assert_eq!(url, "https://checkout.stripe.test/cs_1");
    }

    #[tokio::test]
    async fn change_plan_modifies_subscription() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/subscriptions/sub_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sub_1",
                "current_period_end": 1768143600,
                "items": {"data": [{"id": "si_1", "price": {"id": "price_pro"}}]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions/sub_1"))
            .and(body_string_contains("proration_behavior=create_prorations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sub_1",
                "items": {"data": [{"id": "si_1", "price": {"id": "price_biz"}}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&server.uri(), Some("sk_test"));
        svc.registry().set_plan(
            1,
            PlanName::Pro,
            PlanStatus::Active,
            PlanChange {
                stripe_customer_id: Some("cus_1".into()),
                stripe_subscription_id: Some("sub_1".into()),
                ..Default::default()
            },
        );

        let url = svc.change_plan(who(), "business").await.unwrap();
        assert_eq!(url, "https://app.tlx.test/planos?success=1");
        let row = svc.registry().get(1);
        assert_eq!(row.plan, PlanName::Business);
        assert_eq!(row.current_period_end.as_deref(), Some("2026-01-11T15:00:00+00:00"));
    }

    #[tokio::test]
    async fn cancel_marks_plan_canceled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions/sub_9"))
            .and(body_string_contains("cancel_at_period_end=true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "sub_9",
                "items": {"data": [{"id": "si_9", "price": {"id": "price_pro"}}]}
            })))
            .mount(&server)
            .await;

        let svc = service(&server.uri(), Some("sk_test"));
        let err = svc.cancel(1).await.unwrap_err();
        assert_eq!(err.to_string(), "Subscription not found");

        svc.registry().set_plan(
            1,
            PlanName::Pro,
            PlanStatus::Active,
            PlanChange {
                stripe_subscription_id: Some("sub_9".into()),
                ..Default::default()
            },
        );
        let url = svc.cancel(1).await.unwrap();
        assert_eq!(url, "https://app.tlx.test/planos?canceled=1");
        assert_eq!(
            svc.registry().plan_and_status(1),
            (PlanName::Pro, PlanStatus::Canceled)
        );
    }

    #[test]
    fn webhook_requires_valid_signature() {
        let svc = service("http://unused", Some("sk_test"));
        assert_eq!(
            svc.handle_webhook(b"{}", None).unwrap_err().to_string(),
            "Missing stripe-signature"
        );
        assert_eq!(
            svc.handle_webhook(b"{}", Some("t=1,v1=deadbeef")).unwrap_err().to_string(),
            "Invalid Stripe signature"
        );
    }
}
