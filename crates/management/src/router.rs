//! Ads/CRM API router — mounts the authenticated REST endpoints.

use axum::routing::{get, patch, post};
use axum::Router;

use crate::handlers::{ads, auth, billing, crm, queue, tenants};
use crate::state::AppState;

/// Build the ads/CRM router with all endpoints.
/// Returns a Router that should be merged into the main app.
pub fn management_router(state: AppState) -> Router {
    Router::new()
        // Auth
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/auth/accept-invite", post(auth::accept_invite))
        .route("/auth/request-password-reset", post(auth::request_password_reset))
        .route("/auth/confirm-password-reset", post(auth::confirm_password_reset))
        // Tenants & members
        .route("/tenants", post(tenants::create_tenant))
        .route("/tenants/:tenant_id/members", get(tenants::list_members))
        .route("/tenants/:tenant_id/members/invite-token", post(tenants::create_invite))
        .route("/tenants/:tenant_id/members/:user_id", patch(tenants::update_member_role))
        // Ads
        .route("/ads", get(ads::list_ads).post(ads::create_ad))
        .route("/ads/:id", patch(ads::update_ad).delete(ads::delete_ad))
        .route("/ads/:id/schedule", post(ads::schedule_ad))
        .route("/ads/:id/deliveries", get(ads::list_ad_deliveries))
        // Templates & links
        .route("/templates", get(ads::list_templates).post(ads::create_template))
        .route("/templates/preview", post(ads::preview_template))
        .route("/templates/:id", axum::routing::delete(ads::delete_template))
        .route("/links", post(ads::create_link))
        // CRM
        .route("/campaigns", get(crm::list_campaigns).post(crm::create_campaign))
        .route("/campaigns/:id", patch(crm::update_campaign).delete(crm::delete_campaign))
        .route("/contacts", get(crm::list_contacts).post(crm::create_contact))
        .route("/contacts/:id", patch(crm::update_contact).delete(crm::delete_contact))
        .route("/segments", get(crm::list_segments).post(crm::create_segment))
        .route("/segments/:id", patch(crm::update_segment).delete(crm::delete_segment))
        .route(
            "/segments/:id/members",
            get(crm::list_segment_members).post(crm::add_segment_member),
        )
        .route(
            "/segments/:id/members/:contact_id",
            axum::routing::delete(crm::remove_segment_member),
        )
        // Automation & delivery queue
        .route("/automation/segment-send", post(queue::segment_send))
        .route("/deliveries", get(queue::list_deliveries).post(queue::enqueue_delivery))
        // Plan & billing
        .route("/saas/plan", get(billing::plan))
        .route("/billing/checkout-session", post(billing::checkout_session))
        .route("/billing/portal", post(billing::portal))
        .route("/billing/change-plan", post(billing::change_plan))
        .route("/billing/cancel", post(billing::cancel))
        .route("/stripe/webhook", post(billing::stripe_webhook))
        .with_state(state)
}
