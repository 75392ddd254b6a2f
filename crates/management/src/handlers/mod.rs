//! Axum REST handlers for the ads/CRM API.
//!
//! Every handler resolves the caller through [`AuthUser`](crate::auth::AuthUser)
//! (except the anonymous auth flows), checks the role, validates the body,
//! then calls into the store. Mutations are audited.

pub mod ads;
pub mod auth;
pub mod billing;
pub mod crm;
pub mod queue;
pub mod tenants;

use tlx_core::{render_template, TlxError, TlxResult, Variables};

use crate::state::AppState;

/// Render an ad or message body. A template replaces the inline body; inline
/// bodies are only rendered when variables were given. `None` means the body
/// is sent as written.
pub(crate) fn render_body(
    state: &AppState,
    tenant_id: i64,
    body: &str,
    template_id: Option<i64>,
    variables: &Variables,
) -> TlxResult<Option<String>> {
    if let Some(template_id) = template_id {
        let template = state
            .store
            .template(tenant_id, template_id)
            .ok_or_else(|| TlxError::not_found("Template not found"))?;
        return Ok(Some(render_template(&template.body, variables)));
    }
    if variables.is_empty() {
        return Ok(None);
    }
    Ok(Some(render_template(body, variables)))
}

pub(crate) fn ensure_campaign(state: &AppState, tenant_id: i64, campaign_id: Option<i64>) -> TlxResult<()> {
    match campaign_id {
        Some(id) if state.store.campaign(tenant_id, id).is_none() => {
            Err(TlxError::not_found("Campaign not found"))
        }
        _ => Ok(()),
    }
}
