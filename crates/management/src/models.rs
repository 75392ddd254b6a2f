//! Management domain types — tenants, accounts, ads, CRM, delivery queue —
//! plus the request/response bodies of the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tlx_core::patch::double_option;
use tlx_core::time::iso;
use tlx_core::{AdStatus, CampaignStatus, DeliveryResult, MetricEventType, QueueStatus, Role, TlxError, TlxResult, Variables};

/// Raw template variables as sent by clients. Values may be any JSON.
pub type JsonVariables = BTreeMap<String, Value>;

// ─── Validation ────────────────────────────────────────────────────────────

/// Field-level checks run by handlers before touching the store.
pub trait Validate {
    fn validate(&self) -> TlxResult<()>;
}

pub(crate) fn check_len(field: &str, value: &str, min: usize, max: usize) -> TlxResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(TlxError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(())
}

pub(crate) fn check_opt_len(field: &str, value: Option<&str>, max: usize) -> TlxResult<()> {
    match value {
        Some(v) => check_len(field, v, 0, max),
        None => Ok(()),
    }
}

fn check_patch_len(field: &str, value: &Option<Option<String>>, max: usize) -> TlxResult<()> {
    check_opt_len(field, value.as_ref().and_then(|v| v.as_deref()), max)
}

// ─── Paging ────────────────────────────────────────────────────────────────

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Resolved `limit`/`offset` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

impl Page {
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> TlxResult<Self> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT);
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(TlxError::validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }

    pub fn apply<T>(&self, rows: impl IntoIterator<Item = T>) -> Vec<T> {
        rows.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

impl PageQuery {
    pub fn page(&self) -> TlxResult<Page> {
        Page::new(self.limit, self.offset)
    }
}

// ─── Tenancy & accounts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub slug: String,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Membership {
    pub id: i64,
    pub tenant_id: i64,
    pub user_id: i64,
    pub role: Role,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemberOut {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
}

/// Single-use token letting an email join a tenant with a role.
#[derive(Debug, Clone)]
pub struct InviteToken {
    pub id: i64,
    pub tenant_id: i64,
    pub email: String,
    pub role: Role,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ResetToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterIn {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub tenant_name: Option<String>,
    #[serde(default)]
    pub tenant_slug: Option<String>,
}

impl Validate for RegisterIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("email", &self.email, 3, 200)?;
        check_len("password", &self.password, 6, 128)?;
        check_opt_len("tenant_name", self.tenant_name.as_deref(), 120)?;
        check_opt_len("tenant_slug", self.tenant_slug.as_deref(), 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginIn {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub tenant_slug: Option<String>,
}

impl Validate for LoginIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("email", &self.email, 3, 200)?;
        check_opt_len("tenant_slug", self.tenant_slug.as_deref(), 60)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenOut {
    pub access_token: String,
    pub tenant_id: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeOut {
    pub id: i64,
    pub email: String,
    pub tenant_id: Option<i64>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TenantCreateIn {
    pub name: String,
    pub slug: String,
}

impl Validate for TenantCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("name", &self.name, 1, 120)?;
        check_len("slug", &self.slug, 1, 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberRoleUpdateIn {
    pub role: String,
}

impl Validate for MemberRoleUpdateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("role", &self.role, 3, 20)
    }
}

fn default_invite_role() -> String {
    "viewer".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteCreateIn {
    pub email: String,
    #[serde(default = "default_invite_role")]
    pub role: String,
    #[serde(default)]
    pub invite_base_url: Option<String>,
}

impl Validate for InviteCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("email", &self.email, 3, 200)?;
        check_len("role", &self.role, 0, 20)?;
        check_opt_len("invite_base_url", self.invite_base_url.as_deref(), 4000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InviteOut {
    pub ok: bool,
    pub invite_link: String,
    #[serde(with = "iso")]
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptInviteIn {
    pub token: String,
    pub password: String,
}

impl Validate for AcceptInviteIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("token", &self.token, 10, 200)?;
        check_len("password", &self.password, 6, 128)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetRequestIn {
    pub email: String,
    #[serde(default)]
    pub reset_base_url: Option<String>,
}

impl Validate for PasswordResetRequestIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("email", &self.email, 3, 200)?;
        check_opt_len("reset_base_url", self.reset_base_url.as_deref(), 4000)
    }
}

/// The link, token and expiry are only echoed in development.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PasswordResetRequestOut {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetConfirmIn {
    pub token: String,
    pub new_password: String,
}

impl Validate for PasswordResetConfirmIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("token", &self.token, 10, 200)?;
        check_len("new_password", &self.new_password, 6, 128)
    }
}

// ─── Ads ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Ad {
    pub id: i64,
    pub tenant_id: i64,
    #[serde(skip_serializing)]
    pub owner_user_id: i64,
    pub title: String,
    pub body: String,
    pub rendered_body: Option<String>,
    pub target_url: Option<String>,
    pub channel: String,
    pub target: Option<String>,
    pub campaign_id: Option<i64>,
    #[serde(skip_serializing)]
    pub template_id: Option<i64>,
    #[serde(skip_serializing)]
    pub variables: Variables,
    pub status: AdStatus,
    pub scheduled_at: Option<String>,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso")]
    pub updated_at: DateTime<Utc>,
}

/// One simulated delivery attempt of a scheduled ad.
#[derive(Debug, Clone, Serialize)]
pub struct AdDelivery {
    pub id: i64,
    #[serde(skip_serializing)]
    pub ad_id: i64,
    #[serde(with = "iso")]
    pub delivered_at: DateTime<Utc>,
    pub result: DeliveryResult,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdListQuery {
    pub status: Option<AdStatus>,
    pub channel: Option<String>,
    pub campaign_id: Option<i64>,
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdCreateIn {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub target_url: Option<String>,
    pub channel: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<i64>,
    #[serde(default)]
    pub template_id: Option<i64>,
    #[serde(default)]
    pub variables: Option<JsonVariables>,
}

impl Validate for AdCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("title", &self.title, 1, 120)?;
        check_len("body", &self.body, 1, 4000)?;
        check_opt_len("target_url", self.target_url.as_deref(), 500)?;
        check_len("channel", &self.channel, 1, 40)?;
        check_opt_len("target", self.target.as_deref(), 220)
    }
}

/// PATCH body. Nullable fields use `Option<Option<_>>` so an explicit
/// `null` clears the column.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdUpdateIn {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub target_url: Option<Option<String>>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub target: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub campaign_id: Option<Option<i64>>,
    #[serde(default)]
    pub status: Option<AdStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub scheduled_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub template_id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub variables: Option<Option<JsonVariables>>,
}

impl AdUpdateIn {
    /// Names of the fields present in the body, sorted.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.body.is_some() {
            names.push("body");
        }
        if self.campaign_id.is_some() {
            names.push("campaign_id");
        }
        if self.channel.is_some() {
            names.push("channel");
        }
        if self.scheduled_at.is_some() {
            names.push("scheduled_at");
        }
        if self.status.is_some() {
            names.push("status");
        }
        if self.target.is_some() {
            names.push("target");
        }
        if self.target_url.is_some() {
            names.push("target_url");
        }
        if self.template_id.is_some() {
            names.push("template_id");
        }
        if self.title.is_some() {
            names.push("title");
        }
        if self.variables.is_some() {
            names.push("variables");
        }
        names
    }

    /// Body, template or variables changed, so `rendered_body` is stale.
    pub fn needs_rerender(&self) -> bool {
        self.body.is_some() || self.template_id.is_some() || self.variables.is_some()
    }
}

impl Validate for AdUpdateIn {
    fn validate(&self) -> TlxResult<()> {
        if let Some(title) = &self.title {
            check_len("title", title, 1, 120)?;
        }
        if let Some(body) = &self.body {
            check_len("body", body, 1, 4000)?;
        }
        if let Some(channel) = &self.channel {
            check_len("channel", channel, 1, 40)?;
        }
        check_patch_len("target_url", &self.target_url, 500)?;
        check_patch_len("target", &self.target, 220)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleQuery {
    pub scheduled_at: String,
}

// ─── Templates & links ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub id: i64,
    #[serde(skip_serializing)]
    pub tenant_id: i64,
    pub name: String,
    pub body: String,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateCreateIn {
    pub name: String,
    pub body: String,
}

impl Validate for TemplateCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("name", &self.name, 1, 120)?;
        check_len("body", &self.body, 1, 8000)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatePreviewIn {
    pub body: String,
    #[serde(default)]
    pub variables: Option<JsonVariables>,
}

impl Validate for TemplatePreviewIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("body", &self.body, 1, 8000)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplatePreviewOut {
    pub rendered: String,
}

#[derive(Debug, Clone)]
pub struct ShortLink {
    pub id: i64,
    pub tenant_id: i64,
    pub ad_id: Option<i64>,
    pub slug: String,
    pub destination_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkCreateIn {
    pub destination_url: String,
    #[serde(default)]
    pub ad_id: Option<i64>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
    #[serde(default)]
    pub utm_content: Option<String>,
}

impl Validate for LinkCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("destination_url", &self.destination_url, 3, 4000)?;
        tlx_core::utm::check_destination(&self.destination_url)?;
        check_opt_len("utm_source", self.utm_source.as_deref(), 80)?;
        check_opt_len("utm_medium", self.utm_medium.as_deref(), 80)?;
        check_opt_len("utm_campaign", self.utm_campaign.as_deref(), 120)?;
        check_opt_len("utm_content", self.utm_content.as_deref(), 120)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkOut {
    pub slug: String,
    pub destination_url: String,
}

/// Tracking event recorded by the public endpoints.
#[derive(Debug, Clone)]
pub struct MetricEvent {
    pub id: i64,
    pub tenant_id: i64,
    pub ad_id: Option<i64>,
    pub link_id: Option<i64>,
    pub event_type: MetricEventType,
    pub value: i64,
    pub created_at: DateTime<Utc>,
}

// ─── CRM ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Campaign {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub objective: Option<String>,
    pub status: CampaignStatus,
    pub start_at: Option<String>,
    pub end_at: Option<String>,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CampaignCreateIn {
    pub name: String,
    #[serde(default)]
    pub objective: Option<String>,
    #[serde(default)]
    pub status: CampaignStatus,
    #[serde(default)]
    pub start_at: Option<String>,
    #[serde(default)]
    pub end_at: Option<String>,
}

impl Validate for CampaignCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("name", &self.name, 1, 160)?;
        check_opt_len("objective", self.objective.as_deref(), 200)?;
        check_opt_len("start_at", self.start_at.as_deref(), 40)?;
        check_opt_len("end_at", self.end_at.as_deref(), 40)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CampaignUpdateIn {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub objective: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<CampaignStatus>,
    #[serde(default, deserialize_with = "double_option")]
    pub start_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub end_at: Option<Option<String>>,
}

impl CampaignUpdateIn {
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.end_at.is_some() {
            names.push("end_at");
        }
        if self.name.is_some() {
            names.push("name");
        }
        if self.objective.is_some() {
            names.push("objective");
        }
        if self.start_at.is_some() {
            names.push("start_at");
        }
        if self.status.is_some() {
            names.push("status");
        }
        names
    }
}

impl Validate for CampaignUpdateIn {
    fn validate(&self) -> TlxResult<()> {
        if let Some(name) = &self.name {
            check_len("name", name, 1, 160)?;
        }
        check_patch_len("objective", &self.objective, 200)?;
        check_patch_len("start_at", &self.start_at, 40)?;
        check_patch_len("end_at", &self.end_at, 40)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Contact {
    pub id: i64,
    pub tenant_id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_at: Option<String>,
    /// Free-form metadata serialised as a JSON string.
    pub meta_json: Option<String>,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactListQuery {
    pub q: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactCreateIn {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub consent_at: Option<String>,
    #[serde(default)]
    pub meta: Option<serde_json::Map<String, Value>>,
}

impl Validate for ContactCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_opt_len("name", self.name.as_deref(), 160)?;
        check_opt_len("email", self.email.as_deref(), 200)?;
        check_opt_len("phone", self.phone.as_deref(), 80)?;
        check_opt_len("consent_at", self.consent_at.as_deref(), 40)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactUpdateIn {
    #[serde(default, deserialize_with = "double_option")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub consent_at: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub meta: Option<Option<serde_json::Map<String, Value>>>,
}

impl ContactUpdateIn {
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.consent_at.is_some() {
            names.push("consent_at");
        }
        if self.email.is_some() {
            names.push("email");
        }
        if self.meta.is_some() {
            names.push("meta_json");
        }
        if self.name.is_some() {
            names.push("name");
        }
        if self.phone.is_some() {
            names.push("phone");
        }
        names
    }
}

impl Validate for ContactUpdateIn {
    fn validate(&self) -> TlxResult<()> {
        check_patch_len("name", &self.name, 160)?;
        check_patch_len("email", &self.email, 200)?;
        check_patch_len("phone", &self.phone, 80)?;
        check_patch_len("consent_at", &self.consent_at, 40)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SegmentMember {
    pub id: i64,
    pub segment_id: i64,
    pub contact_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Contact as listed under a segment.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentMemberOut {
    pub id: i64,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub consent_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentCreateIn {
    pub name: String,
}

impl Validate for SegmentCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("name", &self.name, 1, 160)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmentUpdateIn {
    #[serde(default)]
    pub name: Option<String>,
}

impl Validate for SegmentUpdateIn {
    fn validate(&self) -> TlxResult<()> {
        check_opt_len("name", self.name.as_deref(), 160)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SegmentMemberAddIn {
    pub contact_id: i64,
}

// ─── Delivery queue ────────────────────────────────────────────────────────

/// Outbound message waiting for (or done with) the delivery worker.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedDelivery {
    pub id: i64,
    pub tenant_id: i64,
    pub campaign_id: Option<i64>,
    pub channel: String,
    pub to_addr: String,
    #[serde(skip_serializing)]
    pub payload: Value,
    #[serde(skip_serializing)]
    pub idempotency_key: String,
    pub status: QueueStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(with = "iso::option")]
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    #[serde(with = "iso")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "iso")]
    pub updated_at: DateTime<Utc>,
}

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Everything needed to insert a queue row.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub tenant_id: i64,
    pub campaign_id: Option<i64>,
    pub channel: String,
    pub to_addr: String,
    pub payload: Value,
    pub idempotency_key: String,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryQueueCreateIn {
    pub channel: String,
    pub to_addr: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, Value>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<i64>,
}

impl Validate for DeliveryQueueCreateIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("channel", &self.channel, 1, 40)?;
        check_len("to_addr", &self.to_addr, 1, 220)?;
        check_opt_len("idempotency_key", self.idempotency_key.as_deref(), 200)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeliveryListQuery {
    pub status: Option<QueueStatus>,
    pub campaign_id: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AutomationSegmentSendIn {
    pub segment_id: i64,
    #[serde(default)]
    pub campaign_id: Option<i64>,
    pub channel: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub template_id: Option<i64>,
    #[serde(default)]
    pub variables: Option<JsonVariables>,
    #[serde(default)]
    pub scheduled_at: Option<String>,
}

impl Validate for AutomationSegmentSendIn {
    fn validate(&self) -> TlxResult<()> {
        check_len("channel", &self.channel, 1, 40)?;
        check_len("body", &self.body, 0, 8000)?;
        check_opt_len("scheduled_at", self.scheduled_at.as_deref(), 40)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomationSegmentSendOut {
    pub queued: u64,
    pub failed: u64,
    pub skipped: u64,
}

// ─── Billing ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequestIn {
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlOut {
    pub url: String,
}

// ─── Generic acknowledgements ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Deleted {
    pub deleted: bool,
}

impl Deleted {
    pub const YES: Deleted = Deleted { deleted: true };
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub const OK: Ack = Ack { ok: true };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_bounds() {
        assert_eq!(Page::new(None, None).unwrap(), Page { limit: 50, offset: 0 });
        assert!(Page::new(Some(0), None).is_err());
        assert!(Page::new(Some(201), None).is_err());
        let page = Page::new(Some(2), Some(1)).unwrap();
        assert_eq!(page.apply(vec![1, 2, 3, 4]), vec![2, 3]);
    }

    #[test]
    fn length_checks_count_chars() {
        assert!(check_len("name", "ção", 1, 3).is_ok());
        let err = check_len("title", "", 1, 120).unwrap_err();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.to_string(), "title must be between 1 and 120 characters");
    }

    #[test]
    fn ad_patch_tracks_fields_and_rerender() {
        let patch: AdUpdateIn =
            serde_json::from_str(r#"{"title": "New", "target": null, "variables": {"n": 1}}"#).unwrap();
        assert_eq!(patch.field_names(), vec!["target", "title", "variables"]);
        assert!(patch.needs_rerender());
        assert_eq!(patch.target, Some(None));
        assert!(AdUpdateIn::default().field_names().is_empty());
    }

    #[test]
    fn ad_output_hides_internal_columns() {
        let now = Utc::now();
        let ad = Ad {
            id: 1,
            tenant_id: 1,
            owner_user_id: 9,
            title: "t".into(),
            body: "b".into(),
            rendered_body: None,
            target_url: None,
            channel: "whatsapp".into(),
            target: None,
            campaign_id: None,
            template_id: Some(3),
            variables: Variables::new(),
            status: AdStatus::Draft,
            scheduled_at: None,
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&ad).unwrap();
        assert!(json.get("owner_user_id").is_none());
        assert!(json.get("template_id").is_none());
        assert_eq!(json["status"], "draft");
    }

    #[test]
    fn invite_role_defaults_to_viewer() {
        let body: InviteCreateIn = serde_json::from_str(r#"{"email": "a@b.c"}"#).unwrap();
        assert_eq!(body.role, "viewer");
    }
}
