//! Ads/CRM API calls used by the CLI.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::ApiClient;
use crate::error::ClientResult;

/// Largest page the API hands out.
pub const PAGE_LIMIT: usize = 200;

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tenant_slug: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub tenant_id: Option<i64>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Me {
    pub id: i64,
    pub email: String,
    pub tenant_id: Option<i64>,
    pub role: Option<String>,
}

pub struct AdsApi {
    client: ApiClient,
}

impl AdsApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Log in and keep the token for later calls.
    pub async fn login(&self, email: &str, password: &str, tenant_slug: Option<&str>) -> ClientResult<Session> {
        let session: Session = self
            .client
            .post(
                "/auth/login",
                &LoginBody {
                    email,
                    password,
                    tenant_slug,
                },
            )
            .await?;
        self.client.tokens().save(&session.access_token)?;
        Ok(session)
    }

    pub async fn me(&self) -> ClientResult<Me> {
        self.client.get("/auth/me").await
    }

    /// Every row of a paginated list endpoint.
    pub async fn fetch_all(&self, path: &str, filters: &[(&str, String)]) -> ClientResult<Vec<Value>> {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let mut query: Vec<(&str, String)> = filters.to_vec();
            query.push(("limit", PAGE_LIMIT.to_string()));
            query.push(("offset", offset.to_string()));
            let page: Vec<Value> = self.client.get_query(path, &query).await?;
            let len = page.len();
            rows.extend(page);
            if len < PAGE_LIMIT {
                return Ok(rows);
            }
            offset += len;
        }
    }

    pub async fn ads(&self, status: Option<&str>, q: Option<&str>) -> ClientResult<Vec<Value>> {
        let mut filters = Vec::new();
        if let Some(status) = status {
            filters.push(("status", status.to_string()));
        }
        if let Some(q) = q {
            filters.push(("q", q.to_string()));
        }
        self.fetch_all("/ads", &filters).await
    }

    pub async fn contacts(&self, q: Option<&str>) -> ClientResult<Vec<Value>> {
        let filters: Vec<(&str, String)> = q.map(|q| vec![("q", q.to_string())]).unwrap_or_default();
        self.fetch_all("/contacts", &filters).await
    }

    pub async fn deliveries(&self, status: Option<&str>) -> ClientResult<Vec<Value>> {
        let filters: Vec<(&str, String)> = status.map(|s| vec![("status", s.to_string())]).unwrap_or_default();
        self.fetch_all("/deliveries", &filters).await
    }

    /// Lists that are not paginated (templates, segments) or small.
    pub async fn list(&self, path: &str) -> ClientResult<Value> {
        self.client.get(path).await
    }

    pub async fn plan(&self) -> ClientResult<Value> {
        self.client.get("/saas/plan").await
    }

    pub async fn dashboard(&self) -> ClientResult<Value> {
        self.client.get("/dashboard").await
    }
}
