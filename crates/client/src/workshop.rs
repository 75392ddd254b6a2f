//! Service-shop API calls used by the CLI and the reminder poller.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tlx_workshop::models::Appointment;

use crate::client::ApiClient;
use crate::error::ClientResult;

#[derive(Debug, Clone, Deserialize)]
pub struct ShopUser {
    pub id: i64,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShopSession {
    pub access_token: String,
    pub token_type: String,
    pub user: ShopUser,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentRange {
    #[serde(rename = "from", skip_serializing_if = "Option::is_none")]
    pub from_ts: Option<String>,
    #[serde(rename = "to", skip_serializing_if = "Option::is_none")]
    pub to_ts: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Client for the service-shop API. The base URL includes the `/api` prefix.
pub struct WorkshopApi {
    client: ApiClient,
}

impl WorkshopApi {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn login(&self, email: &str, password: &str) -> ClientResult<ShopSession> {
        let session: ShopSession = self
            .client
            .post("auth/login", &json!({ "email": email, "password": password }))
            .await?;
        self.client.tokens().save(&session.access_token)?;
        Ok(session)
    }

    pub async fn me(&self) -> ClientResult<ShopUser> {
        self.client.get("auth/me").await
    }

    pub async fn appointments(&self, range: &AppointmentRange) -> ClientResult<Vec<Appointment>> {
        self.client.get_query("appointments", range).await
    }

    pub async fn appointment(&self, id: i64) -> ClientResult<Option<Appointment>> {
        let all = self.appointments(&AppointmentRange::default()).await?;
        Ok(all.into_iter().find(|a| a.id == id))
    }

    /// Scheduled, unreminded appointments starting within the window.
    pub async fn reminders(&self, within_minutes: u32) -> ClientResult<Vec<Appointment>> {
        self.client
            .get_query("appointments/reminders", &[("within_minutes", within_minutes)])
            .await
    }

    pub async fn mark_reminded(&self, id: i64) -> ClientResult<()> {
        let _: serde_json::Value = self
            .client
            .post_empty(&format!("appointments/{id}/mark-reminded"))
            .await?;
        Ok(())
    }

    pub async fn move_appointment(&self, id: i64, scheduled_at: &str) -> ClientResult<Appointment> {
        self.client
            .patch(&format!("appointments/{id}"), &json!({ "scheduled_at": scheduled_at }))
            .await
    }
}
