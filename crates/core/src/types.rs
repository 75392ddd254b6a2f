use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::TlxError;

/// Implements `Display` and `FromStr` over the serde wire names.
macro_rules! wire_enum {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = TlxError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(TlxError::bad_request(format!(
                        "Invalid {}: {other}",
                        stringify!($ty)
                    ))),
                }
            }
        }
    };
}

// ─── Tenancy ───────────────────────────────────────────────────────────────

/// Membership role inside a tenant. Ordered by privilege.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Viewer,
    Editor,
    Admin,
}

wire_enum!(Role {
    Viewer => "viewer",
    Editor => "editor",
    Admin => "admin",
});

impl Role {
    /// Numeric privilege level (viewer=1, editor=2, admin=3).
    pub fn level(self) -> u8 {
        match self {
            Self::Viewer => 1,
            Self::Editor => 2,
            Self::Admin => 3,
        }
    }
}

// ─── Ads ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Draft,
    Scheduled,
    Sent,
    Paused,
}

wire_enum!(AdStatus {
    Draft => "draft",
    Scheduled => "scheduled",
    Sent => "sent",
    Paused => "paused",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryResult {
    Ok,
    Fail,
}

wire_enum!(DeliveryResult {
    Ok => "ok",
    Fail => "fail",
});

// ─── CRM ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Paused,
    Ended,
}

wire_enum!(CampaignStatus {
    Active => "active",
    Paused => "paused",
    Ended => "ended",
});

impl Default for CampaignStatus {
    fn default() -> Self {
        CampaignStatus::Active
    }
}

/// Lifecycle of a row in the outbound delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Queued,
    Sending,
    Sent,
    Retrying,
    Failed,
}

wire_enum!(QueueStatus {
    Queued => "queued",
    Sending => "sending",
    Sent => "sent",
    Retrying => "retrying",
    Failed => "failed",
});

impl QueueStatus {
    /// Eligible for pickup by the worker.
    pub fn is_pending(self) -> bool {
        matches!(self, Self::Queued | Self::Retrying)
    }

    /// Worker is done with the row.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

// ─── Tracking ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MetricEventType {
    Impression,
    Click,
    Conversion,
}

wire_enum!(MetricEventType {
    Impression => "impression",
    Click => "click",
    Conversion => "conversion",
});
