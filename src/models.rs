use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REGISTRATION_ONLINE: &str = "online";
pub const STATUS_PENDING: &str = "pending";

/// One enrollment record. Walk-in records carry neither a registration
/// type nor a status; online registrations always carry both, plus the
/// payment receipt, which is persisted but never serialized into a
/// response.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub gender: String,
    pub address: String,
    pub classes: Vec<String>,
    pub register_date: String,
    pub registration_fee: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing)]
    pub payment_receipt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_receipt_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Admin {
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The two states an admin may move a pending online registration into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifyStatus {
    Verified,
    Rejected,
}

impl VerifyStatus {
    pub fn parse(raw: &str) -> Option<VerifyStatus> {
        match raw {
            "verified" => Some(VerifyStatus::Verified),
            "rejected" => Some(VerifyStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyStatus::Verified => "verified",
            VerifyStatus::Rejected => "rejected",
        }
    }
}
