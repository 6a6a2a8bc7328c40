use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::OwnerId;

pub type MessageId = Uuid;

/// A message delivered to one user's inbox by an operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub id: MessageId,
    pub user_id: OwnerId,
    pub subject: String,
    pub body: String,
    pub is_read: bool,
    pub sent_at: DateTime<Utc>,
}

impl UserMessage {
    pub fn new(user_id: OwnerId, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            subject: subject.into(),
            body: body.into(),
            is_read: false,
            sent_at: Utc::now(),
        }
    }
}

/// A site-wide banner message, active until deactivated or expired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashMessage {
    pub id: MessageId,
    pub message: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FlashMessage {
    pub fn new(message: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            is_active: true,
            expires_at,
            created_at: Utc::now(),
        }
    }

    /// Whether the banner should currently be shown.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}
