use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Browser push subscription registered by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: i64,
    pub user_id: i64,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}
