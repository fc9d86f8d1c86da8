use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::CredentialId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    Operational(OperationalEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationalEvent {
    QuotaGroupBlocked(QuotaGroupBlockedEvent),
    QuotaGroupCleared(QuotaGroupClearedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaGroupBlockedEvent {
    pub at: SystemTime,
    pub credential_id: CredentialId,
    pub provider: String,
    /// Quota group, or the model itself for providers without grouping.
    pub group: String,
    pub source_model: String,
    pub retry_after: SystemTime,
    pub recover_at: Option<SystemTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaGroupClearedEvent {
    pub at: SystemTime,
    pub credential_id: CredentialId,
    pub provider: String,
    pub group: String,
}
