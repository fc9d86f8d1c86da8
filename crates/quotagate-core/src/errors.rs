use std::time::SystemTime;

use crate::CredentialId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquireError {
    #[error("no credentials registered for provider")]
    ProviderUnknown,
    #[error("no enabled credentials for provider")]
    NoActiveCredentials,
    /// Every enabled credential has the requested quota group blocked.
    /// `retry_at` is the earliest time one of them recovers.
    #[error("quota exhausted on all credentials")]
    QuotaExhausted { retry_at: SystemTime },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InsertError {
    #[error("credential {id} already belongs to provider {provider}")]
    IdTaken { id: CredentialId, provider: String },
}
