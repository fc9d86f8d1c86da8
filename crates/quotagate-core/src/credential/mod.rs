mod pool;

pub use pool::{CredentialEntry, CredentialPool, PoolSnapshot};

use std::sync::OnceLock;

use crate::quota::QuotaBlockIndex;

pub type CredentialId = i64;

/// One logged-in account the gateway can route through.
///
/// The quota index is created on first use and lives as long as the
/// credential; every clone of the `Arc<Credential>` held by the pool sees the
/// same index.
#[derive(Debug)]
pub struct Credential {
    id: CredentialId,
    label: Option<String>,
    quota_index: OnceLock<QuotaBlockIndex>,
}

impl Credential {
    pub fn new(id: CredentialId) -> Self {
        Self {
            id,
            label: None,
            quota_index: OnceLock::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(&self) -> CredentialId {
        self.id
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The credential's quota index, created on first call.
    pub fn quota_index(&self) -> &QuotaBlockIndex {
        self.quota_index.get_or_init(QuotaBlockIndex::new)
    }

    /// The quota index if one was ever needed. Read paths use this so that
    /// credentials that never hit a quota never allocate one.
    pub fn existing_quota_index(&self) -> Option<&QuotaBlockIndex> {
        self.quota_index.get()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use super::*;

    #[test]
    fn index_is_lazy_and_stable() {
        let cred = Credential::new(7).with_label("work account");
        assert!(cred.existing_quota_index().is_none());

        let until = SystemTime::now() + Duration::from_secs(60);
        cred.quota_index().set_blocked("claude", "claude-a", until, None);

        let index = cred.existing_quota_index().expect("index created");
        assert!(std::ptr::eq(index, cred.quota_index()));
        assert_eq!(index.len(), 1);
        assert_eq!(cred.label(), Some("work account"));
    }
}
