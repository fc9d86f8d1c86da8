use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::events::{Event, OperationalEvent, QuotaGroupBlockedEvent, QuotaGroupClearedEvent};
use crate::quota::{QuotaGroupRegistry, QuotaGroupState};
use crate::signal::QuotaSignal;
use crate::{AcquireError, EventHub, InsertError};

use super::{Credential, CredentialId};

#[derive(Debug, Clone)]
pub struct CredentialEntry {
    pub enabled: bool,
    pub credential: Arc<Credential>,
}

/// Immutable view of the pool; replaced wholesale on every mutation.
#[derive(Debug, Clone, Default)]
pub struct PoolSnapshot {
    by_provider: HashMap<String, Vec<CredentialEntry>>,
}

impl PoolSnapshot {
    pub fn credentials(&self, provider: &str) -> &[CredentialEntry] {
        self.by_provider
            .get(&provider_key(provider))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.by_provider.keys().map(String::as_str)
    }

    fn find(&self, id: CredentialId) -> Option<&CredentialEntry> {
        self.by_provider
            .values()
            .flat_map(|entries| entries.iter())
            .find(|entry| entry.credential.id() == id)
    }

    fn owner_of(&self, id: CredentialId) -> Option<&str> {
        self.by_provider
            .iter()
            .find(|(_, entries)| entries.iter().any(|entry| entry.credential.id() == id))
            .map(|(provider, _)| provider.as_str())
    }

    fn find_in(&self, provider: &str, id: CredentialId) -> Option<&CredentialEntry> {
        self.by_provider
            .get(&provider_key(provider))?
            .iter()
            .find(|entry| entry.credential.id() == id)
    }
}

/// Per-provider ordered credential lists, routed with quota-group awareness.
///
/// Reads go through a lock-free snapshot; the quota state itself lives in
/// each credential's own index, so blocking one credential never contends
/// with routing through another.
pub struct CredentialPool {
    registry: Arc<QuotaGroupRegistry>,
    snapshot: ArcSwap<PoolSnapshot>,
    events: EventHub,
}

impl std::fmt::Debug for CredentialPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot.load();
        f.debug_struct("CredentialPool")
            .field("provider_count", &snapshot.by_provider.len())
            .field(
                "credential_count",
                &snapshot.by_provider.values().map(Vec::len).sum::<usize>(),
            )
            .finish()
    }
}

impl CredentialPool {
    pub fn new(registry: Arc<QuotaGroupRegistry>, events: EventHub) -> Self {
        Self {
            registry,
            snapshot: ArcSwap::from_pointee(PoolSnapshot::default()),
            events,
        }
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn registry(&self) -> &QuotaGroupRegistry {
        &self.registry
    }

    pub fn snapshot(&self) -> Arc<PoolSnapshot> {
        self.snapshot.load_full()
    }

    /// Adds a credential under `provider`, enabled. Re-inserting a known id
    /// only re-enables it, so its quota state survives.
    ///
    /// Ids are unique across the pool: an id already held by another
    /// provider is rejected.
    pub fn insert(&self, provider: &str, credential: Credential) -> Result<(), InsertError> {
        let provider = provider_key(provider);
        let id = credential.id();
        let credential = Arc::new(credential);
        let mut conflict = None;
        self.snapshot.rcu(|current| {
            let mut next = PoolSnapshot::clone(current);
            conflict = next
                .owner_of(id)
                .filter(|owner| *owner != provider)
                .map(str::to_string);
            if conflict.is_some() {
                return next;
            }
            let entries = next.by_provider.entry(provider.clone()).or_default();
            match entries.iter_mut().find(|entry| entry.credential.id() == id) {
                Some(entry) => entry.enabled = true,
                None => entries.push(CredentialEntry {
                    enabled: true,
                    credential: Arc::clone(&credential),
                }),
            }
            next
        });
        if let Some(owner) = conflict {
            warn!(event = "credential_id_taken", provider = %provider, owner = %owner, credential_id = id);
            return Err(InsertError::IdTaken { id, provider: owner });
        }
        info!(event = "credential_inserted", provider = %provider, credential_id = id);
        Ok(())
    }

    /// Returns `false` if no credential has this id.
    pub fn set_enabled(&self, id: CredentialId, enabled: bool) -> bool {
        if self.snapshot.load().find(id).is_none() {
            return false;
        }
        self.snapshot.rcu(|current| {
            let mut next = PoolSnapshot::clone(current);
            for entry in next.by_provider.values_mut().flat_map(|entries| entries.iter_mut()) {
                if entry.credential.id() == id {
                    entry.enabled = enabled;
                }
            }
            next
        });
        info!(event = "credential_enabled", credential_id = id, enabled = enabled);
        true
    }

    pub fn credential(&self, id: CredentialId) -> Option<Arc<Credential>> {
        self.snapshot
            .load()
            .find(id)
            .map(|entry| Arc::clone(&entry.credential))
    }

    fn credential_in(&self, provider: &str, id: CredentialId) -> Option<Arc<Credential>> {
        self.snapshot
            .load()
            .find_in(provider, id)
            .map(|entry| Arc::clone(&entry.credential))
    }

    /// Key under which a model's quota is tracked: its group when the
    /// provider groups models, the model itself otherwise.
    pub fn quota_scope(&self, provider: &str, model: &str) -> String {
        let provider = provider_key(provider);
        if !self.registry.has_grouping(&provider) {
            return model.to_string();
        }
        self.registry
            .resolve(&provider, model)
            .unwrap_or_else(|| model.to_string())
    }

    /// First enabled credential of `provider` whose quota scope for `model`
    /// is not blocked at `now`.
    pub fn acquire_for_model(
        &self,
        provider: &str,
        model: &str,
        now: SystemTime,
    ) -> Result<Arc<Credential>, AcquireError> {
        let snapshot = self.snapshot.load();
        let Some(entries) = snapshot.by_provider.get(&provider_key(provider)) else {
            return Err(AcquireError::ProviderUnknown);
        };
        let scope = self.quota_scope(provider, model);

        let mut earliest_retry: Option<SystemTime> = None;
        for entry in entries.iter().filter(|entry| entry.enabled) {
            let blocked = entry
                .credential
                .existing_quota_index()
                .and_then(|index| index.is_blocked(&scope, now));
            match blocked {
                None => return Ok(Arc::clone(&entry.credential)),
                Some(retry_at) => {
                    debug!(
                        event = "credential_skipped",
                        provider = %provider,
                        model = %model,
                        group = %scope,
                        credential_id = entry.credential.id()
                    );
                    earliest_retry = Some(match earliest_retry {
                        Some(current) => current.min(retry_at),
                        None => retry_at,
                    });
                }
            }
        }

        match earliest_retry {
            Some(retry_at) => Err(AcquireError::QuotaExhausted { retry_at }),
            None => Err(AcquireError::NoActiveCredentials),
        }
    }

    /// Blocks the quota scope of `model` on one credential. Returns the scope
    /// that was blocked, or `None` when `provider` holds no credential `id`.
    pub fn record_quota_exceeded(
        &self,
        id: CredentialId,
        provider: &str,
        model: &str,
        signal: QuotaSignal,
    ) -> Option<String> {
        let Some(credential) = self.credential_in(provider, id) else {
            debug!(event = "quota_signal_dropped", provider = %provider, credential_id = id, "unknown credential");
            return None;
        };
        let scope = self.quota_scope(provider, model);
        credential
            .quota_index()
            .set_blocked(&scope, model, signal.retry_after, signal.recover_at);

        warn!(
            event = "quota_group_blocked",
            provider = %provider,
            credential_id = id,
            group = %scope,
            model = %model,
            retry_after = ?signal.retry_after,
            recover_at = ?signal.recover_at
        );
        self.events
            .emit(Event::Operational(OperationalEvent::QuotaGroupBlocked(
                QuotaGroupBlockedEvent {
                    at: SystemTime::now(),
                    credential_id: id,
                    provider: provider_key(provider),
                    group: scope.clone(),
                    source_model: model.to_string(),
                    retry_after: signal.retry_after,
                    recover_at: signal.recover_at,
                },
            )));
        Some(scope)
    }

    /// Unblocks the quota scope of `model` on one credential, e.g. after a
    /// manual reset. Returns `false` when `provider` holds no credential `id`.
    pub fn clear_quota(&self, id: CredentialId, provider: &str, model: &str) -> bool {
        let Some(credential) = self.credential_in(provider, id) else {
            return false;
        };
        let scope = self.quota_scope(provider, model);
        if let Some(index) = credential.existing_quota_index() {
            index.clear(&scope);
        }

        info!(event = "quota_group_cleared", provider = %provider, credential_id = id, group = %scope);
        self.events
            .emit(Event::Operational(OperationalEvent::QuotaGroupCleared(
                QuotaGroupClearedEvent {
                    at: SystemTime::now(),
                    credential_id: id,
                    provider: provider_key(provider),
                    group: scope,
                },
            )));
        true
    }

    pub fn quota_states(&self, id: CredentialId, now: SystemTime) -> Vec<(String, QuotaGroupState)> {
        self.credential(id)
            .and_then(|credential| {
                credential
                    .existing_quota_index()
                    .map(|index| index.snapshot(now))
            })
            .unwrap_or_default()
    }
}

fn provider_key(provider: &str) -> String {
    provider.trim().to_lowercase()
}
