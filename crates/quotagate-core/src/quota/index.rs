use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

/// Why and until when a quota group is exhausted on one credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaGroupState {
    /// Earliest time any model of the group may be retried.
    pub next_retry_after: SystemTime,
    /// Longer recovery window reported by the provider (e.g. a daily reset).
    pub next_recover_at: Option<SystemTime>,
    /// Model whose response triggered the block.
    pub source_model: String,
}

impl QuotaGroupState {
    /// The later of the retry hint and a still-pending recovery window.
    pub fn effective_retry_at(&self, now: SystemTime) -> SystemTime {
        match self.next_recover_at {
            Some(recover) if recover > now && recover > self.next_retry_after => recover,
            _ => self.next_retry_after,
        }
    }
}

/// Per-credential reverse index from quota group to blocked state.
///
/// Entries whose retry time has passed are dropped lazily by the next
/// [`QuotaBlockIndex::is_blocked`] call for that group.
#[derive(Debug, Default)]
pub struct QuotaBlockIndex {
    blocked: Mutex<HashMap<String, QuotaGroupState>>,
}

impl QuotaBlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn groups(&self) -> MutexGuard<'_, HashMap<String, QuotaGroupState>> {
        self.blocked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `group` blocked. The most recent signal always replaces the
    /// stored state, even when its window is shorter.
    pub fn set_blocked(
        &self,
        group: &str,
        source_model: &str,
        next_retry_after: SystemTime,
        next_recover_at: Option<SystemTime>,
    ) {
        if group.is_empty() {
            return;
        }
        self.groups().insert(
            group.to_string(),
            QuotaGroupState {
                next_retry_after,
                next_recover_at,
                source_model: source_model.to_string(),
            },
        );
    }

    pub fn clear(&self, group: &str) {
        self.groups().remove(group);
    }

    /// Returns the time the group unblocks, or `None` if it is usable now.
    pub fn is_blocked(&self, group: &str, now: SystemTime) -> Option<SystemTime> {
        if group.is_empty() {
            return None;
        }
        let mut groups = self.groups();
        let state = groups.get(group)?;
        if state.next_retry_after > now {
            return Some(state.effective_retry_at(now));
        }
        groups.remove(group);
        None
    }

    pub fn state(&self, group: &str) -> Option<QuotaGroupState> {
        self.groups().get(group).cloned()
    }

    /// Groups still blocked at `now`, sorted by name. Expired entries are
    /// skipped but left for lazy removal.
    pub fn snapshot(&self, now: SystemTime) -> Vec<(String, QuotaGroupState)> {
        let groups = self.groups();
        let mut rows: Vec<(String, QuotaGroupState)> = groups
            .iter()
            .filter(|(_, state)| state.next_retry_after > now)
            .map(|(group, state)| (group.clone(), state.clone()))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        rows
    }

    pub fn len(&self) -> usize {
        self.groups().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups().is_empty()
    }
}
