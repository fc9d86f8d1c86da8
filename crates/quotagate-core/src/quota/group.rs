use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use arc_swap::ArcSwap;
use tracing::debug;

/// Maps a model of a provider to the quota group it shares rate limits with.
///
/// Returning `None` (or an empty string from a closure) means the model has
/// an independent quota.
pub trait QuotaGroupResolver: Send + Sync {
    fn resolve(&self, provider: &str, model: &str) -> Option<String>;
}

impl<F> QuotaGroupResolver for F
where
    F: Fn(&str, &str) -> String + Send + Sync,
{
    fn resolve(&self, provider: &str, model: &str) -> Option<String> {
        let group = self(provider, model);
        (!group.is_empty()).then_some(group)
    }
}

/// Groups models by family prefix: everything before the first `-`, `_` or
/// `.`, lower-cased.
///
/// - `claude-opus-4-5-thinking` -> `claude`
/// - `gemini-2.5-pro` -> `gemini`
/// - `gpt-4o` -> `gpt`
/// - `o1` -> `o1`
#[derive(Debug, Clone, Copy, Default)]
pub struct FamilyResolver;

impl FamilyResolver {
    pub fn family(model: &str) -> Option<String> {
        if model.is_empty() {
            return None;
        }
        let family = match model.find(['-', '_', '.']) {
            Some(end) if end > 0 => &model[..end],
            _ => model,
        };
        Some(family.to_lowercase())
    }
}

impl QuotaGroupResolver for FamilyResolver {
    fn resolve(&self, _provider: &str, model: &str) -> Option<String> {
        Self::family(model)
    }
}

/// Providers that get [`FamilyResolver`] grouping out of the box.
pub const DEFAULT_FAMILY_GROUPED_PROVIDERS: &[&str] = &["antigravity"];

/// Registry of quota group resolvers, keyed by lower-cased provider name.
///
/// Written at startup, read on every routing decision. `has_grouping` reads a
/// lock-free snapshot of the registered provider names so that providers
/// without grouping (the common case) never touch the resolver lock.
pub struct QuotaGroupRegistry {
    resolvers: RwLock<HashMap<String, Arc<dyn QuotaGroupResolver>>>,
    grouped: ArcSwap<HashSet<String>>,
}

impl std::fmt::Debug for QuotaGroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let grouped = self.grouped.load();
        let mut providers: Vec<&String> = grouped.iter().collect();
        providers.sort();
        f.debug_struct("QuotaGroupRegistry")
            .field("providers", &providers)
            .finish()
    }
}

impl Default for QuotaGroupRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaGroupRegistry {
    /// An empty registry: every provider has independent per-model quotas.
    pub fn new() -> Self {
        Self {
            resolvers: RwLock::new(HashMap::new()),
            grouped: ArcSwap::from_pointee(HashSet::new()),
        }
    }

    /// A registry with the built-in family grouping registered.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for provider in DEFAULT_FAMILY_GROUPED_PROVIDERS {
            registry.register(provider, FamilyResolver);
        }
        registry
    }

    pub fn register<R>(&self, provider: &str, resolver: R)
    where
        R: QuotaGroupResolver + 'static,
    {
        self.register_arc(provider, Arc::new(resolver));
    }

    /// Registers (or replaces) the resolver for `provider`. Blank provider
    /// names are ignored.
    pub fn register_arc(&self, provider: &str, resolver: Arc<dyn QuotaGroupResolver>) {
        let provider = normalize_provider(provider).into_owned();
        if provider.is_empty() {
            return;
        }

        let mut resolvers = self
            .resolvers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        resolvers.insert(provider.clone(), resolver);
        self.grouped.rcu(|current| {
            let mut next = HashSet::clone(current);
            next.insert(provider.clone());
            next
        });
        drop(resolvers);

        debug!(event = "quota_group_resolver_registered", provider = %provider);
    }

    pub fn has_grouping(&self, provider: &str) -> bool {
        let provider = normalize_provider(provider);
        self.grouped.load().contains(provider.as_ref())
    }

    /// Quota group of `model` under `provider`, or `None` when the model's
    /// quota is independent.
    pub fn resolve(&self, provider: &str, model: &str) -> Option<String> {
        let provider = normalize_provider(provider);
        if provider.is_empty() || model.is_empty() {
            return None;
        }
        let resolver = {
            let resolvers = self.resolvers.read().unwrap_or_else(PoisonError::into_inner);
            resolvers.get(provider.as_ref()).cloned()
        }?;
        resolver
            .resolve(&provider, model)
            .filter(|group| !group.is_empty())
    }
}

/// Trimmed, lower-cased provider name. Borrows when already normalized.
fn normalize_provider(provider: &str) -> Cow<'_, str> {
    let trimmed = provider.trim();
    if trimmed.chars().all(|c| c.to_lowercase().eq([c])) {
        Cow::Borrowed(trimmed)
    } else {
        Cow::Owned(trimmed.to_lowercase())
    }
}
