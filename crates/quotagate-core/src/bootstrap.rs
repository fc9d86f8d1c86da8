use std::sync::Arc;
use std::time::Duration;

use quotagate_common::GatewayConfig;
use tracing::info;

use crate::events::{EventHub, TerminalEventSink};
use crate::quota::{FamilyResolver, QuotaGroupRegistry};
use crate::tokens::TokenCaches;
use crate::CredentialPool;

/// Process-wide quota state, built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct QuotaRuntime {
    pub registry: Arc<QuotaGroupRegistry>,
    pub token_caches: Arc<TokenCaches>,
    pub events: EventHub,
    pub pool: Arc<CredentialPool>,
    pub default_retry_after: Duration,
}

pub fn bootstrap(config: &GatewayConfig) -> QuotaRuntime {
    let registry = Arc::new(QuotaGroupRegistry::with_defaults());
    for provider in &config.grouped_providers {
        registry.register(provider, FamilyResolver);
    }
    info!(
        event = "quota_registry_ready",
        registry = ?registry,
        "quota group resolvers registered"
    );

    let events = EventHub::new(config.event_buffer);
    if config.terminal_events {
        events.add_sink(Arc::new(TerminalEventSink::new()));
    }

    let pool = Arc::new(CredentialPool::new(registry.clone(), events.clone()));

    QuotaRuntime {
        registry,
        token_caches: Arc::new(TokenCaches::new()),
        events,
        pool,
        default_retry_after: Duration::from_secs(config.default_retry_after_secs),
    }
}
