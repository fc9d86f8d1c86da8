//! Credential and quota core of the quotagate gateway.
//!
//! This crate does no IO. It tracks which credentials have exhausted which
//! quota groups, and memoizes token-count estimates. HTTP handling, provider
//! clients and tokenizers live in the layers above.

pub mod bootstrap;
pub mod credential;
pub mod errors;
pub mod events;
pub mod quota;
pub mod signal;
pub mod tokens;

pub use bootstrap::{QuotaRuntime, bootstrap};
pub use credential::{Credential, CredentialEntry, CredentialId, CredentialPool, PoolSnapshot};
pub use errors::{AcquireError, InsertError};
pub use events::{
    Event, EventHub, EventSink, OperationalEvent, QuotaGroupBlockedEvent, QuotaGroupClearedEvent,
    TerminalEventSink,
};
pub use quota::{FamilyResolver, QuotaBlockIndex, QuotaGroupRegistry, QuotaGroupResolver, QuotaGroupState};
pub use signal::{DEFAULT_RETRY_AFTER, QuotaSignal};
pub use tokens::{
    ContentHash, SHARD_CAPACITY, SHARD_COUNT, TokenCacheKind, TokenCaches, TokenCostCache,
    content_hash,
};
