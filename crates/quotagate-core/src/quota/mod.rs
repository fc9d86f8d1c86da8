//! Shared quota groups and the per-credential index of blocked groups.
//!
//! Providers such as Antigravity meter usage per model family rather than per
//! model: a 429 for `claude-opus-4-5` also exhausts `claude-sonnet-4-5` on the
//! same account. The [`QuotaGroupRegistry`] answers which bucket a model
//! belongs to; each credential's [`QuotaBlockIndex`] answers whether that
//! bucket is currently blocked for that credential.

mod group;
mod index;

pub use group::{
    DEFAULT_FAMILY_GROUPED_PROVIDERS, FamilyResolver, QuotaGroupRegistry, QuotaGroupResolver,
};
pub use index::{QuotaBlockIndex, QuotaGroupState};
