mod cache;
mod hash;

pub use cache::{SHARD_CAPACITY, SHARD_COUNT, TokenCostCache};
pub use hash::{ContentHash, content_hash};

/// Category of content whose token cost is cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCacheKind {
    /// Tool / function declarations.
    Tool,
    /// System prompts and instructions.
    Instruction,
    /// Message content blocks.
    Content,
}

/// The set of token caches a gateway process keeps, one per content category.
#[derive(Debug, Default)]
pub struct TokenCaches {
    tool: TokenCostCache,
    instruction: TokenCostCache,
    content: TokenCostCache,
}

impl TokenCaches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: TokenCacheKind) -> &TokenCostCache {
        match kind {
            TokenCacheKind::Tool => &self.tool,
            TokenCacheKind::Instruction => &self.instruction,
            TokenCacheKind::Content => &self.content,
        }
    }
}
