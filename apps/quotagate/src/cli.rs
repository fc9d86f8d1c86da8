use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use quotagate_common::GatewayConfigPatch;
use quotagate_core::TokenCacheKind;

#[derive(Parser)]
#[command(
    name = "quotagate",
    version,
    about = "Inspect quota grouping and token cost caching of the quotagate core"
)]
pub(crate) struct Cli {
    /// JSON config file; CLI and ENV values override its fields.
    #[arg(long, env = "QUOTAGATE_CONFIG")]
    pub(crate) config: Option<PathBuf>,

    /// Providers whose models share quota per family (comma separated).
    #[arg(long = "grouped-provider", env = "QUOTAGATE_GROUPED_PROVIDERS", value_delimiter = ',')]
    pub(crate) grouped_providers: Option<Vec<String>>,

    /// Block length for a 429 without a usable Retry-After.
    #[arg(long, env = "QUOTAGATE_DEFAULT_RETRY_AFTER_SECS")]
    pub(crate) default_retry_after_secs: Option<u64>,

    /// Capacity of the operational event channel.
    #[arg(long, env = "QUOTAGATE_EVENT_BUFFER")]
    pub(crate) event_buffer: Option<usize>,

    /// Print operational events as JSON lines on stderr.
    #[arg(long, env = "QUOTAGATE_TERMINAL_EVENTS")]
    pub(crate) terminal_events: Option<bool>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

impl Cli {
    pub(crate) fn config_patch(&self) -> GatewayConfigPatch {
        GatewayConfigPatch {
            grouped_providers: self.grouped_providers.clone(),
            default_retry_after_secs: self.default_retry_after_secs,
            event_buffer: self.event_buffer,
            terminal_events: self.terminal_events,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the quota group a provider model resolves to.
    Resolve {
        #[arg(long)]
        provider: String,
        #[arg(long)]
        model: String,
    },
    /// Count tokens of files, reusing cached counts for repeated content.
    Count {
        /// Model whose tiktoken encoding is used (falls back to o200k_base).
        #[arg(long, default_value = "gpt-4o")]
        model: String,
        #[arg(long, value_enum, default_value_t = CacheKindArg::Content)]
        kind: CacheKindArg,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Replay a JSON-lines routing trace through the credential pool.
    Replay {
        trace: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum CacheKindArg {
    Tool,
    Instruction,
    Content,
}

impl From<CacheKindArg> for TokenCacheKind {
    fn from(value: CacheKindArg) -> Self {
        match value {
            CacheKindArg::Tool => TokenCacheKind::Tool,
            CacheKindArg::Instruction => TokenCacheKind::Instruction,
            CacheKindArg::Content => TokenCacheKind::Content,
        }
    }
}
