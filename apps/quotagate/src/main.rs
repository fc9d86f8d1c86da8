use std::fs::File;
use std::io::{BufReader, Write};

use anyhow::Context;
use clap::Parser;
use quotagate_common::{GatewayConfig, GatewayConfigPatch};
use quotagate_core::{QuotaRuntime, TokenCacheKind, bootstrap};
use tiktoken_rs::{CoreBPE, get_bpe_from_model, o200k_base};
use tracing::info;

mod cli;
mod replay;

use crate::cli::{Cli, Command};

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("quotagate failed: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        grouped_providers = ?config.grouped_providers,
        default_retry_after_secs = config.default_retry_after_secs,
        event_buffer = config.event_buffer,
        "config loaded"
    );
    let runtime = bootstrap(&config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Resolve { provider, model } => {
            let group = runtime.registry.resolve(&provider, &model);
            writeln!(out, "{}", group.as_deref().unwrap_or("(independent)"))?;
        }
        Command::Count { model, kind, files } => {
            count_files(&runtime, &model, kind.into(), &files, &mut out)?;
        }
        Command::Replay { trace } => {
            let file = File::open(&trace)
                .with_context(|| format!("open trace {}", trace.display()))?;
            replay::run(&runtime, BufReader::new(file), &mut out)?;
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<GatewayConfig> {
    let mut merged = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {}", path.display()))?;
            serde_json::from_str::<GatewayConfigPatch>(&raw)
                .with_context(|| format!("parse config {}", path.display()))?
        }
        None => GatewayConfigPatch::default(),
    };
    merged.overlay(cli.config_patch());
    merged.into_config().context("finalize gateway config")
}

fn count_files(
    runtime: &QuotaRuntime,
    model: &str,
    kind: TokenCacheKind,
    files: &[std::path::PathBuf],
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let bpe = tokenizer_for(model)?;
    let cache = runtime.token_caches.get(kind);
    for path in files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        let (tokens, source) = match cache.get(&text) {
            Some(tokens) => (tokens, "cached"),
            None => {
                let tokens = bpe.encode_ordinary(&text).len() as u64;
                cache.set(&text, tokens);
                (tokens, "counted")
            }
        };
        writeln!(out, "{}\t{tokens}\t{source}", path.display())?;
    }
    Ok(())
}

fn tokenizer_for(model: &str) -> anyhow::Result<CoreBPE> {
    get_bpe_from_model(model)
        .or_else(|_| o200k_base())
        .map_err(|err| anyhow::anyhow!("load tokenizer for {model}: {err}"))
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("quotagate=info,quotagate_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
