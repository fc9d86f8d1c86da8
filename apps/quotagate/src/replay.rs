//! Replays a recorded routing trace through the credential pool.
//!
//! Each input line is one JSON step. Times are seconds from the Unix epoch
//! so traces are reproducible. Routing decisions are written as JSON lines.

use std::io::{BufRead, Write};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context;
use http::header::RETRY_AFTER;
use http::{HeaderMap, HeaderValue, StatusCode};
use quotagate_core::{AcquireError, Credential, CredentialId, QuotaRuntime, QuotaSignal};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum TraceStep {
    Credential {
        id: CredentialId,
        provider: String,
        #[serde(default)]
        label: Option<String>,
    },
    Enable {
        id: CredentialId,
    },
    Disable {
        id: CredentialId,
    },
    Route {
        at: u64,
        provider: String,
        model: String,
    },
    Response {
        at: u64,
        credential: CredentialId,
        provider: String,
        model: String,
        status: u16,
        #[serde(default)]
        retry_after: Option<String>,
        #[serde(default)]
        recover_after_secs: Option<u64>,
    },
    Clear {
        credential: CredentialId,
        provider: String,
        model: String,
    },
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
enum RouteOutcome {
    Routed {
        at: u64,
        model: String,
        group: String,
        credential: CredentialId,
    },
    Exhausted {
        at: u64,
        model: String,
        group: String,
        retry_at: u64,
    },
    Unavailable {
        at: u64,
        model: String,
        reason: String,
    },
}

pub(crate) fn run(
    runtime: &QuotaRuntime,
    input: impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    for (line_no, line) in input.lines().enumerate() {
        let line = line.context("read trace")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step: TraceStep = serde_json::from_str(line)
            .with_context(|| format!("parse trace line {}", line_no + 1))?;
        let outcome = apply(runtime, step)
            .with_context(|| format!("replay trace line {}", line_no + 1))?;
        if let Some(outcome) = outcome {
            writeln!(out, "{}", serde_json::to_string(&outcome)?)?;
        }
    }
    Ok(())
}

fn apply(runtime: &QuotaRuntime, step: TraceStep) -> anyhow::Result<Option<RouteOutcome>> {
    let pool = &runtime.pool;
    match step {
        TraceStep::Credential { id, provider, label } => {
            let credential = match label {
                Some(label) => Credential::new(id).with_label(label),
                None => Credential::new(id),
            };
            pool.insert(&provider, credential)?;
        }
        TraceStep::Enable { id } => {
            pool.set_enabled(id, true);
        }
        TraceStep::Disable { id } => {
            pool.set_enabled(id, false);
        }
        TraceStep::Route { at, provider, model } => {
            let group = pool.quota_scope(&provider, &model);
            let outcome = match pool.acquire_for_model(&provider, &model, at_time(at)?) {
                Ok(credential) => RouteOutcome::Routed {
                    at,
                    model,
                    group,
                    credential: credential.id(),
                },
                Err(AcquireError::QuotaExhausted { retry_at }) => RouteOutcome::Exhausted {
                    at,
                    model,
                    group,
                    retry_at: epoch_secs(retry_at),
                },
                Err(err) => RouteOutcome::Unavailable {
                    at,
                    model,
                    reason: err.to_string(),
                },
            };
            return Ok(Some(outcome));
        }
        TraceStep::Response {
            at,
            credential,
            provider,
            model,
            status,
            retry_after,
            recover_after_secs,
        } => {
            let status = StatusCode::from_u16(status)
                .with_context(|| format!("invalid status {status}"))?;
            let mut headers = HeaderMap::new();
            if let Some(value) = retry_after {
                headers.insert(
                    RETRY_AFTER,
                    HeaderValue::from_str(&value).context("invalid retry_after")?,
                );
            }
            let now = at_time(at)?;
            let Some(mut signal) = QuotaSignal::from_response_with_default(
                status,
                &headers,
                now,
                runtime.default_retry_after,
            ) else {
                debug!(status = %status, model = %model, "response is not a quota signal");
                return Ok(None);
            };
            if let Some(secs) = recover_after_secs {
                let recover_at = now
                    .checked_add(Duration::from_secs(secs))
                    .with_context(|| format!("recover_after_secs {secs} out of range"))?;
                signal = signal.with_recover_at(recover_at);
            }
            pool.record_quota_exceeded(credential, &provider, &model, signal);
        }
        TraceStep::Clear {
            credential,
            provider,
            model,
        } => {
            pool.clear_quota(credential, &provider, &model);
        }
    }
    Ok(None)
}

fn at_time(secs: u64) -> anyhow::Result<SystemTime> {
    UNIX_EPOCH
        .checked_add(Duration::from_secs(secs))
        .with_context(|| format!("time {secs} out of range"))
}

fn epoch_secs(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or(0)
}
