use std::time::{Duration, SystemTime};

use http::header::RETRY_AFTER;
use http::{HeaderMap, StatusCode};

/// Block length used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// A provider's report that a quota is exhausted, reduced to the two recovery
/// timestamps the quota index stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaSignal {
    pub retry_after: SystemTime,
    pub recover_at: Option<SystemTime>,
}

impl QuotaSignal {
    pub fn new(retry_after: SystemTime) -> Self {
        Self {
            retry_after,
            recover_at: None,
        }
    }

    pub fn after(now: SystemTime, wait: Duration) -> Self {
        Self::new(now.checked_add(wait).unwrap_or(now))
    }

    pub fn with_recover_at(mut self, recover_at: SystemTime) -> Self {
        self.recover_at = Some(recover_at);
        self
    }

    pub fn from_response(status: StatusCode, headers: &HeaderMap, now: SystemTime) -> Option<Self> {
        Self::from_response_with_default(status, headers, now, DEFAULT_RETRY_AFTER)
    }

    /// Classifies an upstream response. Only `429 Too Many Requests` is a
    /// quota signal; other failures are the router's business.
    pub fn from_response_with_default(
        status: StatusCode,
        headers: &HeaderMap,
        now: SystemTime,
        default_wait: Duration,
    ) -> Option<Self> {
        if status != StatusCode::TOO_MANY_REQUESTS {
            return None;
        }
        let retry_after =
            retry_after_at(headers, now).unwrap_or_else(|| Self::after(now, default_wait).retry_after);
        Some(Self::new(retry_after))
    }
}

/// `Retry-After` as an absolute time. Accepts delta-seconds or an HTTP date;
/// a date already in the past means "retry now".
fn retry_after_at(headers: &HeaderMap, now: SystemTime) -> Option<SystemTime> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return now.checked_add(Duration::from_secs(seconds));
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(when.max(now))
}
