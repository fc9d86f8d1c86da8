use serde::{Deserialize, Serialize};

pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GatewayConfigError {
    #[error("invalid gateway config field: {0} must be greater than zero")]
    ZeroField(&'static str),
}

/// Final, merged configuration of the quota core.
///
/// Merge order: config file < ENV < CLI (clap resolves ENV vs CLI per field).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Providers whose models share quota per family, on top of the
    /// built-in ones.
    pub grouped_providers: Vec<String>,
    /// Block length for a 429 without a usable `Retry-After`.
    pub default_retry_after_secs: u64,
    /// Capacity of the operational event broadcast channel.
    pub event_buffer: usize,
    /// Print operational events as JSON lines on stderr.
    pub terminal_events: bool,
}

/// Optional layer used for merging gateway config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfigPatch {
    pub grouped_providers: Option<Vec<String>>,
    pub default_retry_after_secs: Option<u64>,
    pub event_buffer: Option<usize>,
    pub terminal_events: Option<bool>,
}

impl GatewayConfigPatch {
    pub fn overlay(&mut self, other: GatewayConfigPatch) {
        if other.grouped_providers.is_some() {
            self.grouped_providers = other.grouped_providers;
        }
        if other.default_retry_after_secs.is_some() {
            self.default_retry_after_secs = other.default_retry_after_secs;
        }
        if other.event_buffer.is_some() {
            self.event_buffer = other.event_buffer;
        }
        if other.terminal_events.is_some() {
            self.terminal_events = other.terminal_events;
        }
    }

    pub fn into_config(self) -> Result<GatewayConfig, GatewayConfigError> {
        let default_retry_after_secs = self
            .default_retry_after_secs
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        if default_retry_after_secs == 0 {
            return Err(GatewayConfigError::ZeroField("default_retry_after_secs"));
        }
        let event_buffer = self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER);
        if event_buffer == 0 {
            return Err(GatewayConfigError::ZeroField("event_buffer"));
        }

        let mut grouped_providers: Vec<String> = self
            .grouped_providers
            .unwrap_or_default()
            .into_iter()
            .map(|provider| provider.trim().to_lowercase())
            .filter(|provider| !provider.is_empty())
            .collect();
        grouped_providers.sort();
        grouped_providers.dedup();

        Ok(GatewayConfig {
            grouped_providers,
            default_retry_after_secs,
            event_buffer,
            terminal_events: self.terminal_events.unwrap_or(false),
        })
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            grouped_providers: Vec::new(),
            default_retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
            event_buffer: DEFAULT_EVENT_BUFFER,
            terminal_events: false,
        }
    }
}

impl From<GatewayConfig> for GatewayConfigPatch {
    fn from(value: GatewayConfig) -> Self {
        Self {
            grouped_providers: Some(value.grouped_providers),
            default_retry_after_secs: Some(value.default_retry_after_secs),
            event_buffer: Some(value.event_buffer),
            terminal_events: Some(value.terminal_events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_patch_yields_defaults() {
        let config = GatewayConfigPatch::default().into_config().unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn later_layer_wins_per_field() {
        let mut merged: GatewayConfigPatch = serde_json::from_str(
            r#"{"grouped_providers":["geminicli"],"default_retry_after_secs":30}"#,
        )
        .unwrap();
        merged.overlay(GatewayConfigPatch {
            default_retry_after_secs: Some(90),
            terminal_events: Some(true),
            ..Default::default()
        });

        let config = merged.into_config().unwrap();
        assert_eq!(config.grouped_providers, vec!["geminicli".to_string()]);
        assert_eq!(config.default_retry_after_secs, 90);
        assert_eq!(config.event_buffer, DEFAULT_EVENT_BUFFER);
        assert!(config.terminal_events);
    }

    #[test]
    fn grouped_providers_are_normalized() {
        let config = GatewayConfigPatch {
            grouped_providers: Some(vec![
                " Codex ".to_string(),
                "codex".to_string(),
                "".to_string(),
                "Antigravity".to_string(),
            ]),
            ..Default::default()
        }
        .into_config()
        .unwrap();
        assert_eq!(
            config.grouped_providers,
            vec!["antigravity".to_string(), "codex".to_string()]
        );
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = GatewayConfigPatch {
            event_buffer: Some(0),
            ..Default::default()
        }
        .into_config()
        .unwrap_err();
        assert_eq!(err, GatewayConfigError::ZeroField("event_buffer"));

        let err = GatewayConfigPatch {
            default_retry_after_secs: Some(0),
            ..Default::default()
        }
        .into_config()
        .unwrap_err();
        assert_eq!(err, GatewayConfigError::ZeroField("default_retry_after_secs"));
    }

    #[test]
    fn config_round_trips_through_patch() {
        let config = GatewayConfig {
            grouped_providers: vec!["antigravity".to_string()],
            default_retry_after_secs: 15,
            event_buffer: 8,
            terminal_events: true,
        };
        let patch = GatewayConfigPatch::from(config.clone());
        assert_eq!(patch.into_config().unwrap(), config);
    }
}
