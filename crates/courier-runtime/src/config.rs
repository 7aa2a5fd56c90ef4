//! Runtime configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the gateway runtime. All fields have working defaults; the
/// bootstrap layer deserializes overrides on top of [`GatewayConfig::default`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Capacity of each identity's serialized outbound queue.
    pub outbound_queue_capacity: usize,

    /// When `true`, sends for one identity are transmitted in submission
    /// order through a single per-identity queue. When `false` each send
    /// runs on its own task, with no ordering between concurrent sends.
    pub serialize_sends: bool,

    /// Announce a typing indicator before each send.
    pub send_typing_presence: bool,

    /// Lower bound of the randomized pre-send delay, in milliseconds.
    pub typing_delay_min_ms: u64,

    /// Upper bound of the randomized pre-send delay, in milliseconds.
    pub typing_delay_max_ms: u64,

    /// How long shutdown waits for sessions to terminate before abandoning
    /// the stragglers, in seconds.
    pub shutdown_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            outbound_queue_capacity: 32,
            serialize_sends: false,
            send_typing_presence: true,
            typing_delay_min_ms: 1_000,
            typing_delay_max_ms: 10_000,
            shutdown_timeout_secs: 30,
        }
    }
}

impl GatewayConfig {
    /// A config suited to tests: no artificial delays, no typing indicator
    /// noise, short shutdown window.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            send_typing_presence: false,
            typing_delay_min_ms: 0,
            typing_delay_max_ms: 0,
            shutdown_timeout_secs: 2,
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = GatewayConfig::default();
        assert_eq!(config.outbound_queue_capacity, 32);
        assert!(!config.serialize_sends);
        assert!(config.send_typing_presence);
        assert_eq!(config.typing_delay_min_ms, 1_000);
        assert_eq!(config.typing_delay_max_ms, 10_000);
        assert_eq!(config.shutdown_timeout_secs, 30);
    }

    #[test]
    fn partial_overrides_fill_from_default() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"serialize_sends": true, "shutdown_timeout_secs": 5}"#)
                .unwrap();
        assert!(config.serialize_sends);
        assert_eq!(config.shutdown_timeout_secs, 5);
        assert_eq!(config.outbound_queue_capacity, 32);
    }
}
