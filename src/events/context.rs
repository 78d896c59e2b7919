//! Per-session context threaded through every translation call.

use serde_json::{json, Value};

use crate::acp::schema::{SessionNotification, SessionUpdate};
use crate::engine::UsageMetrics;

/// Key of the metrics block inside the `_meta` object of a notification.
pub const METRICS_META_KEY: &str = "openhands.dev/metrics";

/// Session identity plus the latest usage snapshot reported by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionContext {
    /// Session the notifications belong to.
    pub session_id: String,
    /// Latest accumulated usage; `None` until the engine reports any.
    pub metrics: Option<UsageMetrics>,
}

impl SessionContext {
    /// Context for `session_id` with no usage yet.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            metrics: None,
        }
    }

    /// Replace the usage snapshot.
    pub fn update_metrics(&mut self, metrics: UsageMetrics) {
        self.metrics = Some(metrics);
    }

    /// Wrap `update` for this session with the current `_meta`.
    #[must_use]
    pub fn notification(&self, update: SessionUpdate) -> SessionNotification {
        SessionNotification {
            session_id: self.session_id.clone(),
            update,
            meta: self.meta(),
        }
    }

    /// `_meta` object attached to outgoing notifications, if usage is known.
    #[must_use]
    pub fn meta(&self) -> Option<Value> {
        self.metrics.as_ref().map(|usage| {
            json!({
                METRICS_META_KEY: {
                    "input_tokens": usage.input_tokens,
                    "output_tokens": usage.output_tokens,
                    "cache_read_tokens": usage.cache_read_tokens,
                    "reasoning_tokens": usage.reasoning_tokens,
                    "cost": usage.cost,
                    "status_line": status_line(usage),
                }
            })
        })
    }
}

/// One-line usage summary, e.g. `↑ input 1.2K • cache hit 50.00% • ↓ output 500 • $ 0.0050`.
#[must_use]
pub fn status_line(usage: &UsageMetrics) -> String {
    let cache_rate = if usage.input_tokens > 0 {
        #[allow(clippy::cast_precision_loss)]
        let rate = usage.cache_read_tokens as f64 / usage.input_tokens as f64 * 100.0;
        format!("{rate:.2}%")
    } else {
        "N/A".to_owned()
    };

    let cost = if usage.cost > 0.0 {
        format!("{:.4}", usage.cost)
    } else {
        "0.00".to_owned()
    };

    let mut parts = vec![
        format!("↑ input {}", abbreviate(usage.input_tokens)),
        format!("cache hit {cache_rate}"),
    ];
    if usage.reasoning_tokens > 0 {
        parts.push(format!("reasoning {}", abbreviate(usage.reasoning_tokens)));
    }
    parts.push(format!("↓ output {}", abbreviate(usage.output_tokens)));
    parts.push(format!("$ {cost}"));
    parts.join(" • ")
}

/// Abbreviate a token count with a K/M/B suffix and up to two decimals.
#[must_use]
pub fn abbreviate(n: u64) -> String {
    let (divisor, suffix) = match n {
        1_000_000_000.. => (1_000_000_000u64, "B"),
        1_000_000.. => (1_000_000, "M"),
        1_000.. => (1_000, "K"),
        _ => return n.to_string(),
    };
    #[allow(clippy::cast_precision_loss)]
    let value = n as f64 / divisor as f64;
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed}{suffix}")
}
