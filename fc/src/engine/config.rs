//! Engine configuration

use std::time::Duration;

use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholds and timings for the coordination cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between coordination ticks in milliseconds
    #[serde(rename = "tick-interval-ms", default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Seconds without a heartbeat before an agent is Offline
    #[serde(rename = "heartbeat-timeout-secs", default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    /// Error rate above which an agent is marked Error
    #[serde(rename = "error-rate-threshold", default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,

    /// Load above which an agent is Busy
    #[serde(rename = "busy-load-threshold", default = "default_busy_load_threshold")]
    pub busy_load_threshold: f64,

    /// Load below which an agent is Idle
    #[serde(rename = "idle-load-threshold", default = "default_idle_load_threshold")]
    pub idle_load_threshold: f64,

    /// Agents above this load are not offered new tasks
    #[serde(rename = "max-assignable-load", default = "default_max_assignable_load")]
    pub max_assignable_load: f64,

    /// Fraction of a new agent's capabilities a group must share for it to join
    #[serde(rename = "group-overlap-threshold", default = "default_group_overlap_threshold")]
    pub group_overlap_threshold: f64,

    /// Workers a newly registered supervisor adopts
    #[serde(rename = "max-subordinates", default = "default_max_subordinates")]
    pub max_subordinates: usize,

    /// Load above which the optimizer sheds a task
    #[serde(rename = "overload-threshold", default = "default_overload_threshold")]
    pub overload_threshold: f64,

    /// Load below which an agent may receive a shed task
    #[serde(rename = "underload-threshold", default = "default_underload_threshold")]
    pub underload_threshold: f64,

    /// Minimum mean selection score for an assignment (0 disables the check)
    #[serde(rename = "min-confidence", default)]
    pub min_confidence: f64,

    /// Upper bound on a single executor dispatch in milliseconds
    #[serde(rename = "dispatch-timeout-ms", default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Buffer size of the coordinator request channel
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,
}

fn default_tick_interval_ms() -> u64 {
    debug!("default_tick_interval_ms: called");
    2000
}

fn default_heartbeat_timeout_secs() -> u64 {
    debug!("default_heartbeat_timeout_secs: called");
    300
}

fn default_error_rate_threshold() -> f64 {
    0.10
}

fn default_busy_load_threshold() -> f64 {
    0.8
}

fn default_idle_load_threshold() -> f64 {
    0.1
}

fn default_max_assignable_load() -> f64 {
    0.9
}

fn default_group_overlap_threshold() -> f64 {
    0.5
}

fn default_max_subordinates() -> usize {
    5
}

fn default_overload_threshold() -> f64 {
    0.8
}

fn default_underload_threshold() -> f64 {
    0.3
}

fn default_dispatch_timeout_ms() -> u64 {
    debug!("default_dispatch_timeout_ms: called");
    5000
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    256
}

impl Default for EngineConfig {
    fn default() -> Self {
        debug!("EngineConfig::default: called");
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            error_rate_threshold: default_error_rate_threshold(),
            busy_load_threshold: default_busy_load_threshold(),
            idle_load_threshold: default_idle_load_threshold(),
            max_assignable_load: default_max_assignable_load(),
            group_overlap_threshold: default_group_overlap_threshold(),
            max_subordinates: default_max_subordinates(),
            overload_threshold: default_overload_threshold(),
            underload_threshold: default_underload_threshold(),
            min_confidence: 0.0,
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            channel_buffer: default_channel_buffer(),
        }
    }
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn heartbeat_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.heartbeat_timeout_secs as i64)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Reject threshold combinations the cycle cannot honor
    pub fn validate(&self) -> Result<()> {
        debug!("EngineConfig::validate: called");
        let unit = [
            ("error-rate-threshold", self.error_rate_threshold),
            ("busy-load-threshold", self.busy_load_threshold),
            ("idle-load-threshold", self.idle_load_threshold),
            ("max-assignable-load", self.max_assignable_load),
            ("group-overlap-threshold", self.group_overlap_threshold),
            ("overload-threshold", self.overload_threshold),
            ("underload-threshold", self.underload_threshold),
            ("min-confidence", self.min_confidence),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(eyre!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if self.idle_load_threshold > self.busy_load_threshold {
            return Err(eyre!(
                "idle-load-threshold ({}) exceeds busy-load-threshold ({})",
                self.idle_load_threshold,
                self.busy_load_threshold
            ));
        }
        if self.underload_threshold >= self.overload_threshold {
            return Err(eyre!(
                "underload-threshold ({}) must be below overload-threshold ({})",
                self.underload_threshold,
                self.overload_threshold
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(eyre!("tick-interval-ms must be positive"));
        }
        if self.channel_buffer == 0 {
            return Err(eyre!("channel-buffer must be positive"));
        }
        Ok(())
    }
}
