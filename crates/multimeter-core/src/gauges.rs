//! CPU and memory gauges.
//!
//! Readings arrive as loosely-typed JSON. Anything that is not a finite
//! number (or a string holding one) is an invalid reading, shown as
//! `ERROR` with a full bar instead of a bogus percentage.

use serde_json::Value;

use multimeter_types::backend::GaugeReadout;

/// CPU limit used until the identity fetch resolves.
pub const DEFAULT_CPU_LIMIT: f64 = 1.0;

/// Memory limit in bytes (2 MiB).
pub const DEFAULT_MEMORY_LIMIT: f64 = 2_097_152.0;

/// A single telemetry value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Valid(f64),
    Invalid,
}

impl Reading {
    pub fn from_json(value: &Value) -> Self {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_numeric(s),
            _ => None,
        };
        match parsed {
            Some(v) if v.is_finite() => Self::Valid(v),
            _ => Self::Invalid,
        }
    }
}

/// A whole numeric string, or else its leading integer (`"12abc"` is 12).
/// Strings with no leading digits are rejected.
fn parse_numeric(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'))
        && let Ok(v) = s.parse::<f64>()
    {
        return Some(v);
    }
    let unsigned = s.trim_start_matches(['+', '-']);
    let sign_len = s.len() - unsigned.len();
    if sign_len > 1 {
        return None;
    }
    let digits = unsigned.len() - unsigned.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return None;
    }
    s[..sign_len + digits].parse::<f64>().ok()
}

/// Current usage against limits.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeModel {
    cpu_current: Reading,
    cpu_limit: f64,
    mem_current: Reading,
    mem_limit: f64,
}

impl GaugeModel {
    pub fn new() -> Self {
        Self {
            cpu_current: Reading::Valid(0.0),
            cpu_limit: DEFAULT_CPU_LIMIT,
            mem_current: Reading::Valid(0.0),
            mem_limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    pub fn cpu_limit(&self) -> f64 {
        self.cpu_limit
    }

    pub fn memory_limit(&self) -> f64 {
        self.mem_limit
    }

    /// Set the CPU limit. Non-positive or non-finite limits are ignored so
    /// percentages never divide by zero.
    pub fn set_cpu_limit(&mut self, limit: f64) -> bool {
        if positive(limit) {
            self.cpu_limit = limit;
            true
        } else {
            log::warn!("ignoring CPU limit {limit}");
            false
        }
    }

    pub fn set_memory_limit(&mut self, limit: f64) -> bool {
        if positive(limit) {
            self.mem_limit = limit;
            true
        } else {
            log::warn!("ignoring memory limit {limit}");
            false
        }
    }

    /// Record a telemetry sample and return the new readout.
    pub fn update(&mut self, cpu: Reading, memory: Reading) -> GaugeReadout {
        if cpu == Reading::Invalid {
            log::warn!("malformed CPU reading");
        }
        if memory == Reading::Invalid {
            log::warn!("malformed memory reading");
        }
        self.cpu_current = cpu;
        self.mem_current = memory;
        self.readout()
    }

    pub fn readout(&self) -> GaugeReadout {
        let (cpu_label, cpu_fill) = match self.cpu_current {
            Reading::Valid(current) => (
                format!("CPU: {:>3}/{:>3}", current as i64, self.cpu_limit as i64),
                percent(current, self.cpu_limit),
            ),
            Reading::Invalid => ("CPU: ERROR".to_string(), 100.0),
        };
        let (mem_label, mem_fill) = match self.mem_current {
            Reading::Valid(current) => (
                format!(
                    "Mem: {:>4}K/{:>4}K",
                    (current / 1024.0) as i64,
                    (self.mem_limit / 1024.0) as i64
                ),
                percent(current, self.mem_limit),
            ),
            Reading::Invalid => ("Mem: ERROR".to_string(), 100.0),
        };
        GaugeReadout {
            cpu_label,
            cpu_fill,
            mem_label,
            mem_fill,
        }
    }
}

impl Default for GaugeModel {
    fn default() -> Self {
        Self::new()
    }
}

fn positive(limit: f64) -> bool {
    limit.is_finite() && limit > 0.0
}

fn percent(current: f64, limit: f64) -> f64 {
    (current / limit * 100.0).clamp(0.0, 100.0)
}
