use chrono::{DateTime, Utc};
use serde::Serialize;

/// One flattened channel sample from a device usage response.
///
/// `usage_W` approximates instantaneous power from a one-second energy
/// sample: kWh * 1000 * 3600. The vendor reports energy over the sampling
/// interval, so at 1S scale this is the average power during that second.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReading {
    pub timestamp: DateTime<Utc>,
    pub device_id: u64,
    pub channel_id: String,
    pub channel_name: String,
    #[serde(rename = "usage_kWh")]
    pub usage_kwh: f64,
    #[serde(rename = "usage_W")]
    pub usage_w: f64,
}

impl ChannelReading {
    /// A missing usage value is treated as 0 before rounding.
    pub fn new(device_id: u64, channel_id: String, channel_name: String, usage: Option<f64>) -> Self {
        let kwh = usage.unwrap_or(0.0);
        Self {
            timestamp: Utc::now(),
            device_id,
            channel_id,
            channel_name,
            usage_kwh: round_to(kwh, 6),
            usage_w: round_to(kwh * 1000.0 * 3600.0, 2),
        }
    }
}

/// Outcome of one polling cycle. Exactly one of these is serialized to
/// stdout per process run.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PollResult {
    NoInternet {
        message: String,
        timestamp: DateTime<Utc>,
    },
    Success {
        execution_time_seconds: f64,
        readings: Vec<ChannelReading>,
    },
    ApiError {
        message: String,
        execution_time_seconds: f64,
        timestamp: DateTime<Utc>,
    },
    FatalError {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl PollResult {
    /// Only a fatal error terminates the process with a non-zero status;
    /// the other variants all count as a completed poll.
    pub fn exit_code(&self) -> i32 {
        match self {
            PollResult::FatalError { .. } => 1,
            _ => 0,
        }
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
