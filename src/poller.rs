use chrono::Utc;
use std::time::Instant;
use tracing::{info, warn};

use crate::client::{DeviceListUsage, EnergyApi};
use crate::config::{CredentialsConfig, PollConfig};
use crate::models::{round_to, ChannelReading, PollResult};

/// Runs one polling cycle against the vendor API: connectivity probe,
/// login, usage fetch, result shaping. Single attempt; re-invocation on a
/// schedule is the caller's job.
pub struct UsagePoller<'a, A: EnergyApi> {
    api: &'a A,
    credentials: &'a CredentialsConfig,
    poll: &'a PollConfig,
}

impl<'a, A: EnergyApi> UsagePoller<'a, A> {
    pub fn new(api: &'a A, credentials: &'a CredentialsConfig, poll: &'a PollConfig) -> Self {
        Self {
            api,
            credentials,
            poll,
        }
    }

    /// Never fails: every failure mode folds into a `PollResult` variant.
    /// Elapsed time is measured from just before login through the end of
    /// the usage request.
    pub async fn run(&self) -> PollResult {
        info!("checking connectivity");
        if let Err(e) = self.api.probe().await {
            warn!(error = %e, "service unreachable");
            return PollResult::NoInternet {
                message: e.to_string(),
                timestamp: Utc::now(),
            };
        }

        info!("authenticating");
        let started = Instant::now();
        if let Err(e) = self.api.login(&self.credentials.email, &self.credentials.password).await {
            return PollResult::FatalError {
                message: e.to_string(),
                timestamp: Utc::now(),
            };
        }

        info!(device_gid = self.poll.device_gid, "fetching device usage");
        let fetched = self
            .api
            .get_device_list_usage(
                &[self.poll.device_gid],
                Utc::now(),
                &self.poll.scale,
                &self.poll.unit,
            )
            .await;
        let elapsed = round_to(started.elapsed().as_secs_f64(), 2);

        match fetched {
            Ok(usage) => {
                let readings = shape_readings(&usage);
                info!(readings = readings.len(), "usage fetched");
                PollResult::Success {
                    execution_time_seconds: elapsed,
                    readings,
                }
            }
            Err(e) => {
                warn!(error = %e, "usage request failed");
                PollResult::ApiError {
                    message: e.to_string(),
                    execution_time_seconds: elapsed,
                    timestamp: Utc::now(),
                }
            }
        }
    }
}

/// Flatten the nested device -> channel structure into one reading per
/// channel. Null channel entries are skipped; null usages become zero.
fn shape_readings(usage: &DeviceListUsage) -> Vec<ChannelReading> {
    let mut readings = Vec::new();
    for device in &usage.devices {
        for channel in device.channel_usages.iter().flatten() {
            readings.push(ChannelReading::new(
                device.device_gid,
                channel.channel_num.clone(),
                channel.name.clone().unwrap_or_default(),
                channel.usage,
            ));
        }
    }
    readings
}
