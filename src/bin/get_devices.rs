use std::io::Write;

use emporia_poller::client::{Device, EmporiaClient, EnergyApi};
use emporia_poller::config::Config;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct DeviceSummary {
    device_gid: u64,
    device_name: String,
}

#[derive(Debug, Serialize)]
struct DeviceList {
    devices: Vec<DeviceSummary>,
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Flatten the account's device tree, sub-devices included, into
/// (gid, name) pairs.
fn summarize(devices: Vec<Device>) -> Vec<DeviceSummary> {
    let mut out = Vec::new();
    for device in devices {
        collect(device, &mut out);
    }
    out
}

fn collect(device: Device, out: &mut Vec<DeviceSummary>) {
    let device_name = device
        .location_properties
        .as_ref()
        .and_then(|p| p.device_name.clone())
        .unwrap_or_default();
    out.push(DeviceSummary {
        device_gid: device.device_gid,
        device_name,
    });
    for nested in device.devices {
        collect(nested, out);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;
    init_tracing(&cfg.logging.level);

    let client = EmporiaClient::new(&cfg.api)?;

    info!("logging in");
    client
        .login(&cfg.credentials.email, &cfg.credentials.password)
        .await?;

    info!("fetching devices");
    match client.get_devices().await {
        Ok(devices) => {
            let list = DeviceList {
                devices: summarize(devices),
            };
            info!(devices = list.devices.len(), "device list fetched");
            println!("{}", serde_json::to_string(&list)?);
            let _ = std::io::stdout().flush();
        }
        Err(e) => {
            // Listing failure after a successful login is not fatal.
            error!(error = %e, "device listing failed");
        }
    }

    Ok(())
}
