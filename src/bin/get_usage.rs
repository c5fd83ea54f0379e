use std::io::Write;

use chrono::Utc;
use emporia_poller::client::EmporiaClient;
use emporia_poller::config::Config;
use emporia_poller::models::PollResult;
use emporia_poller::poller::UsagePoller;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Progress goes to stderr; stdout carries exactly one JSON line so a
/// supervising process can parse it deterministically.
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

async fn poll_once() -> PollResult {
    let cfg = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            return PollResult::FatalError {
                message: format!("{:#}", e),
                timestamp: Utc::now(),
            }
        }
    };
    init_tracing(&cfg.logging.level);
    info!("starting usage poll");

    let client = match EmporiaClient::new(&cfg.api) {
        Ok(client) => client,
        Err(e) => {
            return PollResult::FatalError {
                message: e.to_string(),
                timestamp: Utc::now(),
            }
        }
    };

    UsagePoller::new(&client, &cfg.credentials, &cfg.poll)
        .run()
        .await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let result = poll_once().await;

    match serde_json::to_string(&result) {
        Ok(line) => println!("{}", line),
        Err(e) => {
            // Unreachable for these types, but the one-line stdout
            // contract holds even then.
            println!(
                "{}",
                serde_json::json!({
                    "status": "fatal_error",
                    "message": format!("result serialization failed: {}", e),
                    "timestamp": Utc::now(),
                })
            );
            let _ = std::io::stdout().flush();
            std::process::exit(1);
        }
    }
    let _ = std::io::stdout().flush();

    std::process::exit(result.exit_code());
}
