pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod poller;

pub use config::Config;
pub use error::{AppError, Result};
pub use models::{ChannelReading, PollResult};
