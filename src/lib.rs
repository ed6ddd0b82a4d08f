pub mod admin;
pub mod config;
pub mod controller;
pub mod error;
pub mod poll;
pub mod session;
pub mod types;

pub use config::{Properties, TopicConfig};
pub use types::*;

/// The property source holding admin connection settings
pub const ADMIN_SOURCE: &str = "admin";
/// The property source holding the default configuration for pack topics
pub const PACK_TOPIC_SOURCE: &str = "pack_topic";
