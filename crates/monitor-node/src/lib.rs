//! Headless crowd monitor: one video source, one debouncer, MQTT out.

pub mod api;
pub mod capture;
pub mod config;
pub mod publisher;
pub mod state;

pub use config::Config;
pub use state::{MonitorState, StatusSnapshot};
