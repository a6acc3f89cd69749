pub mod analysis;
pub mod api;
pub mod config;
pub mod live;
pub mod state;
pub mod websocket;

pub use config::Config;
pub use state::{DashboardState, LiveSnapshot};
