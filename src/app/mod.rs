//! Application setup: configuration, logging and component wiring

pub mod config;
pub mod context;
pub mod loader;
pub mod logging;

pub use config::AppConfig;
pub use loader::load_config;
