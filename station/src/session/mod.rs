pub mod config;
pub mod runner;

pub use config::StationConfig;
pub use runner::{LinkSource, Session, SharedSession};
