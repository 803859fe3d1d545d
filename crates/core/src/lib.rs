pub mod config;
pub mod error;
pub mod types;

pub use config::BusConfig;
pub use error::*;
pub use types::*;
