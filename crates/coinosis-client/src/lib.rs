pub mod config;
pub mod http;
pub mod logging;

pub use config::{BackendConfig, ClientConfig, DistributionSettings, LoggingConfig, SettlementConfig};
pub use http::{HttpBackend, HttpBeacon};
pub use logging::init_logging;
