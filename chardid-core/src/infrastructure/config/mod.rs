mod loader;
mod types;

pub use loader::load_config;
pub use types::{AppConfig, AuthoringConfig, BlsConfig, NodeConfig, RuntimeConfig, StoreConfig};
