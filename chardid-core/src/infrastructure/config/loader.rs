//! Configuration loader using Figment for layered config management.
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. TOML config file
//! 3. Environment variables (CHARDID_* prefix)
//!
//! Example override: `CHARDID_NODE__RPC_PORT=18332` -> `node.rpc_port`.

use crate::foundation::{DidError, Result};
use crate::infrastructure::config::types::AppConfig;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use log::debug;
use std::path::Path;

const ENV_PREFIX: &str = "CHARDID_";

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));
    if let Some(path) = path {
        if !path.exists() {
            return Err(DidError::ConfigError(format!("config file not found: {}", path.display())));
        }
        debug!("loading config file {}", path.display());
        figment = figment.merge(Toml::file(path));
    }
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
    figment.extract().map_err(|err| DidError::ConfigError(err.to_string()))
}
