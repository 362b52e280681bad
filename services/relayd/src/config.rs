use serde_derive::{Deserialize, Serialize};
use std::env;
use std::path::Path;

pub const DEFAULT_PORT: u16 = 8888;

/// Relay runtime settings. Sources, strongest first: command line flags,
/// environment variables, optional TOML config file, built-in defaults.
#[derive(Serialize, Deserialize)]
pub struct RelayConfig {
    pub ip: String,
    pub port: u16,
    pub storage_dir: String,
    pub log_level: String,
}

impl Default for RelayConfig {
    fn default() -> RelayConfig {
        RelayConfig {
            ip: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            storage_dir: ".".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> RelayConfig {
        serdeconv::from_toml_file(path).expect("Error loading relay configuration file")
    }

    /// Overlays `SERVER_IP`, `SERVER_PORT`, `STORAGE_DIR` and `LOG_LEVEL`
    /// from the environment.
    pub fn apply_env(&mut self) {
        if let Ok(ip) = env::var("SERVER_IP") {
            self.ip = ip;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            self.port = port.parse().expect("SERVER_PORT must be a valid port number");
        }
        if let Ok(dir) = env::var("STORAGE_DIR") {
            self.storage_dir = dir;
        }
        if let Ok(level) = env::var("LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// The `ip:port` form the listener binds.
    pub fn address(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}
