use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Listener host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Mesh listener port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Canvas width in points, the right edge for space allocation
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f32,

    /// Canvas height in points, the bottom edge for space allocation
    #[serde(default = "default_canvas_height")]
    pub canvas_height: f32,

    /// Path of the session file for save/load, if any
    pub session_file: Option<String>,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        match envy::from_env::<Config>() {
            Ok(config) => {
                info!("Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("Failed to load configuration: {}", e);
                Err(ConfigError::EnvError(e))
            }
        }
    }

    /// Get the full listener address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            canvas_width: default_canvas_width(),
            canvas_height: default_canvas_height(),
            session_file: None,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_canvas_width() -> f32 {
    1200.0
}

fn default_canvas_height() -> f32 {
    900.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_whole_canvas_surface() {
        let config = Config::default();
        assert_eq!(config.server_address(), "0.0.0.0:8888");
        assert_eq!(config.canvas_width, 1200.0);
        assert_eq!(config.canvas_height, 900.0);
        assert!(config.session_file.is_none());
    }
}
