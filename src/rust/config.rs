//! Service configuration

use std::env;
use std::path::PathBuf;

use clap::Args;

pub const ARTIFACTS_ENV: &str = "POSTURE_ARTIFACTS";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Where the inference service finds its bundle and where it listens.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ServiceConfig {
    /// Directory holding the artifact bundle
    #[arg(long = "artifacts", env = ARTIFACTS_ENV, default_value_os_t = default_artifacts_dir())]
    pub artifacts_dir: PathBuf,

    /// Interface to bind
    #[arg(long, env = "POSTURE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "POSTURE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServiceConfig {
    pub fn new(artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            ..Self::default()
        }
    }

    /// `host:port`, as accepted by `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolves the default bundle directory.
pub fn default_artifacts_dir() -> PathBuf {
    // 1. Check environment variable
    if let Ok(path) = env::var(ARTIFACTS_ENV) {
        return PathBuf::from(path);
    }

    // 2. Use platform-specific data directory
    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("posture").join("artifacts");
    }

    // 3. Fallback to user's home directory
    if let Some(home_dir) = dirs::home_dir() {
        return home_dir.join(".local").join("share").join("posture").join("artifacts");
    }

    // 4. If all else fails, use system temp directory
    env::temp_dir().join("posture").join("artifacts")
}
