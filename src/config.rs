// SPDX-License-Identifier: MPL-2.0

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "skygraph";

pub const DEFAULT_PDS: &str = "https://bsky.social";

/// Public web client that post and profile URLs point at.
pub const WEB_HOST: &str = "bsky.app";

/// Largest `limit` any listing endpoint accepts.
pub const MAX_PAGE_SIZE: usize = 100;

/// Default result count for post search when no usable limit is given.
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Delay between pages (and between items on per-item listings) to stay under
/// the AppView rate limit.
pub const PACING_DELAY: Duration = Duration::from_millis(100);

pub const FOLLOWERS_MAX_ATTEMPTS: u32 = 3;
pub const FOLLOWERS_BASE_DELAY: Duration = Duration::from_secs(1);
pub const FOLLOWERS_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);

const ENV_HANDLE: &str = "SKYGRAPH_HANDLE";
const ENV_APP_PASSWORD: &str = "SKYGRAPH_APP_PASSWORD";
const ENV_PDS_HOST: &str = "SKYGRAPH_PDS_HOST";

/// Credentials and host for one named connection.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub app_password: Option<String>,
    #[serde(default)]
    pub pds_host: Option<String>,
}

// Keeps the app password out of logs.
impl std::fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("handle", &self.handle)
            .field("app_password", &self.app_password.as_ref().map(|_| "<redacted>"))
            .field("pds_host", &self.pds_host)
            .finish()
    }
}

/// Validated credentials, ready for session creation.
#[derive(Clone)]
pub struct Credentials {
    pub handle: String,
    pub app_password: String,
    pub pds_host: String,
}

impl ConnectionConfig {
    /// Check required fields and fill in the default PDS host.
    pub fn credentials(&self) -> Result<Credentials, Error> {
        let handle = non_empty(&self.handle)
            .ok_or_else(|| Error::Config("handle is required".into()))?;
        let app_password = non_empty(&self.app_password)
            .ok_or_else(|| Error::Config("app_password is required".into()))?;
        let pds_host = non_empty(&self.pds_host).unwrap_or(DEFAULT_PDS);

        Ok(Credentials {
            handle: handle.to_string(),
            app_password: app_password.to_string(),
            pds_host: pds_host.trim_end_matches('/').to_string(),
        })
    }

    /// Overlay `SKYGRAPH_*` environment variables on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(handle) = std::env::var(ENV_HANDLE) {
            self.handle = Some(handle);
        }
        if let Ok(password) = std::env::var(ENV_APP_PASSWORD) {
            self.app_password = Some(password);
        }
        if let Ok(host) = std::env::var(ENV_PDS_HOST) {
            self.pds_host = Some(host);
        }
        self
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// All named connections, as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionsFile {
    pub connections: HashMap<String, ConnectionConfig>,
}

impl ConnectionsFile {
    /// Get the connections file path (~/.config/skygraph/connections.json)
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push(APP_NAME);
            p.push("connections.json");
            p
        })
    }

    /// Load connections from disk. A missing file is an empty set; a file that
    /// exists but does not parse is a configuration error.
    pub fn load() -> Result<Self, Error> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents)
                .map_err(|e| Error::Config(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(Error::Config(format!(
                "failed to read {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }

    /// Config for `name` with environment overrides applied. Unknown names
    /// start from an empty config so the environment alone can supply it.
    pub fn connection(&self, name: &str) -> ConnectionConfig {
        self.connections
            .get(name)
            .cloned()
            .unwrap_or_default()
            .with_env_overrides()
    }
}
