// SPDX-License-Identifier: MPL-2.0

use crate::atproto::{Authenticator, Remote, Session, XrpcAuthenticator};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// An authenticated API handle plus the session it was created with.
pub struct Client {
    session: Session,
    api: Arc<dyn Remote>,
}

impl Client {
    pub fn new(session: Session, api: Arc<dyn Remote>) -> Self {
        Self { session, api }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &dyn Remote {
        self.api.as_ref()
    }
}

/// Process-lifetime cache of authenticated clients, keyed by connection name.
///
/// Build one at startup and share it. Entries are created on first use and
/// never evicted or refreshed; an expired token stays cached until exit.
///
/// All lookups and the create path run under one async mutex, held across the
/// session-creation call. Concurrent callers for a name that is not cached yet
/// therefore create at most one session: the first caller logs in, the rest
/// wait on the lock and then read the published entry. Creating sessions for
/// different names is serialized as well.
pub struct SessionManager {
    authenticator: Arc<dyn Authenticator>,
    clients: Mutex<HashMap<String, Arc<Client>>>,
}

impl SessionManager {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached client for `connection_name`, logging in with
    /// `config` if there is none yet. `config` is ignored on a cache hit.
    pub async fn connect(
        &self,
        connection_name: &str,
        config: &ConnectionConfig,
    ) -> Result<Arc<Client>> {
        let mut clients = self.clients.lock().await;

        if let Some(client) = clients.get(connection_name) {
            return Ok(Arc::clone(client));
        }

        let creds = config.credentials().inspect_err(|e| {
            error!(connection = connection_name, error = %e, "connect: invalid config");
        })?;

        debug!(
            connection = connection_name,
            handle = %creds.handle,
            host = %creds.pds_host,
            "connect: creating session"
        );

        let (session, api) = self
            .authenticator
            .create_session(&creds.pds_host, &creds.handle, &creds.app_password)
            .await
            .map_err(|e| {
                error!(
                    connection = connection_name,
                    handle = %creds.handle,
                    error = %e,
                    "connect: authentication failed"
                );
                Error::Auth {
                    handle: creds.handle.clone(),
                    message: e.to_string(),
                }
            })?;

        info!(
            connection = connection_name,
            did = %session.did,
            handle = %session.handle,
            "connect: session created"
        );

        let client = Arc::new(Client::new(session, api));
        clients.insert(connection_name.to_string(), Arc::clone(&client));
        Ok(client)
    }

    /// Cached client for `connection_name`, without logging in.
    pub async fn cached(&self, connection_name: &str) -> Option<Arc<Client>> {
        self.clients.lock().await.get(connection_name).cloned()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Arc::new(XrpcAuthenticator))
    }
}
