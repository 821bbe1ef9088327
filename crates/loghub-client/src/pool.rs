//! Client cache keyed by `(access_key_id, endpoint)`.
//!
//! Constructing a log store client is comparatively expensive (credential
//! signing state, connection setup), and the underlying handles are safe to
//! share, so one live handle per key pair is kept for the life of the pool.
//! There is no automatic expiry; entries leave the pool only through
//! [`ClientPool::remove`] or [`ClientPool::clear`].
//!
//! ## Keying
//!
//! The secret is deliberately NOT part of the key: it is consumed once, at
//! handle creation. Calling [`ClientPool::get_or_create`] again with the
//! same `(access_key_id, endpoint)` but a rotated secret returns the handle
//! built with the original secret. Rotate by calling `remove` first.
//!
//! ## Sharing
//!
//! Production code constructs one pool and hands the same `Arc<ClientPool>`
//! to every reader in the process; tests construct isolated pools and seed
//! them with [`ClientPool::insert`]. All map access goes through a single
//! mutex, so the pool is safe to use from any number of reader instances.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use loghub_core::Result;
use tracing::debug;

use crate::client::{Credentials, LogStoreClient};

/// Builds a concrete client handle for a credential/endpoint pair.
///
/// Injected at pool construction so the pool never knows transport details.
pub type ClientFactory =
    Arc<dyn Fn(&Credentials, &str) -> Result<Arc<dyn LogStoreClient>> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    access_key_id: String,
    endpoint: String,
}

/// Keyed cache of log store client handles.
pub struct ClientPool {
    factory: ClientFactory,
    clients: Mutex<HashMap<PoolKey, Arc<dyn LogStoreClient>>>,
}

impl ClientPool {
    /// Create an empty pool around a client factory.
    pub fn new(factory: ClientFactory) -> Self {
        Self {
            factory,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Return the live handle for `(credentials.access_key_id, endpoint)`,
    /// building and caching one through the factory on first use.
    ///
    /// Idempotent per key pair: every later call observes the same handle,
    /// regardless of the secret it carries (see the module doc).
    pub fn get_or_create(
        &self,
        credentials: &Credentials,
        endpoint: &str,
    ) -> Result<Arc<dyn LogStoreClient>> {
        let key = PoolKey {
            access_key_id: credentials.access_key_id.clone(),
            endpoint: endpoint.to_string(),
        };

        let mut clients = self.lock();
        if let Some(client) = clients.get(&key) {
            return Ok(Arc::clone(client));
        }

        let client = (self.factory)(credentials, endpoint)?;
        clients.insert(key, Arc::clone(&client));
        debug!(
            access_key_id = %credentials.access_key_id,
            endpoint = %endpoint,
            pool_size = clients.len(),
            "created log store client"
        );
        Ok(client)
    }

    /// Override the entry for a key pair with a pre-built handle.
    ///
    /// Test support; production handles come from the factory.
    pub fn insert(&self, access_key_id: &str, endpoint: &str, client: Arc<dyn LogStoreClient>) {
        let key = PoolKey {
            access_key_id: access_key_id.to_string(),
            endpoint: endpoint.to_string(),
        };
        self.lock().insert(key, client);
    }

    /// Evict the entry for a key pair. Returns whether one existed.
    pub fn remove(&self, access_key_id: &str, endpoint: &str) -> bool {
        let key = PoolKey {
            access_key_id: access_key_id.to_string(),
            endpoint: endpoint.to_string(),
        };
        let removed = self.lock().remove(&key).is_some();
        if removed {
            debug!(access_key_id, endpoint, "evicted log store client");
        }
        removed
    }

    /// Drop every cached handle.
    pub fn clear(&self) {
        self.lock().clear();
        debug!("cleared client pool");
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PoolKey, Arc<dyn LogStoreClient>>> {
        // A panic while holding the map lock leaves the map itself intact.
        self.clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("len", &self.len())
            .finish()
    }
}
