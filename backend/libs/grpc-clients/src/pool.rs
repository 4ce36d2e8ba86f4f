/// Connection Pool Management
///
/// One pool per service kind, keyed by endpoint address. The first caller for
/// an endpoint dials; everyone else, concurrent or later, receives a clone of
/// the same client handle.
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::config::ChannelSettings;
use crate::trace::TracedChannel;
use crate::PoolError;

/// A client handle that can be built from a pooled channel
///
/// Implementations must be cheap to clone; clones share the underlying
/// connection.
pub trait PooledClient: Clone + Send + Sync + 'static {
    fn from_channel(channel: TracedChannel, settings: &ChannelSettings) -> Self;
}

/// Endpoint → client cache for a single service kind
pub struct ConnectionPool<C> {
    kind: &'static str,
    settings: Arc<ChannelSettings>,
    entries: Mutex<HashMap<String, Arc<OnceCell<C>>>>,
}

impl<C: PooledClient> ConnectionPool<C> {
    pub fn new(kind: &'static str, settings: Arc<ChannelSettings>) -> Self {
        Self {
            kind,
            settings,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the client for `endpoint`, dialing on first use
    ///
    /// A failed dial leaves nothing behind; the next call dials again.
    pub async fn get(&self, endpoint: &str) -> Result<C, PoolError> {
        let cell = {
            let mut entries = self.entries.lock();
            entries.entry(endpoint.to_string()).or_default().clone()
        };

        match cell.get_or_try_init(|| self.dial(endpoint)).await {
            Ok(client) => Ok(client.clone()),
            Err(e) => {
                self.forget(endpoint, &cell);
                Err(e)
            }
        }
    }

    /// Drop the entry for `endpoint` if it is still `cell` and never filled
    fn forget(&self, endpoint: &str, cell: &Arc<OnceCell<C>>) {
        let mut entries = self.entries.lock();
        let stale = entries
            .get(endpoint)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized());
        if stale {
            entries.remove(endpoint);
        }
    }

    async fn dial(&self, endpoint: &str) -> Result<C, PoolError> {
        let channel = self.settings.connect(endpoint).await?;
        debug!(kind = self.kind, endpoint, lazy = self.settings.lazy, "client channel created");
        Ok(C::from_channel(TracedChannel::new(channel, self.kind), &self.settings))
    }

    /// Endpoints holding a live client
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

impl<C> std::fmt::Debug for ConnectionPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("kind", &self.kind)
            .field("endpoints", &self.entries.lock().len())
            .finish()
    }
}
