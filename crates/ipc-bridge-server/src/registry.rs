//! Connection registry: the broadcast set and feature map shared between the
//! Event Publisher and every Connection Handler.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use ipc_bridge_core::FeatureGuard;
use tokio::sync::{mpsc, Mutex};

/// Handle to a registered connection's outbound sink.
struct Registered {
    sender: mpsc::UnboundedSender<Vec<u8>>,
    features: FeatureGuard,
}

/// Active-connections table, guarded by a single mutex per the spec's
/// shared-resource rule (broadcast set and feature map share one lock).
///
/// The connection count is mirrored into an [`AtomicUsize`] so that the
/// `diagnostics` Sub-Handler, which runs synchronously on the Main-Thread
/// Dispatcher and cannot await the registry's async mutex, can still read it.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<u64, Registered>>,
    count: Arc<AtomicUsize>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { connections: Mutex::new(HashMap::new()), count: Arc::new(AtomicUsize::new(0)) }
    }

    /// A cheap, lock-free handle to the live connection count, suitable for
    /// main-thread-synchronous readers such as the `diagnostics` handler.
    #[must_use]
    pub fn connection_count_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.count)
    }

    /// Register a newly active connection's outbound sink and negotiated
    /// features.
    pub async fn register(&self, session_id: u64, sender: mpsc::UnboundedSender<Vec<u8>>, features: FeatureGuard) {
        let mut connections = self.connections.lock().await;
        connections.insert(session_id, Registered { sender, features });
        self.count.store(connections.len(), Ordering::Release);
    }

    /// Remove a connection. Idempotent.
    pub async fn unregister(&self, session_id: u64) {
        let mut connections = self.connections.lock().await;
        connections.remove(&session_id);
        self.count.store(connections.len(), Ordering::Release);
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Whether `tag` is enabled on `session_id`'s negotiated feature set.
    /// `false` if the connection is not registered.
    pub async fn is_feature_enabled(&self, session_id: u64, tag: &str) -> bool {
        self.connections.lock().await.get(&session_id).is_some_and(|c| c.features.is_enabled(tag))
    }

    /// Fan a pre-framed event out to every registered connection.
    ///
    /// A connection whose sender is closed (its handler has already torn
    /// down or the bounded buffer rejected the send) is dropped from the set;
    /// the Connection Handler remains the sole owner of its own close
    /// semantics, so this never closes a socket directly.
    pub async fn broadcast(&self, framed: Vec<u8>) {
        let mut connections = self.connections.lock().await;
        connections.retain(|_, registered| registered.sender.send(framed.clone()).is_ok());
        self.count.store(connections.len(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_unregister_clears_count() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(1, tx, FeatureGuard::new(["health.basic".to_string()])).await;
        assert_eq!(registry.connection_count().await, 1);
        registry.unregister(1).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        registry.unregister(42).await;
        registry.unregister(42).await;
        assert_eq!(registry.connection_count().await, 0);
    }

    #[tokio::test]
    async fn feature_check_reflects_registered_guard() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(1, tx, FeatureGuard::new(["diagnostics.basic".to_string()])).await;
        assert!(registry.is_feature_enabled(1, "diagnostics.basic").await);
        assert!(!registry.is_feature_enabled(1, "health.basic").await);
        assert!(!registry.is_feature_enabled(99, "diagnostics.basic").await);
    }

    #[tokio::test]
    async fn connection_count_handle_reflects_register_and_unregister() {
        let registry = ConnectionRegistry::new();
        let handle = registry.connection_count_handle();
        assert_eq!(handle.load(Ordering::Acquire), 0);
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(1, tx, FeatureGuard::new([])).await;
        assert_eq!(handle.load(Ordering::Acquire), 1);
        registry.unregister(1).await;
        assert_eq!(handle.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn broadcast_drops_connections_with_closed_receivers() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = mpsc::unbounded_channel();
        registry.register(1, tx, FeatureGuard::new([])).await;
        drop(rx);
        registry.broadcast(vec![1, 2, 3]).await;
        assert_eq!(registry.connection_count().await, 0);
    }
}
