//! Connector manager for registered provider connectors.

use crate::error::{OrchestratorError, OrchestratorResult};
use crucible_training::{Connector, ConnectorError, LOCAL_PROVIDER};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// Registry of provider connectors, keyed by connector id.
///
/// Connectors are validated at registration time; an unknown provider is a
/// synchronous error at the call site, never a silent no-op.
pub struct ConnectorManager {
    /// Registered connectors.
    connectors: Arc<RwLock<HashMap<String, Arc<dyn Connector>>>>,
}

impl ConnectorManager {
    /// Creates an empty connector manager.
    pub fn new() -> Self {
        Self { connectors: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Registers a connector.
    ///
    /// # Errors
    /// Returns an error if the connector id is blank, reserved, already
    /// registered, or if the lock is poisoned.
    pub fn register(&self, connector: Arc<dyn Connector>) -> OrchestratorResult<()> {
        let id = connector.id().to_string();
        if id.trim().is_empty() {
            return Err(OrchestratorError::Registry("connector id is blank".to_string()));
        }
        if id == LOCAL_PROVIDER {
            return Err(OrchestratorError::Registry(format!(
                "connector id '{LOCAL_PROVIDER}' is reserved for the local runtime"
            )));
        }

        let mut connectors = self
            .connectors
            .write()
            .map_err(|e| OrchestratorError::Registry(format!("Lock poisoned: {}", e)))?;

        if connectors.contains_key(&id) {
            return Err(OrchestratorError::Registry(format!(
                "connector already registered: {id}"
            )));
        }

        debug!(connector_id = %id, "Registered connector");
        connectors.insert(id, connector);
        Ok(())
    }

    /// Gets a connector by id.
    ///
    /// # Errors
    /// Returns `ConnectorNotFound` if no connector is registered under `id`.
    pub fn get(&self, id: &str) -> OrchestratorResult<Arc<dyn Connector>> {
        let connectors = self
            .connectors
            .read()
            .map_err(|e| OrchestratorError::Registry(format!("Lock poisoned: {}", e)))?;

        connectors
            .get(id)
            .cloned()
            .ok_or_else(|| OrchestratorError::ConnectorNotFound(id.to_string()))
    }

    /// Lists registered connector ids.
    pub fn list(&self) -> OrchestratorResult<Vec<String>> {
        let connectors = self
            .connectors
            .read()
            .map_err(|e| OrchestratorError::Registry(format!("Lock poisoned: {}", e)))?;

        let mut ids: Vec<String> = connectors.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Checks if a connector is registered.
    pub fn has(&self, id: &str) -> bool {
        self.connectors.read().map(|c| c.contains_key(id)).unwrap_or(false)
    }

    /// Removes a connector.
    pub fn unregister(&self, id: &str) -> OrchestratorResult<()> {
        let mut connectors = self
            .connectors
            .write()
            .map_err(|e| OrchestratorError::Registry(format!("Lock poisoned: {}", e)))?;

        connectors.remove(id);
        Ok(())
    }

    /// Gets the number of registered connectors.
    pub fn count(&self) -> usize {
        self.connectors.read().map(|c| c.len()).unwrap_or(0)
    }

    /// Probes a connector's liveness under an explicit deadline.
    ///
    /// Expiry is treated as failure, not success.
    ///
    /// # Errors
    /// Returns `ConnectorError::Timeout` if the probe exceeds `timeout`, or
    /// the connector's own error if the probe fails.
    pub async fn verify(&self, id: &str, timeout: Duration) -> OrchestratorResult<bool> {
        let connector = self.get(id)?;
        match tokio::time::timeout(timeout, connector.verify_connection()).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(OrchestratorError::Connector(ConnectorError::Timeout(format!(
                "verify_connection exceeded {}ms",
                timeout.as_millis()
            )))),
        }
    }
}

impl Default for ConnectorManager {
    fn default() -> Self {
        Self::new()
    }
}
