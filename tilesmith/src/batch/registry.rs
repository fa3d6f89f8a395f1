//! Lazy registration of dataset configurations with the remote service.

use super::remote::RemoteCompute;
use crate::coalesce::RequestCoalescer;
use crate::error::{TileError, TileResult};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Known dataset configurations and which of them the remote service has seen.
///
/// A configuration is sent the first time a request references its
/// dataset; concurrent first references share a single registration call.
pub struct DatasetRegistry {
    configs: RwLock<HashMap<String, Arc<str>>>,
    registered: Mutex<HashSet<String>>,
    pending: RequestCoalescer<()>,
}

impl DatasetRegistry {
    pub fn new() -> Self {
        Self {
            configs: RwLock::new(HashMap::new()),
            registered: Mutex::new(HashSet::new()),
            pending: RequestCoalescer::new(),
        }
    }

    /// Reads the dataset name from a JSON configuration's `name` field.
    pub fn dataset_name(config: &str) -> TileResult<String> {
        let value: Value = serde_json::from_str(config)?;
        match value.get("name") {
            Some(Value::String(name)) if !name.is_empty() => Ok(name.clone()),
            _ => Err(TileError::config("dataset configuration has no `name`")),
        }
    }

    /// Adds a dataset configuration and returns its name.
    ///
    /// Replacing an existing configuration causes it to be sent again on
    /// next use.
    pub fn add(&self, config: impl Into<String>) -> TileResult<String> {
        let config = config.into();
        let name = Self::dataset_name(&config)?;
        let replaced = self
            .configs
            .write()
            .insert(name.clone(), Arc::from(config))
            .is_some();
        if replaced {
            self.registered.lock().remove(&name);
        }
        debug!(dataset = %name, replaced, "Added dataset configuration");
        Ok(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.configs.read().contains_key(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.registered.lock().contains(name)
    }

    /// Sends the named dataset's configuration unless that already happened.
    ///
    /// The remote call is bounded by `timeout`. A registration that finishes
    /// after the configuration was replaced does not mark the dataset as
    /// registered, so the new configuration is sent on next use.
    pub async fn ensure_registered<C: RemoteCompute>(
        &self,
        remote: &Arc<C>,
        name: &str,
        timeout: Duration,
    ) -> TileResult<()> {
        if self.is_registered(name) {
            return Ok(());
        }
        let config = self
            .configs
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TileError::config(format!("unknown dataset `{}`", name)))?;

        // one flight per configuration, so a replacement never joins a stale call
        let key = format!("{}@{:p}", name, Arc::as_ptr(&config));
        let remote = Arc::clone(remote);
        let sent = Arc::clone(&config);
        let result = self
            .pending
            .get_or_compute(&key, move || async move {
                tokio::time::timeout(timeout, remote.register_dataset(&sent))
                    .await
                    .unwrap_or(Err(TileError::Timeout(timeout)))
            })
            .await;

        match result {
            Ok(()) => {
                let configs = self.configs.read();
                let current = configs.get(name).is_some_and(|c| Arc::ptr_eq(c, &config));
                if !current {
                    debug!(dataset = %name, "Configuration replaced during registration");
                } else if self.registered.lock().insert(name.to_string()) {
                    info!(dataset = %name, "Registered dataset with remote compute");
                }
                Ok(())
            }
            Err(err) => {
                warn!(dataset = %name, error = %err, "Dataset registration failed");
                Err(err)
            }
        }
    }
}

impl Default for DatasetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
