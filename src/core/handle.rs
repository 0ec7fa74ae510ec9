//! Lock-free read handle over one configuration.

use crate::core::AttrView;
use crate::core::document::lookup_path;
use crate::error::{ConfigError, Result};
use arc_swap::ArcSwap;
use serde_json::Value;
use std::sync::Arc;

/// A cloneable, lock-free reader over one configuration's effective
/// document.
///
/// The handle shares the publication cell of its configuration: a reload
/// atomically replaces the document readers see, so a read observes either
/// the pre-reload or the fully post-reload state, never a partially-merged
/// intermediate. Reads never touch the registry lock.
///
/// # Examples
///
/// ```rust,no_run
/// use layerconf::prelude::*;
///
/// # fn example() -> layerconf::error::Result<()> {
/// let registry = ConfigRegistry::new();
/// registry.load("config", "car.json", LoadOptions::default())?;
///
/// let handle = registry.handle(None)?;
/// let max_speed = handle.value("drive.max_speed")?;
/// # Ok(())
/// # }
/// ```
pub struct ConfigHandle {
    name: String,
    shared: Arc<ArcSwap<Value>>,
}

impl ConfigHandle {
    pub(crate) fn new(name: String, shared: Arc<ArcSwap<Value>>) -> Self {
        Self { name, shared }
    }

    /// Canonical name of the configuration this handle reads.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current effective document.
    ///
    /// This is a lock-free pointer load; the returned `Arc` stays valid
    /// even if the configuration reloads or is removed afterwards.
    pub fn document(&self) -> Arc<Value> {
        self.shared.load_full()
    }

    /// Look up one dotted key path in the current effective document.
    pub fn value(&self, key: &str) -> Result<Value> {
        let document = self.shared.load();
        lookup_path(&document, key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound {
                config: self.name.clone(),
                key: key.to_string(),
            })
    }

    /// Attribute-style snapshot of the current effective document.
    pub fn attr(&self) -> AttrView {
        AttrView::snapshot(&self.shared.load())
    }
}

impl Clone for ConfigHandle {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}
