//! Per-configuration lifecycle state.

use crate::core::document::{Document, shallow_update};
use crate::core::validation::validate_document;
use crate::error::{ConfigError, Result};
use crate::sources::JsonFileLoader;
use crate::watch::WatcherHandle;
use arc_swap::ArcSwap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// One named configuration: its source files, schema, cached documents,
/// modification-time snapshot, merge dependencies, and watcher handle.
///
/// The *base* document is the result of file loading and file-level merge.
/// The *effective* document layers merge-dependency documents and the
/// environment overlay on top; it is recomputed by the registry pipeline
/// and never mutated directly. The effective document is published through
/// an `ArcSwap` cell shared with [`ConfigHandle`](crate::core::ConfigHandle)
/// readers, so a reload atomically replaces what readers see.
pub(crate) struct ConfigState {
    name: String,
    loader: JsonFileLoader,
    schema: Option<Value>,
    base: Document,
    effective: Arc<ArcSwap<Value>>,
    mtimes: BTreeMap<PathBuf, SystemTime>,
    merge_sources: Vec<String>,
    watch_enabled: bool,
    watch_interval: Duration,
    watcher: Option<WatcherHandle>,
    loaded: bool,
    /// Set on transient merge layers: the configuration that owns them.
    owner: Option<String>,
}

impl ConfigState {
    pub(crate) fn new(
        name: String,
        loader: JsonFileLoader,
        schema: Option<Value>,
        watch_enabled: bool,
        watch_interval: Duration,
    ) -> Self {
        Self {
            name,
            loader,
            schema,
            base: Document::new(),
            effective: Arc::new(ArcSwap::from_pointee(Value::Object(Document::new()))),
            mtimes: BTreeMap::new(),
            merge_sources: Vec::new(),
            watch_enabled,
            watch_interval,
            watcher: None,
            loaded: false,
            owner: None,
        }
    }

    pub(crate) fn owned_by(mut self, owner: String) -> Self {
        self.owner = Some(owner);
        self
    }

    pub(crate) fn loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    pub(crate) fn is_internal(&self) -> bool {
        self.owner.is_some()
    }

    pub(crate) fn base(&self) -> &Document {
        &self.base
    }

    pub(crate) fn merge_sources(&self) -> &[String] {
        &self.merge_sources
    }

    pub(crate) fn add_merge_source(&mut self, source: String) {
        if !self.merge_sources.contains(&source) {
            self.merge_sources.push(source);
        }
    }

    pub(crate) fn prune_merge_source(&mut self, source: &str) -> bool {
        let before = self.merge_sources.len();
        self.merge_sources.retain(|name| name != source);
        self.merge_sources.len() != before
    }

    pub(crate) fn set_schema(&mut self, schema: Option<Value>) {
        self.schema = schema;
    }

    /// Replace the file set entirely; the cached documents stay in place
    /// until the next successful load.
    pub(crate) fn replace_sources(&mut self, loader: JsonFileLoader) {
        self.loader = loader;
    }

    pub(crate) fn watch_enabled(&self) -> bool {
        self.watch_enabled
    }

    pub(crate) fn enable_watch(&mut self, interval: Duration) {
        self.watch_enabled = true;
        self.watch_interval = interval;
    }

    pub(crate) fn watch_interval(&self) -> Duration {
        self.watch_interval
    }

    pub(crate) fn watcher(&self) -> Option<&WatcherHandle> {
        self.watcher.as_ref()
    }

    pub(crate) fn set_watcher(&mut self, handle: WatcherHandle) {
        self.watcher = Some(handle);
    }

    pub(crate) fn take_watcher(&mut self) -> Option<WatcherHandle> {
        self.watcher.take()
    }

    /// Load and merge the source files, then validate against the schema.
    ///
    /// Later files win top-level key conflicts. Nothing is committed unless
    /// every step succeeds, so a failed reload leaves the previous base and
    /// effective documents in place (stale but valid).
    pub(crate) fn load_base(&mut self) -> Result<()> {
        let documents = self.loader.load_all()?;

        let mut merged = Document::new();
        for (_, document) in &documents {
            shallow_update(&mut merged, document);
        }

        if let Some(schema) = &self.schema {
            validate_document(&merged, schema)?;
        }

        let mut mtimes = BTreeMap::new();
        for (path, _) in &documents {
            mtimes.insert(path.clone(), file_mtime(path));
        }

        self.base = merged;
        self.mtimes = mtimes;
        self.loaded = true;
        tracing::info!(config = %self.name, files = documents.len(), "configuration loaded");
        Ok(())
    }

    /// Publish a freshly composed effective document.
    pub(crate) fn store_effective(&mut self, document: Document) -> Arc<Value> {
        let published = Arc::new(Value::Object(document));
        self.effective.store(Arc::clone(&published));
        published
    }

    /// The current effective document.
    pub(crate) fn effective(&self) -> Arc<Value> {
        self.effective.load_full()
    }

    /// The publication cell, for lock-free reader handles.
    pub(crate) fn share(&self) -> Arc<ArcSwap<Value>> {
        Arc::clone(&self.effective)
    }

    /// Whether any source file's modification time differs from the
    /// snapshot taken at the last successful load.
    pub(crate) fn files_changed(&self) -> bool {
        self.current_mtimes() != self.mtimes
    }

    fn current_mtimes(&self) -> BTreeMap<PathBuf, SystemTime> {
        let mut mtimes = BTreeMap::new();
        for filename in self.loader.filenames() {
            match self.loader.resolve(filename) {
                Ok(path) => {
                    let modified = file_mtime(&path);
                    mtimes.insert(path, modified);
                }
                Err(ConfigError::FileNotFound { path }) => {
                    mtimes.insert(path, SystemTime::UNIX_EPOCH);
                }
                Err(_) => {}
            }
        }
        mtimes
    }
}

/// Modification time of a file, epoch when unreadable.
fn file_mtime(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}
