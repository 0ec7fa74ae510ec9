//! The configuration registry.

use crate::core::document::{Document, lookup_path, shallow_update};
use crate::core::handle::ConfigHandle;
use crate::core::state::ConfigState;
use crate::core::view::AttrView;
use crate::error::{ConfigError, Result};
use crate::sources::{EnvOverlay, JsonFileLoader};
use crate::watch;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Name of the configuration targeted by unqualified calls until
/// [`ConfigRegistry::set_active`] moves the pointer.
pub const DEFAULT_CONFIG: &str = "default";

/// Default polling interval for hot-reload watchers.
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(1);

/// One or more candidate base directories, searched in order.
#[derive(Debug, Clone)]
pub struct SearchPath(Vec<PathBuf>);

impl SearchPath {
    fn into_inner(self) -> Vec<PathBuf> {
        self.0
    }
}

impl From<&str> for SearchPath {
    fn from(dir: &str) -> Self {
        Self(vec![PathBuf::from(dir)])
    }
}

impl From<String> for SearchPath {
    fn from(dir: String) -> Self {
        Self(vec![PathBuf::from(dir)])
    }
}

impl From<&Path> for SearchPath {
    fn from(dir: &Path) -> Self {
        Self(vec![dir.to_path_buf()])
    }
}

impl From<PathBuf> for SearchPath {
    fn from(dir: PathBuf) -> Self {
        Self(vec![dir])
    }
}

impl From<Vec<PathBuf>> for SearchPath {
    fn from(dirs: Vec<PathBuf>) -> Self {
        Self(dirs)
    }
}

/// One or more filenames, merged in order (later files win).
#[derive(Debug, Clone)]
pub struct FileSet(Vec<PathBuf>);

impl FileSet {
    /// An empty file set, for calls that target an existing configuration.
    pub fn none() -> Self {
        Self(Vec::new())
    }

    fn into_inner(self) -> Vec<PathBuf> {
        self.0
    }
}

impl From<&str> for FileSet {
    fn from(file: &str) -> Self {
        Self(vec![PathBuf::from(file)])
    }
}

impl From<String> for FileSet {
    fn from(file: String) -> Self {
        Self(vec![PathBuf::from(file)])
    }
}

impl From<&Path> for FileSet {
    fn from(file: &Path) -> Self {
        Self(vec![file.to_path_buf()])
    }
}

impl From<PathBuf> for FileSet {
    fn from(file: PathBuf) -> Self {
        Self(vec![file])
    }
}

impl From<Vec<PathBuf>> for FileSet {
    fn from(files: Vec<PathBuf>) -> Self {
        Self(files)
    }
}

impl From<Vec<String>> for FileSet {
    fn from(files: Vec<String>) -> Self {
        Self(files.into_iter().map(PathBuf::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FileSet {
    fn from(files: [&str; N]) -> Self {
        Self(files.iter().map(PathBuf::from).collect())
    }
}

/// Options for [`ConfigRegistry::load`] and [`ConfigRegistry::register`].
///
/// `merge_into` is deliberately three-valued: unset means "just (re)load the
/// existing configuration", `true` folds the new files in as a standing
/// merge layer, `false` replaces the file set entirely.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub(crate) alias: Option<String>,
    pub(crate) merge_into: Option<bool>,
    pub(crate) watch: bool,
    pub(crate) reload_interval: Duration,
    pub(crate) schema: Option<Value>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            alias: None,
            merge_into: None,
            watch: false,
            reload_interval: DEFAULT_RELOAD_INTERVAL,
            schema: None,
        }
    }
}

impl LoadOptions {
    /// Target (or create) the configuration known under `alias`.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// When the target already exists: fold the new files in (`true`) or
    /// replace its file set (`false`).
    pub fn merge_into(mut self, merge: bool) -> Self {
        self.merge_into = Some(merge);
        self
    }

    /// Start a polling hot-reload watcher after loading.
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Polling interval for the watcher.
    pub fn reload_interval(mut self, interval: Duration) -> Self {
        self.reload_interval = interval;
        self
    }

    /// JSON schema the file-merged document must validate against.
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }
}

/// Options for [`ConfigRegistry::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub(crate) name: Option<String>,
    pub(crate) as_map: bool,
    pub(crate) as_attr: bool,
}

impl GetOptions {
    /// Read from the named (or aliased) configuration instead of the
    /// active one.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// With multiple keys, return a key-to-value map instead of a list.
    pub fn as_map(mut self, as_map: bool) -> Self {
        self.as_map = as_map;
        self
    }

    /// With zero keys, return an [`AttrView`] over the whole document.
    /// Combining this with explicit keys is a usage error.
    pub fn as_attr(mut self, as_attr: bool) -> Self {
        self.as_attr = as_attr;
        self
    }
}

/// Result shape of [`ConfigRegistry::get`], matching the requested options.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched {
    /// Zero keys: the whole effective document.
    Document(Arc<Value>),
    /// One key: its value.
    One(Value),
    /// Multiple keys: their values, in key order.
    Many(Vec<Value>),
    /// Multiple keys with `as_map`: key-to-value mapping.
    Map(Document),
    /// Zero keys with `as_attr`: an attribute-style snapshot.
    Attr(AttrView),
}

struct RegistryInner {
    configs: BTreeMap<String, ConfigState>,
    aliases: BTreeMap<String, String>,
    active: String,
    merge_counter: u64,
}

impl RegistryInner {
    /// Resolve a name through the alias map, falling back to the name
    /// itself. Aliases and canonical names share one lookup namespace.
    fn resolve(&self, name: &str) -> Option<String> {
        if let Some(canonical) = self.aliases.get(name) {
            if self.configs.contains_key(canonical) {
                return Some(canonical.clone());
            }
        }
        self.configs.contains_key(name).then(|| name.to_string())
    }

    fn alias_for(&self, canonical: &str) -> Option<&str> {
        self.aliases
            .iter()
            .find_map(|(alias, target)| (target == canonical).then_some(alias.as_str()))
    }
}

static GLOBAL: Mutex<Option<Arc<ConfigRegistry>>> = Mutex::new(None);

/// Registry of named configurations.
///
/// Owns the name-to-state map, a separate alias-to-name map, the active
/// configuration pointer used by unqualified calls, and the per-configuration
/// hot-reload watchers. All mutation (load, merge, remove, watcher-triggered
/// reload) is serialized under one registry lock; reads briefly acquire the
/// same lock to resolve the name, then work on an atomic snapshot of the
/// effective document. [`ConfigRegistry::handle`] returns a reader that skips
/// the lock entirely, accepting that a reload may interleave with its reads.
///
/// Construct one explicitly with [`ConfigRegistry::new`] and pass the handle
/// around, or use the process-wide instance via [`ConfigRegistry::global`].
///
/// # Examples
///
/// ```rust,no_run
/// use layerconf::prelude::*;
///
/// # fn example() -> layerconf::error::Result<()> {
/// let registry = ConfigRegistry::new();
/// registry.load(
///     "config",
///     ["default.json", "site.json"],
///     LoadOptions::default().watch(true),
/// )?;
///
/// let port = registry.value("server.port")?;
/// let view = registry.attr(None)?;
/// assert_eq!(view["server"]["port"].as_i64(), port.as_i64());
/// # Ok(())
/// # }
/// ```
pub struct ConfigRegistry {
    self_ref: Weak<ConfigRegistry>,
    inner: Mutex<RegistryInner>,
}

impl ConfigRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            inner: Mutex::new(RegistryInner {
                configs: BTreeMap::new(),
                aliases: BTreeMap::new(),
                active: DEFAULT_CONFIG.to_string(),
                merge_counter: 0,
            }),
        })
    }

    /// The process-wide registry, created on first access.
    ///
    /// Concurrent first-time callers all observe the same instance.
    pub fn global() -> Arc<ConfigRegistry> {
        GLOBAL.lock().get_or_insert_with(ConfigRegistry::new).clone()
    }

    /// Tear down the process-wide registry: stop every watcher, discard all
    /// state, and let the next [`global`](ConfigRegistry::global) call start
    /// fresh. Safe to call when nothing was ever loaded.
    pub fn reset_global() {
        let taken = GLOBAL.lock().take();
        if let Some(registry) = taken {
            registry.reset();
        }
    }

    /// Load (or reload) a configuration and return its effective document.
    ///
    /// The behavior forks on whether the target — `options.alias` if given,
    /// else the active configuration — already exists:
    ///
    /// - unknown: a new configuration is created and loaded. Its canonical
    ///   name is derived from the first filename's stem, with the alias
    ///   mapping to it.
    /// - known, `merge_into(true)`: the files are loaded as a separate
    ///   transient layer and folded into the existing configuration, and the
    ///   fold is recorded so future reloads of either side stay in sync.
    /// - known, `merge_into(false)`: the file set is replaced entirely and
    ///   the configuration reloaded.
    /// - known, `merge_into` unset: the existing configuration is simply
    ///   reloaded; the passed filenames are ignored.
    pub fn load(
        &self,
        base: impl Into<SearchPath>,
        files: impl Into<FileSet>,
        options: LoadOptions,
    ) -> Result<Arc<Value>> {
        let dirs = base.into().into_inner();
        let files = files.into().into_inner();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let requested = options
            .alias
            .clone()
            .unwrap_or_else(|| inner.active.clone());
        match inner.resolve(&requested) {
            Some(canonical) => match options.merge_into {
                Some(true) => self.merge_layer(inner, &canonical, dirs, files, &options),
                Some(false) => self.replace_sources(inner, &canonical, dirs, files, &options),
                None => {
                    let document = Self::reload_by_name(inner, &canonical)?;
                    if options.watch {
                        if let Some(state) = inner.configs.get_mut(&canonical) {
                            state.enable_watch(options.reload_interval);
                        }
                        self.start_watch(inner, &canonical)?;
                    }
                    Ok(document)
                }
            },
            None => self.create(inner, &requested, dirs, files, &options, false),
        }
    }

    /// Create a configuration without loading it; the first lookup triggers
    /// the lazy load. With `watch(true)` the load happens immediately so the
    /// watcher has a modification-time snapshot to compare against.
    pub fn register(
        &self,
        base: impl Into<SearchPath>,
        files: impl Into<FileSet>,
        options: LoadOptions,
    ) -> Result<()> {
        let dirs = base.into().into_inner();
        let files = files.into().into_inner();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let requested = options
            .alias
            .clone()
            .unwrap_or_else(|| inner.active.clone());
        if inner.resolve(&requested).is_some() {
            return Err(ConfigError::Usage(format!(
                "configuration `{requested}` already exists; call load to reload it"
            )));
        }
        self.create(inner, &requested, dirs, files, &options, true)
            .map(|_| ())
    }

    /// Re-run the full pipeline for one configuration (the active one when
    /// `name` is `None`) and return the recomputed effective document.
    pub fn reload(&self, name: Option<&str>) -> Result<Arc<Value>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let requested = name
            .map(str::to_string)
            .unwrap_or_else(|| inner.active.clone());
        let canonical = inner
            .resolve(&requested)
            .ok_or_else(|| ConfigError::UnknownConfiguration(requested.clone()))?;
        Self::reload_by_name(inner, &canonical)
    }

    /// General read operation; see [`GetOptions`] for the shape switches.
    ///
    /// Keys are dotted paths, each looked up independently. An absent key at
    /// any nesting level is [`ConfigError::KeyNotFound`]. Combining `as_attr`
    /// with explicit keys is rejected before any lookup happens.
    pub fn get(&self, keys: &[&str], options: GetOptions) -> Result<Fetched> {
        if options.as_attr && !keys.is_empty() {
            return Err(ConfigError::Usage(
                "as_attr cannot be combined with explicit keys".to_string(),
            ));
        }
        let (canonical, document) = self.effective_document(options.name.as_deref())?;
        match keys {
            [] if options.as_attr => Ok(Fetched::Attr(AttrView::snapshot(&document))),
            [] => Ok(Fetched::Document(document)),
            [key] => lookup_path(&document, key)
                .cloned()
                .map(Fetched::One)
                .ok_or_else(|| ConfigError::KeyNotFound {
                    config: canonical,
                    key: (*key).to_string(),
                }),
            keys if options.as_map => {
                let mut map = Document::new();
                for key in keys {
                    let value = lookup_path(&document, key).cloned().ok_or_else(|| {
                        ConfigError::KeyNotFound {
                            config: canonical.clone(),
                            key: (*key).to_string(),
                        }
                    })?;
                    map.insert((*key).to_string(), value);
                }
                Ok(Fetched::Map(map))
            }
            keys => {
                let mut values = Vec::with_capacity(keys.len());
                for key in keys {
                    let value = lookup_path(&document, key).cloned().ok_or_else(|| {
                        ConfigError::KeyNotFound {
                            config: canonical.clone(),
                            key: (*key).to_string(),
                        }
                    })?;
                    values.push(value);
                }
                Ok(Fetched::Many(values))
            }
        }
    }

    /// One dotted key from the active configuration.
    pub fn value(&self, key: &str) -> Result<Value> {
        self.value_in(None, key)
    }

    /// One dotted key from a named configuration.
    pub fn value_in(&self, name: Option<&str>, key: &str) -> Result<Value> {
        let (canonical, document) = self.effective_document(name)?;
        lookup_path(&document, key)
            .cloned()
            .ok_or_else(|| ConfigError::KeyNotFound {
                config: canonical,
                key: key.to_string(),
            })
    }

    /// The whole effective document of a configuration.
    pub fn document(&self, name: Option<&str>) -> Result<Arc<Value>> {
        Ok(self.effective_document(name)?.1)
    }

    /// An attribute-style snapshot of a configuration.
    pub fn attr(&self, name: Option<&str>) -> Result<AttrView> {
        Ok(AttrView::snapshot(&self.effective_document(name)?.1))
    }

    /// A lock-free read handle over a configuration's effective document.
    pub fn handle(&self, name: Option<&str>) -> Result<ConfigHandle> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let requested = name
            .map(str::to_string)
            .unwrap_or_else(|| inner.active.clone());
        let canonical = inner
            .resolve(&requested)
            .ok_or_else(|| ConfigError::UnknownConfiguration(requested.clone()))?;
        Self::ensure_loaded(inner, &canonical)?;
        let state = inner
            .configs
            .get(&canonical)
            .ok_or_else(|| ConfigError::UnknownConfiguration(canonical.clone()))?;
        Ok(ConfigHandle::new(canonical.clone(), state.share()))
    }

    /// Fold `source`'s effective document into `target`'s, top-level keys
    /// from `source` winning, and record the dependency so future reloads of
    /// either side re-propagate.
    pub fn merge_configs(&self, target: &str, source: &str) -> Result<Arc<Value>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let target_name = inner
            .resolve(target)
            .ok_or_else(|| ConfigError::UnknownConfiguration(target.to_string()))?;
        let source_name = inner
            .resolve(source)
            .ok_or_else(|| ConfigError::UnknownConfiguration(source.to_string()))?;
        if target_name == source_name {
            return Err(ConfigError::Usage(format!(
                "cannot merge configuration `{target_name}` into itself"
            )));
        }
        Self::ensure_loaded(inner, &source_name)?;
        Self::ensure_loaded(inner, &target_name)?;
        if let Some(state) = inner.configs.get_mut(&target_name) {
            state.add_merge_source(source_name.clone());
        }
        Self::recompose(inner, &target_name)
    }

    /// Remove a configuration: stop its watcher, delete its state and any
    /// transient merge layers it owns, drop aliases pointing at it, prune it
    /// from every other configuration's merge dependencies (re-propagating
    /// their effective documents), and reset the active pointer if it
    /// targeted the removed configuration.
    pub fn remove(&self, name: &str) -> Result<()> {
        let mut stopped = Vec::new();
        {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let canonical = inner
                .resolve(name)
                .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
            let mut state = inner
                .configs
                .remove(&canonical)
                .ok_or_else(|| ConfigError::UnknownConfiguration(canonical.clone()))?;
            if let Some(watcher) = state.take_watcher() {
                stopped.push(watcher);
            }

            let owned: Vec<String> = inner
                .configs
                .iter()
                .filter(|(_, other)| other.owner() == Some(canonical.as_str()))
                .map(|(layer, _)| layer.clone())
                .collect();
            for layer in &owned {
                if let Some(mut layer_state) = inner.configs.remove(layer) {
                    if let Some(watcher) = layer_state.take_watcher() {
                        stopped.push(watcher);
                    }
                }
            }

            inner
                .aliases
                .retain(|_, target| target != &canonical && !owned.contains(target));

            let mut affected = Vec::new();
            for (other_name, other) in inner.configs.iter_mut() {
                let mut pruned = other.prune_merge_source(&canonical);
                for layer in &owned {
                    pruned |= other.prune_merge_source(layer);
                }
                if pruned {
                    affected.push(other_name.clone());
                }
            }
            for other in affected {
                let _ = Self::recompose(inner, &other);
            }

            if inner.active == canonical {
                inner.active = DEFAULT_CONFIG.to_string();
            }
            tracing::info!(config = %canonical, "configuration removed");
        }
        // Join outside the lock: a watcher blocked on the lock mid-tick must
        // be able to finish before it can observe the stop signal.
        for mut watcher in stopped {
            watcher.stop();
        }
        Ok(())
    }

    /// Canonical names of all non-internal configurations, or their alias
    /// names with `as_alias`.
    pub fn get_configs(&self, as_alias: bool) -> Vec<String> {
        let guard = self.inner.lock();
        guard
            .configs
            .iter()
            .filter(|(_, state)| !state.is_internal())
            .map(|(name, _)| {
                if as_alias {
                    guard.alias_for(name).unwrap_or(name).to_string()
                } else {
                    name.clone()
                }
            })
            .collect()
    }

    /// Point unqualified calls at a different configuration.
    pub fn set_active(&self, name: &str) -> Result<()> {
        let mut guard = self.inner.lock();
        let canonical = guard
            .resolve(name)
            .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
        guard.active = canonical;
        Ok(())
    }

    /// Name of the configuration unqualified calls target.
    pub fn active(&self) -> String {
        self.inner.lock().active.clone()
    }

    /// Stop a configuration's watcher, blocking until its thread has
    /// exited. Idempotent: stopping a never-started or already-stopped
    /// watcher is a no-op.
    pub fn stop_watch(&self, name: Option<&str>) -> Result<()> {
        let watcher = {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let requested = name
                .map(str::to_string)
                .unwrap_or_else(|| inner.active.clone());
            let canonical = inner
                .resolve(&requested)
                .ok_or_else(|| ConfigError::UnknownConfiguration(requested.clone()))?;
            inner
                .configs
                .get_mut(&canonical)
                .and_then(ConfigState::take_watcher)
        };
        if let Some(mut watcher) = watcher {
            watcher.stop();
        }
        Ok(())
    }

    /// Whether a configuration currently has an active watcher.
    pub fn is_watching(&self, name: &str) -> bool {
        let guard = self.inner.lock();
        guard
            .resolve(name)
            .and_then(|canonical| guard.configs.get(&canonical))
            .is_some_and(|state| state.watcher().is_some())
    }

    /// Stop every watcher and discard all registry state. Safe to call even
    /// when nothing was ever loaded.
    pub fn reset(&self) {
        let mut stopped = Vec::new();
        {
            let mut guard = self.inner.lock();
            for state in guard.configs.values_mut() {
                if let Some(watcher) = state.take_watcher() {
                    stopped.push(watcher);
                }
            }
            guard.configs.clear();
            guard.aliases.clear();
            guard.active = DEFAULT_CONFIG.to_string();
            guard.merge_counter = 0;
        }
        for mut watcher in stopped {
            watcher.stop();
        }
        tracing::info!("registry reset");
    }

    /// One watcher poll: reload the configuration if any source file's
    /// modification time moved. Returns `false` when the configuration no
    /// longer exists so the watcher thread can exit.
    pub(crate) fn watcher_tick(&self, name: &str) -> bool {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(state) = inner.configs.get(name) else {
            return false;
        };
        if !state.files_changed() {
            return true;
        }
        tracing::info!(config = name, "source change detected, reloading");
        if let Err(err) = Self::reload_by_name(inner, name) {
            tracing::warn!(
                config = name,
                error = %err,
                "reload failed; keeping previous configuration"
            );
        }
        true
    }

    fn create(
        &self,
        inner: &mut RegistryInner,
        requested: &str,
        dirs: Vec<PathBuf>,
        files: Vec<PathBuf>,
        options: &LoadOptions,
        defer: bool,
    ) -> Result<Arc<Value>> {
        if files.is_empty() {
            return Err(ConfigError::FileNotSpecified);
        }
        let canonical = Self::canonical_name(inner, requested, options, &files);
        let loader = JsonFileLoader::new(dirs, files);
        let mut state = ConfigState::new(
            canonical.clone(),
            loader,
            options.schema.clone(),
            options.watch,
            options.reload_interval,
        );
        let document = if defer && !options.watch {
            state.effective()
        } else {
            state.load_base()?;
            Self::compose_effective(inner, &mut state)
        };
        inner.configs.insert(canonical.clone(), state);
        if options.alias.is_some() && requested != canonical {
            inner.aliases.insert(requested.to_string(), canonical.clone());
        }
        self.start_watch(inner, &canonical)?;
        Ok(document)
    }

    /// Canonical name for a new configuration: the first filename's stem
    /// when loading under an alias (`camera.json` -> `camera`), unless that
    /// name is already taken; the requested name otherwise.
    fn canonical_name(
        inner: &RegistryInner,
        requested: &str,
        options: &LoadOptions,
        files: &[PathBuf],
    ) -> String {
        if options.alias.is_none() {
            return requested.to_string();
        }
        let stem = files
            .first()
            .and_then(|file| file.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned());
        match stem {
            Some(stem)
                if stem == requested
                    || (!inner.configs.contains_key(&stem)
                        && !inner.aliases.contains_key(&stem)) =>
            {
                stem
            }
            _ => requested.to_string(),
        }
    }

    fn merge_layer(
        &self,
        inner: &mut RegistryInner,
        target: &str,
        dirs: Vec<PathBuf>,
        files: Vec<PathBuf>,
        options: &LoadOptions,
    ) -> Result<Arc<Value>> {
        if files.is_empty() {
            return Err(ConfigError::FileNotSpecified);
        }
        inner.merge_counter += 1;
        let layer_name = format!("{target}#{}", inner.merge_counter);
        let loader = JsonFileLoader::new(dirs, files);
        let mut layer = ConfigState::new(
            layer_name.clone(),
            loader,
            options.schema.clone(),
            options.watch,
            options.reload_interval,
        )
        .owned_by(target.to_string());
        layer.load_base()?;
        Self::compose_effective(inner, &mut layer);
        inner.configs.insert(layer_name.clone(), layer);
        self.start_watch(inner, &layer_name)?;

        if let Some(state) = inner.configs.get_mut(target) {
            state.add_merge_source(layer_name);
        }
        Self::ensure_loaded(inner, target)?;
        Self::recompose(inner, target)
    }

    fn replace_sources(
        &self,
        inner: &mut RegistryInner,
        name: &str,
        dirs: Vec<PathBuf>,
        files: Vec<PathBuf>,
        options: &LoadOptions,
    ) -> Result<Arc<Value>> {
        if files.is_empty() {
            return Err(ConfigError::FileNotSpecified);
        }
        {
            let state = inner
                .configs
                .get_mut(name)
                .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
            state.replace_sources(JsonFileLoader::new(dirs, files));
            if options.schema.is_some() {
                state.set_schema(options.schema.clone());
            }
            if options.watch {
                state.enable_watch(options.reload_interval);
            }
        }
        let document = Self::reload_by_name(inner, name)?;
        self.start_watch(inner, name)?;
        Ok(document)
    }

    /// Full pipeline for one configuration: file load + merge + schema
    /// check, then merge-dependency folding and the environment overlay.
    /// On failure the previous state stays in place and dependents are not
    /// touched.
    fn reload_by_name(inner: &mut RegistryInner, name: &str) -> Result<Arc<Value>> {
        let mut state = inner
            .configs
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
        match state.load_base() {
            Ok(()) => {
                let document = Self::compose_effective(inner, &mut state);
                inner.configs.insert(name.to_string(), state);
                Self::refresh_dependents(inner, name);
                Ok(document)
            }
            Err(err) => {
                inner.configs.insert(name.to_string(), state);
                Err(err)
            }
        }
    }

    /// Recompute one configuration's effective document from its cached
    /// base (no file I/O) and re-propagate to dependents.
    fn recompose(inner: &mut RegistryInner, name: &str) -> Result<Arc<Value>> {
        let mut state = inner
            .configs
            .remove(name)
            .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
        let document = Self::compose_effective(inner, &mut state);
        inner.configs.insert(name.to_string(), state);
        Self::refresh_dependents(inner, name);
        Ok(document)
    }

    /// base document -> merge-dependency folds (top-level, later wins) ->
    /// environment overlay (deep). The asymmetry is deliberate.
    fn compose_effective(inner: &RegistryInner, state: &mut ConfigState) -> Arc<Value> {
        let mut document = state.base().clone();
        for source in state.merge_sources() {
            if let Some(source_state) = inner.configs.get(source) {
                if let Value::Object(map) = &*source_state.effective() {
                    shallow_update(&mut document, map);
                }
            }
        }
        EnvOverlay::from_env().apply(&mut document);
        state.store_effective(document)
    }

    /// Recompose every configuration that records `root` as a merge source,
    /// transitively.
    fn refresh_dependents(inner: &mut RegistryInner, root: &str) {
        let mut visited: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = Self::dependents_of(inner, root).into();
        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            if let Some(mut state) = inner.configs.remove(&name) {
                if state.loaded() {
                    Self::compose_effective(inner, &mut state);
                }
                inner.configs.insert(name.clone(), state);
            }
            for dependent in Self::dependents_of(inner, &name) {
                if !visited.contains(&dependent) {
                    queue.push_back(dependent);
                }
            }
        }
    }

    fn dependents_of(inner: &RegistryInner, source: &str) -> Vec<String> {
        inner
            .configs
            .iter()
            .filter(|(_, state)| state.merge_sources().iter().any(|s| s == source))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn ensure_loaded(inner: &mut RegistryInner, name: &str) -> Result<()> {
        let loaded = inner
            .configs
            .get(name)
            .map(ConfigState::loaded)
            .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
        if !loaded {
            tracing::debug!(config = name, "lazy-loading configuration on first access");
            Self::reload_by_name(inner, name)?;
        }
        Ok(())
    }

    fn effective_document(&self, name: Option<&str>) -> Result<(String, Arc<Value>)> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let requested = name
            .map(str::to_string)
            .unwrap_or_else(|| inner.active.clone());
        let canonical = inner
            .resolve(&requested)
            .ok_or_else(|| ConfigError::UnknownConfiguration(requested.clone()))?;
        Self::ensure_loaded(inner, &canonical)?;
        let document = inner
            .configs
            .get(&canonical)
            .ok_or_else(|| ConfigError::UnknownConfiguration(canonical.clone()))?
            .effective();
        Ok((canonical, document))
    }

    /// Start the watcher for `name` if it wants one and has none yet.
    fn start_watch(&self, inner: &mut RegistryInner, name: &str) -> Result<()> {
        let state = inner
            .configs
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownConfiguration(name.to_string()))?;
        if !state.watch_enabled() || state.watcher().is_some() {
            return Ok(());
        }
        let handle = watch::spawn(
            self.self_ref.clone(),
            name.to_string(),
            state.watch_interval(),
        )
        .map_err(|err| ConfigError::Watch(format!("failed to spawn watcher for `{name}`: {err}")))?;
        state.set_watcher(handle);
        Ok(())
    }
}
