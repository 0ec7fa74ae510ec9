//! # layerconf
//!
//! Layered JSON configuration registry with environment overlays, aliases,
//! and polling hot-reload.
//!
//! ## Overview
//!
//! `layerconf` manages named configuration sets for a whole process:
//! - Ordered file lists merged with later-file-wins precedence
//! - Optional JSON-schema validation of the merged document
//! - Environment variable overrides with type coercion
//!   (`CONFIG__DB__PORT=5432` sets `db.port` as an integer)
//! - Alias-based lookup and standing merge dependencies between
//!   configurations
//! - Per-configuration polling watchers that hot-reload on file change
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layerconf::prelude::*;
//!
//! # fn example() -> layerconf::error::Result<()> {
//! let registry = ConfigRegistry::new();
//!
//! // Load and watch: edits to the files show up without a manual reload.
//! registry.load(
//!     "config",
//!     ["default.json", "site.json"],
//!     LoadOptions::default().watch(true),
//! )?;
//!
//! // Dotted-key reads from the merged, overridden document.
//! let port = registry.value("server.port")?;
//!
//! // Or an attribute-style snapshot.
//! let view = registry.attr(None)?;
//! println!("host = {:?}", view["server"]["host"].as_str());
//! # Ok(())
//! # }
//! ```
//!
//! ## Precedence
//!
//! Within one configuration the pipeline is always: file merge (shallow,
//! later file wins top-level keys) → schema validation → merge-dependency
//! folding (shallow) → environment overlay (deep, sets single leaves).
//! The shallow/deep asymmetry is deliberate and load-bearing: a production
//! override file replaces a whole section, while an environment variable
//! tweaks one value without clobbering its siblings.
//!
//! ## Concurrency
//!
//! All mutation is serialized under one registry lock; reads resolve the
//! name under that lock, then work on an atomic snapshot. A
//! [`ConfigHandle`](core::ConfigHandle) skips the lock entirely for hot
//! read paths.

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod logging;
pub mod sources;

mod watch;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{
        AttrView, ConfigHandle, ConfigRegistry, Document, Fetched, FileSet, GetOptions,
        LoadOptions, SearchPath,
    };
    pub use crate::error::{ConfigError, Result};
}
