//! Core configuration management types.

pub(crate) mod document;
mod handle;
mod registry;
pub(crate) mod state;
mod validation;
mod view;

pub use document::Document;
pub use handle::ConfigHandle;
pub use registry::{
    ConfigRegistry, DEFAULT_CONFIG, DEFAULT_RELOAD_INTERVAL, Fetched, FileSet, GetOptions,
    LoadOptions, SearchPath,
};
pub use view::AttrView;
