//! Data-driven network layouts for the ductwork transit engine.
//!
//! Layouts and engine tuning are written as RON, JSON, or TOML files and
//! loaded into a ready-to-run [`TransitEngine`](ductwork_core::engine::TransitEngine).

pub mod loader;
pub mod schema;

pub use loader::{
    build_config, build_layout, load_config, load_layout, load_network, DataLoadError,
    LoadedLayout,
};
