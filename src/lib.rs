//! Drydock - continuous build-and-publish pipeline
//!
//! Compiles a release binary through a cache-partitioned two-stage build,
//! assembles it into a minimal runtime image, publishes the image under a
//! deterministic tag scheme, and rotates the local build cache.

pub mod cache;
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod pipeline;
pub mod registry;
pub mod tag;
pub mod toolchain;
pub mod ui;

pub use error::{DrydockError, DrydockResult};
