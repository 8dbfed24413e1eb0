//! Track Metadata Sync Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod generation;
pub mod metadata;
pub mod server;
pub mod sync;
