//! Host-side collaborators for `rigup-core`: the command install backend,
//! system probes, the TOML catalog loader, strategies and renderers.

pub mod backend;
pub mod catalog;
pub mod executor;
pub mod factory;
pub mod probe;
