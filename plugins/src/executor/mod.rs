pub mod renderers;
pub mod strategies;

pub use renderers::{JsonlRenderer, TextRenderer};
pub use strategies::{exponential_from_config, AdaptiveConcurrency, LinearRetry};
