pub mod concurrency;
pub mod retry;

pub use concurrency::AdaptiveConcurrency;
pub use retry::{exponential_from_config, LinearRetry};
