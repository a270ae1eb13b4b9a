mod load;
mod types;

pub use load::{apply_env_overrides, get_rigup_data_dir, load_default, load_from_path, snapshot_dir};
pub use types::{
    AppConfig, ConcurrencyConfig, ExecutorConfig, LoggingConfig, RetryConfig, SnapshotConfig,
};
