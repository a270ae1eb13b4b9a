pub mod file;

pub use file::{load_catalog, parse_catalog};
