pub mod command;

pub use command::{CommandBackend, CreatedPaths};
