pub mod cli;
pub mod install;
pub mod plan;
pub mod recover;
