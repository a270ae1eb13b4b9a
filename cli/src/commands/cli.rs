use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Jsonl,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Jsonl => "jsonl",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "rigup", version, about = "Install software components with dependency ordering and rollback")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of ~/.rigup/config.toml or ./rigup.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Plain ASCII status labels
    #[arg(long, global = true)]
    pub ascii: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    /// Components to install
    #[arg(required = true)]
    pub names: Vec<String>,

    /// TOML catalog of `[[component]]` tables
    #[arg(long)]
    pub catalog: PathBuf,

    /// Drop unknown dependencies with a warning instead of failing
    #[arg(long)]
    pub lenient: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct InstallArgs {
    #[command(flatten)]
    pub plan: PlanArgs,

    #[arg(long)]
    pub max_parallel: Option<usize>,

    /// Attempt ceiling per component, first attempt included
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Leave side effects of failed components in place
    #[arg(long)]
    pub no_rollback: bool,

    /// Write the JSON batch report to this file
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Disable progress bars in text mode
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RecoverArgs {
    /// Only list snapshots left behind by interrupted runs
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and print the install plan without touching the system
    Plan(PlanArgs),
    /// Resolve, plan and install
    Install(InstallArgs),
    /// Roll back snapshots left by a crashed or killed run
    Recover(RecoverArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_install_flags() {
        let args = Args::try_parse_from([
            "rigup",
            "install",
            "app",
            "tools",
            "--catalog",
            "catalog.toml",
            "--max-retries",
            "5",
            "--no-rollback",
            "--format",
            "jsonl",
        ])
        .unwrap();

        let Commands::Install(install) = args.command else {
            panic!("expected install");
        };
        assert_eq!(install.plan.names, vec!["app".to_string(), "tools".to_string()]);
        assert_eq!(install.max_retries, Some(5));
        assert!(install.no_rollback);
        assert_eq!(install.plan.format, OutputFormat::Jsonl);
        assert!(!install.plan.lenient);
    }

    #[test]
    fn plan_requires_names() {
        assert!(Args::try_parse_from(["rigup", "plan", "--catalog", "c.toml"]).is_err());
    }
}
