mod commands;
mod utils;

use crate::commands::plan::{plan, PlanArgs};
use crate::commands::run::{run, RunArgs};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the configured strategy to every index
    Run(RunArgs),
    /// Show what a merge would change, without changing anything
    Plan(PlanArgs),
}

#[derive(Parser, Debug)]
#[command(name = "mapsync")]
#[command(version)]
#[command(about = "Keeps Elasticsearch mappings and analysis settings in line with schema documents", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Exits with 1 when an index could not be brought up to date, and with 2
/// when the run could not start at all.
pub fn mapsync_cli(args: Vec<String>) -> ExitCode {
    let cli = Cli::parse_from(args);

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::Plan(args) => plan(args),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("{} {}", "Error:".red(), err);
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsync_types::{FailurePolicy, SchemaManagementStrategy};

    #[test]
    fn test_parse_run_arguments() {
        let cli = Cli::try_parse_from([
            "mapsync",
            "run",
            "--config",
            "/etc/mapsync/config.yaml",
            "--strategy",
            "DROP_AND_CREATE",
            "--failure-policy",
            "report_all",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected the run command");
        };
        assert_eq!(args.config_path, "/etc/mapsync/config.yaml");
        assert_eq!(args.strategy, Some(SchemaManagementStrategy::DropAndCreate));
        assert_eq!(args.failure_policy, Some(FailurePolicy::ReportAll));
    }

    #[test]
    fn test_parse_plan_defaults() {
        let cli = Cli::try_parse_from(["mapsync", "plan"]).unwrap();
        let Command::Plan(args) = cli.command else {
            panic!("expected the plan command");
        };
        assert_eq!(args.config_path, mapsync_config::DEFAULT_CONFIG_PATH);
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        assert!(Cli::try_parse_from(["mapsync", "run", "--strategy", "UPSERT"]).is_err());
    }
}
