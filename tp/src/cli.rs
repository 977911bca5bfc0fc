//! CLI argument parsing for the tp smoke binary

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tp")]
#[command(author, version, about = "Structured progress events for nested units of work", long_about = None)]
pub struct Cli {
    /// Log filter for stderr output (e.g. "progress=debug")
    #[arg(short, long)]
    pub log_filter: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a synthetic nested workload and emit its progress
    Demo {
        /// Elements in the driven inner loop
        #[arg(short, long, default_value_t = 500)]
        iterations: usize,

        /// Emission threshold (minimum fraction gap between updates)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Print the stable id derived from a key
    Derive {
        /// Key to derive an id from
        #[arg(required = true)]
        key: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_defaults() {
        let cli = Cli::parse_from(["tp", "demo"]);
        match cli.command {
            Command::Demo { iterations, threshold } => {
                assert_eq!(iterations, 500);
                assert!(threshold.is_none());
            }
            _ => panic!("Expected Demo command"),
        }
    }

    #[test]
    fn test_derive_requires_key() {
        assert!(Cli::try_parse_from(["tp", "derive"]).is_err());
        let cli = Cli::parse_from(["tp", "derive", "job-7"]);
        match cli.command {
            Command::Derive { key } => assert_eq!(key, "job-7"),
            _ => panic!("Expected Derive command"),
        }
    }
}
