//! CLI for the vidq media delivery queue.

mod commands;
mod console_host;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use vidq_core::config;
use vidq_core::storage::SplitPolicy;

use commands::{run_console, run_resolve, run_search, run_split};

/// Top-level CLI for vidq.
#[derive(Debug, Parser)]
#[command(name = "vidq")]
#[command(about = "vidq: per-user media download and delivery queue", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// How `vidq split` cuts a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Ceiling-sized parts, the last one holds the rest.
    Fixed,
    /// As few parts as possible, all about the same size.
    Equal,
}

impl From<PolicyArg> for SplitPolicy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Fixed => SplitPolicy::FixedSize,
            PolicyArg::Equal => SplitPolicy::EqualParts,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Interactive session: each input line is a message, `#N` picks a menu entry.
    Console {
        /// User id the session acts as.
        #[arg(long, default_value = "1", value_name = "ID")]
        user: i64,
        /// Chat id replies go to (defaults to the user id).
        #[arg(long, value_name = "ID")]
        chat: Option<i64>,
        /// Directory delivered files are copied into (default: current dir).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Resolve a link and print the quality menu.
    Resolve {
        /// Media page URL.
        url: String,
    },

    /// Search for videos.
    Search {
        /// Free-text query.
        query: String,
    },

    /// Split a file into parts no larger than the delivery ceiling.
    Split {
        /// File to split.
        path: PathBuf,
        #[arg(long, value_enum, default_value = "fixed")]
        policy: PolicyArg,
        /// Largest part size in bytes (default: configured delivery ceiling).
        #[arg(long, value_name = "BYTES")]
        ceiling: Option<u64>,
        /// Directory for the part files (default: next to the source).
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Console { user, chat, out } => {
                let out_dir = match out {
                    Some(dir) => dir,
                    None => std::env::current_dir()?,
                };
                run_console(&cfg, user, chat.unwrap_or(user), out_dir).await?;
            }
            CliCommand::Resolve { url } => run_resolve(&cfg, &url).await?,
            CliCommand::Search { query } => run_search(&cfg, &query).await?,
            CliCommand::Split {
                path,
                policy,
                ceiling,
                out,
            } => {
                let out_dir = match out {
                    Some(dir) => dir,
                    None => match path.parent() {
                        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                        _ => std::env::current_dir()?,
                    },
                };
                let ceiling = ceiling.unwrap_or(cfg.delivery_ceiling_bytes);
                run_split(&path, policy.into(), ceiling, &out_dir).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
