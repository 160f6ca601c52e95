//! CLI for the deid job orchestrator.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use deid_core::config::{self, DeidConfig};
use deid_core::dispatcher::DispatchMode;
use deid_core::tabular::MergeOptions;

use commands::{
    run_collect, run_config, run_merge, run_range_command, run_split, run_stage, run_status, RunArgs,
    SplitArgs,
};

/// Top-level CLI for the deid job orchestrator.
#[derive(Debug, Parser)]
#[command(name = "deid")]
#[command(about = "deid: bounded de-identification job orchestrator", long_about = None)]
pub struct Cli {
    /// Config file to use instead of ~/.config/deid/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Dispatch mode as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Poll each job until it finishes or runs out of time.
    Poll,
    /// Submit and move on.
    FireAndForget,
}

impl From<ModeArg> for DispatchMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Poll => DispatchMode::PollToCompletion,
            ModeArg::FireAndForget => DispatchMode::FireAndForget,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Submit one de-identification job per folder in RANGE (e.g. 5-7).
    Run {
        /// Inclusive folder range "start-end".
        range: String,
        /// Jobs in flight at once (1-10; default from config).
        #[arg(long, value_name = "N")]
        jobs: Option<usize>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
        /// Seconds between status queries.
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,
        /// Seconds to wait for each job before recording it as timed out.
        #[arg(long, value_name = "SECS")]
        max_wait: Option<u64>,
        /// Download results of succeeded folders into DIR afterwards.
        #[arg(long, value_name = "DIR")]
        collect: Option<PathBuf>,
        /// Print the outcome records as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Show the service status of one job.
    Status {
        /// Job handle, e.g. deid-5-1a2b3c4d5e6f.
        handle: String,
    },

    /// Upload LOCAL_ROOT/<id>/ for each folder in RANGE to the source container.
    Stage {
        range: String,
        local_root: PathBuf,
    },

    /// Download results for each folder in RANGE from the target container.
    Collect {
        range: String,
        out_dir: PathBuf,
        /// Delete each remote result after it was downloaded.
        #[arg(long)]
        delete: bool,
    },

    /// Split a large CSV into chunks of about SIZE_MB each.
    Split {
        input: PathBuf,
        /// Target chunk size in MB.
        size_mb: f64,
        /// Directory for the chunks (default: next to INPUT).
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
        /// Do not repeat the header in every chunk.
        #[arg(long)]
        no_header: bool,
        /// Put each chunk in its own numbered folder, starting at N.
        #[arg(long, value_name = "N")]
        folders: Option<u64>,
    },

    /// Merge the CSVs below ROOT into merged_<pattern>.csv and merged_other.csv.
    Merge {
        #[arg(default_value = ".")]
        root: PathBuf,
        /// Only read this subfolder of ROOT (repeatable).
        #[arg(long = "folder", value_name = "NAME")]
        folders: Vec<String>,
        /// File-name pattern of the first output group.
        #[arg(long, default_value = "truth")]
        pattern: String,
        #[arg(long)]
        case_sensitive: bool,
        /// Add source_file, source_path, file_size and merge_timestamp columns.
        #[arg(long)]
        metadata: bool,
        /// Put the merge time in the output file names.
        #[arg(long)]
        timestamped: bool,
    },

    /// Print the effective configuration.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<DeidConfig> {
    match path {
        Some(p) => config::load_from_path(p),
        None => config::load_or_init(),
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = load_config(cli.config.as_ref())?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run {
                range,
                jobs,
                mode,
                poll_interval,
                max_wait,
                collect,
                json,
            } => {
                let args = RunArgs {
                    range,
                    jobs,
                    mode: mode.map(DispatchMode::from),
                    poll_interval,
                    max_wait,
                    collect,
                    json,
                };
                run_range_command(&cfg, args).await?
            }
            CliCommand::Status { handle } => run_status(&cfg, &handle).await?,
            CliCommand::Stage { range, local_root } => run_stage(&cfg, &range, &local_root).await?,
            CliCommand::Collect {
                range,
                out_dir,
                delete,
            } => run_collect(&cfg, &range, &out_dir, delete).await?,
            CliCommand::Split {
                input,
                size_mb,
                output_dir,
                no_header,
                folders,
            } => {
                run_split(SplitArgs {
                    input,
                    size_mb,
                    output_dir,
                    no_header,
                    folders,
                })
                .await?
            }
            CliCommand::Merge {
                root,
                folders,
                pattern,
                case_sensitive,
                metadata,
                timestamped,
            } => {
                let opts = MergeOptions {
                    subfolders: (!folders.is_empty()).then_some(folders),
                    pattern,
                    case_sensitive,
                    add_metadata: metadata,
                    timestamped,
                    ..MergeOptions::new(root)
                };
                run_merge(opts).await?
            }
            CliCommand::Config => run_config(&cfg, cli.config.as_deref())?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
