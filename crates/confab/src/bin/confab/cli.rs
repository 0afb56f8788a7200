//! confab cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; confab ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Assemble all units of a plan and write their artifacts
    #[command(alias = "build")]
    Assemble(AssembleCommand),

    /// Build units without writing and print their merged trees
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct AssembleCommand {
    #[clap(flatten)]
    pub plan: PlanArgs,
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Project base directory
    ///
    /// Fragment locations are resolved against it and absolute paths
    /// below it are replaced by the base dir marker in the artifacts.
    /// Defaults to the work directory.
    #[clap(short = 'b', long = "base-dir")]
    pub base_dir: Option<PathBuf>,

    /// Directory the artifacts are written to
    ///
    /// Defaults to `<base-dir>/assembled`.
    #[clap(short = 'o', long = "output-dir")]
    pub output_dir: Option<PathBuf>,

    /// Assembly plan file (yaml or json)
    ///
    /// Maps each unit name to its ordered fragment locations and may
    /// carry an `addition` tree merged into every ordinary unit.
    pub plan: PathBuf,
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[clap(flatten)]
    pub plan: PlanArgs,

    /// Only print this unit's merged tree
    #[clap(short = 'u', long = "unit")]
    pub unit: Option<String>,

    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}
