mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{GlobalArgs, StashCommand};
use output::{OutputFormat, print_error};

/// flowgen - build-file generator for step graphs, with a shared output stash
#[derive(Parser)]
#[command(name = "flowgen")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Design directory containing .flowgen.yml
  #[arg(long, global = true, default_value = ".")]
  design: PathBuf,

  /// Build-file backend: make or ninja
  #[arg(long, global = true)]
  backend: Option<String>,

  /// Build directory (default: build_dir from .flowgen.yml, else <design>/build)
  #[arg(long, global = true)]
  build_dir: Option<PathBuf>,

  /// Stash directory
  #[arg(long, global = true)]
  stash: Option<PathBuf>,

  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Text)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Generate the build file (default)
  Build,

  /// Print the steps in build order
  List,

  /// Show which steps are up to date
  Status,

  /// Store and restore step outputs
  Stash {
    #[command(subcommand)]
    command: StashCommand,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match run(cli) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}

fn run(cli: Cli) -> Result<()> {
  let args = GlobalArgs {
    design: cli.design,
    backend: cli.backend,
    build_dir: cli.build_dir,
    stash: cli.stash,
    output: cli.output,
  };

  match cli.command.unwrap_or(Commands::Build) {
    Commands::Build => cmd::cmd_build(&args),
    Commands::List => cmd::cmd_list(&args),
    Commands::Status => cmd::cmd_status(&args),
    Commands::Stash { command } => cmd::cmd_stash(&args, &command),
  }
}
