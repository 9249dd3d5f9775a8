//! `flowgen stash ...`: share step outputs through a stash directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use owo_colors::{OwoColorize, Stream};

use flowgen_lib::orchestrator::{pop_entry, push_step};
use flowgen_lib::platform::fs::dir_size;
use flowgen_lib::stash::pointer::write_pointer;
use flowgen_lib::stash::{PopMode, PushOutcome, Stash};

use super::GlobalArgs;
use crate::output::{
  ARROW, format_age, format_bytes, format_timestamp, print_info, print_json, print_stat, print_success,
};

#[derive(Debug, Subcommand)]
pub enum StashCommand {
  /// Create a stash and link the build directory to it
  Init {
    /// Stash directory (created if missing)
    #[arg(short, long)]
    dir: PathBuf,
  },

  /// Link the build directory to an existing stash
  Link {
    /// Stash directory
    #[arg(short, long)]
    dir: PathBuf,
  },

  /// Store a step's outputs under its current fingerprint
  Push {
    /// Step name or position
    #[arg(short, long)]
    step: String,

    /// Note recorded with the entry
    #[arg(short, long)]
    message: Option<String>,
  },

  /// Restore an entry into its step's outputs directory
  Pop {
    /// Entry hash or unique prefix
    #[arg(long)]
    hash: String,

    /// Link to the stored outputs instead of copying them
    #[arg(long)]
    symlink: bool,
  },

  /// Remove an entry
  Drop {
    /// Entry hash or unique prefix
    #[arg(long)]
    hash: String,
  },

  /// List stash entries
  Status,
}

pub fn cmd_stash(args: &GlobalArgs, command: &StashCommand) -> Result<()> {
  match command {
    StashCommand::Init { dir } => cmd_init(args, dir, true),
    StashCommand::Link { dir } => cmd_init(args, dir, false),
    StashCommand::Push { step, message } => cmd_push(args, step, message.as_deref()),
    StashCommand::Pop { hash, symlink } => cmd_pop(args, hash, *symlink),
    StashCommand::Drop { hash } => cmd_drop(args, hash),
    StashCommand::Status => cmd_status(args),
  }
}

fn cmd_init(args: &GlobalArgs, dir: &Path, create: bool) -> Result<()> {
  let stash = if create {
    Stash::init(dir).with_context(|| format!("Failed to initialize stash at {}", dir.display()))?
  } else {
    Stash::open(dir).with_context(|| format!("Failed to open stash at {}", dir.display()))?
  };

  let config = args.try_config()?;
  let build_dir = args.build_dir(config.as_ref());
  let pointer = write_pointer(&build_dir, &stash).context("Failed to link build directory")?;

  if args.output.is_json() {
    return print_json(&serde_json::json!({
      "stash": stash.root(),
      "build_dir": build_dir,
      "pointer": pointer,
    }));
  }

  let verb = if create { "Initialized" } else { "Linked" };
  print_success(&format!("{verb} stash {}", stash.root().display()));
  print_stat("Build directory", &build_dir.display().to_string());
  Ok(())
}

fn cmd_push(args: &GlobalArgs, step: &str, message: Option<&str>) -> Result<()> {
  let design = args.load_design()?;
  let plan = design.plan()?;
  let build_dir = args.build_dir(Some(&design.config));
  let stash = args.open_stash(Some(&design.config), &build_dir)?;

  let outcome =
    push_step(&plan, &build_dir, &stash, step, message).with_context(|| format!("Failed to stash step {step}"))?;

  if args.output.is_json() {
    return print_json(&serde_json::json!({
      "stored": outcome.is_new(),
      "entry": outcome.entry(),
    }));
  }

  match &outcome {
    PushOutcome::Stored(entry) => print_success(&format!("Stashed {} as {}", entry.step, entry.hash.short())),
    PushOutcome::Deduplicated(entry) => print_info(&format!(
      "{} is already stashed as {}",
      entry.step,
      entry.hash.short()
    )),
  }
  let entry = outcome.entry();
  if let Some(message) = &entry.message {
    print_stat("Message", message);
  }
  Ok(())
}

fn cmd_pop(args: &GlobalArgs, hash: &str, symlink: bool) -> Result<()> {
  let design = args.load_design()?;
  let plan = design.plan()?;
  let build_dir = args.build_dir(Some(&design.config));
  let stash = args.open_stash(Some(&design.config), &build_dir)?;

  let hash = stash.resolve(hash).context("Failed to find stash entry")?;
  let mode = if symlink { PopMode::Link } else { PopMode::Copy };
  let popped = pop_entry(&plan, &build_dir, &stash, &hash, mode)
    .with_context(|| format!("Failed to restore stash entry {}", hash.short()))?;

  if args.output.is_json() {
    return print_json(&serde_json::json!({
      "step": popped.step,
      "outputs": popped.outputs,
      "entry": popped.entry,
      "linked": symlink,
    }));
  }

  print_success(&format!(
    "Restored {} {} {}",
    hash.short(),
    ARROW,
    popped.outputs.display()
  ));
  if plan.find(&popped.step).is_some_and(|s| s.fingerprint != hash) {
    print_info("Entry does not match the step's current fingerprint; status will report it as needing a rebuild.");
  }
  Ok(())
}

fn cmd_drop(args: &GlobalArgs, hash: &str) -> Result<()> {
  let config = args.try_config()?;
  let build_dir = args.build_dir(config.as_ref());
  let stash = args.open_stash(config.as_ref(), &build_dir)?;

  let hash = stash.resolve(hash).context("Failed to find stash entry")?;
  let entry = stash.drop(&hash).context("Failed to drop stash entry")?;

  if args.output.is_json() {
    return print_json(&entry);
  }
  print_success(&format!("Dropped {} ({})", hash.short(), entry.step));
  Ok(())
}

fn cmd_status(args: &GlobalArgs) -> Result<()> {
  let config = args.try_config()?;
  let build_dir = args.build_dir(config.as_ref());
  let stash = args.open_stash(config.as_ref(), &build_dir)?;
  let entries = stash.status().context("Failed to list stash")?;

  if args.output.is_json() {
    return print_json(&entries);
  }

  if entries.is_empty() {
    print_info(&format!("Stash {} is empty.", stash.root().display()));
    return Ok(());
  }

  println!("Stash {}:", stash.root().display());
  for entry in &entries {
    let message = entry.message.as_deref().unwrap_or("");
    println!(
      " - {} {} {} {}",
      entry.hash.short().if_supports_color(Stream::Stdout, |s| s.yellow()),
      entry.step,
      format!("({} ago, {})", format_age(entry.created_at), format_timestamp(entry.created_at))
        .if_supports_color(Stream::Stdout, |s| s.dimmed()),
      message
    );
  }

  let usage: u64 = entries.iter().map(|e| dir_size(&stash.outputs_path(&e.hash))).sum();
  println!();
  print_stat("Entries", &entries.len().to_string());
  print_stat("Size", &format_bytes(usage));
  Ok(())
}
