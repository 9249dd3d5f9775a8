//! `flowgen status`: per-step freshness of the build directory.

use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use flowgen_lib::orchestrator::{StepState, status};

use super::GlobalArgs;
use crate::output::{format_state, print_info, print_json, print_stat, print_warning};

pub fn cmd_status(args: &GlobalArgs) -> Result<()> {
  let design = args.load_design()?;
  let plan = design.plan()?;
  let build_dir = args.build_dir(Some(&design.config));

  // A broken stash should not hide the freshness table.
  let stash = match args.stash_root(Some(&design.config), &build_dir)? {
    Some(_) => match args.open_stash(Some(&design.config), &build_dir) {
      Ok(stash) => Some(stash),
      Err(e) => {
        print_warning(&format!("{e:#}"));
        None
      }
    },
    None => None,
  };

  let rows = status(&plan, &build_dir, stash.as_ref());

  if args.output.is_json() {
    return print_json(&rows);
  }

  if rows.is_empty() {
    print_info("Design has no steps.");
    return Ok(());
  }

  println!("Status:");
  let width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
  for row in &rows {
    let stashed = if row.stashed { " [stashed]" } else { "" };
    println!(
      " - {:>3} : {:<width$} {} {}{}",
      row.position,
      row.name,
      row.fingerprint.short().if_supports_color(Stream::Stdout, |s| s.dimmed()),
      format_state(row.state),
      stashed.if_supports_color(Stream::Stdout, |s| s.cyan()),
    );
  }

  let fresh = rows.iter().filter(|r| r.state == StepState::UpToDate).count();
  println!();
  print_stat("Up to date", &format!("{fresh}/{}", rows.len()));
  print_stat("Build directory", &build_dir.display().to_string());
  Ok(())
}
