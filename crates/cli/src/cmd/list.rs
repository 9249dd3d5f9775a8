use anyhow::Result;
use owo_colors::{OwoColorize, Stream};

use flowgen_lib::orchestrator::list;

use super::GlobalArgs;
use crate::output::{print_info, print_json};

pub fn cmd_list(args: &GlobalArgs) -> Result<()> {
  let design = args.load_design()?;
  let rows = list(&design.plan()?);

  if args.output.is_json() {
    return print_json(&rows);
  }

  if rows.is_empty() {
    print_info("Design has no steps.");
    return Ok(());
  }

  println!("Steps:");
  for row in &rows {
    println!(
      " - {} : {} {}",
      row.position,
      row.name,
      row.fingerprint.short().if_supports_color(Stream::Stdout, |s| s.dimmed())
    );
  }
  Ok(())
}
