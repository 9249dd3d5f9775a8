mod build;
mod context;
mod list;
mod stash;
mod status;

pub use build::cmd_build;
pub use context::GlobalArgs;
pub use list::cmd_list;
pub use stash::{StashCommand, cmd_stash};
pub use status::cmd_status;
