//! CLI command handlers, one file per command.

mod install;
mod latest;
mod list;
mod path;
mod remove;
mod run;

pub use install::run_install;
pub use latest::run_latest;
pub use list::run_list;
pub use path::run_path;
pub use remove::run_remove;
pub use run::run_runtime;
