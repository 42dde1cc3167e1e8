pub mod config;
pub mod logging;

pub mod build;
pub mod cache;
pub mod extract;
pub mod fetch;
pub mod host;
pub mod install;
pub mod listeners;
pub mod loader;
pub mod release;
pub mod retry;
pub mod version;
