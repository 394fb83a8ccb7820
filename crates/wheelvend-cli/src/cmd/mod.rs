//! Subcommand implementations

pub mod check;
pub mod embed;
pub mod install;
