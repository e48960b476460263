//! Command implementations for the latest CLI.

pub mod check;
pub mod install;
pub mod list;
