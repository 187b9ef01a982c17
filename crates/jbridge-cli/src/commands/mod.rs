//! Subcommand implementations.

pub mod emit;
pub mod layout;
pub mod object;
