//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod send;

pub use send::SendArgs;
