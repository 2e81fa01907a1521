//! CLI module for runwatch - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
