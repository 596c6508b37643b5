//! Command-line entry point, parsed by [`csa_config::Cli`] (spec §6).

pub use csa_config::Cli;
