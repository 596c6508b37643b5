//! CLI parsing, `devlm.env` loading, and agent-home path layout
//! (spec §6, §10).

pub mod cli;
pub mod defaults;
pub mod env_file;
pub mod paths;

pub use cli::Cli;
pub use defaults::RuntimeDefaults;
pub use env_file::{load_env_file, parse_env_file};
pub use paths::{AgentHome, AGENT_HOME_DIR};
