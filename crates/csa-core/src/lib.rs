//! Shared types and error kinds for the agent control loop and its action
//! runtime: the tagged action enum, edit-command kind, provider/mode
//! selectors, and `AppError`.

pub mod error;
pub mod types;

pub use error::{AppError, TransportErrorKind};
pub use types::{ActionTag, EditCommandKind, ProviderSource, RunMode, WriteMode};
