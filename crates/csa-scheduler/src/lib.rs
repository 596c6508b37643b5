//! Retry/backoff policy and the RUN-command server-shape heuristic used
//! by the control loop's transport and dispatcher layers.

pub mod backoff;
pub mod classify;
pub mod suggest;

pub use backoff::{exponential_backoff, seconds_until_midnight, vendor_gateway_backoff};
pub use classify::{classify, parse_retry_after_body, parse_retry_after_header};
pub use suggest::{SuggestionState, SuggestionTracker};
