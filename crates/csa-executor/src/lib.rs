//! LLM transport layer: three provider backends behind one
//! `Transport::generate` surface, plus session-isolated log setup.

pub mod logging;
pub mod transport;

pub use logging::create_session_log_writer;
pub use transport::{
    HostedChatTransport, OpenAiCompatTransport, Transport, VendorGatewayTransport,
    MAX_PROMPT_CHARS,
};
