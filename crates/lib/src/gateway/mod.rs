//! Gateway: HTTP + WebSocket transport for conversation envelopes.
//!
//! Single port serves the WebSocket channel (at `/` and `/ws`), a health probe, and the
//! synchronous `/test-llm` call path. Every inbound frame is handled on its own task.

mod dispatch;
mod protocol;
mod server;

pub use dispatch::handle_payload;
pub use protocol::{
    parse_envelope, ConversationInput, ConversationOutput, ConversationRequest,
    ConversationResponse, Envelope, Inbound, MalformedEnvelope, OptionalArgs, RichContent,
    CONVERSATION_REQUEST, CONVERSATION_RESPONSE,
};
pub use server::{run_server, INVALID_REQUEST_TEXT, LLM_ERROR_TEXT};
