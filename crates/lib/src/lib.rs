//! Conversation relay core: envelope protocol, response composer, generation client and the
//! HTTP + WebSocket server used by the CLI.

pub mod composer;
pub mod config;
pub mod gateway;
pub mod llm;
