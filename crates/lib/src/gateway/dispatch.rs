//! Dispatcher: raw inbound frame in, outbound envelope (if any) out.

use crate::composer::{error_response, Composer};
use crate::gateway::protocol::{parse_envelope, ConversationRequest, Envelope, Inbound};

/// Handle one inbound frame. Returns the envelope to send back on the same channel, or `None`
/// when nothing should be sent (malformed payload, or a name we do not handle).
pub async fn handle_payload(composer: &Composer, payload: &[u8]) -> Option<Envelope> {
    let envelope = match parse_envelope(payload) {
        Ok(e) => e,
        Err(e) => {
            log::warn!(
                "unrecognized message {:?}: {}",
                String::from_utf8_lossy(payload),
                e
            );
            return None;
        }
    };
    let body = match envelope.classify() {
        Inbound::ConversationRequest(body) => body,
        Inbound::Unrecognized(name) => {
            log::debug!("ignoring envelope {:?}", name);
            return None;
        }
    };
    let echo = body
        .pointer("/input/text")
        .and_then(serde_json::Value::as_str)
        .unwrap_or("")
        .to_string();
    let response = match serde_json::from_value::<ConversationRequest>(body) {
        Ok(req) => {
            log::debug!("conversation request: {:?}", req.input.text);
            composer.respond(&req).await
        }
        Err(e) => {
            log::warn!("conversation request body could not be decoded: {}", e);
            error_response(&echo)
        }
    };
    match Envelope::conversation_response(&response) {
        Ok(env) => Some(env),
        Err(e) => {
            log::error!("encoding conversation response: {}", e);
            None
        }
    }
}
