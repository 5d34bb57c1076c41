//! Response composition: ask the generator for a reply, then lay the override rules over it.
//!
//! Rules are independent overlays applied in table order. Every matching rule runs, so a later
//! rule may overwrite text set by an earlier one. A generation fault skips the rules entirely.

use std::sync::Arc;

use serde_json::json;

use crate::config::GenerationPolicy;
use crate::gateway::{ConversationRequest, ConversationResponse, RichContent};
use crate::llm::{GenerationError, TextGenerator, NO_RESPONSE};

pub const INIT_GREETING: &str = "Hi there!";
pub const WHY_REPLY: &str = "I do not know how to answer that";
pub const CARD_REPLY: &str = "Here is a cat @showcards(cat)";
pub const ERROR_REPLY: &str = "There was an error processing your request.";

/// Variable key referenced by the `@showcards(cat)` directive in [`CARD_REPLY`].
pub const CARD_VARIABLE: &str = "public-cat";

/// A deterministic condition on the request and the change it makes to the response.
pub struct OverrideRule {
    pub name: &'static str,
    pub matches: fn(&ConversationRequest) -> bool,
    pub apply: fn(&mut ConversationResponse),
}

/// Applied in order; order is part of the contract.
pub const OVERRIDE_RULES: [OverrideRule; 3] = [
    OverrideRule {
        name: "init-greeting",
        matches: ConversationRequest::is_init,
        apply: greet,
    },
    OverrideRule {
        name: "why-fallback",
        matches: asks_why,
        apply: decline,
    },
    OverrideRule {
        name: "show-card",
        matches: asks_for_card,
        apply: show_card,
    },
];

fn asks_why(req: &ConversationRequest) -> bool {
    req.input.text.to_lowercase().starts_with("why")
}

fn asks_for_card(req: &ConversationRequest) -> bool {
    req.input.text.to_lowercase() == "show card"
}

fn greet(resp: &mut ConversationResponse) {
    resp.output.text = INIT_GREETING.to_string();
}

fn decline(resp: &mut ConversationResponse) {
    resp.output.text = WHY_REPLY.to_string();
    resp.fallback = true;
}

fn show_card(resp: &mut ConversationResponse) {
    resp.output.text = CARD_REPLY.to_string();
    resp.variables.insert(
        CARD_VARIABLE.to_string(),
        RichContent {
            component: "image".to_string(),
            data: json!({
                "alt": "A cute kitten",
                "url": "https://placekitten.com/300/300",
            }),
        },
    );
}

/// Run every matching rule over `resp`, in table order.
pub fn apply_overrides(req: &ConversationRequest, resp: &mut ConversationResponse) {
    for rule in &OVERRIDE_RULES {
        if (rule.matches)(req) {
            log::debug!("override rule {} applied", rule.name);
            (rule.apply)(resp);
        }
    }
}

/// True when some rule will replace the generated text.
pub fn is_overridden(req: &ConversationRequest) -> bool {
    OVERRIDE_RULES.iter().any(|rule| (rule.matches)(req))
}

/// Minimal reply sent when generation failed.
pub fn error_response(input_text: &str) -> ConversationResponse {
    let mut resp = ConversationResponse::new(input_text, ERROR_REPLY);
    resp.fallback = true;
    resp
}

/// Builds a [`ConversationResponse`] for each request. Holds no per-request state.
#[derive(Clone)]
pub struct Composer {
    generator: Arc<dyn TextGenerator>,
    policy: GenerationPolicy,
}

impl Composer {
    pub fn new(generator: Arc<dyn TextGenerator>, policy: GenerationPolicy) -> Self {
        Self { generator, policy }
    }

    /// Generated (or overridden) reply; `Err` when the generator faulted.
    pub async fn compose(
        &self,
        req: &ConversationRequest,
    ) -> Result<ConversationResponse, GenerationError> {
        let generated = self.base_text(req).await?;
        let mut resp = ConversationResponse::new(req.input.text.clone(), generated);
        apply_overrides(req, &mut resp);
        Ok(resp)
    }

    /// Output text before overrides: the generated reply, or [`NO_RESPONSE`] when there is none
    /// or the call was skipped.
    async fn base_text(&self, req: &ConversationRequest) -> Result<String, GenerationError> {
        if self.policy == GenerationPolicy::SkipOverridden && is_overridden(req) {
            log::debug!("skipping generation, override applies");
            return Ok(NO_RESPONSE.to_string());
        }
        let out = self.generator.generate(&req.input.text).await?;
        if out.is_empty() {
            Ok(NO_RESPONSE.to_string())
        } else {
            Ok(out)
        }
    }

    /// Channel path: like [`Composer::compose`] but a generation fault becomes [`error_response`].
    pub async fn respond(&self, req: &ConversationRequest) -> ConversationResponse {
        match self.compose(req).await {
            Ok(resp) => resp,
            Err(e) => {
                log::warn!("conversation request failed, sending error fallback: {}", e);
                error_response(&req.input.text)
            }
        }
    }
}
