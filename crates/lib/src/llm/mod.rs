//! Text generation: the `TextGenerator` seam and the Hugging Face inference client.

mod huggingface;

pub use huggingface::{HuggingFaceClient, NO_RESPONSE};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("generation api error: {0}")]
    Api(String),
}

/// Produces reply text for a user utterance. One stateless exchange per call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, text: &str) -> Result<String, GenerationError>;
}
