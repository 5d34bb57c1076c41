//! Hugging Face Inference API client (text-generation models).
//! Request `{ "inputs": text }`; response is an array of `{ "generated_text" }` objects.

use async_trait::async_trait;
use serde::Serialize;

use super::{GenerationError, TextGenerator};

/// Returned when the endpoint answered but produced no usable text.
pub const NO_RESPONSE: &str = "No response from LLM";

/// Client for a single text-generation model endpoint.
#[derive(Clone)]
pub struct HuggingFaceClient {
    endpoint: String,
    token: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
}

impl HuggingFaceClient {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            token,
            client: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, text: &str) -> Result<String, GenerationError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&GenerateRequest { inputs: text });
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        let res = req.send().await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(GenerationError::Api(format!("{} {}", status, body)));
        }
        let body = res.text().await?;
        Ok(first_generated_text(&body).unwrap_or_else(|| {
            log::debug!("generation response had no generated_text: {}", body);
            NO_RESPONSE.to_string()
        }))
    }
}

/// `generated_text` of the first array element, when it is a non-empty string.
fn first_generated_text(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get(0)?
        .get("generated_text")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl TextGenerator for HuggingFaceClient {
    async fn generate(&self, text: &str) -> Result<String, GenerationError> {
        self.post(text).await.map_err(|e| {
            log::error!("calling generation endpoint {}: {}", self.endpoint, e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    #[test]
    fn first_generated_text_shapes() {
        assert_eq!(
            first_generated_text(r#"[{"generated_text":"a"},{"generated_text":"b"}]"#).as_deref(),
            Some("a")
        );
        assert_eq!(first_generated_text(r#"[]"#), None);
        assert_eq!(first_generated_text(r#"[{"score":1}]"#), None);
        assert_eq!(first_generated_text(r#"[{"generated_text":""}]"#), None);
        assert_eq!(first_generated_text(r#"{"generated_text":"a"}"#), None);
        assert_eq!(first_generated_text("plain text"), None);
    }

    #[tokio::test]
    async fn generate_sends_inputs_and_bearer() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gpt2")
            .match_header("authorization", "Bearer hf_test")
            .match_body(Matcher::Json(json!({ "inputs": "Hello there" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"generated_text":"Hello there, friend."}]"#)
            .create_async()
            .await;

        let client = HuggingFaceClient::new(
            format!("{}/models/gpt2", server.url()),
            Some("hf_test".to_string()),
        );
        let text = client.generate("Hello there").await.unwrap();
        assert_eq!(text, "Hello there, friend.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_without_token_sends_no_authorization() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("authorization", Matcher::Missing)
            .with_status(200)
            .with_body(r#"[{"generated_text":"ok"}]"#)
            .create_async()
            .await;

        let client = HuggingFaceClient::new(server.url(), None);
        assert_eq!(client.generate("x").await.unwrap(), "ok");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_without_usable_text_returns_sentinel() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let client = HuggingFaceClient::new(server.url(), None);
        assert_eq!(client.generate("x").await.unwrap(), NO_RESPONSE);
    }

    #[tokio::test]
    async fn generate_error_status_is_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(503)
            .with_body("model is loading")
            .create_async()
            .await;

        let client = HuggingFaceClient::new(server.url(), None);
        let err = client.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Api(_)));
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("model is loading"));
    }

    #[tokio::test]
    async fn generate_unreachable_is_request_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HuggingFaceClient::new(format!("http://127.0.0.1:{}/", port), None);
        let err = client.generate("x").await.unwrap_err();
        assert!(matches!(err, GenerationError::Request(_)));
    }
}
