use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::providers::traits::{ImagePart, VisionProvider};

#[derive(Clone)]
pub struct GeminiProvider {
    api_key: String,
    client: Client,
    model: String,
    api_url: String,
    temperature: f32,
    timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(ProviderError::MissingApiKey("GOOGLE_API_KEY"))?;

        Ok(Self {
            api_key,
            client: Client::new(),
            model: config.model.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            timeout: config.timeout,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.api_url, self.model)
    }

    fn build_request(&self, instruction: &str, image: &ImagePart, prompt: &str) -> GeminiRequest {
        let mut parts = vec![
            Part::Text {
                text: instruction.to_string(),
            },
            Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: general_purpose::STANDARD.encode(&image.data),
                },
            },
        ];
        // Gemini rejects empty text parts.
        if !prompt.trim().is_empty() {
            parts.push(Part::Text {
                text: prompt.to_string(),
            });
        }

        GeminiRequest {
            contents: vec![Content { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
        }
    }

    async fn call_gemini_api(&self, request: &GeminiRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gemini API error: {} - {}", status, body);
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_response(&body)
    }
}

fn parse_response(body: &str) -> Result<String, ProviderError> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("{}: {}", e, body)))?;

    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(ProviderError::Api(format!("prompt blocked ({})", reason)));
    }

    let text: Vec<String> = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::InvalidResponse(
            "no text in first candidate".to_string(),
        ));
    }
    Ok(text.join(""))
}

#[async_trait]
impl VisionProvider for GeminiProvider {
    async fn analyze(
        &self,
        instruction: &str,
        image: &ImagePart,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(instruction, image, prompt);
        debug!(
            "Sending {} byte {} image to {}",
            image.data.len(),
            image.mime_type,
            self.model
        );

        match tokio::time::timeout(self.timeout, self.call_gemini_api(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.timeout.as_secs())),
        }
    }

    fn get_model_info(&self) -> String {
        self.model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Query, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};
    use std::collections::HashMap;

    fn config(api_url: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: Some("test-key".to_string()),
            model: "gemini-1.5-flash".to_string(),
            api_url: api_url.to_string(),
            temperature: 0.4,
            timeout: Duration::from_secs(5),
        }
    }

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1beta/models", addr)
    }

    fn jpeg() -> ImagePart {
        ImagePart::new("image/jpeg", vec![0xff, 0xd8, 0xff])
    }

    #[test]
    fn test_missing_api_key() {
        let mut cfg = config("http://localhost");
        cfg.api_key = None;
        assert!(matches!(
            GeminiProvider::new(&cfg),
            Err(ProviderError::MissingApiKey("GOOGLE_API_KEY"))
        ));
    }

    #[test]
    fn test_request_orders_instruction_image_prompt() {
        let provider = GeminiProvider::new(&config("http://localhost/")).unwrap();
        let request = provider.build_request("identify", &jpeg(), "is it vegan?");
        let body = serde_json::to_value(&request).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "identify");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(parts[1]["inline_data"]["data"], "/9j/");
        assert_eq!(parts[2]["text"], "is it vegan?");
        assert_eq!(
            provider.endpoint(),
            "http://localhost/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_request_skips_blank_prompt() {
        let provider = GeminiProvider::new(&config("http://localhost")).unwrap();
        let request = provider.build_request("identify", &jpeg(), "  ");
        assert_eq!(request.contents[0].parts.len(), 2);
    }

    #[test]
    fn test_parse_response_joins_parts() {
        let body = json!({
            "candidates": [{"content": {"parts": [{"text": "Pizza, "}, {"text": "center"}]}}]
        });
        assert_eq!(parse_response(&body.to_string()).unwrap(), "Pizza, center");
    }

    #[test]
    fn test_parse_response_blocked_prompt() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        assert!(matches!(
            parse_response(&body.to_string()),
            Err(ProviderError::Api(msg)) if msg.contains("SAFETY")
        ));
    }

    #[test]
    fn test_parse_response_without_text() {
        assert!(matches!(
            parse_response(r#"{"candidates": []}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_analyze_against_mock_server() {
        let router = Router::new().route(
            "/v1beta/models/:method",
            post(
                |Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    assert_eq!(query.get("key").map(String::as_str), Some("test-key"));
                    let text = body["contents"][0]["parts"][2]["text"].clone();
                    Json(json!({
                        "candidates": [{"content": {"parts": [{"text": format!("echo: {}", text.as_str().unwrap_or(""))}]}}]
                    }))
                },
            ),
        );
        let url = spawn_mock(router).await;
        let provider = GeminiProvider::new(&config(&url)).unwrap();

        let text = provider.analyze("identify", &jpeg(), "calories?").await.unwrap();
        assert_eq!(text, "echo: calories?");
    }

    #[tokio::test]
    async fn test_analyze_surfaces_http_errors() {
        let router = Router::new().route(
            "/v1beta/models/:method",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let url = spawn_mock(router).await;
        let provider = GeminiProvider::new(&config(&url)).unwrap();

        let err = provider.analyze("identify", &jpeg(), "").await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, ref body } if body == "overloaded"));
    }
}
