use crate::config::{CompletionConfig, API_KEY_ENV};
use crate::traits::{CompletionClient, CompletionRequest};
use crate::SearchError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// OpenAI-compatible chat completions client. Groq is the default endpoint.
pub struct ChatCompletionClient {
    endpoint: String,
    api_key: String,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::MissingCredential(format!(
                "empty api key for {endpoint}"
            )));
        }
        Url::parse(endpoint)?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Uses the configured key, falling back to `GROQ_API_KEY`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, SearchError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                SearchError::MissingCredential(format!(
                    "{API_KEY_ENV} is not set and no api key was configured"
                ))
            })?;
        Self::new(&config.endpoint, api_key)
    }

    fn headers(&self) -> Result<HeaderMap, SearchError> {
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", self.api_key.trim());
        let auth = HeaderValue::from_str(&auth).map_err(|_| {
            SearchError::MissingCredential("api key is not a valid header".to_string())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

fn chat_body(request: &CompletionRequest) -> ChatRequest<'_> {
    ChatRequest {
        model: &request.model,
        temperature: request.temperature,
        messages: vec![
            ChatMessage {
                role: "system",
                content: &request.system_prompt,
            },
            ChatMessage {
                role: "user",
                content: &request.user_prompt,
            },
        ],
    }
}

fn first_choice(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)
        .unwrap_or_default()
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, SearchError> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .headers(self.headers()?)
            .json(&chat_body(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(SearchError::BackendResponse {
                backend: "chat-completions".to_string(),
                details: format!("{status}: {text}"),
            });
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(first_choice(parsed).trim().to_string())
    }
}
