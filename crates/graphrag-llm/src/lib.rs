//! OpenAI-compatible chat and embedding client.
//!
//! [`LlmService`] is the one handle bound to the API key and endpoint. It is
//! constructed once at startup, before any other collaborator, and fails fast
//! when the key is missing or still the template placeholder.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use graphrag_core::config::LlmSettings;
use graphrag_core::error::{Error, Result};
use graphrag_core::traits::LanguageModel;
use graphrag_core::types::Prompt;

pub mod embed;
pub mod reply;

pub use embed::{get_default_embedder, ApiEmbedder, FakeEmbedder};

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(8);

#[derive(Clone)]
pub struct LlmService {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    max_retries: u32,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService").field("base_url", &self.base_url).field("max_retries", &self.max_retries).finish()
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

fn service_err(reason: impl Into<String>) -> Error {
    Error::ExternalService(reason.into())
}

impl LlmService {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let api_key = settings.require_api_key()?.to_string();
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|e| Error::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            max_retries: settings.max_retries,
        })
    }

    pub fn chat(&self, prompt: &Prompt) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system.as_deref() {
            messages.push(ChatMessage { role: "system", content: system });
        }
        messages.push(ChatMessage { role: "user", content: &prompt.user });
        let body = ChatRequest {
            model: &prompt.model,
            messages,
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };
        let response: ChatResponse = self.post_json("/chat/completions", &body)?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| service_err("chat completion returned no content"))
    }

    pub fn embed(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = EmbeddingRequest { model, input: texts, encoding_format: "float" };
        let mut response: EmbeddingResponse = self.post_json("/embeddings", &body)?;
        if response.data.len() != texts.len() {
            return Err(service_err(format!(
                "embedding count mismatch: sent {}, received {}",
                texts.len(),
                response.data.len()
            )));
        }
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }

    /// POST with retry on transport errors, 429 and 5xx. Other 4xx fail at once.
    fn post_json<Req: Serialize, Resp: for<'de> Deserialize<'de>>(&self, path: &str, body: &Req) -> Result<Resp> {
        let url = format!("{}{}", self.base_url, path);
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = String::new();

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tracing::debug!(%url, attempt, max = self.max_retries, ?backoff, "retrying llm request");
                std::thread::sleep(backoff);
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }

            let sent = self.http.post(&url).bearer_auth(&self.api_key).json(body).send();
            match sent {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp.json::<Resp>().map_err(|e| service_err(format!("decoding {path} response: {e}")));
                    }
                    let text = resp.text().unwrap_or_default();
                    if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                        return Err(service_err(format!("HTTP {status} from {path}: {text}")));
                    }
                    last_err = format!("HTTP {status}: {text}");
                }
                Err(e) => last_err = e.to_string(),
            }
            tracing::warn!(%url, attempt, error = %last_err, "llm request failed");
        }

        Err(service_err(format!("{path}: all {} attempts failed: {last_err}", self.max_retries + 1)))
    }
}

impl LanguageModel for LlmService {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.chat(prompt)
    }
}
