//! GigaChat client — two chained calls per post.
//!
//! 1. `POST auth_url` trades the API key for an access token.
//! 2. `POST api_url` sends the prompt with that token as bearer auth.
//!
//! No retries. The first failing step ends the attempt and its reason is
//! returned as a [`GenerationFailure`]. All wire types are private to this
//! module.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Certificate, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use super::token_cache::TokenCache;
use crate::config::GigaChatConfig;
use crate::llm::{GenerationFailure, GenerationRequest, GenerationResult, ProviderError};

/// Header GigaChat uses to trace each token request.
const RQUID_HEADER: &str = "RqUID";

// ── Public client ─────────────────────────────────────────────────────────────

/// Constructed once at startup, then cloned per request.
#[derive(Clone)]
pub struct GigaChatClient {
    client: Client,
    auth_url: String,
    api_url: String,
    scope: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    tokens: Option<Arc<TokenCache>>,
}

impl fmt::Debug for GigaChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GigaChatClient")
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("scope", &self.scope)
            .field("model", &self.model)
            .field("cache_token", &self.tokens.is_some())
            .finish_non_exhaustive()
    }
}

impl GigaChatClient {
    /// Build a client from config. `api_key` is the Base64 authorization
    /// key from the GigaChat console, sent as `Authorization: Basic <key>`.
    pub fn new(config: &GigaChatConfig, api_key: String) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if config.accept_invalid_certs {
            warn!(auth_url = %config.auth_url, "TLS certificate validation disabled for GigaChat");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path)
                .map_err(|e| ProviderError::Client(format!("cannot read {}: {e}", path.display())))?;
            let cert = Certificate::from_pem(&pem)
                .map_err(|e| ProviderError::Client(format!("bad certificate {}: {e}", path.display())))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| ProviderError::Client(e.to_string()))?;

        Ok(Self {
            client,
            auth_url: config.auth_url.clone(),
            api_url: config.api_url.clone(),
            scope: config.scope.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            tokens: config.cache_token.then(|| Arc::new(TokenCache::new())),
        })
    }

    /// Authenticate, then request one completion for `topic`.
    pub async fn generate(&self, topic: &str) -> GenerationResult {
        let token = self.access_token().await?;
        let request = GenerationRequest {
            topic: topic.to_string(),
            model: self.model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        let result = self.complete(&token, &request).await;
        if let (Err(GenerationFailure::CompletionStatus(401)), Some(cache)) = (&result, &self.tokens) {
            cache.clear();
        }
        result
    }

    async fn access_token(&self) -> Result<String, GenerationFailure> {
        if let Some(token) = self.tokens.as_ref().and_then(|c| c.get()) {
            debug!("reusing cached GigaChat access token");
            return Ok(token);
        }
        let issued = self.request_token().await?;
        if let Some(cache) = &self.tokens {
            cache.store(&issued.access_token, issued.expires_at);
        }
        Ok(issued.access_token)
    }

    async fn request_token(&self) -> Result<IssuedToken, GenerationFailure> {
        let rq_uid = Uuid::new_v4();
        debug!(%rq_uid, "requesting GigaChat access token");

        let response = self
            .client
            .post(&self.auth_url)
            .header(ACCEPT, "application/json")
            .header(RQUID_HEADER, rq_uid.to_string())
            .header(AUTHORIZATION, format!("Basic {}", self.api_key))
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%rq_uid, %status, "GigaChat authorization failed");
            return Err(GenerationFailure::AuthStatus(status.as_u16()));
        }

        let body = response.json::<TokenResponse>().await.map_err(|e| {
            warn!(%rq_uid, error = %e, "unreadable GigaChat token response");
            GenerationFailure::MissingAccessToken
        })?;

        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(GenerationFailure::MissingAccessToken)?;

        Ok(IssuedToken { access_token, expires_at: body.expires_at })
    }

    async fn complete(&self, token: &str, request: &GenerationRequest) -> GenerationResult {
        let payload = ChatCompletionRequest {
            model: &request.model,
            messages: vec![Message { role: "user", content: request.prompt() }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        debug!(
            model = %payload.model,
            topic_len = request.topic.len(),
            "sending GigaChat completion request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header(ACCEPT, "application/json")
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            warn!(%status, "GigaChat completion failed");
            return Err(GenerationFailure::CompletionStatus(status.as_u16()));
        }

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            warn!(error = %e, "unreadable GigaChat completion response");
            GenerationFailure::MissingContent
        })?;

        debug!(choices = parsed.choices.len(), "received GigaChat completion");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .ok_or(GenerationFailure::MissingContent)
    }
}

fn transport(e: reqwest::Error) -> GenerationFailure {
    warn!(error = %e, timeout = e.is_timeout(), "GigaChat request failed (transport)");
    GenerationFailure::Transport(e.to_string())
}

// ── Private wire types ────────────────────────────────────────────────────────

struct IssuedToken {
    access_token: String,
    expires_at: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    expires_at: Option<u64>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
