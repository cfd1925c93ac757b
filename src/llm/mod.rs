//! Post generation abstraction.
//!
//! `Generator` is an enum over concrete backends. Adding a backend = new
//! module in `providers/` + new variant + new `generate` arm.
//!
//! Generation never fails with an `Err` that the caller has to propagate:
//! every failure is a [`GenerationFailure`] value carrying a human-readable
//! reason, and [`render_result`] turns the outcome into the text the user
//! sees.

pub mod providers;

use thiserror::Error;

/// Every user-visible failure string starts with this marker.
pub const FAILURE_MARKER: &str = "❌";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Construction-time errors (bad config, unusable TLS material).
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown generator: {0}")]
    UnknownProvider(String),
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Why a single generation attempt failed. `Display` is the reason shown
/// to the user after [`FAILURE_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationFailure {
    #[error("Ошибка авторизации: {0}")]
    AuthStatus(u16),
    #[error("Не удалось получить access token")]
    MissingAccessToken,
    #[error("Ошибка генерации поста: {0}")]
    CompletionStatus(u16),
    #[error("Не удалось получить ответ от GigaChat")]
    MissingContent,
    #[error("Ошибка соединения с GigaChat: {0}")]
    Transport(String),
}

/// Generated text, or the reason there is none. Never partially valid.
pub type GenerationResult = Result<String, GenerationFailure>;

/// Flatten a result into the string contract: content verbatim on
/// success, `FAILURE_MARKER` + reason on failure.
pub fn render_result(result: &GenerationResult) -> String {
    match result {
        Ok(text) => text.clone(),
        Err(failure) => format!("{FAILURE_MARKER} {failure}"),
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// One post request: the topic plus fixed sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub topic: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// The topic wrapped in the post-writing instructions sent as the
    /// single user message.
    pub fn prompt(&self) -> String {
        format!(
            "Создай привлекательный текстовый пост для социальных сетей на тему: {}\n\n\
             Требования:\n\
             - Используй эмодзи\n\
             - Добавь заголовок\n\
             - Форматируй текст по абзацам\n",
            self.topic
        )
    }
}

// ── Generator enum ────────────────────────────────────────────────────────────

/// All available generation backends.
///
/// Cheap to clone: HTTP clients are `Arc`s internally.
#[derive(Debug, Clone)]
pub enum Generator {
    GigaChat(providers::gigachat::GigaChatClient),
    Dummy(providers::dummy::DummyGenerator),
}

impl Generator {
    /// Produce a post for `topic`.
    pub async fn generate(&self, topic: &str) -> GenerationResult {
        match self {
            Generator::GigaChat(c) => c.generate(topic).await,
            Generator::Dummy(d) => d.generate(topic).await,
        }
    }

    /// [`Generator::generate`] flattened to the user-facing string.
    pub async fn generate_text(&self, topic: &str) -> String {
        render_result(&self.generate(topic).await)
    }
}
