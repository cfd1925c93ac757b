//! Generator implementations.
//!
//! `build(config, api_key)` is the factory, called once at startup.

pub mod dummy;
pub mod gigachat;
pub mod token_cache;

use crate::config::GeneratorConfig;
use crate::llm::{Generator, ProviderError};

/// Construct a [`Generator`] from config and the `GIGACHAT_API_KEY` value.
pub fn build(config: &GeneratorConfig, api_key: Option<String>) -> Result<Generator, ProviderError> {
    match config.provider.as_str() {
        "dummy" => Ok(Generator::Dummy(dummy::DummyGenerator)),
        "gigachat" => {
            let key = api_key.ok_or(ProviderError::MissingCredential("GIGACHAT_API_KEY"))?;
            let client = gigachat::GigaChatClient::new(&config.gigachat, key)?;
            Ok(Generator::GigaChat(client))
        }
        _ => Err(ProviderError::UnknownProvider(config.provider.clone())),
    }
}
