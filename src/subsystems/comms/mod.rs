//! Comms subsystem — manages the chat transports.
//!
//! Each channel (Telegram, console) implements [`Component`] and is spawned
//! as an independent task by [`start`]. Channels capture a shared
//! [`Arc<CommsState>`] at construction time.

mod state;
#[cfg(feature = "channel-pty")]
pub mod pty;
#[cfg(feature = "channel-telegram")]
pub mod telegram;

pub use state::CommsState;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::subsystems::conversation::ConversationController;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

/// Split `text` into pieces of at most `max_chars` characters.
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

// ── start ─────────────────────────────────────────────────────────────────────

/// Spawn all configured channels and return a [`SubsystemHandle`].
///
/// Synchronous: returns as soon as the tasks are spawned.
pub fn start(
    config: &Config,
    controller: Arc<ConversationController>,
    shutdown: CancellationToken,
) -> Result<SubsystemHandle, AppError> {
    let state = Arc::new(CommsState::new(controller));

    let mut components: Vec<Box<dyn Component>> = Vec::new();

    if config.comms_telegram_should_load() {
        #[cfg(feature = "channel-telegram")]
        {
            let token = config
                .secrets
                .telegram_token
                .clone()
                .ok_or_else(|| AppError::Config("TELEGRAM_BOT_TOKEN is not set".into()))?;
            info!("loading telegram channel");
            components.push(Box::new(telegram::TelegramChannel::new("telegram0", token, state.clone())));
        }
        #[cfg(not(feature = "channel-telegram"))]
        tracing::warn!("telegram channel enabled in config but built without `channel-telegram`");
    }

    if config.comms_pty_should_load() {
        #[cfg(feature = "channel-pty")]
        {
            info!("loading pty channel");
            components.push(Box::new(pty::PtyChannel::new("pty0", state.clone())));
        }
        #[cfg(not(feature = "channel-pty"))]
        tracing::warn!("pty channel enabled in config but built without `channel-pty`");
    }

    if components.is_empty() {
        return Err(AppError::Config("no comms channel could be loaded".into()));
    }

    Ok(spawn_components(components, shutdown))
}
