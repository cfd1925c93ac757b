//! Telegram comms channel — long-polls the Bot API, hands each message to
//! the conversation controller and delivers its replies in order.
//!
//! The teloxide dispatcher processes updates from one chat sequentially and
//! different chats concurrently, so a slow generation only holds up the
//! chat that asked for it.

use std::sync::Arc;

use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::{ApiError, RequestError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::CommsState;
use super::chunk_text;
use crate::error::AppError;
use crate::subsystems::conversation::{Inbound, Outbound};
use crate::subsystems::runtime::{Component, ComponentFuture};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Telegram has a 4096 character limit per message; chunk below it.
const MAX_MESSAGE_LENGTH: usize = 4000;

// ── TelegramChannel ───────────────────────────────────────────────────────────

pub struct TelegramChannel {
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
}

impl TelegramChannel {
    pub fn new(channel_id: impl Into<String>, token: String, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), token, state }
    }
}

impl Component for TelegramChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_telegram(self.channel_id, self.token, self.state, shutdown))
    }
}

// ── run_telegram ──────────────────────────────────────────────────────────────

async fn run_telegram(
    channel_id: String,
    token: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let bot = Bot::new(token);

    let bot_username = match bot.get_me().await {
        Ok(me) => me.user.username.clone(),
        Err(e) if rejects_token(&e) => {
            return Err(AppError::Comms(format!("{channel_id}: get_me failed: {e}")));
        }
        Err(e) => {
            warn!(%channel_id, "get_me failed, accepting commands addressed to any bot: {e}");
            None
        }
    };

    info!(%channel_id, username = ?bot_username, "telegram channel starting");

    let state_clone = state.clone();
    let channel_id_clone = channel_id.clone();

    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let state = state_clone.clone();
        let channel_id = channel_id_clone.clone();
        let bot_username = bot_username.clone();
        async move {
            debug!(%channel_id, chat_id = msg.chat.id.0, "telegram received message");

            let inbound = Inbound {
                chat_id: msg.chat.id.0,
                sender_name: msg.from.as_ref().map(|u| u.first_name.clone()),
                text: msg.text().or_else(|| msg.caption()).map(str::to_string),
                bot_username,
            };

            let (outbox, replies) = mpsc::channel::<Outbound>(8);
            let delivery = tokio::spawn(deliver(bot, replies));
            state.handle_message(inbound, &outbox).await;
            drop(outbox);
            if let Err(e) = delivery.await {
                warn!(%channel_id, "reply delivery task failed: {e}");
            }
            respond(())
        }
    });

    let mut dispatcher = Dispatcher::builder(bot, handler).build();

    tokio::select! {
        biased;

        _ = shutdown.cancelled() => {
            info!(%channel_id, "shutdown signal received, closing telegram channel");
            Ok(())
        }
        _ = dispatcher.dispatch() => {
            Err(AppError::Comms(format!("{channel_id}: telegram dispatcher exited unexpectedly")))
        }
    }
}

/// Telegram refused the bot token itself. Polling with it can never succeed.
fn rejects_token(e: &RequestError) -> bool {
    matches!(e, RequestError::Api(ApiError::InvalidToken))
}

/// Send every queued reply, in order, until the controller is done.
async fn deliver(bot: Bot, mut replies: mpsc::Receiver<Outbound>) {
    while let Some(out) = replies.recv().await {
        send_reply(&bot, &out).await;
    }
}

// Legacy Markdown: reply texts use single-asterisk bold.
#[allow(deprecated)]
async fn send_reply(bot: &Bot, out: &Outbound) {
    let chat = ChatId(out.chat_id);
    let text = if out.text.is_empty() { "(empty response)" } else { out.text.as_str() };

    for chunk in chunk_text(text, MAX_MESSAGE_LENGTH) {
        if out.markup {
            match bot.send_message(chat, chunk.clone()).parse_mode(ParseMode::Markdown).await {
                Ok(_) => continue,
                // Generated posts often contain markup Telegram refuses.
                Err(e) => debug!(chat_id = out.chat_id, "markdown rejected, resending as plain text: {e}"),
            }
        }
        if let Err(e) = bot.send_message(chat, chunk).await {
            warn!(chat_id = out.chat_id, "failed to send telegram reply: {e}");
        }
    }
}
