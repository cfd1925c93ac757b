//! Conversation subsystem — turns "/post, then a topic" into a generated post.
//!
//! # State machine
//!
//! | state           | input            | reply                    | next            |
//! |-----------------|------------------|--------------------------|-----------------|
//! | `Idle`          | `/start`         | welcome                  | `Idle`          |
//! | `Idle`          | `/post`          | ask for a topic          | `AwaitingTopic` |
//! | `Idle`          | anything else    | help                     | `Idle`          |
//! | `AwaitingTopic` | any message      | progress, then the post  | `Idle`          |
//!
//! With [`TopicPrecedence::Commands`], `/start` and `/post` keep their
//! command meaning while a topic is awaited.
//!
//! Replies are pushed into an [`Outbound`] channel in the order they are
//! produced, so the progress notice always reaches the user before the
//! result. The state is reset before generation starts, whatever its
//! outcome.

mod command;
pub mod session;

pub use command::Command;
pub use session::{ChatId, Session, SessionState, SessionStore, SessionSweeper};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConversationConfig;
use crate::llm::Generator;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

// ── Reply texts ───────────────────────────────────────────────────────────────

pub const TOPIC_PROMPT: &str = "📝 *Создание поста*\n\n\
    Напиши тему для поста, и я создам для тебя интересный контент с эмодзи \
    и структурированным текстом!";

pub const IN_PROGRESS: &str = "🤖 Генерирую пост... Это может занять несколько секунд.";

pub const SUCCESS_HEADER: &str = "✅ *Ваш пост готов:*\n\n";

pub const NEED_TEXT_TOPIC: &str = "🤔 Тема поста должна быть текстом. \
    Отправь /post и напиши тему сообщением.";

pub const FALLBACK: &str = "🤔 Я не понимаю эту команду.\n\n\
    Используйте:\n\
    • /start - для начала работы\n\
    • /post - для создания поста";

pub fn welcome_text(first_name: &str) -> String {
    format!(
        "🤖 *Привет, {first_name}!*\n\n\
         Я бот для генерации текстовых постов с помощью GigaChat AI!\n\n\
         📝 *Доступные команды:*\n\
         • /start - показать это сообщение\n\
         • /post - создать новый пост\n\n\
         ✨ Чтобы создать пост, просто введи команду /post и укажи тему!"
    )
}

// ── Messages ──────────────────────────────────────────────────────────────────

/// One message received from a transport.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: ChatId,
    /// Sender's display (first) name, if the transport provides one.
    pub sender_name: Option<String>,
    /// Text body or media caption. `None` for stickers and the like.
    pub text: Option<String>,
    /// The bot's own username, used to accept `/post@<username>`.
    pub bot_username: Option<String>,
}

/// One reply to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub chat_id: ChatId,
    pub text: String,
    /// Send with Markdown formatting when the transport supports it.
    pub markup: bool,
}

/// How `/start` and `/post` are treated while a topic is awaited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TopicPrecedence {
    /// Any message, commands included, is consumed as the topic.
    #[default]
    Literal,
    /// Commands keep their meaning; only other messages become topics.
    Commands,
}

impl From<&ConversationConfig> for TopicPrecedence {
    fn from(config: &ConversationConfig) -> Self {
        if config.commands_interrupt_topic {
            TopicPrecedence::Commands
        } else {
            TopicPrecedence::Literal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Welcome,
    PromptTopic,
    Generate(String),
    NeedTextTopic,
    Fallback,
}

// ── Controller ────────────────────────────────────────────────────────────────

/// Routes each inbound message by command and session state.
pub struct ConversationController {
    sessions: Arc<SessionStore>,
    generator: Generator,
    precedence: TopicPrecedence,
}

impl ConversationController {
    pub fn new(sessions: Arc<SessionStore>, generator: Generator, precedence: TopicPrecedence) -> Self {
        Self { sessions, generator, precedence }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Handle one message, pushing every reply into `outbox`.
    ///
    /// Returns once the last reply has been queued. A closed `outbox` is
    /// logged and otherwise ignored.
    pub async fn handle(&self, msg: Inbound, outbox: &mpsc::Sender<Outbound>) {
        let command = msg
            .text
            .as_deref()
            .and_then(|t| Command::parse(t, msg.bot_username.as_deref()));

        let action = self.sessions.transition(msg.chat_id, |state| {
            decide(state, command, msg.text.as_deref(), self.precedence)
        });

        debug!(chat_id = msg.chat_id, ?command, ?action, "routed message");

        let reply = |text: String, markup: bool| Outbound { chat_id: msg.chat_id, text, markup };

        match action {
            Action::Welcome => {
                let name = msg.sender_name.as_deref().unwrap_or("друг");
                emit(outbox, reply(welcome_text(name), true)).await;
            }
            Action::PromptTopic => emit(outbox, reply(TOPIC_PROMPT.into(), true)).await,
            Action::NeedTextTopic => emit(outbox, reply(NEED_TEXT_TOPIC.into(), false)).await,
            Action::Fallback => emit(outbox, reply(FALLBACK.into(), false)).await,
            Action::Generate(topic) => {
                emit(outbox, reply(IN_PROGRESS.into(), false)).await;
                info!(chat_id = msg.chat_id, topic_len = topic.len(), "generating post");
                match self.generator.generate(&topic).await {
                    Ok(post) => {
                        emit(outbox, reply(format!("{SUCCESS_HEADER}{post}"), true)).await;
                    }
                    Err(failure) => {
                        warn!(chat_id = msg.chat_id, %failure, "post generation failed");
                        let text = crate::llm::render_result(&Err(failure));
                        emit(outbox, reply(text, false)).await;
                    }
                }
            }
        }
    }
}

/// Pure transition function: `(state, input) -> (next state, action)`.
fn decide(
    state: SessionState,
    command: Option<Command>,
    text: Option<&str>,
    precedence: TopicPrecedence,
) -> (SessionState, Action) {
    use SessionState::*;

    match (state, command) {
        (AwaitingTopic, Some(Command::Start)) if precedence == TopicPrecedence::Commands => {
            (Idle, Action::Welcome)
        }
        (AwaitingTopic, Some(Command::Post)) if precedence == TopicPrecedence::Commands => {
            (AwaitingTopic, Action::PromptTopic)
        }
        (AwaitingTopic, _) => match text {
            Some(topic) => (Idle, Action::Generate(topic.to_string())),
            None => (Idle, Action::NeedTextTopic),
        },
        (Idle, Some(Command::Start)) => (Idle, Action::Welcome),
        (Idle, Some(Command::Post)) => (AwaitingTopic, Action::PromptTopic),
        (Idle, None) => (Idle, Action::Fallback),
    }
}

async fn emit(outbox: &mpsc::Sender<Outbound>, out: Outbound) {
    if outbox.send(out).await.is_err() {
        warn!("reply dropped: outbox closed");
    }
}

// ── start ─────────────────────────────────────────────────────────────────────

/// Spawn the session sweeper when an idle TTL is configured.
pub fn start(
    config: &ConversationConfig,
    sessions: Arc<SessionStore>,
    shutdown: CancellationToken,
) -> Option<SubsystemHandle> {
    let ttl = config.session_ttl_seconds?;
    let sweeper = SessionSweeper::new(
        sessions,
        Duration::from_secs(ttl),
        Duration::from_secs(config.sweep_interval_seconds),
    );
    let components: Vec<Box<dyn Component>> = vec![Box::new(sweeper)];
    Some(spawn_components(components, shutdown))
}
