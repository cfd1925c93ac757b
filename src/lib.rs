//! GigaPost bot — Telegram bot that writes social media posts with GigaChat.
//!
//! A user sends `/post`, then a topic; the bot authenticates against the
//! GigaChat OAuth endpoint, requests a completion and relays the text back.
//!
//! - [`subsystems::conversation`] — per-chat state machine and controller.
//! - [`llm`] — generation backends (GigaChat, dummy).
//! - [`subsystems::comms`] — Telegram and console transports.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod subsystems;
