//! PTY (console) comms channel — reads lines from stdin, hands them to the
//! conversation controller as chat `0`, prints the replies to stdout.
//!
//! Meant for local runs, typically with the dummy generator. Runs until the
//! `shutdown` token is cancelled (Ctrl-C) or stdin is closed.

use std::env;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::CommsState;
use crate::error::AppError;
use crate::subsystems::conversation::{ChatId, Inbound, Outbound};
use crate::subsystems::runtime::{Component, ComponentFuture};

const CONSOLE_CHAT_ID: ChatId = 0;

// ── PtyChannel ────────────────────────────────────────────────────────────────

pub struct PtyChannel {
    channel_id: String,
    state: Arc<CommsState>,
}

impl PtyChannel {
    pub fn new(channel_id: impl Into<String>, state: Arc<CommsState>) -> Self {
        Self { channel_id: channel_id.into(), state }
    }
}

impl Component for PtyChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(run_pty(self.channel_id, self.state, shutdown))
    }
}

// ── run_pty ───────────────────────────────────────────────────────────────────

async fn run_pty(
    channel_id: String,
    state: Arc<CommsState>,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    info!(%channel_id, "pty channel started");
    println!("─────────────────────────────────");
    println!(" GigaPost console  (Ctrl-C to quit)");
    println!(" try /start or /post");
    println!("─────────────────────────────────");

    let sender_name = env::var("USER").ok();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        use std::io::Write as _;
        let _ = std::io::stdout().flush();

        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                println!();
                info!("pty channel shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim().to_string();
                        if input.is_empty() { continue; }

                        debug!(input_len = input.len(), "pty received line");

                        let inbound = Inbound {
                            chat_id: CONSOLE_CHAT_ID,
                            sender_name: sender_name.clone(),
                            text: Some(input),
                            bot_username: None,
                        };

                        let (outbox, mut replies) = mpsc::channel::<Outbound>(8);
                        let printer = tokio::spawn(async move {
                            while let Some(out) = replies.recv().await {
                                println!("{}", out.text);
                            }
                        });
                        state.handle_message(inbound, &outbox).await;
                        drop(outbox);
                        let _ = printer.await;
                    }
                }
            }
        }
    }

    info!(%channel_id, "pty channel stopped");
    Ok(())
}
