//! Shared state for the Comms subsystem: the capability boundary for channels.
//!
//! Channels receive an `Arc<CommsState>` and reach the conversation
//! controller only through [`CommsState::handle_message`].

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::subsystems::conversation::{ConversationController, Inbound, Outbound};

pub struct CommsState {
    controller: Arc<ConversationController>,
}

impl CommsState {
    pub fn new(controller: Arc<ConversationController>) -> Self {
        Self { controller }
    }

    /// Hand `msg` to the conversation controller. Replies arrive on
    /// `outbox` in order; the future resolves after the last one is queued.
    pub async fn handle_message(&self, msg: Inbound, outbox: &mpsc::Sender<Outbound>) {
        self.controller.handle(msg, outbox).await;
    }
}
