//! Subsystem modules for the GigaPost bot.

pub mod comms;
pub mod conversation;
pub mod runtime;
