//! GigaPost bot — entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger, then validate config (missing credentials abort startup)
//!   4. Build the generator and conversation controller
//!   5. Start the comms channels (and the session sweeper, if configured)
//!   6. Run until Ctrl-C or a channel fails

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use gigapost_bot::config::{self, Config};
use gigapost_bot::error::AppError;
use gigapost_bot::llm::providers;
use gigapost_bot::logger;
use gigapost_bot::subsystems::comms;
use gigapost_bot::subsystems::conversation::{self, ConversationController, SessionStore, TopicPrecedence};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;

    // RUST_LOG, when set, wins over the configured level.
    logger::init(&config.log_level)?;

    config.validate()?;

    info!(
        bot_name = %config.bot_name,
        generator = %config.generator.provider,
        telegram = config.comms_telegram_should_load(),
        pty = config.comms_pty_should_load(),
        "config loaded"
    );

    run_bot(config).await
}

async fn run_bot(config: Config) -> Result<(), AppError> {
    let generator = providers::build(&config.generator, config.secrets.gigachat_api_key.clone())?;

    let sessions = Arc::new(SessionStore::new());
    let precedence = TopicPrecedence::from(&config.conversation);
    if precedence == TopicPrecedence::Commands {
        info!("commands interrupt a pending topic");
    }
    let controller = Arc::new(ConversationController::new(sessions.clone(), generator, precedence));

    let shutdown = CancellationToken::new();
    let sweeper = conversation::start(&config.conversation, sessions, shutdown.clone());
    let comms = comms::start(&config, controller, shutdown.clone())?;

    info!("bot is running");

    let result = comms.run_until(tokio::signal::ctrl_c(), &shutdown).await;
    shutdown.cancel();

    if let Some(sweeper) = sweeper {
        sweeper.join().await?;
    }
    result
}
