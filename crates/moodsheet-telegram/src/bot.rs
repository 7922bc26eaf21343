//! Main Telegram bot implementation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use moodsheet_core::TrackerConfig;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MenuButton};
use teloxide::utils::command::BotCommands;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TelegramError};
use crate::handlers::{bot_call, deliver, handle_callback, handle_command, handle_message, Command};
use crate::scheduler::run_daily_prompts;
use crate::state::{create_shared_state, BotState};

/// Attempts at reaching Telegram before giving up.
pub const LAUNCH_ATTEMPTS: u32 = 3;

const LAUNCH_BACKOFF_BASE_MS: u64 = 1000;
const LAUNCH_BACKOFF_CAP_MS: u64 = 10_000;

/// How often the watchdog looks for stuck handlers.
const WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);

/// Wait before retry number `attempt` (1-based): 1s, 2s, 4s... capped at 10s.
pub fn launch_backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let ms = LAUNCH_BACKOFF_BASE_MS.saturating_mul(1 << exponent);
    Duration::from_millis(ms.min(LAUNCH_BACKOFF_CAP_MS))
}

/// The moodsheet Telegram bot.
pub struct TelegramBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared state across handlers.
    state: Arc<BotState>,
    /// Whether the daily prompt task runs.
    scheduler_enabled: bool,
}

impl TelegramBot {
    /// Create a bot talking to Notion with the configured token.
    pub fn new(config: TrackerConfig) -> Self {
        let bot = Bot::new(&config.bot_token);
        let state = create_shared_state(config);
        Self {
            bot,
            state,
            scheduler_enabled: true,
        }
    }

    /// Create a TelegramBot with custom state (for testing).
    pub fn with_state(state: Arc<BotState>) -> Self {
        let bot = Bot::new(&state.config.bot_token);
        Self {
            bot,
            state,
            scheduler_enabled: true,
        }
    }

    /// Do not run the daily prompt task.
    pub fn without_scheduler(mut self) -> Self {
        self.scheduler_enabled = false;
        self
    }

    pub fn state(&self) -> &Arc<BotState> {
        &self.state
    }

    /// Reach Telegram, retrying with exponential backoff.
    ///
    /// Returns the bot's username.
    pub async fn connect(&self) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 1..=LAUNCH_ATTEMPTS {
            match bot_call("getMe", self.bot.get_me()).await {
                Ok(me) => {
                    info!(attempt, username = %me.username(), "Bot successfully connected to Telegram API");
                    return Ok(me.username().to_string());
                }
                Err(e) => {
                    error!(attempt, max = LAUNCH_ATTEMPTS, error = %e, "Failed to start bot");
                    last_error = e.to_string();
                    if attempt < LAUNCH_ATTEMPTS {
                        let wait = launch_backoff(attempt);
                        info!(wait_ms = wait.as_millis() as u64, "Retrying");
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        Err(TelegramError::BotStartFailed {
            attempts: LAUNCH_ATTEMPTS,
            last_error,
        })
    }

    /// Register the command menu. Failures are logged only.
    async fn register_menu(&self) {
        let commands = deliver("setMyCommands", self.bot.set_my_commands(Command::bot_commands()))
            .await
            .is_some();
        let button = deliver(
            "setChatMenuButton",
            self.bot.set_chat_menu_button().menu_button(MenuButton::Commands),
        )
        .await
        .is_some();

        if commands && button {
            info!("Menu commands registered");
        } else {
            warn!("Could not register menu commands");
        }
    }

    /// Start the bot in polling mode. Runs until Ctrl+C.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");
        self.register_menu().await;

        let bot = self.bot.clone();
        let state = Arc::clone(&self.state);

        if self.scheduler_enabled {
            let scheduler_bot = bot.clone();
            let scheduler_state = Arc::clone(&state);
            tokio::spawn(async move {
                run_daily_prompts(scheduler_bot, scheduler_state).await;
            });
        } else {
            info!("Daily prompt disabled");
        }

        let watchdog_state = Arc::clone(&state);
        tokio::spawn(async move {
            watchdog_loop(watchdog_state).await;
        });

        let state_for_commands = Arc::clone(&state);
        let state_for_messages = Arc::clone(&state);
        let state_for_callbacks = Arc::clone(&state);

        let handler = dptree::entry()
            .branch(
                Update::filter_callback_query()
                    .endpoint(move |bot: Bot, q: CallbackQuery| {
                        let state = Arc::clone(&state_for_callbacks);
                        async move { handle_callback(bot, q, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter_command::<Command>()
                    .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
                        let state = Arc::clone(&state_for_commands);
                        debug!(chat_id = %msg.chat.id, "Command matched: {:?}", cmd);
                        async move { handle_command(bot, msg, cmd, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .endpoint(move |bot: Bot, msg: Message| {
                        let state = Arc::clone(&state_for_messages);
                        async move { handle_message(bot, msg, state).await }
                    }),
            );

        info!("Bot is running! Send /start to begin.");

        // One queue for every update: events are handled one at a time.
        let mut dispatcher = Dispatcher::builder(bot, handler)
            .distribution_function(|_: &Update| Some(()))
            .default_handler(|upd| async move {
                warn!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build();

        match terminate_listener() {
            Ok(terminated) => {
                let token = dispatcher.shutdown_token();
                tokio::spawn(async move {
                    terminated.await;
                    info!("SIGTERM received, shutting down");
                    match token.shutdown() {
                        Ok(stopped) => stopped.await,
                        Err(e) => warn!(error = %e, "Dispatcher was not running"),
                    }
                });
            }
            Err(e) => warn!(error = %e, "Could not listen for SIGTERM"),
        }

        dispatcher.dispatch().await;

        info!("Bot stopped");
        Ok(())
    }
}

/// Resolves once the process receives SIGTERM.
///
/// The signal handler is installed before this returns, so a signal sent
/// right afterwards is not lost.
#[cfg(unix)]
pub fn terminate_listener() -> std::io::Result<impl Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        terminate.recv().await;
    })
}

/// SIGTERM does not exist here; only Ctrl-C stops the bot.
#[cfg(not(unix))]
pub fn terminate_listener() -> std::io::Result<impl Future<Output = ()>> {
    Ok(std::future::pending::<()>())
}

/// Periodically warn about handlers that have not finished.
async fn watchdog_loop(state: Arc<BotState>) {
    let mut ticker = interval(WATCHDOG_INTERVAL);
    loop {
        ticker.tick().await;
        state.watchdog.check();
    }
}
