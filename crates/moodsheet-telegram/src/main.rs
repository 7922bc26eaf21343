//! Moodsheet Telegram Bot binary.
//!
//! Start the bot with:
//! ```bash
//! TELEGRAM_BOT_TOKEN=xxx NOTION_TOKEN=yyy cargo run -p moodsheet-telegram
//! ```

use clap::Parser;
use moodsheet_core::{load_env_files, TrackerConfig};
use moodsheet_telegram::{create_shared_state, TelegramBot};
use tracing_subscriber::EnvFilter;

/// Moodsheet Telegram Bot - rate the day into a Notion tracker
#[derive(Parser, Debug)]
#[command(name = "moodsheet-telegram")]
#[command(about = "Telegram bot that records daily ratings in a Notion tracker page")]
struct Args {
    /// Do not send the daily reminder
    #[arg(long)]
    no_scheduler: bool,

    /// Print whether today is filled in as JSON and exit
    #[arg(long)]
    check: bool,

    /// Verbose logging (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let loaded = load_env_files();

    // Initialize logging based on verbosity
    let filter = match args.verbose {
        0 => "moodsheet_telegram=info,moodsheet_notion=info,moodsheet_core=info,teloxide=warn",
        1 => "moodsheet_telegram=debug,moodsheet_notion=debug,moodsheet_core=debug,teloxide=info",
        2 => "moodsheet_telegram=trace,moodsheet_notion=trace,moodsheet_core=trace,teloxide=debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    for path in &loaded {
        tracing::debug!(path = %path.display(), "Loaded env file");
    }

    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if args.check {
        let state = create_shared_state(config);
        let check = state.sheet.check_today_filled().await?;
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(());
    }

    let mut bot = TelegramBot::new(config);
    if args.no_scheduler {
        bot = bot.without_scheduler();
    }

    match bot.connect().await {
        Ok(username) => {
            println!("\n[robot] Moodsheet Telegram Bot");
            println!("   Bot: @{}", username);
            println!(
                "   Daily prompt: {}",
                if args.no_scheduler { "off" } else { "on" }
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            std::process::exit(1);
        }
    }

    println!("\n[phone] Open Telegram and send /start to begin");
    println!("   Press Ctrl+C to stop\n");

    bot.start_polling().await?;

    Ok(())
}
