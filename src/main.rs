use std::io::{self as std_io, Write};

use clap::Parser;
use console::style;
use tokio::io::{self, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

use reminder_bot::client::ReminderBot;
use reminder_bot::config::{Config, StorageConfig};
use reminder_bot::domains::user::User;
use reminder_bot::error::{ReminderBotError, Result};
use reminder_bot::tools::create_reminder::format_local_timestamp;

#[derive(Parser, Debug)]
#[command(name = "reminder-bot")]
#[command(about = "Conversational reminder assistant")]
struct Cli {
    /// JSON config file; environment variables are used when omitted.
    #[arg(long, env = "REMINDER_BOT_CONFIG")]
    config: Option<String>,

    /// SQLite database path, overrides the configured storage.
    #[arg(long)]
    db: Option<String>,

    #[arg(long, default_value = "cli_user")]
    user_id: String,

    /// IANA timezone name used to interpret reminder times.
    #[arg(long, env = "REMINDER_BOT_TIMEZONE", default_value = "UTC")]
    timezone: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List stored reminders for the user.
    Reminders,
    /// Delete the user's conversation history.
    ClearHistory,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?.resolve_env(),
        None => Config::from_env(),
    };
    if let Some(db) = &cli.db {
        config.storage = Some(StorageConfig {
            sqlite_path: Some(db.clone()),
        });
    }
    Ok(config)
}

fn print_user_prompt() -> std_io::Result<()> {
    let mut out = std_io::stdout();
    write!(
        out,
        "{} {} ",
        style("➜").color256(45).bold(),
        style("You").color256(81).bold()
    )?;
    out.flush()
}

fn print_reply(reply: Option<&str>) {
    let text = reply.unwrap_or("");
    println!(
        "{} {}",
        style("⏰ Reminder Bot:").color256(214).bold(),
        text
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,reminder_bot=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std_io::stderr)
        .init();

    let cli = Cli::parse();
    let user = User::with_timezone_name(cli.user_id.clone(), &cli.timezone)?;
    let bot = ReminderBot::from_config(load_config(&cli)?).await?;

    match cli.command {
        Some(Commands::Reminders) => {
            let reminders = bot.list_reminders(user.id()).await?;
            if reminders.is_empty() {
                println!("{}", style("No reminders.").color256(245));
            }
            for reminder in reminders {
                let local = user.local_time(reminder.reminder_at);
                let recurrence = reminder
                    .recurrence
                    .map(|r| format!(" (every {} {})", r.frequency, r.unit))
                    .unwrap_or_default();
                println!(
                    "- {} {}{}",
                    style(format_local_timestamp(&local)).color256(81),
                    reminder.content,
                    recurrence
                );
            }
            return Ok(());
        }
        Some(Commands::ClearHistory) => {
            bot.delete_user_history(user.id()).await?;
            println!("History cleared for {}", user.id());
            return Ok(());
        }
        None => {}
    }

    println!(
        "{}",
        style(format!(
            "User: {} • Timezone: {} • Ctrl+D to exit",
            user.id(),
            user.timezone()
        ))
        .color256(245)
    );
    let stdin = io::BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    loop {
        print_user_prompt().map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        let line = lines
            .next_line()
            .await
            .map_err(|e| ReminderBotError::Runtime(e.to_string()))?;
        let Some(line) = line else {
            println!("\n{}", style("Goodbye").color256(245));
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = bot.handle_message(&user, line.trim()).await?;
        print_reply(reply.as_deref());
    }

    Ok(())
}
