use std::io::Write;

use clap::Parser;
use tokio::io::{self, AsyncBufReadExt};
use tracing_subscriber::EnvFilter;

use calendar_assistant::domains::user::{Gender, Personality, User};
use calendar_assistant::error::{AssistantError, Result};
use calendar_assistant::timezone::parse_timezone;
use calendar_assistant::{AssistantFactory, AssistantReply, Config};

#[derive(Parser, Debug)]
#[command(name = "calendar-assistant")]
#[command(about = "Conversational calendar assistant")]
struct Cli {
    /// JSON configuration file; defaults apply when omitted.
    #[arg(long, env = "CALENDAR_ASSISTANT_CONFIG")]
    config: Option<String>,

    #[arg(long, default_value_t = 1)]
    user_id: i32,

    #[arg(long, default_value = "cli@localhost")]
    email: String,

    /// IANA timezone name.
    #[arg(long, default_value = "UTC")]
    timezone: String,

    #[arg(long, default_value = "assistant")]
    personality: String,

    #[arg(long, default_value = "other")]
    gender: String,

    #[arg(long, default_value = "en")]
    language: String,

    /// Print the full reply as JSON instead of the text only.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Answer one message and exit; without it, read messages from stdin.
    message: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,calendar_assistant=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .resolve_env();

    parse_timezone(&cli.timezone)?;
    let mut user = User::new(cli.user_id, cli.email.clone());
    user.timezone = cli.timezone.clone();
    user.chat_personality = Personality::parse_or_default(&cli.personality);
    user.gender = Gender::parse_or_default(&cli.gender);
    user.preferred_language = cli.language.clone();

    let assistant = AssistantFactory::create_from_config(config).await?;

    if let Some(message) = &cli.message {
        let reply = assistant.handle_message(&user, message).await;
        print_reply(&reply, cli.json)?;
        return Ok(());
    }

    let stdin = io::BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    loop {
        print!("> ");
        std::io::stdout()
            .flush()
            .map_err(|e| AssistantError::Runtime(e.to_string()))?;
        let line = lines
            .next_line()
            .await
            .map_err(|e| AssistantError::Runtime(e.to_string()))?;
        let Some(line) = line else {
            println!();
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let reply = assistant.handle_message(&user, &line).await;
        print_reply(&reply, cli.json)?;
    }

    Ok(())
}

fn print_reply(reply: &AssistantReply, json: bool) -> Result<()> {
    if json {
        let rendered = serde_json::to_string_pretty(reply)
            .map_err(|e| AssistantError::Serialization(e.to_string()))?;
        println!("{rendered}");
    } else {
        println!("{}", reply.reply_text);
    }
    Ok(())
}
