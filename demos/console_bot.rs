//! Console demo: chat with the bot from a terminal
//!
//! Each line read from stdin becomes a message in a single conversation.
//! Set RUST_LOG (e.g. `debug`) to see the turn pipeline; BOT_SETTINGS may
//! point at a JSON settings file.

use enterprise_bot::{
    Activity, BotAdapter, BotServices, BotSettings, BotState, CancellationToken, ChannelAccount,
    ConversationAccount, EnterpriseBot, ErrorReplyHandler, MemoryStorage,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt};

fn address(activity: Activity) -> Activity {
    activity.addressed(
        "console",
        ChannelAccount::new("console-user").with_name("You"),
        ChannelAccount::new("enterprise-bot").with_name("Bot"),
        ConversationAccount::new("console"),
    )
}

fn print_replies(replies: &[Activity]) {
    for reply in replies {
        if let Some(text) = &reply.text {
            println!("bot> {text}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(true)
        .init();

    let settings = BotSettings::from_env()?;
    let storage = Arc::new(MemoryStorage::new());
    let conversation_state = BotState::conversation(storage.clone());
    let user_state = BotState::user(storage);

    let bot = EnterpriseBot::new(
        BotServices::from_settings(settings.clone()),
        &conversation_state,
        &user_state,
    );
    let adapter = BotAdapter::new(conversation_state.clone(), user_state).with_error_handler(
        Arc::new(ErrorReplyHandler::new(settings.error_message, conversation_state)),
    );

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let join = address(Activity::conversation_update(vec![ChannelAccount::new(
        "console-user",
    )]));
    print_replies(&adapter.process_activity(join, &bot, &cancel).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancel.cancelled() => None,
        };
        let Some(line) = line else { break };

        let replies = adapter
            .process_activity(address(Activity::message(line)), &bot, &cancel)
            .await?;
        print_replies(&replies);
    }

    Ok(())
}
