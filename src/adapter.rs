//! Host turn pipeline
//!
//! The adapter turns an inbound [`Activity`] into a [`TurnContext`], runs the
//! bot, saves conversation and user state, and hands back whatever the bot
//! sent. It is also where turn failures end up.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::activity::Activity;
use crate::bot::Bot;
use crate::error::{BotError, BotResult};
use crate::state::{ConversationState, UserState};
use crate::turn::TurnContext;

/// Recovery hook for a failed turn
#[async_trait]
pub trait OnTurnError: Send + Sync {
    async fn on_turn_error(&self, turn: &TurnContext, error: &BotError) -> BotResult<()>;
}

/// Tells the user something went wrong and drops the conversation state,
/// so the next turn starts from an empty dialog stack
pub struct ErrorReplyHandler {
    message: String,
    conversation_state: ConversationState,
}

impl ErrorReplyHandler {
    pub fn new(message: impl Into<String>, conversation_state: ConversationState) -> Self {
        Self {
            message: message.into(),
            conversation_state,
        }
    }
}

#[async_trait]
impl OnTurnError for ErrorReplyHandler {
    async fn on_turn_error(&self, turn: &TurnContext, _error: &BotError) -> BotResult<()> {
        turn.send_text(self.message.as_str()).await;
        self.conversation_state.delete(turn).await
    }
}

/// Runs bots turn by turn against a pair of state stores
pub struct BotAdapter {
    conversation_state: ConversationState,
    user_state: UserState,
    on_turn_error: Option<Arc<dyn OnTurnError>>,
}

impl BotAdapter {
    pub fn new(conversation_state: ConversationState, user_state: UserState) -> Self {
        Self {
            conversation_state,
            user_state,
            on_turn_error: None,
        }
    }

    /// Install a recovery hook; without one, turn errors are returned to the caller
    pub fn with_error_handler(mut self, handler: Arc<dyn OnTurnError>) -> Self {
        self.on_turn_error = Some(handler);
        self
    }

    /// Run one turn and return the activities the bot sent
    #[instrument(
        skip_all,
        fields(
            activity_type = activity.activity_type.as_str(),
            conversation_id = %activity.conversation.id,
        )
    )]
    pub async fn process_activity(
        &self,
        activity: Activity,
        bot: &dyn Bot,
        cancel: &CancellationToken,
    ) -> BotResult<Vec<Activity>> {
        let turn = TurnContext::new(activity);
        info!("turn started");

        if let Err(err) = self.run_turn(&turn, bot, cancel).await {
            error!(error = %err, "turn failed");
            let Some(handler) = &self.on_turn_error else {
                return Err(err);
            };
            // the turn's own failure is what the caller needs to see
            if let Err(hook_err) = handler.on_turn_error(&turn, &err).await {
                error!(error = %err, hook_error = %hook_err, "turn error handler failed");
                return Err(err);
            }
        }

        let responses = turn.responses().await;
        info!(responses = responses.len(), "turn finished");
        Ok(responses)
    }

    async fn run_turn(
        &self,
        turn: &TurnContext,
        bot: &dyn Bot,
        cancel: &CancellationToken,
    ) -> BotResult<()> {
        bot.on_turn(turn, cancel).await?;
        self.conversation_state.save_changes(turn, false).await?;
        self.user_state.save_changes(turn, false).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::{ChannelAccount, ConversationAccount};
    use crate::state::MemoryStorage;

    struct FailingBot;

    #[async_trait]
    impl Bot for FailingBot {
        async fn on_turn(&self, turn: &TurnContext, _cancel: &CancellationToken) -> BotResult<()> {
            turn.send_text("partial").await;
            Err(BotError::DialogNotFound("ghost".to_string()))
        }
    }

    fn message() -> Activity {
        Activity::message("hi").addressed(
            "test",
            ChannelAccount::new("user-42"),
            ChannelAccount::new("bot-1"),
            ConversationAccount::new("conv-1"),
        )
    }

    #[tokio::test]
    async fn test_error_propagates_without_handler() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = BotAdapter::new(
            ConversationState::conversation(storage.clone()),
            UserState::user(storage),
        );

        let err = adapter
            .process_activity(message(), &FailingBot, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::DialogNotFound(_)));
    }

    #[tokio::test]
    async fn test_error_handler_replies() {
        let storage = Arc::new(MemoryStorage::new());
        let conversation = ConversationState::conversation(storage.clone());
        let adapter = BotAdapter::new(conversation.clone(), UserState::user(storage))
            .with_error_handler(Arc::new(ErrorReplyHandler::new("oops", conversation)));

        let replies = adapter
            .process_activity(message(), &FailingBot, &CancellationToken::new())
            .await
            .unwrap();

        let texts: Vec<_> = replies.iter().filter_map(|a| a.text.as_deref()).collect();
        assert_eq!(texts, vec!["partial", "oops"]);
    }

    struct BrokenHandler;

    #[async_trait]
    impl OnTurnError for BrokenHandler {
        async fn on_turn_error(&self, _turn: &TurnContext, _error: &BotError) -> BotResult<()> {
            Err(BotError::Storage("backend unavailable".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failing_handler_returns_turn_error() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = BotAdapter::new(
            ConversationState::conversation(storage.clone()),
            UserState::user(storage),
        )
        .with_error_handler(Arc::new(BrokenHandler));

        let err = adapter
            .process_activity(message(), &FailingBot, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BotError::DialogNotFound(id) if id == "ghost"));
    }
}
