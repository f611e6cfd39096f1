//! Turn dispatcher: routes each inbound turn to the right dialog action

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::activity::ActivityType;
use crate::dialogs::{DialogSet, DialogState, DialogTurnStatus};
use crate::error::BotResult;
use crate::main_dialog::{MainDialog, OnboardingDialog};
use crate::services::BotServices;
use crate::state::{ConversationState, UserState};
use crate::turn::TurnContext;

/// Called by the host once per conversational turn
#[async_trait]
pub trait Bot: Send + Sync {
    async fn on_turn(&self, turn: &TurnContext, cancel: &CancellationToken) -> BotResult<()>;
}

/// Main entry point and orchestration for the bot
pub struct EnterpriseBot {
    dialogs: DialogSet,
}

impl EnterpriseBot {
    /// Name of the conversation-state property holding the dialog stack
    pub const DIALOG_STATE_PROPERTY: &'static str = "EnterpriseBot";

    pub fn new(
        services: BotServices,
        conversation_state: &ConversationState,
        user_state: &UserState,
    ) -> Self {
        let mut dialogs = DialogSet::new(
            conversation_state.create_property::<DialogState>(Self::DIALOG_STATE_PROPERTY),
        );
        dialogs
            .add(MainDialog::new(services.clone(), conversation_state, user_state))
            .add(OnboardingDialog::new(services, user_state));
        Self::with_dialogs(dialogs)
    }

    /// Dispatch over an already populated dialog set; it must contain
    /// a dialog registered as [`MainDialog::ID`]
    pub fn with_dialogs(dialogs: DialogSet) -> Self {
        Self { dialogs }
    }

    pub fn dialogs(&self) -> &DialogSet {
        &self.dialogs
    }
}

#[async_trait]
impl Bot for EnterpriseBot {
    async fn on_turn(&self, turn: &TurnContext, cancel: &CancellationToken) -> BotResult<()> {
        let mut dc = self.dialogs.create_context(turn, cancel).await?;
        let result = dc.continue_dialog().await?;

        if result.status == DialogTurnStatus::Empty {
            let activity = turn.activity();
            if activity.activity_type == ActivityType::ConversationUpdate {
                // if conversation update is not from the bot.
                if !activity.is_from_self_join() {
                    debug!(
                        conversation_id = %activity.conversation.id,
                        "starting main dialog"
                    );
                    dc.begin_dialog(MainDialog::ID, None).await?;
                }
            }
        }

        Ok(())
    }
}
