//! Main conversational flow: introduction, onboarding and intent routing

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::activity::ActivityType;
use crate::dialogs::{Dialog, DialogContext, DialogReason, DialogTurnResult};
use crate::error::BotResult;
use crate::services::{BotServices, Intent};
use crate::state::{ConversationState, StatePropertyAccessor, UserState};

/// What we know about a user, kept in user state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: Option<String>,
}

/// Per-conversation bookkeeping, kept in conversation state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationData {
    pub last_intent: Option<String>,
    pub messages_routed: u32,
}

/// Routes user messages by intent; onboards users it doesn't know yet
pub struct MainDialog {
    services: BotServices,
    conversation_data: StatePropertyAccessor<ConversationData>,
    user_profile: StatePropertyAccessor<UserProfile>,
}

impl MainDialog {
    pub const ID: &'static str = "MainDialog";

    pub fn new(
        services: BotServices,
        conversation_state: &ConversationState,
        user_state: &UserState,
    ) -> Self {
        Self {
            services,
            conversation_data: conversation_state.create_property("ConversationData"),
            user_profile: user_state.create_property("UserProfile"),
        }
    }

    async fn route(&self, dc: &mut DialogContext, text: &str) -> BotResult<DialogTurnResult> {
        let settings = &self.services.settings;
        let intent = self.services.recognizer.recognize(text);
        info!(?intent, "routing message");

        let mut data = self.conversation_data.get(dc.turn()).await?;
        data.last_intent = Some(format!("{intent:?}"));
        data.messages_routed += 1;
        self.conversation_data.set(dc.turn(), &data).await?;

        let reply = match intent {
            Intent::Greeting => &settings.greeting_message,
            Intent::Help => &settings.help_message,
            Intent::Escalate => &settings.escalate_message,
            Intent::None => &settings.confused_message,
            Intent::Cancel => {
                dc.turn().send_text(settings.cancelled_message.as_str()).await;
                return dc.cancel_all_dialogs().await;
            }
        };
        dc.turn().send_text(reply.as_str()).await;
        Ok(DialogTurnResult::waiting())
    }
}

#[async_trait]
impl Dialog for MainDialog {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        dc.turn()
            .send_text(self.services.settings.intro_message.as_str())
            .await;

        let profile = self.user_profile.get(dc.turn()).await?;
        if profile.name.is_none() {
            return dc.begin_dialog(OnboardingDialog::ID, None).await;
        }
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> BotResult<DialogTurnResult> {
        let Some(text) = dc.turn().activity().as_message_text().map(str::to_string) else {
            return Ok(DialogTurnResult::waiting());
        };
        self.route(dc, &text).await
    }

    async fn resume_dialog(
        &self,
        _dc: &mut DialogContext,
        _reason: DialogReason,
        _result: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        Ok(DialogTurnResult::waiting())
    }
}

/// Asks for the user's name and remembers it
pub struct OnboardingDialog {
    services: BotServices,
    user_profile: StatePropertyAccessor<UserProfile>,
}

impl OnboardingDialog {
    pub const ID: &'static str = "OnboardingDialog";

    pub fn new(services: BotServices, user_state: &UserState) -> Self {
        Self {
            services,
            user_profile: user_state.create_property("UserProfile"),
        }
    }
}

#[async_trait]
impl Dialog for OnboardingDialog {
    fn id(&self) -> &str {
        Self::ID
    }

    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        _options: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        dc.turn()
            .send_text(self.services.settings.name_prompt.as_str())
            .await;
        Ok(DialogTurnResult::waiting())
    }

    async fn continue_dialog(&self, dc: &mut DialogContext) -> BotResult<DialogTurnResult> {
        if dc.turn().activity().activity_type != ActivityType::Message {
            return Ok(DialogTurnResult::waiting());
        }

        let settings = &self.services.settings;
        let name = dc
            .turn()
            .activity()
            .as_message_text()
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        let Some(name) = name else {
            dc.turn().send_text(settings.name_prompt.as_str()).await;
            return Ok(DialogTurnResult::waiting());
        };

        // only a bare keyword cancels; longer replies are names
        let single_word = !name.contains(char::is_whitespace);
        if single_word && self.services.recognizer.recognize(&name) == Intent::Cancel {
            dc.turn().send_text(settings.cancelled_message.as_str()).await;
            return dc.cancel_all_dialogs().await;
        }

        let mut profile = self.user_profile.get(dc.turn()).await?;
        profile.name = Some(name.clone());
        self.user_profile.set(dc.turn(), &profile).await?;

        dc.turn().send_text(settings.greet_by_name(&name)).await;
        dc.end_dialog(Some(Value::String(name))).await
    }
}
