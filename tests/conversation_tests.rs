//! End-to-end conversations through the adapter with the real main dialog

use enterprise_bot::{
    Activity, ActivityType, BotAdapter, BotError, BotServices, BotSettings, BotState, CancellationToken, ChannelAccount,
    ConversationAccount, ConversationData, ConversationState, EnterpriseBot, ErrorReplyHandler,
    MemoryStorage, Storage, TurnContext, UserProfile, UserState,
};
use std::sync::Arc;

struct Conversation {
    adapter: BotAdapter,
    bot: EnterpriseBot,
    storage: Arc<MemoryStorage>,
    conversation_state: ConversationState,
    user_state: UserState,
    settings: BotSettings,
}

impl Conversation {
    fn new() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        let conversation_state = BotState::conversation(storage.clone());
        let user_state = BotState::user(storage.clone());
        let settings = BotSettings::default();

        let bot = EnterpriseBot::new(
            BotServices::from_settings(settings.clone()),
            &conversation_state,
            &user_state,
        );
        let adapter = BotAdapter::new(conversation_state.clone(), user_state.clone())
            .with_error_handler(Arc::new(ErrorReplyHandler::new(
                settings.error_message.clone(),
                conversation_state.clone(),
            )));

        Self {
            adapter,
            bot,
            storage,
            conversation_state,
            user_state,
            settings,
        }
    }

    async fn send(&self, activity: Activity) -> Vec<String> {
        let activity = activity.addressed(
            "test",
            ChannelAccount::new("user-42"),
            ChannelAccount::new("bot-1"),
            ConversationAccount::new("conv-1"),
        );
        self.adapter
            .process_activity(activity, &self.bot, &CancellationToken::new())
            .await
            .unwrap()
            .into_iter()
            .filter_map(|a| a.text)
            .collect()
    }

    async fn join(&self, id: &str) -> Vec<String> {
        self.send(Activity::conversation_update(vec![ChannelAccount::new(id)]))
            .await
    }

    async fn say(&self, text: &str) -> Vec<String> {
        self.send(Activity::message(text)).await
    }

    fn state_turn(&self) -> TurnContext {
        TurnContext::new(Activity::message("lookup").addressed(
            "test",
            ChannelAccount::new("user-42"),
            ChannelAccount::new("bot-1"),
            ConversationAccount::new("conv-1"),
        ))
    }
}

#[tokio::test]
async fn test_new_user_is_onboarded() {
    let c = Conversation::new();

    let replies = c.join("user-42").await;
    assert_eq!(
        replies,
        vec![c.settings.intro_message.clone(), c.settings.name_prompt.clone()]
    );

    let replies = c.say("Ada").await;
    assert_eq!(replies, vec!["Nice to meet you, Ada!".to_string()]);

    let profile = c
        .user_state
        .create_property::<UserProfile>("UserProfile")
        .get(&c.state_turn())
        .await
        .unwrap();
    assert_eq!(profile.name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_bot_join_gets_no_reply() {
    let c = Conversation::new();

    assert!(c.join("bot-1").await.is_empty());
    // no dialog was started, so a plain message gets no reply either
    assert!(c.say("hello").await.is_empty());
}

#[tokio::test]
async fn test_intents_are_routed() {
    let c = Conversation::new();
    c.join("user-42").await;
    c.say("Ada").await;

    assert_eq!(c.say("hello").await, vec![c.settings.greeting_message.clone()]);
    assert_eq!(c.say("help me").await, vec![c.settings.help_message.clone()]);
    assert_eq!(
        c.say("get me a human").await,
        vec![c.settings.escalate_message.clone()]
    );
    assert_eq!(
        c.say("what is the meaning of life").await,
        vec![c.settings.confused_message.clone()]
    );

    let data = c
        .conversation_state
        .create_property::<ConversationData>("ConversationData")
        .get(&c.state_turn())
        .await
        .unwrap();
    assert_eq!(data.messages_routed, 4);
    assert_eq!(data.last_intent.as_deref(), Some("None"));
}

#[tokio::test]
async fn test_cancel_clears_stack_until_next_join() {
    let c = Conversation::new();
    c.join("user-42").await;
    c.say("Ada").await;

    assert_eq!(c.say("cancel").await, vec![c.settings.cancelled_message.clone()]);
    assert!(c.say("hello").await.is_empty());

    // known user: intro only, no onboarding
    assert_eq!(c.join("user-42").await, vec![c.settings.intro_message.clone()]);
    assert_eq!(c.say("hello").await, vec![c.settings.greeting_message.clone()]);
}

#[tokio::test]
async fn test_cancel_during_onboarding() {
    let c = Conversation::new();
    c.join("user-42").await;

    assert_eq!(c.say("cancel").await, vec![c.settings.cancelled_message.clone()]);

    let profile = c
        .user_state
        .create_property::<UserProfile>("UserProfile")
        .get(&c.state_turn())
        .await
        .unwrap();
    assert_eq!(profile.name, None);
}

#[tokio::test]
async fn test_empty_name_reprompts() {
    let c = Conversation::new();
    c.join("user-42").await;

    assert_eq!(c.say("   ").await, vec![c.settings.name_prompt.clone()]);
    assert_eq!(c.say("Grace").await, vec!["Nice to meet you, Grace!".to_string()]);
}

#[tokio::test]
async fn test_onboarding_ignores_non_message_activities() {
    let c = Conversation::new();
    c.join("user-42").await;

    assert!(c.send(Activity::new(ActivityType::Typing)).await.is_empty());
    assert!(c.join("user-43").await.is_empty());

    assert_eq!(c.say("Ada").await, vec!["Nice to meet you, Ada!".to_string()]);
    let profile = c
        .user_state
        .create_property::<UserProfile>("UserProfile")
        .get(&c.state_turn())
        .await
        .unwrap();
    assert_eq!(profile.name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn test_multi_word_name_with_cancel_keyword_is_kept() {
    let c = Conversation::new();
    c.join("user-42").await;

    assert_eq!(
        c.say("Quit Lee").await,
        vec!["Nice to meet you, Quit Lee!".to_string()]
    );
    assert_eq!(c.say("hello").await, vec![c.settings.greeting_message.clone()]);
}

#[tokio::test]
async fn test_state_is_persisted_per_conversation_and_user() {
    let c = Conversation::new();
    c.join("user-42").await;
    c.say("Ada").await;

    let items = c
        .storage
        .read(&[
            "test/conversations/conv-1".to_string(),
            "test/users/user-42".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(items["test/users/user-42"]["UserProfile"]["name"], "Ada");
    let stack = &items["test/conversations/conv-1"]["EnterpriseBot"]["dialogStack"];
    assert_eq!(stack.as_array().map(Vec::len), Some(1));
    assert_eq!(stack[0]["id"], "MainDialog");
}

#[tokio::test]
async fn test_failed_turn_reports_error_and_resets() {
    let c = Conversation::new();

    // a stack left behind by a dialog this bot no longer has
    let mut changes = std::collections::HashMap::new();
    changes.insert(
        "test/conversations/conv-1".to_string(),
        serde_json::json!({ "EnterpriseBot": { "dialogStack": [{ "id": "RetiredDialog" }] } }),
    );
    c.storage.write(changes).await.unwrap();

    assert_eq!(c.say("hello").await, vec![c.settings.error_message.clone()]);

    // conversation state was dropped, so the next join starts over
    assert_eq!(
        c.join("user-42").await,
        vec![c.settings.intro_message.clone(), c.settings.name_prompt.clone()]
    );
}

#[tokio::test]
async fn test_unaddressable_activity_is_an_error() {
    let c = Conversation::new();

    // without a conversation id neither the turn nor the recovery hook can reach state
    let activity = Activity::conversation_update(vec![ChannelAccount::new("user-42")]).addressed(
        "test",
        ChannelAccount::new("user-42"),
        ChannelAccount::new("bot-1"),
        ConversationAccount::new(""),
    );
    let result = c
        .adapter
        .process_activity(activity, &c.bot, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(BotError::InvalidActivity(_))));
    assert!(c.storage.is_empty().await);
}
