//! Turn context: one inbound activity and everything scoped to handling it

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::activity::Activity;

/// State loaded for one `BotState` during a turn
#[derive(Debug, Clone, Default)]
pub struct CachedState {
    /// Property name to serialized value
    pub state: serde_json::Map<String, Value>,
    /// Serialized form at load time, used to detect changes
    pub hash: String,
}

impl CachedState {
    pub fn new(state: serde_json::Map<String, Value>) -> Self {
        let hash = Value::Object(state.clone()).to_string();
        Self { state, hash }
    }

    /// Whether the state differs from what was loaded
    pub fn is_changed(&self) -> bool {
        Value::Object(self.state.clone()).to_string() != self.hash
    }
}

#[derive(Debug)]
struct TurnInner {
    activity: Activity,
    turn_state: Mutex<HashMap<String, CachedState>>,
    responses: Mutex<Vec<Activity>>,
}

/// Context for a single turn
///
/// Clones share the same turn; dropping the last clone ends it.
#[derive(Debug, Clone)]
pub struct TurnContext {
    inner: Arc<TurnInner>,
}

impl TurnContext {
    pub fn new(activity: Activity) -> Self {
        Self {
            inner: Arc::new(TurnInner {
                activity,
                turn_state: Mutex::new(HashMap::new()),
                responses: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The inbound activity
    pub fn activity(&self) -> &Activity {
        &self.inner.activity
    }

    /// Queue an outbound activity
    pub async fn send_activity(&self, activity: Activity) {
        tracing::debug!(
            conversation_id = %activity.conversation.id,
            activity_type = activity.activity_type.as_str(),
            "sending activity"
        );
        self.inner.responses.lock().await.push(activity);
    }

    /// Reply to the inbound activity with a text message
    pub async fn send_text(&self, text: impl Into<String>) {
        let reply = self.inner.activity.create_reply(text);
        self.send_activity(reply).await;
    }

    /// Activities sent so far this turn
    pub async fn responses(&self) -> Vec<Activity> {
        self.inner.responses.lock().await.clone()
    }

    /// Whether anything has been sent this turn
    pub async fn responded(&self) -> bool {
        !self.inner.responses.lock().await.is_empty()
    }

    pub(crate) async fn cached_state(&self, name: &str) -> Option<CachedState> {
        self.inner.turn_state.lock().await.get(name).cloned()
    }

    pub(crate) async fn set_cached_state(&self, name: &str, cached: CachedState) {
        self.inner
            .turn_state
            .lock()
            .await
            .insert(name.to_string(), cached);
    }

    pub(crate) async fn remove_cached_state(&self, name: &str) {
        self.inner.turn_state.lock().await.remove(name);
    }

    /// Apply `f` to the cached state named `name`, if loaded
    pub(crate) async fn update_cached_state<R>(
        &self,
        name: &str,
        f: impl FnOnce(&mut CachedState) -> R,
    ) -> Option<R> {
        self.inner.turn_state.lock().await.get_mut(name).map(f)
    }
}
