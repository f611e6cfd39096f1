//! Conversation and user state
//!
//! State is kept in a [`Storage`] backend and cached on the [`TurnContext`]
//! for the duration of a turn. Handlers read and write typed properties
//! through a [`StatePropertyAccessor`]; the adapter saves changes once the
//! turn completes.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{BotError, BotResult};
use crate::turn::{CachedState, TurnContext};

/// Key-value persistence backend
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the given keys; missing keys are absent from the result
    async fn read(&self, keys: &[String]) -> BotResult<HashMap<String, Value>>;

    /// Write each key, replacing any existing value
    async fn write(&self, changes: HashMap<String, Value>) -> BotResult<()>;

    /// Remove the given keys
    async fn delete(&self, keys: &[String]) -> BotResult<()>;
}

/// In-process storage, lost on restart
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, keys: &[String]) -> BotResult<HashMap<String, Value>> {
        let items = self.items.read().await;
        Ok(keys
            .iter()
            .filter_map(|k| items.get(k).map(|v| (k.clone(), v.clone())))
            .collect())
    }

    async fn write(&self, changes: HashMap<String, Value>) -> BotResult<()> {
        self.items.write().await.extend(changes);
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> BotResult<()> {
        let mut items = self.items.write().await;
        for key in keys {
            items.remove(key);
        }
        Ok(())
    }
}

/// Which identity a state store is keyed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    Conversation,
    User,
}

/// A state store scoped to the conversation or the user of a turn
#[derive(Clone)]
pub struct BotState {
    storage: Arc<dyn Storage>,
    scope: StateScope,
    name: &'static str,
}

/// State shared by everyone in a conversation
pub type ConversationState = BotState;

/// State that follows a user across conversations on a channel
pub type UserState = BotState;

impl BotState {
    pub fn conversation(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            scope: StateScope::Conversation,
            name: "ConversationState",
        }
    }

    pub fn user(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            scope: StateScope::User,
            name: "UserState",
        }
    }

    pub fn scope(&self) -> StateScope {
        self.scope
    }

    /// Storage key for the turn's conversation or user
    pub fn storage_key(&self, turn: &TurnContext) -> BotResult<String> {
        let activity = turn.activity();
        if activity.channel_id.is_empty() {
            return Err(BotError::InvalidActivity("missing channel id".to_string()));
        }
        match self.scope {
            StateScope::Conversation => {
                if activity.conversation.id.is_empty() {
                    return Err(BotError::InvalidActivity(
                        "missing conversation id".to_string(),
                    ));
                }
                Ok(format!(
                    "{}/conversations/{}",
                    activity.channel_id, activity.conversation.id
                ))
            }
            StateScope::User => {
                if activity.from.id.is_empty() {
                    return Err(BotError::InvalidActivity("missing sender id".to_string()));
                }
                Ok(format!("{}/users/{}", activity.channel_id, activity.from.id))
            }
        }
    }

    /// Load state into the turn cache; a no-op if already loaded unless `force`
    pub async fn load(&self, turn: &TurnContext, force: bool) -> BotResult<()> {
        if !force && turn.cached_state(self.name).await.is_some() {
            return Ok(());
        }

        let key = self.storage_key(turn)?;
        let mut items = self.storage.read(std::slice::from_ref(&key)).await?;
        let state = match items.remove(&key) {
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(BotError::Storage(format!(
                    "expected object at {key}, found {other}"
                )));
            }
            None => serde_json::Map::new(),
        };

        debug!(state = self.name, key = %key, properties = state.len(), "state loaded");
        turn.set_cached_state(self.name, CachedState::new(state)).await;
        Ok(())
    }

    /// Write cached state back to storage if it changed, or always when `force`
    pub async fn save_changes(&self, turn: &TurnContext, force: bool) -> BotResult<()> {
        let Some(cached) = turn.cached_state(self.name).await else {
            return Ok(());
        };
        if !force && !cached.is_changed() {
            return Ok(());
        }

        let key = self.storage_key(turn)?;
        let value = Value::Object(cached.state.clone());
        let mut changes = HashMap::new();
        changes.insert(key.clone(), value);
        self.storage.write(changes).await?;

        debug!(state = self.name, key = %key, "state saved");
        turn.set_cached_state(self.name, CachedState::new(cached.state))
            .await;
        Ok(())
    }

    /// Empty the cached state; the next save writes the empty object
    pub async fn clear(&self, turn: &TurnContext) -> BotResult<()> {
        self.load(turn, false).await?;
        turn.update_cached_state(self.name, |cached| cached.state.clear())
            .await;
        Ok(())
    }

    /// Drop the cached state and remove it from storage
    pub async fn delete(&self, turn: &TurnContext) -> BotResult<()> {
        turn.remove_cached_state(self.name).await;
        let key = self.storage_key(turn)?;
        self.storage.delete(&[key]).await
    }

    /// Typed accessor for a property of this state
    pub fn create_property<T>(&self, name: impl Into<String>) -> StatePropertyAccessor<T>
    where
        T: Serialize + DeserializeOwned + Default + Send + Sync,
    {
        StatePropertyAccessor {
            state: self.clone(),
            name: name.into(),
            _marker: PhantomData,
        }
    }

    async fn get_property_value(&self, turn: &TurnContext, name: &str) -> BotResult<Option<Value>> {
        self.load(turn, false).await?;
        turn.update_cached_state(self.name, |cached| cached.state.get(name).cloned())
            .await
            .ok_or_else(|| BotError::StateNotLoaded(self.name.to_string()))
    }

    async fn set_property_value(&self, turn: &TurnContext, name: &str, value: Value) -> BotResult<()> {
        self.load(turn, false).await?;
        turn.update_cached_state(self.name, |cached| {
            cached.state.insert(name.to_string(), value);
        })
        .await
        .ok_or_else(|| BotError::StateNotLoaded(self.name.to_string()))
    }

    async fn delete_property_value(&self, turn: &TurnContext, name: &str) -> BotResult<()> {
        self.load(turn, false).await?;
        turn.update_cached_state(self.name, |cached| {
            cached.state.remove(name);
        })
        .await
        .ok_or_else(|| BotError::StateNotLoaded(self.name.to_string()))
    }
}

impl std::fmt::Debug for BotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotState")
            .field("scope", &self.scope)
            .field("name", &self.name)
            .finish()
    }
}

/// Typed view of a single property inside a [`BotState`]
#[derive(Debug, Clone)]
pub struct StatePropertyAccessor<T> {
    state: BotState,
    name: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StatePropertyAccessor<T>
where
    T: Serialize + DeserializeOwned + Default + Send + Sync,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value, or `T::default()` when unset
    pub async fn get(&self, turn: &TurnContext) -> BotResult<T> {
        match self.state.get_property_value(turn, &self.name).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(T::default()),
        }
    }

    pub async fn set(&self, turn: &TurnContext, value: &T) -> BotResult<()> {
        let value = serde_json::to_value(value)?;
        self.state.set_property_value(turn, &self.name, value).await
    }

    pub async fn delete(&self, turn: &TurnContext) -> BotResult<()> {
        self.state.delete_property_value(turn, &self.name).await
    }
}
