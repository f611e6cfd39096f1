//! Dialogs: named, resumable units of conversational logic
//!
//! A [`DialogSet`] is a registry of dialogs keyed by id. For each turn it
//! creates a [`DialogContext`] over the conversation's persisted dialog stack.
//! The active dialog is the top of the stack; when it ends, its parent is
//! resumed with the child's result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{BotError, BotResult};
use crate::state::StatePropertyAccessor;
use crate::turn::TurnContext;

/// One entry on the dialog stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialogInstance {
    /// Id of the dialog this instance runs
    pub id: String,
    /// Dialog-private state, persisted with the stack
    #[serde(default)]
    pub state: serde_json::Map<String, Value>,
}

/// Persisted dialog stack for a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogState {
    #[serde(default)]
    pub dialog_stack: Vec<DialogInstance>,
}

/// Outcome of a dialog operation for the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogTurnStatus {
    /// No dialog was active
    Empty,
    /// The active dialog is waiting for more input
    Waiting,
    /// The last dialog on the stack completed
    Complete,
    /// The stack was cancelled
    Cancelled,
}

/// Status plus the result value of a completed dialog
#[derive(Debug, Clone, PartialEq)]
pub struct DialogTurnResult {
    pub status: DialogTurnStatus,
    pub result: Option<Value>,
}

impl DialogTurnResult {
    pub fn empty() -> Self {
        Self {
            status: DialogTurnStatus::Empty,
            result: None,
        }
    }

    pub fn waiting() -> Self {
        Self {
            status: DialogTurnStatus::Waiting,
            result: None,
        }
    }

    pub fn complete(result: Option<Value>) -> Self {
        Self {
            status: DialogTurnStatus::Complete,
            result,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            status: DialogTurnStatus::Cancelled,
            result: None,
        }
    }
}

/// Why a dialog is being ended or resumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogReason {
    EndCalled,
    ReplaceCalled,
    CancelCalled,
}

/// Behaviour of a dialog registered in a [`DialogSet`]
#[async_trait]
pub trait Dialog: Send + Sync {
    /// Stable id the dialog is registered and started under
    fn id(&self) -> &str;

    /// Called when the dialog is pushed onto the stack
    async fn begin_dialog(
        &self,
        dc: &mut DialogContext,
        options: Option<Value>,
    ) -> BotResult<DialogTurnResult>;

    /// Called for each turn while this dialog is active
    async fn continue_dialog(&self, dc: &mut DialogContext) -> BotResult<DialogTurnResult> {
        dc.end_dialog(None).await
    }

    /// Called when a child dialog ended and this one is active again
    async fn resume_dialog(
        &self,
        dc: &mut DialogContext,
        _reason: DialogReason,
        result: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        dc.end_dialog(result).await
    }

    /// Called after the instance has been removed from the stack
    async fn end_dialog(
        &self,
        _turn: &TurnContext,
        _instance: &DialogInstance,
        _reason: DialogReason,
    ) -> BotResult<()> {
        Ok(())
    }
}

/// Registry of dialogs backed by a persisted dialog stack
#[derive(Clone)]
pub struct DialogSet {
    state: StatePropertyAccessor<DialogState>,
    dialogs: Arc<HashMap<String, Arc<dyn Dialog>>>,
}

impl DialogSet {
    /// Create a set whose stack lives in the given state property
    pub fn new(state: StatePropertyAccessor<DialogState>) -> Self {
        Self {
            state,
            dialogs: Arc::new(HashMap::new()),
        }
    }

    /// Register a dialog under its id
    pub fn add<D: Dialog + 'static>(&mut self, dialog: D) -> &mut Self {
        let id = dialog.id().to_string();
        let dialogs = Arc::make_mut(&mut self.dialogs);
        if dialogs.insert(id.clone(), Arc::new(dialog)).is_some() {
            warn!(dialog_id = %id, "dialog id registered twice, replacing");
        }
        self
    }

    /// Look up a dialog by id
    pub fn find(&self, id: &str) -> Option<Arc<dyn Dialog>> {
        self.dialogs.get(id).cloned()
    }

    /// Ids of all registered dialogs
    pub fn ids(&self) -> Vec<&str> {
        self.dialogs.keys().map(String::as_str).collect()
    }

    /// Load the conversation's dialog stack and wrap it in a context for this turn
    pub async fn create_context(
        &self,
        turn: &TurnContext,
        cancel: &CancellationToken,
    ) -> BotResult<DialogContext> {
        let stack = self.state.get(turn).await?;
        Ok(DialogContext {
            dialogs: self.clone(),
            turn: turn.clone(),
            cancel: cancel.clone(),
            stack,
        })
    }
}

impl std::fmt::Debug for DialogSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogSet")
            .field("property", &self.state.name())
            .field("dialogs", &self.ids())
            .finish()
    }
}

/// Turn-scoped view over a conversation's dialog stack
pub struct DialogContext {
    dialogs: DialogSet,
    turn: TurnContext,
    cancel: CancellationToken,
    stack: DialogState,
}

impl DialogContext {
    pub fn turn(&self) -> &TurnContext {
        &self.turn
    }

    pub fn dialogs(&self) -> &DialogSet {
        &self.dialogs
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// The instance on top of the stack
    pub fn active_dialog(&self) -> Option<&DialogInstance> {
        self.stack.dialog_stack.last()
    }

    /// Mutable state of the active instance; saved when the current operation returns
    pub fn active_state_mut(&mut self) -> Option<&mut serde_json::Map<String, Value>> {
        self.stack.dialog_stack.last_mut().map(|i| &mut i.state)
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.dialog_stack.len()
    }

    /// Push a dialog onto the stack and start it
    pub async fn begin_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        self.ensure_not_cancelled()?;
        let dialog = self.lookup(dialog_id)?;

        let depth = self.stack_depth();
        debug!(dialog_id, depth = depth + 1, "beginning dialog");
        self.stack.dialog_stack.push(DialogInstance {
            id: dialog_id.to_string(),
            state: serde_json::Map::new(),
        });
        self.persist().await?;

        // a dialog that fails to start leaves nothing behind on the stack
        let result = match dialog.begin_dialog(self, options).await {
            Ok(result) => result,
            Err(err) => {
                self.stack.dialog_stack.truncate(depth);
                self.persist().await?;
                return Err(err);
            }
        };
        self.persist().await?;
        Ok(result)
    }

    /// Continue the active dialog; `Empty` when nothing is active
    pub async fn continue_dialog(&mut self) -> BotResult<DialogTurnResult> {
        self.ensure_not_cancelled()?;
        let Some(active_id) = self.active_dialog().map(|i| i.id.clone()) else {
            return Ok(DialogTurnResult::empty());
        };
        let dialog = self.lookup(&active_id)?;

        debug!(dialog_id = %active_id, "continuing dialog");
        let result = dialog.continue_dialog(self).await?;
        self.persist().await?;
        Ok(result)
    }

    /// Pop the active dialog and resume its parent with `result`
    pub async fn end_dialog(&mut self, result: Option<Value>) -> BotResult<DialogTurnResult> {
        self.pop_active(DialogReason::EndCalled).await?;

        let Some(parent_id) = self.active_dialog().map(|i| i.id.clone()) else {
            return Ok(DialogTurnResult::complete(result));
        };
        let parent = self.lookup(&parent_id)?;

        debug!(dialog_id = %parent_id, "resuming dialog");
        let resumed = parent
            .resume_dialog(self, DialogReason::EndCalled, result)
            .await?;
        self.persist().await?;
        Ok(resumed)
    }

    /// Swap the active dialog for another one
    pub async fn replace_dialog(
        &mut self,
        dialog_id: &str,
        options: Option<Value>,
    ) -> BotResult<DialogTurnResult> {
        self.pop_active(DialogReason::ReplaceCalled).await?;
        self.begin_dialog(dialog_id, options).await
    }

    /// End every dialog on the stack
    pub async fn cancel_all_dialogs(&mut self) -> BotResult<DialogTurnResult> {
        if self.stack.dialog_stack.is_empty() {
            return Ok(DialogTurnResult::empty());
        }
        while !self.stack.dialog_stack.is_empty() {
            self.pop_active(DialogReason::CancelCalled).await?;
        }
        Ok(DialogTurnResult::cancelled())
    }

    async fn pop_active(&mut self, reason: DialogReason) -> BotResult<()> {
        let instance = self
            .stack
            .dialog_stack
            .pop()
            .ok_or(BotError::NoActiveDialog)?;
        self.persist().await?;

        debug!(dialog_id = %instance.id, ?reason, "dialog ended");
        if let Some(dialog) = self.dialogs.find(&instance.id) {
            dialog.end_dialog(&self.turn, &instance, reason).await?;
        }
        Ok(())
    }

    fn lookup(&self, dialog_id: &str) -> BotResult<Arc<dyn Dialog>> {
        self.dialogs
            .find(dialog_id)
            .ok_or_else(|| BotError::DialogNotFound(dialog_id.to_string()))
    }

    fn ensure_not_cancelled(&self) -> BotResult<()> {
        if self.cancel.is_cancelled() {
            return Err(BotError::Cancelled);
        }
        Ok(())
    }

    async fn persist(&self) -> BotResult<()> {
        self.dialogs.state.set(&self.turn, &self.stack).await
    }
}
