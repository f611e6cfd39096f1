//! Enterprise bot
//!
//! A conversational bot built around a persisted dialog stack. It provides:
//! - A turn dispatcher that continues the active dialog, or starts the main
//!   dialog when a new member joins a conversation
//! - Dialogs as named, resumable units registered in a dialog set
//! - Conversation and user state over a pluggable storage backend
//! - A host adapter that runs turns, saves state and recovers from failures
//!
//! Each inbound [`Activity`] is handled in one turn. The dispatcher itself
//! sends nothing; replies come from whichever dialog runs.

pub mod activity;
pub mod adapter;
pub mod bot;
pub mod config;
pub mod dialogs;
pub mod error;
pub mod main_dialog;
pub mod services;
pub mod state;
pub mod turn;

// Re-export main types
pub use activity::{Activity, ActivityType, ChannelAccount, ConversationAccount};

pub use adapter::{BotAdapter, ErrorReplyHandler, OnTurnError};

pub use bot::{Bot, EnterpriseBot};

pub use config::BotSettings;

pub use dialogs::{
    Dialog, DialogContext, DialogInstance, DialogReason, DialogSet, DialogState,
    DialogTurnResult, DialogTurnStatus,
};

pub use error::{BotError, BotResult};

pub use main_dialog::{ConversationData, MainDialog, OnboardingDialog, UserProfile};

pub use services::{BotServices, Intent, KeywordRecognizer, Recognizer};

pub use state::{
    BotState, ConversationState, MemoryStorage, StatePropertyAccessor, StateScope, Storage,
    UserState,
};

pub use turn::TurnContext;

pub use tokio_util::sync::CancellationToken;
