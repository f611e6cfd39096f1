//! Activity model: inbound messages and system events exchanged with a channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag of an activity
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    /// Text sent by a participant
    Message,
    /// Conversation membership changed
    ConversationUpdate,
    /// Programmatic event raised by the channel or client
    Event,
    /// Participant is typing
    Typing,
    /// Conversation was closed
    EndOfConversation,
    /// Any type this crate does not model
    Other(String),
}

impl ActivityType {
    /// Wire name of this type
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Message => "message",
            ActivityType::ConversationUpdate => "conversationUpdate",
            ActivityType::Event => "event",
            ActivityType::Typing => "typing",
            ActivityType::EndOfConversation => "endOfConversation",
            ActivityType::Other(name) => name,
        }
    }
}

impl From<String> for ActivityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "message" => ActivityType::Message,
            "conversationUpdate" => ActivityType::ConversationUpdate,
            "event" => ActivityType::Event,
            "typing" => ActivityType::Typing,
            "endOfConversation" => ActivityType::EndOfConversation,
            _ => ActivityType::Other(value),
        }
    }
}

impl From<ActivityType> for String {
    fn from(value: ActivityType) -> Self {
        value.as_str().to_string()
    }
}

/// A participant identity on a channel (user or bot)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The conversation an activity belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default)]
    pub is_group: bool,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_group: false,
        }
    }
}

/// One inbound or outbound unit of communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub channel_id: String,
    pub from: ChannelAccount,
    pub recipient: ChannelAccount,
    pub conversation: ConversationAccount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_added: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members_removed: Vec<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    /// Create an activity of the given type with empty addressing
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            activity_type,
            channel_id: String::new(),
            from: ChannelAccount::default(),
            recipient: ChannelAccount::default(),
            conversation: ConversationAccount::default(),
            text: None,
            members_added: Vec::new(),
            members_removed: Vec::new(),
            reply_to_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a text message activity
    pub fn message(text: impl Into<String>) -> Self {
        let mut activity = Self::new(ActivityType::Message);
        activity.text = Some(text.into());
        activity
    }

    /// Create a conversation update announcing `members_added`
    pub fn conversation_update(members_added: Vec<ChannelAccount>) -> Self {
        let mut activity = Self::new(ActivityType::ConversationUpdate);
        activity.members_added = members_added;
        activity
    }

    /// Set channel, sender, recipient and conversation
    pub fn addressed(
        mut self,
        channel_id: impl Into<String>,
        from: ChannelAccount,
        recipient: ChannelAccount,
        conversation: ConversationAccount,
    ) -> Self {
        self.channel_id = channel_id.into();
        self.from = from;
        self.recipient = recipient;
        self.conversation = conversation;
        self
    }

    /// Build a message replying to this activity
    ///
    /// Sender and recipient are swapped; channel and conversation are kept.
    pub fn create_reply(&self, text: impl Into<String>) -> Activity {
        Activity {
            id: Uuid::new_v4().to_string(),
            activity_type: ActivityType::Message,
            channel_id: self.channel_id.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            text: Some(text.into()),
            members_added: Vec::new(),
            members_removed: Vec::new(),
            reply_to_id: Some(self.id.clone()),
            timestamp: Utc::now(),
        }
    }

    /// True when the bot itself is among the members added
    pub fn is_from_self_join(&self) -> bool {
        self.members_added.iter().any(|m| m.id == self.recipient.id)
    }

    /// Trimmed text of a message activity
    pub fn as_message_text(&self) -> Option<&str> {
        match self.activity_type {
            ActivityType::Message => self.text.as_deref().map(str::trim),
            _ => None,
        }
    }
}
