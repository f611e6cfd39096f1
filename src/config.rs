//! Bot settings: response strings and intent keywords.
//! Loaded from a JSON file, with environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use crate::error::BotError;

/// Texts the main dialog sends and the keywords it recognizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BotSettings {
    pub intro_message: String,
    pub greeting_message: String,
    pub help_message: String,
    pub cancelled_message: String,
    pub escalate_message: String,
    pub confused_message: String,
    pub error_message: String,
    pub name_prompt: String,
    /// `{name}` is replaced with the user's name
    pub name_greeting: String,
    /// Intent name (`greeting`, `help`, `cancel`, `escalate`) to keywords
    pub intents: BTreeMap<String, Vec<String>>,
}

impl Default for BotSettings {
    fn default() -> Self {
        let mut intents = BTreeMap::new();
        intents.insert(
            "greeting".to_string(),
            vec!["hi".into(), "hello".into(), "hey".into()],
        );
        intents.insert(
            "help".to_string(),
            vec!["help".into(), "support".into(), "options".into()],
        );
        intents.insert(
            "cancel".to_string(),
            vec!["cancel".into(), "stop".into(), "quit".into()],
        );
        intents.insert(
            "escalate".to_string(),
            vec!["agent".into(), "human".into(), "escalate".into()],
        );

        Self {
            intro_message: "Welcome! I'm your enterprise assistant. Type 'help' at any time to see what I can do.".to_string(),
            greeting_message: "Hi there!".to_string(),
            help_message: "I can greet you, answer 'help', hand you over to a person with 'agent', or start over with 'cancel'.".to_string(),
            cancelled_message: "Ok, I've cancelled that. Let me know if there's anything else.".to_string(),
            escalate_message: "Connecting you with a person who can help.".to_string(),
            confused_message: "Sorry, I didn't understand that. Type 'help' to see what I can do.".to_string(),
            error_message: "Sorry, it looks like something went wrong.".to_string(),
            name_prompt: "What's your name?".to_string(),
            name_greeting: "Nice to meet you, {name}!".to_string(),
            intents,
        }
    }
}

impl BotSettings {
    /// Parse settings; fields missing from the JSON keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self, BotError> {
        serde_json::from_str(json).map_err(|e| BotError::Config(e.to_string()))
    }

    /// Read settings from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading bot settings from {}", path.display()))?;
        Ok(Self::from_json_str(&json)?)
    }

    /// Load from environment: BOT_SETTINGS names a JSON file (optional),
    /// BOT_INTRO_MESSAGE overrides the intro text (optional).
    pub fn from_env() -> Result<Self> {
        let mut settings = match env::var("BOT_SETTINGS") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(intro) = env::var("BOT_INTRO_MESSAGE") {
            settings.intro_message = intro;
        }
        Ok(settings)
    }

    /// Greeting for a user who just told us their name
    pub fn greet_by_name(&self, name: &str) -> String {
        self.name_greeting.replace("{name}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings =
            BotSettings::from_json_str(r#"{"introMessage": "Hello from config"}"#).unwrap();
        assert_eq!(settings.intro_message, "Hello from config");
        assert_eq!(settings.help_message, BotSettings::default().help_message);
        assert!(settings.intents.contains_key("cancel"));
    }

    #[test]
    fn test_invalid_json() {
        let err = BotSettings::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, BotError::Config(_)));
    }

    #[test]
    fn test_missing_file() {
        assert!(BotSettings::from_file("/nonexistent/bot-settings.json").is_err());
    }

    #[test]
    fn test_greet_by_name() {
        let settings = BotSettings::default();
        assert_eq!(settings.greet_by_name("Ada"), "Nice to meet you, Ada!");
    }
}
