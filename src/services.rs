//! Services shared by the dialogs: settings and intent recognition

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::BotSettings;

/// What the user is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    Greeting,
    Help,
    Cancel,
    Escalate,
    None,
}

impl Intent {
    /// Matching order when an utterance hits several intents
    const PRIORITY: [Intent; 4] = [Intent::Cancel, Intent::Help, Intent::Escalate, Intent::Greeting];

    fn key(self) -> &'static str {
        match self {
            Intent::Greeting => "greeting",
            Intent::Help => "help",
            Intent::Cancel => "cancel",
            Intent::Escalate => "escalate",
            Intent::None => "none",
        }
    }
}

/// Maps an utterance to an [`Intent`]
pub trait Recognizer: Send + Sync {
    fn recognize(&self, text: &str) -> Intent;
}

/// Whole-word, case-insensitive keyword matching
#[derive(Debug, Clone, Default)]
pub struct KeywordRecognizer {
    keywords: BTreeMap<String, Vec<String>>,
}

impl KeywordRecognizer {
    pub fn new(keywords: &BTreeMap<String, Vec<String>>) -> Self {
        let keywords = keywords
            .iter()
            .map(|(intent, words)| {
                (
                    intent.to_lowercase(),
                    words.iter().map(|w| w.to_lowercase()).collect(),
                )
            })
            .collect();
        Self { keywords }
    }
}

impl Recognizer for KeywordRecognizer {
    fn recognize(&self, text: &str) -> Intent {
        let text = text.to_lowercase();
        let words: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .collect();

        Intent::PRIORITY
            .into_iter()
            .find(|intent| {
                self.keywords
                    .get(intent.key())
                    .is_some_and(|kws| kws.iter().any(|kw| words.contains(&kw.as_str())))
            })
            .unwrap_or(Intent::None)
    }
}

/// Services handed to the main dialog at construction
#[derive(Clone)]
pub struct BotServices {
    pub settings: Arc<BotSettings>,
    pub recognizer: Arc<dyn Recognizer>,
}

impl BotServices {
    pub fn new(settings: BotSettings, recognizer: Arc<dyn Recognizer>) -> Self {
        Self {
            settings: Arc::new(settings),
            recognizer,
        }
    }

    /// Services using a keyword recognizer built from the settings
    pub fn from_settings(settings: BotSettings) -> Self {
        let recognizer = Arc::new(KeywordRecognizer::new(&settings.intents));
        Self::new(settings, recognizer)
    }
}

impl Default for BotServices {
    fn default() -> Self {
        Self::from_settings(BotSettings::default())
    }
}

impl std::fmt::Debug for BotServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotServices")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
