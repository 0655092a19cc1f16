//! Keyword router choosing between the general and current-information responders.

use serde::Serialize;

use parley_core::config::RouterConfig;

/// Which responder handles a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    General,
    CurrentInfo,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::General => "general",
            Destination::CurrentInfo => "current_info",
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub destination: Destination,
    /// The first trigger phrase found in the prompt, if any.
    pub matched: Option<String>,
}

/// Routes prompts by case-insensitive substring match against an ordered
/// list of trigger phrases.
#[derive(Debug, Clone)]
pub struct TriggerRouter {
    /// Lower-cased, non-empty phrases in configured order.
    phrases: Vec<String>,
}

impl TriggerRouter {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(&config.trigger_phrases)
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }

    /// Pick the destination for `text`. First matching phrase wins.
    pub fn route(&self, text: &str) -> RouteDecision {
        let haystack = text.to_lowercase();
        match self.phrases.iter().find(|p| haystack.contains(p.as_str())) {
            Some(phrase) => RouteDecision {
                destination: Destination::CurrentInfo,
                matched: Some(phrase.clone()),
            },
            None => RouteDecision {
                destination: Destination::General,
                matched: None,
            },
        }
    }
}

impl Default for TriggerRouter {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}
