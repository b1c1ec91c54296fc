//! Description of one dangerous action.

use botdeck_cache::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use uuid::Uuid;

/// Future returned by a confirmed action.
pub type ActionFuture = BoxFuture<'static, Result<Value, String>>;

/// The guarded command. Runs at most once.
pub type Action = Box<dyn FnOnce() -> ActionFuture + Send>;

/// Wrap an async closure as an `Action`.
pub fn action_fn<F, Fut>(f: F) -> Action
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, String>> + Send + 'static,
{
    Box::new(move || Box::pin(f()) as ActionFuture)
}

/// Visual weight of the dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    #[default]
    Danger,
    Critical,
}

/// A guarded command plus everything the dialog shows about it.
pub struct DangerousActionSpec {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub consequences: Vec<String>,
    pub confirm_label: String,
    pub severity: Severity,
    /// Typed phrase required when the bot is live.
    pub requires_typed_confirmation: bool,
    pub confirmation_phrase: String,
    pub(crate) action: Action,
}

impl DangerousActionSpec {
    pub fn new(title: impl Into<String>, action: Action) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            consequences: Vec::new(),
            confirm_label: "Confirm".to_string(),
            severity: Severity::default(),
            requires_typed_confirmation: false,
            confirmation_phrase: String::new(),
            action,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn consequence(mut self, consequence: impl Into<String>) -> Self {
        self.consequences.push(consequence.into());
        self
    }

    #[must_use]
    pub fn confirm_label(mut self, label: impl Into<String>) -> Self {
        self.confirm_label = label.into();
        self
    }

    #[must_use]
    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Require `phrase` to be typed exactly when the bot is live.
    #[must_use]
    pub fn typed_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.requires_typed_confirmation = true;
        self.confirmation_phrase = phrase.into();
        self
    }
}

impl fmt::Debug for DangerousActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DangerousActionSpec")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("severity", &self.severity)
            .field("requires_typed_confirmation", &self.requires_typed_confirmation)
            .field("confirmation_phrase", &self.confirmation_phrase)
            .finish_non_exhaustive()
    }
}
