//! Workflow state and the chat history it carries.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::WorkflowError;
use crate::graph::StepId;

/// Maximum number of tones or audiences per run
pub const MAX_SELECTIONS: usize = 3;

pub const ORIGINAL_POST_PREFIX: &str = "Generated Post: ";
pub const FEEDBACK_REVISION_PREFIX: &str = "Generated post based on feedback:";
pub const VALIDATION_PREFIX: &str = "Post Validation Node:";
pub const POSITIVE_FEEDBACK_PREFIX: &str = "Positive feedback received:";
pub const NEGATIVE_FEEDBACK_PREFIX: &str = "Negative feedback received:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Assistant,
}

/// Display category of a chat entry, fixed when the entry is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    OriginalPost,
    FeedbackRevision,
    Validation,
    UserFeedbackEcho,
    Plain,
}

impl EntryKind {
    /// Category implied by an assistant entry's prefix.
    #[must_use]
    pub fn categorize(text: &str) -> Self {
        if text.starts_with(ORIGINAL_POST_PREFIX) {
            EntryKind::OriginalPost
        } else if text.starts_with(FEEDBACK_REVISION_PREFIX) {
            EntryKind::FeedbackRevision
        } else if text.starts_with(VALIDATION_PREFIX) {
            EntryKind::Validation
        } else if text.starts_with(POSITIVE_FEEDBACK_PREFIX)
            || text.starts_with(NEGATIVE_FEEDBACK_PREFIX)
        {
            EntryKind::UserFeedbackEcho
        } else {
            EntryKind::Plain
        }
    }

    /// Badge label shown next to the entry, if any.
    #[must_use]
    pub const fn badge(&self) -> Option<&'static str> {
        match self {
            EntryKind::OriginalPost => Some("Original Post"),
            EntryKind::FeedbackRevision => Some("Generated Post Based on Feedback"),
            EntryKind::Validation => Some("Validation"),
            EntryKind::UserFeedbackEcho => Some("User Feedback"),
            EntryKind::Plain => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub author: Author,
    pub text: String,
    pub kind: EntryKind,
}

impl ChatEntry {
    /// Assistant entry, categorized by prefix.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            author: Author::Assistant,
            kind: EntryKind::categorize(&text),
            text,
        }
    }

    /// What the user typed; never categorized.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            author: Author::User,
            text: text.into(),
            kind: EntryKind::Plain,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Validation {
    Valid,
    Invalid,
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Validation::Valid => f.write_str("Valid"),
            Validation::Invalid => f.write_str("Invalid"),
        }
    }
}

/// Parameters supplied when a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowParams {
    pub topic: String,
    pub tone: Vec<String>,
    pub audience: Vec<String>,
}

impl WorkflowParams {
    /// Tone and audience are de-duplicated (first occurrence wins) and
    /// limited to [`MAX_SELECTIONS`] entries each.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::InvalidParameters` when more than three
    /// distinct tones or audiences are given.
    pub fn new<T, A>(
        topic: impl Into<String>,
        tone: impl IntoIterator<Item = T>,
        audience: impl IntoIterator<Item = A>,
    ) -> Result<Self, WorkflowError>
    where
        T: Into<String>,
        A: Into<String>,
    {
        Ok(Self {
            topic: topic.into(),
            tone: selection("tone", tone)?,
            audience: selection("audience", audience)?,
        })
    }
}

fn selection<S: Into<String>>(
    name: &str,
    items: impl IntoIterator<Item = S>,
) -> Result<Vec<String>, WorkflowError> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        let item = item.into().trim().to_string();
        if !item.is_empty() && !out.contains(&item) {
            out.push(item);
        }
    }
    if out.len() > MAX_SELECTIONS {
        return Err(WorkflowError::InvalidParameters(format!(
            "at most {MAX_SELECTIONS} {name} values allowed, got {}",
            out.len()
        )));
    }
    Ok(out)
}

/// Everything a run knows. Serialized whole into each checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowState {
    user_id: String,
    topic: String,
    tone: Vec<String>,
    audience: Vec<String>,
    drafts: Vec<String>,
    best_post: Option<String>,
    feedback: Option<String>,
    current_step: Option<StepId>,
    validation: Option<Validation>,
    on: String,
    analysis: String,
    history: Vec<ChatEntry>,
}

impl WorkflowState {
    #[must_use]
    pub fn new(params: WorkflowParams) -> Self {
        Self {
            user_id: String::new(),
            topic: params.topic,
            tone: params.tone,
            audience: params.audience,
            drafts: Vec::new(),
            best_post: None,
            feedback: None,
            current_step: None,
            validation: None,
            on: String::new(),
            analysis: String::new(),
            history: Vec::new(),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn tone(&self) -> &[String] {
        &self.tone
    }

    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// All drafts in generation order; index 0 is the first.
    pub fn drafts(&self) -> &[String] {
        &self.drafts
    }

    pub fn latest_draft(&self) -> Option<&str> {
        self.drafts.last().map(String::as_str)
    }

    pub fn best_post(&self) -> Option<&str> {
        self.best_post.as_deref()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    /// The last step that ran.
    pub fn current_step(&self) -> Option<StepId> {
        self.current_step
    }

    pub fn validation(&self) -> Option<Validation> {
        self.validation
    }

    /// Draft validation verdict as the model gave it.
    pub fn on(&self) -> &str {
        &self.on
    }

    /// Feedback sentiment.
    pub fn analysis(&self) -> &str {
        &self.analysis
    }

    pub fn history(&self) -> &[ChatEntry] {
        &self.history
    }

    /// Tones joined for prompts and display.
    #[must_use]
    pub fn tone_list(&self) -> String {
        self.tone.join(", ")
    }

    #[must_use]
    pub fn audience_list(&self) -> String {
        self.audience.join(", ")
    }

    pub(crate) fn push_entry(&mut self, entry: ChatEntry) {
        self.history.push(entry);
    }

    pub(crate) fn push_draft(&mut self, draft: String) {
        self.drafts.push(draft);
    }

    /// Assign `id` unless a user id is already set.
    pub(crate) fn ensure_user_id(&mut self, id: impl FnOnce() -> String) {
        if self.user_id.is_empty() {
            self.user_id = id();
        }
    }

    pub(crate) fn set_best_post(&mut self, post: String) {
        self.best_post = Some(post);
    }

    pub(crate) fn set_feedback(&mut self, feedback: String) {
        self.feedback = Some(feedback);
    }

    pub(crate) fn set_current_step(&mut self, step: StepId) {
        self.current_step = Some(step);
    }

    pub(crate) fn set_validation(&mut self, validation: Validation) {
        self.validation = Some(validation);
    }

    pub(crate) fn set_on(&mut self, verdict: &str) {
        self.on = verdict.to_string();
    }

    pub(crate) fn set_analysis(&mut self, sentiment: &str) {
        self.analysis = sentiment.to_string();
    }
}
