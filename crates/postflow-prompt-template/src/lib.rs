//! Prompt templates for postflow model calls.
//!
//! A template decides how one step prompt (plus an optional output-format
//! instruction) is laid out as a system/user message pair for a given provider
//! family. The prompt text itself is owned by the workflow.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Providers postflow can talk to.
pub const KNOWN_PROVIDERS: &[&str] = &["anthropic", "openrouter"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error(
        "Unknown prompt template '{0}'. Available templates: default, claude-optimized, openai-compatible"
    )]
    Unknown(String),

    #[error(
        "Prompt template '{template}' is not compatible with provider '{provider}'. Compatible providers: {compatible}. Use 'default' for cross-provider compatibility."
    )]
    Incompatible {
        template: &'static str,
        provider: String,
        compatible: String,
    },
}

/// Prompt template types for provider-specific layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptTemplate {
    /// Single user message; works with every provider
    #[default]
    Default,
    /// System prompt plus XML-tagged sections for Anthropic models
    ClaudeOptimized,
    /// System prompt plus plain sections for OpenAI-style chat APIs
    OpenAiCompatible,
}

/// A laid-out prompt, ready to be turned into provider messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLayout {
    pub system: Option<String>,
    pub user: String,
}

const SYSTEM_PROMPT: &str =
    "You are a LinkedIn content assistant. Follow the instructions exactly and reply only with what is asked for.";

impl PromptTemplate {
    /// Parse a template name string into a PromptTemplate.
    pub fn parse(s: &str) -> Result<Self, TemplateError> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "claude-optimized" | "claude_optimized" | "claude" | "anthropic" => {
                Ok(Self::ClaudeOptimized)
            }
            "openai-compatible" | "openai_compatible" | "openai" | "openrouter" => {
                Ok(Self::OpenAiCompatible)
            }
            _ => Err(TemplateError::Unknown(s.to_string())),
        }
    }

    /// Check if this template is compatible with the given provider.
    pub fn validate_provider_compatibility(&self, provider: &str) -> Result<(), TemplateError> {
        if self.compatible_providers().contains(&provider) {
            Ok(())
        } else {
            Err(TemplateError::Incompatible {
                template: self.as_str(),
                provider: provider.to_string(),
                compatible: self.compatible_providers().join(", "),
            })
        }
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::ClaudeOptimized => "claude-optimized",
            Self::OpenAiCompatible => "openai-compatible",
        }
    }

    #[must_use]
    pub const fn compatible_providers(&self) -> &'static [&'static str] {
        match self {
            Self::Default => KNOWN_PROVIDERS,
            Self::ClaudeOptimized => &["anthropic"],
            Self::OpenAiCompatible => &["openrouter"],
        }
    }

    /// Lay out a step prompt and an optional output-format instruction.
    #[must_use]
    pub fn layout(&self, prompt: &str, format_instruction: Option<&str>) -> PromptLayout {
        let prompt = prompt.trim();
        let format = format_instruction.map(str::trim).filter(|f| !f.is_empty());

        match self {
            Self::Default => {
                let mut user = prompt.to_string();
                if let Some(format) = format {
                    user.push_str("\n\n");
                    user.push_str(format);
                }
                PromptLayout { system: None, user }
            }
            Self::ClaudeOptimized => {
                let mut user = String::from("<instructions>\n");
                user.push_str(prompt);
                user.push_str("\n</instructions>");
                if let Some(format) = format {
                    user.push_str("\n<output_format>\n");
                    user.push_str(format);
                    user.push_str("\n</output_format>");
                }
                PromptLayout {
                    system: Some(SYSTEM_PROMPT.to_string()),
                    user,
                }
            }
            Self::OpenAiCompatible => {
                let mut user = prompt.to_string();
                if let Some(format) = format {
                    user.push_str("\n\nResponse format:\n");
                    user.push_str(format);
                }
                PromptLayout {
                    system: Some(SYSTEM_PROMPT.to_string()),
                    user,
                }
            }
        }
    }
}

impl std::fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_valid_templates() {
        assert_eq!(PromptTemplate::parse("default").unwrap(), PromptTemplate::Default);
        assert_eq!(
            PromptTemplate::parse("Claude-Optimized").unwrap(),
            PromptTemplate::ClaudeOptimized
        );
        assert_eq!(
            PromptTemplate::parse("openrouter").unwrap(),
            PromptTemplate::OpenAiCompatible
        );
    }

    #[test]
    fn test_parse_invalid_template() {
        match PromptTemplate::parse("fancy") {
            Err(TemplateError::Unknown(name)) => assert_eq!(name, "fancy"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }

    #[test]
    fn test_provider_compatibility() {
        assert!(PromptTemplate::Default.validate_provider_compatibility("anthropic").is_ok());
        assert!(PromptTemplate::Default.validate_provider_compatibility("openrouter").is_ok());
        assert!(
            PromptTemplate::ClaudeOptimized
                .validate_provider_compatibility("openrouter")
                .is_err()
        );
        assert!(
            PromptTemplate::OpenAiCompatible
                .validate_provider_compatibility("anthropic")
                .is_err()
        );
    }

    #[test]
    fn test_default_layout_is_single_user_message() {
        let layout = PromptTemplate::Default.layout("  Write a post.  ", Some("Reply in JSON."));
        assert_eq!(layout.system, None);
        assert_eq!(layout.user, "Write a post.\n\nReply in JSON.");
    }

    #[test]
    fn test_claude_layout_uses_tags() {
        let layout = PromptTemplate::ClaudeOptimized.layout("Judge this.", Some("JSON only"));
        assert!(layout.system.is_some());
        assert!(layout.user.starts_with("<instructions>\nJudge this.\n</instructions>"));
        assert!(layout.user.ends_with("<output_format>\nJSON only\n</output_format>"));
    }

    #[test]
    fn test_openai_layout_without_format() {
        let layout = PromptTemplate::OpenAiCompatible.layout("Write.", None);
        assert_eq!(layout.user, "Write.");
        assert!(layout.system.is_some());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for t in [
            PromptTemplate::Default,
            PromptTemplate::ClaudeOptimized,
            PromptTemplate::OpenAiCompatible,
        ] {
            assert_eq!(t.to_string(), t.as_str());
            assert_eq!(PromptTemplate::parse(&t.to_string()).unwrap(), t);
        }
    }

    proptest! {
        #[test]
        fn prop_layout_always_contains_prompt(prompt in "[a-zA-Z0-9 ,.]{1,80}") {
            for t in [
                PromptTemplate::Default,
                PromptTemplate::ClaudeOptimized,
                PromptTemplate::OpenAiCompatible,
            ] {
                let layout = t.layout(&prompt, None);
                prop_assert!(layout.user.contains(prompt.trim()));
            }
        }
    }
}
