//! Prompt texts for the gateway-backed steps.

use postflow_llm::OutputSchema;

use crate::state::WorkflowState;

pub fn validate_input(state: &WorkflowState) -> String {
    format!(
        "You review LinkedIn content plans.\n\
         1. Topic: \"{topic}\"\n\
         2. Tone: \"{tone}\"\n\
         3. Target audience: \"{audience}\"\n\
         If the topic is professional and relevant, and the tone and audience suit LinkedIn, \
         reply with only 'Valid'. Reply 'Invalid' only when there is a clear reason the post \
         would be inappropriate for LinkedIn. Give no explanation.",
        topic = state.topic(),
        tone = state.tone_list(),
        audience = state.audience_list(),
    )
}

pub fn generate_draft(state: &WorkflowState) -> String {
    format!(
        "Write a LinkedIn post from these details:\n\
         - Topic: {topic}\n\
         - Tone: {tone}\n\
         - Audience: {audience}\n\n\
         Requirements:\n\
         - Open with a strong hook.\n\
         - Keep the body clear and concise, and make it valuable to: {audience}.\n\
         - Hold a {tone} tone from start to finish.\n\
         - Close with a call to action or a thought-provoking question.\n\
         - Add 3 to 7 relevant hashtags.\n\
         - Follow LinkedIn formatting conventions and avoid clichés.\n\
         Reply with the post only.",
        topic = state.topic(),
        tone = state.tone_list(),
        audience = state.audience_list(),
    )
}

pub fn validate_draft(state: &WorkflowState, draft: &str) -> String {
    format!(
        "You validate LinkedIn posts.\n\
         1. Topic: \"{topic}\"\n\
         2. Tone: \"{tone}\"\n\
         3. Target audience: \"{audience}\"\n\
         4. Draft post: \"{draft}\"\n\
         Check that the draft matches the topic, uses the requested tone, and suits the \
         audience. Answer 'Valid' if it meets every criterion, otherwise 'Invalid'.",
        topic = state.topic(),
        tone = state.tone_list(),
        audience = state.audience_list(),
    )
}

pub fn feedback_sentiment(feedback: &str) -> String {
    format!(
        "Classify this feedback on a LinkedIn post draft as positive or negative.\n\
         Feedback that asks for any improvement, change, or modification is 'negative'.\n\
         Feedback saying the post is fine as it is, or that no changes are wanted, is 'positive'.\n\
         Feedback: {feedback}"
    )
}

pub fn revise_draft(state: &WorkflowState, feedback: &str, last_draft: &str) -> String {
    format!(
        "You rewrite LinkedIn posts based on reader feedback.\n\n\
         Feedback: {feedback}\n\
         Last draft: {last_draft}\n\n\
         Work the feedback into a new version of the post. Keep the topic ({topic}), \
         the tone ({tone}) and the audience ({audience}). Reply with the new post only.",
        topic = state.topic(),
        tone = state.tone_list(),
        audience = state.audience_list(),
    )
}

pub fn draft_verdict_schema() -> OutputSchema {
    OutputSchema::new("response", "Valid or Invalid")
}

pub fn sentiment_schema() -> OutputSchema {
    OutputSchema::new("sentiment", "positive or negative")
}

/// The user's opening message as the chat shows it.
pub fn start_echo(state: &WorkflowState) -> String {
    format!(
        "Topic: {}, Audience: {}, Tone: {}",
        state.topic(),
        state.audience_list(),
        state.tone_list()
    )
}
