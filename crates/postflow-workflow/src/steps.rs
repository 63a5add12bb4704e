//! The six step functions.
//!
//! Each step checks its precondition, makes at most one gateway call, and
//! then updates the state and appends one chat entry. A step that fails
//! leaves the state untouched.

use postflow_llm::{Gateway, GatewayRequest};
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::graph::StepId;
use crate::prompts;
use crate::state::{ChatEntry, Validation, WorkflowState};

pub const PUBLISH_CONFIRMATION: &str = "Post sent to LinkedIn (simulated). PING ==> PONG";

/// Execute `step` against `state`.
pub(crate) async fn run_step(
    step: StepId,
    state: &mut WorkflowState,
    gateway: &Gateway,
    session: &str,
) -> Result<(), WorkflowError> {
    let ctx = StepContext {
        step,
        gateway,
        session,
    };
    match step {
        StepId::ValidateInput => validate_input(&ctx, state).await,
        StepId::GenerateDraft => generate_draft(&ctx, state).await,
        StepId::ValidateDraft => validate_draft(&ctx, state).await,
        StepId::CollectFeedback => collect_feedback(&ctx, state).await,
        StepId::ReviseDraft => revise_draft(&ctx, state).await,
        StepId::Publish => publish(state),
    }
}

struct StepContext<'a> {
    step: StepId,
    gateway: &'a Gateway,
    session: &'a str,
}

impl StepContext<'_> {
    fn request(&self, prompt: String) -> GatewayRequest {
        GatewayRequest::new(self.step.as_str(), prompt).for_session(self.session)
    }

    async fn ask(&self, request: GatewayRequest) -> Result<String, WorkflowError> {
        self.gateway
            .invoke(&request)
            .await
            .map_err(|source| WorkflowError::Gateway {
                step: self.step,
                source,
            })
    }
}

/// Case-insensitive verdict: any mention of "invalid" wins, then "valid";
/// anything else is conservatively Invalid.
///
/// Stricter than a bare `contains("valid")` test, which would read "Invalid" as Valid.
pub fn parse_validity(reply: &str) -> Validation {
    let reply = reply.to_lowercase();
    if reply.contains("invalid") {
        Validation::Invalid
    } else if reply.contains("valid") {
        Validation::Valid
    } else {
        Validation::Invalid
    }
}

/// Normalized sentiment label; unknown labels stay as given (lowercased)
/// and route like negative feedback.
pub fn parse_sentiment(reply: &str) -> String {
    reply
        .trim()
        .trim_matches(|c: char| c == '\'' || c == '"' || c == '.')
        .to_lowercase()
}

async fn validate_input(ctx: &StepContext<'_>, state: &mut WorkflowState) -> Result<(), WorkflowError> {
    if state.topic().trim().is_empty() || state.tone().is_empty() || state.audience().is_empty() {
        return Err(WorkflowError::contract(
            ctx.step,
            "topic, tone and audience must all be provided",
        ));
    }

    let reply = ctx.ask(ctx.request(prompts::validate_input(state))).await?;

    state.set_current_step(ctx.step);
    state.push_entry(ChatEntry::assistant(format!(
        "Validation Node: Response - {reply}"
    )));
    state.set_validation(parse_validity(&reply));
    Ok(())
}

async fn generate_draft(ctx: &StepContext<'_>, state: &mut WorkflowState) -> Result<(), WorkflowError> {
    if state.validation() != Some(Validation::Valid) {
        return Err(WorkflowError::contract(
            ctx.step,
            "inputs have not been validated",
        ));
    }

    // Salted with the draft ordinal so a regeneration never replays a cached draft.
    let request = ctx
        .request(prompts::generate_draft(state))
        .with_cache_salt(state.drafts().len().to_string());
    let post = ctx.ask(request).await?;

    state.push_draft(post.clone());
    state.ensure_user_id(|| Uuid::new_v4().to_string());
    state.set_current_step(ctx.step);
    state.push_entry(ChatEntry::assistant(format!("Generated Post: {post}")));
    Ok(())
}

async fn validate_draft(ctx: &StepContext<'_>, state: &mut WorkflowState) -> Result<(), WorkflowError> {
    let Some(draft) = state.latest_draft() else {
        return Err(WorkflowError::contract(ctx.step, "no draft to validate"));
    };

    let request = ctx
        .request(prompts::validate_draft(state, draft))
        .with_schema(prompts::draft_verdict_schema())
        .with_cache_salt(state.drafts().len().to_string());
    let verdict = ctx.ask(request).await?;

    state.set_current_step(ctx.step);
    state.set_on(&verdict);
    state.push_entry(ChatEntry::assistant(format!(
        "Post Validation Node: Validation result - {verdict}"
    )));
    Ok(())
}

async fn collect_feedback(ctx: &StepContext<'_>, state: &mut WorkflowState) -> Result<(), WorkflowError> {
    if state.drafts().is_empty() {
        return Err(WorkflowError::contract(ctx.step, "no drafts found"));
    }

    let feedback = state.feedback().unwrap_or_default().to_string();
    let request = ctx
        .request(prompts::feedback_sentiment(&feedback))
        .with_schema(prompts::sentiment_schema());
    let sentiment = parse_sentiment(&ctx.ask(request).await?);

    let entry = match sentiment.as_str() {
        "positive" if !feedback.is_empty() => format!("Positive feedback received: {feedback}"),
        "negative" if !feedback.is_empty() => format!("Negative feedback received: {feedback}"),
        _ => format!("Feedback received: {feedback}"),
    };

    state.set_current_step(ctx.step);
    state.set_feedback(feedback);
    state.set_analysis(&sentiment);
    state.push_entry(ChatEntry::assistant(entry));
    Ok(())
}

async fn revise_draft(ctx: &StepContext<'_>, state: &mut WorkflowState) -> Result<(), WorkflowError> {
    let Some(last_draft) = state.latest_draft() else {
        return Err(WorkflowError::contract(ctx.step, "no drafts found"));
    };
    let Some(feedback) = state.feedback() else {
        return Err(WorkflowError::contract(ctx.step, "no feedback to revise from"));
    };

    // Revises the latest generated draft, not a previous revision.
    let revised = ctx
        .ask(ctx.request(prompts::revise_draft(state, feedback, last_draft)))
        .await?;

    state.set_current_step(ctx.step);
    state.push_entry(ChatEntry::assistant(format!(
        "Generated post based on feedback: {revised}"
    )));
    state.set_best_post(revised);
    Ok(())
}

fn publish(state: &mut WorkflowState) -> Result<(), WorkflowError> {
    if state.best_post().is_none() {
        return Err(WorkflowError::contract(StepId::Publish, "no revised post to publish"));
    }

    state.set_current_step(StepId::Publish);
    state.push_entry(ChatEntry::assistant(PUBLISH_CONFIRMATION));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{EntryKind, WorkflowParams};
    use postflow_llm::testing::ScriptedBackend;
    use postflow_llm::{GatewayOptions, LlmError};

    fn gateway(backend: &ScriptedBackend) -> Gateway {
        Gateway::new(Box::new(backend.clone()), GatewayOptions::default()).with_cache(Some(16))
    }

    fn state() -> WorkflowState {
        WorkflowState::new(
            WorkflowParams::new("Remote work productivity", ["professional"], ["managers"])
                .unwrap(),
        )
    }

    async fn run(step: StepId, state: &mut WorkflowState, backend: &ScriptedBackend) -> Result<(), WorkflowError> {
        run_step(step, state, &gateway(backend), "s1").await
    }

    fn validated_with_draft() -> WorkflowState {
        let mut state = state();
        state.set_validation(Validation::Valid);
        state.push_draft("First draft".to_string());
        state
    }

    #[test]
    fn test_parse_validity() {
        assert_eq!(parse_validity("Valid"), Validation::Valid);
        assert_eq!(parse_validity("  VALID.\n"), Validation::Valid);
        assert_eq!(parse_validity("This is valid for LinkedIn"), Validation::Valid);
        assert_eq!(parse_validity("Invalid"), Validation::Invalid);
        assert_eq!(parse_validity("Valid? No, this is INVALID."), Validation::Invalid);
        assert_eq!(parse_validity("invalid: off-topic"), Validation::Invalid);
        assert_eq!(parse_validity("Yes"), Validation::Invalid);
        assert_eq!(parse_validity(""), Validation::Invalid);
    }

    #[test]
    fn test_parse_sentiment() {
        assert_eq!(parse_sentiment(" Positive\n"), "positive");
        assert_eq!(parse_sentiment("'negative'."), "negative");
        assert_eq!(parse_sentiment("Mixed"), "mixed");
    }

    #[tokio::test]
    async fn test_validate_input_sets_validation_and_entry() {
        let backend = ScriptedBackend::new().always("validate-input", "Valid");
        let mut state = state();

        run(StepId::ValidateInput, &mut state, &backend).await.unwrap();

        assert_eq!(state.validation(), Some(Validation::Valid));
        assert_eq!(state.current_step(), Some(StepId::ValidateInput));
        assert_eq!(state.history()[0].text, "Validation Node: Response - Valid");
        assert_eq!(state.history()[0].kind, EntryKind::Plain);
    }

    #[tokio::test]
    async fn test_validate_input_requires_parameters() {
        let backend = ScriptedBackend::new().always("validate-input", "Valid");
        let mut state = WorkflowState::new(
            WorkflowParams::new("Topic", Vec::<String>::new(), ["managers"]).unwrap(),
        );

        let err = run(StepId::ValidateInput, &mut state, &backend).await.unwrap_err();

        assert!(matches!(err, WorkflowError::ContractViolation { step: StepId::ValidateInput, .. }));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_draft_appends_and_assigns_user_id_once() {
        let backend = ScriptedBackend::new()
            .reply("generate-draft", "Post one")
            .reply("generate-draft", "Post two");
        let mut state = state();
        state.set_validation(Validation::Valid);

        run(StepId::GenerateDraft, &mut state, &backend).await.unwrap();
        let user_id = state.user_id().to_string();
        assert!(Uuid::parse_str(&user_id).is_ok());

        run(StepId::GenerateDraft, &mut state, &backend).await.unwrap();

        assert_eq!(state.drafts(), ["Post one", "Post two"]);
        assert_eq!(state.user_id(), user_id);
        assert_eq!(state.history()[1].text, "Generated Post: Post two");
        assert_eq!(state.history()[1].kind, EntryKind::OriginalPost);
    }

    #[tokio::test]
    async fn test_generate_draft_requires_valid_inputs() {
        let backend = ScriptedBackend::new().always("generate-draft", "Post");
        let mut state = state();
        state.set_validation(Validation::Invalid);

        let err = run(StepId::GenerateDraft, &mut state, &backend).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ContractViolation { .. }));
        assert!(state.drafts().is_empty());
    }

    #[tokio::test]
    async fn test_validate_draft_records_structured_verdict() {
        let backend = ScriptedBackend::new().always("validate-draft", r#"{"response": "Valid"}"#);
        let mut state = validated_with_draft();

        run(StepId::ValidateDraft, &mut state, &backend).await.unwrap();

        assert_eq!(state.on(), "Valid");
        let entry = state.history().last().unwrap();
        assert_eq!(entry.text, "Post Validation Node: Validation result - Valid");
        assert_eq!(entry.kind, EntryKind::Validation);
        assert!(
            backend
                .last_prompt("validate-draft")
                .unwrap()
                .contains("\"First draft\"")
        );
    }

    #[tokio::test]
    async fn test_collect_feedback_without_drafts_is_a_contract_violation() {
        let backend = ScriptedBackend::new().always("collect-feedback", "positive");
        let mut state = state();
        state.set_feedback("great".to_string());

        let err = run(StepId::CollectFeedback, &mut state, &backend).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ContractViolation { step: StepId::CollectFeedback, .. }));
    }

    #[tokio::test]
    async fn test_collect_feedback_entries_by_sentiment() {
        let cases = [
            ("positive", "Looks great", "Positive feedback received: Looks great"),
            ("negative", "add more data", "Negative feedback received: add more data"),
            ("neutral", "hmm", "Feedback received: hmm"),
        ];
        for (sentiment, feedback, expected) in cases {
            let backend = ScriptedBackend::new().always(
                "collect-feedback",
                format!("{{\"sentiment\": \"{sentiment}\"}}"),
            );
            let mut state = validated_with_draft();
            state.set_feedback(feedback.to_string());

            run(StepId::CollectFeedback, &mut state, &backend).await.unwrap();

            assert_eq!(state.analysis(), sentiment);
            assert_eq!(state.history().last().unwrap().text, expected);
        }
    }

    #[tokio::test]
    async fn test_collect_feedback_with_empty_feedback_is_generic() {
        let backend = ScriptedBackend::new().always("collect-feedback", "positive");
        let mut state = validated_with_draft();

        run(StepId::CollectFeedback, &mut state, &backend).await.unwrap();

        assert_eq!(state.history().last().unwrap().text, "Feedback received: ");
        assert_eq!(state.feedback(), Some(""));
    }

    #[tokio::test]
    async fn test_revise_draft_sets_best_post_without_new_draft() {
        let backend = ScriptedBackend::new().always("revise-draft", "Revised with data");
        let mut state = validated_with_draft();
        state.set_feedback("add more data".to_string());

        run(StepId::ReviseDraft, &mut state, &backend).await.unwrap();

        assert_eq!(state.best_post(), Some("Revised with data"));
        assert_eq!(state.drafts(), ["First draft"]);
        let prompt = backend.last_prompt("revise-draft").unwrap();
        assert!(prompt.contains("First draft"));
        assert_eq!(state.history().last().unwrap().kind, EntryKind::FeedbackRevision);
    }

    #[tokio::test]
    async fn test_revise_draft_without_drafts_is_a_contract_violation() {
        let backend = ScriptedBackend::new().always("revise-draft", "x");
        let mut state = state();
        state.set_feedback("more".to_string());

        let err = run(StepId::ReviseDraft, &mut state, &backend).await.unwrap_err();
        assert!(matches!(err, WorkflowError::ContractViolation { step: StepId::ReviseDraft, .. }));
    }

    #[tokio::test]
    async fn test_publish_requires_best_post() {
        let backend = ScriptedBackend::new();
        let mut state = validated_with_draft();

        assert!(run(StepId::Publish, &mut state, &backend).await.is_err());

        state.set_best_post("Final".to_string());
        run(StepId::Publish, &mut state, &backend).await.unwrap();
        assert_eq!(state.history().last().unwrap().text, PUBLISH_CONFIRMATION);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_state_untouched() {
        let backend = ScriptedBackend::new()
            .fail("validate-input", LlmError::ProviderOutage("503".to_string()));
        let mut state = state();
        let before = state.clone();

        let err = run(StepId::ValidateInput, &mut state, &backend).await.unwrap_err();

        assert!(matches!(err, WorkflowError::Gateway { step: StepId::ValidateInput, .. }));
        assert_eq!(state, before);
    }
}
