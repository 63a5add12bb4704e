//! Step identifiers, routers, and the edge table.
//!
//! Routing is data: a router inspects the state and yields a [`Branch`], and
//! [`EDGES`] maps `(step, branch)` to the next step. A missing entry means the
//! run ends after that step.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{Validation, WorkflowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepId {
    ValidateInput,
    GenerateDraft,
    ValidateDraft,
    CollectFeedback,
    ReviseDraft,
    Publish,
}

impl StepId {
    pub const ALL: [StepId; 6] = [
        StepId::ValidateInput,
        StepId::GenerateDraft,
        StepId::ValidateDraft,
        StepId::CollectFeedback,
        StepId::ReviseDraft,
        StepId::Publish,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            StepId::ValidateInput => "validate-input",
            StepId::GenerateDraft => "generate-draft",
            StepId::ValidateDraft => "validate-draft",
            StepId::CollectFeedback => "collect-feedback",
            StepId::ReviseDraft => "revise-draft",
            StepId::Publish => "publish",
        }
    }

    /// Steps that need fresh human input: a run reaching one by routing
    /// pauses before executing it.
    #[must_use]
    pub const fn interrupts_before(&self) -> bool {
        matches!(self, StepId::CollectFeedback)
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing result of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Branch {
    /// Unconditional edge
    Always,
    Valid,
    Invalid,
    Positive,
    Negative,
}

/// Where a run goes after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    Step(StepId),
    End,
}

/// Every run starts here unless it resumes from a checkpoint.
pub const ENTRY: StepId = StepId::ValidateInput;

pub const EDGES: &[(StepId, Branch, Next)] = &[
    (StepId::ValidateInput, Branch::Valid, Next::Step(StepId::GenerateDraft)),
    (StepId::ValidateInput, Branch::Invalid, Next::End),
    (StepId::GenerateDraft, Branch::Always, Next::Step(StepId::ValidateDraft)),
    (StepId::ValidateDraft, Branch::Valid, Next::Step(StepId::CollectFeedback)),
    (StepId::ValidateDraft, Branch::Invalid, Next::Step(StepId::GenerateDraft)),
    (StepId::CollectFeedback, Branch::Positive, Next::End),
    (StepId::CollectFeedback, Branch::Negative, Next::Step(StepId::ReviseDraft)),
    (StepId::ReviseDraft, Branch::Always, Next::Step(StepId::Publish)),
    (StepId::Publish, Branch::Always, Next::End),
];

/// Router for `step`: a pure function of the state.
#[must_use]
pub fn route(step: StepId, state: &WorkflowState) -> Branch {
    match step {
        StepId::ValidateInput => match state.validation() {
            Some(Validation::Valid) => Branch::Valid,
            _ => Branch::Invalid,
        },
        // Anything but the exact verdict sends the run back to regenerate.
        StepId::ValidateDraft => {
            if state.on() == "Valid" {
                Branch::Valid
            } else {
                Branch::Invalid
            }
        }
        StepId::CollectFeedback => {
            if state.analysis() == "positive" {
                Branch::Positive
            } else {
                Branch::Negative
            }
        }
        StepId::GenerateDraft | StepId::ReviseDraft | StepId::Publish => Branch::Always,
    }
}

#[must_use]
pub fn next_step(step: StepId, branch: Branch) -> Next {
    EDGES
        .iter()
        .find(|(from, on, _)| *from == step && *on == branch)
        .map_or(Next::End, |(_, _, to)| *to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowParams;
    use proptest::prelude::*;

    fn state() -> WorkflowState {
        WorkflowState::new(
            WorkflowParams::new("Remote work", ["professional"], ["managers"]).unwrap(),
        )
    }

    #[test]
    fn test_step_names_round_trip_through_serde() {
        for step in StepId::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
            assert_eq!(serde_json::from_str::<StepId>(&json).unwrap(), step);
        }
    }

    #[test]
    fn test_validate_input_routing() {
        let mut state = state();
        assert_eq!(route(StepId::ValidateInput, &state), Branch::Invalid);
        state.set_validation(Validation::Valid);
        assert_eq!(route(StepId::ValidateInput, &state), Branch::Valid);
        assert_eq!(
            next_step(StepId::ValidateInput, Branch::Valid),
            Next::Step(StepId::GenerateDraft)
        );
        assert_eq!(next_step(StepId::ValidateInput, Branch::Invalid), Next::End);
    }

    #[test]
    fn test_validate_draft_requires_exact_verdict() {
        let mut state = state();
        for verdict in ["valid", "Valid.", " Valid", "VALID", "Invalid", ""] {
            state.set_on(verdict);
            assert_eq!(route(StepId::ValidateDraft, &state), Branch::Invalid, "{verdict:?}");
        }
        state.set_on("Valid");
        assert_eq!(route(StepId::ValidateDraft, &state), Branch::Valid);
    }

    #[test]
    fn test_sentiment_routing_defaults_to_revision() {
        let mut state = state();
        state.set_analysis("positive");
        assert_eq!(route(StepId::CollectFeedback, &state), Branch::Positive);
        for other in ["negative", "neutral", ""] {
            state.set_analysis(other);
            assert_eq!(route(StepId::CollectFeedback, &state), Branch::Negative);
        }
    }

    #[test]
    fn test_fixed_edges() {
        assert_eq!(
            next_step(StepId::ReviseDraft, Branch::Always),
            Next::Step(StepId::Publish)
        );
        assert_eq!(next_step(StepId::Publish, Branch::Always), Next::End);
        assert_eq!(
            next_step(StepId::GenerateDraft, Branch::Always),
            Next::Step(StepId::ValidateDraft)
        );
    }

    #[test]
    fn test_only_collect_feedback_interrupts() {
        let interrupting: Vec<StepId> = StepId::ALL
            .into_iter()
            .filter(StepId::interrupts_before)
            .collect();
        assert_eq!(interrupting, vec![StepId::CollectFeedback]);
    }

    fn any_step() -> impl Strategy<Value = StepId> {
        proptest::sample::select(StepId::ALL.to_vec())
    }

    fn any_branch() -> impl Strategy<Value = Branch> {
        proptest::sample::select(vec![
            Branch::Always,
            Branch::Valid,
            Branch::Invalid,
            Branch::Positive,
            Branch::Negative,
        ])
    }

    proptest! {
        #[test]
        fn prop_edge_table_is_deterministic(step in any_step(), branch in any_branch()) {
            let matches = EDGES.iter().filter(|(f, b, _)| *f == step && *b == branch).count();
            prop_assert!(matches <= 1);
        }

        #[test]
        fn prop_routed_branch_always_has_an_edge(step in any_step(), verdict in "[A-Za-z]{0,8}", sentiment in "[a-z]{0,8}") {
            let mut state = state();
            state.set_on(&verdict);
            state.set_analysis(&sentiment);
            let branch = route(step, &state);
            prop_assert!(EDGES.iter().any(|(f, b, _)| *f == step && *b == branch));
        }

        #[test]
        fn prop_publish_only_follows_revision(step in any_step(), branch in any_branch()) {
            if next_step(step, branch) == Next::Step(StepId::Publish) {
                prop_assert_eq!(step, StepId::ReviseDraft);
            }
        }
    }
}
