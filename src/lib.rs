//! postflow - conversational LinkedIn post drafting driven by an LLM
//!
//! A run validates the topic, tone and audience, drafts a post, checks the
//! draft, and pauses for human feedback. Positive feedback ends the run;
//! anything else revises the post and publishes it (simulated).
//!
//! postflow can be used in two ways:
//! - **CLI**: `postflow start`, `postflow feedback`, `postflow show`, ...
//! - **Library**: build an [`Orchestrator`] over any [`LlmBackend`] and
//!   [`CheckpointStore`]
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use postflow::{Config, Gateway, Interaction, MemoryCheckpointStore, Orchestrator, WorkflowParams};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&Default::default())?;
//! let (gateway, _fallback) = Gateway::from_config(&config)?;
//! let orchestrator = Orchestrator::new(gateway, Box::new(MemoryCheckpointStore::new()));
//!
//! let params = WorkflowParams::new("Remote work productivity", ["professional"], ["managers"])?;
//! let outcome = orchestrator.run("demo", Interaction::Start(params)).await?;
//! println!("{:?}", outcome.state.latest_draft());
//!
//! orchestrator
//!     .run("demo", Interaction::Feedback("add more data".to_string()))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;
pub mod render;

pub use error::PostflowError;
pub use postflow_config::{CliArgs, Config, ConfigSource};
pub use postflow_llm::{Gateway, GatewayOptions, GatewayRequest, LlmBackend, OutputSchema};
pub use postflow_utils::error::{LlmError, UserFriendlyError};
pub use postflow_utils::exit_codes::ExitCode;
pub use postflow_workflow::{
    ChatEntry, Checkpoint, CheckpointStore, Cursor, EntryKind, FileCheckpointStore, Interaction,
    MemoryCheckpointStore, Orchestrator, RunOutcome, RunStatus, StepId, WorkflowError,
    WorkflowParams, WorkflowState,
};
