//! The post drafting workflow.
//!
//! A run validates the requested topic, tone and audience, generates a draft,
//! validates it (regenerating until it passes), then pauses for human
//! feedback. Positive feedback ends the run; anything else revises the draft
//! and publishes the revision (simulated).
//!
//! [`Orchestrator`] walks the step graph in [`graph`], checkpointing the whole
//! [`WorkflowState`] after every step through a [`CheckpointStore`].

pub mod checkpoint;
pub mod error;
pub mod graph;
mod orchestrator;
pub mod prompts;
pub mod state;
mod steps;

pub use checkpoint::{
    CHECKPOINT_VERSION, Checkpoint, CheckpointStore, Cursor, FileCheckpointStore,
    MemoryCheckpointStore, RunStatus, SessionGuard,
};
pub use error::{CheckpointError, WorkflowError};
pub use graph::{Branch, ENTRY, EDGES, Next, StepId};
pub use orchestrator::{Interaction, Orchestrator, RunOutcome};
pub use state::{
    Author, ChatEntry, EntryKind, MAX_SELECTIONS, Validation, WorkflowParams, WorkflowState,
};
pub use steps::{PUBLISH_CONFIRMATION, parse_sentiment, parse_validity};
