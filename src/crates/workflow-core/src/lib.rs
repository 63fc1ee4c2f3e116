//! Plan-and-execute graph runtime.
//!
//! A thread moves through a fixed four-node state machine — planner, router,
//! executor, synthesizer — rather than an arbitrary cyclic graph. Every
//! transition is checkpointed through [`workflow_checkpoint`], so a thread can be
//! resumed or retried from durable storage without the runtime holding any
//! in-memory continuation.

pub mod error;
pub mod interrupt;
pub mod llm;
pub mod lock;
pub mod runtime;
pub mod types;

pub use error::{GraphError, Result};
pub use interrupt::{InterruptDescriptor, ResumeAction};
pub use llm::{LlmGateway, StepOutcome, TokenSink};
pub use lock::ThreadLockRegistry;
pub use runtime::{GraphRuntime, RuntimeEvent};
pub use types::{AppliedDecision, GraphState, Message, MessageRole, Plan, PlanView, Step, StepStatus, ThreadId};
