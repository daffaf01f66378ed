//! lariat-eval: offline evaluation harness
//!
//! Runs the agent against examples stored in a LangSmith-compatible
//! backend, scores the answers with an LLM-as-judge evaluator, and logs
//! runs and feedback back to the backend.

pub mod client;
pub mod datasets;
pub mod error;
pub mod evaluators;
pub mod runner;
pub mod target;

pub use client::{Dataset, EvalClient, Example};
pub use error::Error;
pub use evaluators::{CorrectnessEvaluator, EvaluatorResult, ScoreMode};
pub use runner::{run_evaluation, EvaluationConfig, EvaluationReport, ExampleResult};
pub use target::{AgentTarget, EvalTarget};
