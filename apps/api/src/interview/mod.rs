//! Interview orchestration: state machine, question/answer pipeline,
//! fallback synthesizer, final evaluation and the engine tying them together.

pub mod aggregator;
pub mod backend;
pub mod engine;
pub mod fallback;
pub mod handlers;
pub mod pipeline;
pub mod prompts;
pub mod state_machine;

#[cfg(test)]
pub mod testing;

pub use engine::InterviewEngine;
