// Interview workflow: persona generation, learning objectives, interview
// turns and rubric grading. All model calls go through llm_client.

pub mod dialogue;
pub mod grading;
pub mod handlers;
pub mod image_policy;
pub mod models;
pub mod objectives;
pub mod orchestrator;
pub mod persona;
pub mod prompts;
