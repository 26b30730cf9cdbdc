//! InterviewOrchestrator — the four interview operations behind one handle.
//!
//! Flow per operation: render template → complete → extract → normalize →
//! (persona only) portrait enrichment. Every call is a single stateless round
//! trip; callers own all session and conversation state.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::errors::AppError;
use crate::interview::dialogue::{generate_interview_turn, InterviewTurnRequest};
use crate::interview::grading::{grade_answer, GradeRequest};
use crate::interview::image_policy::ImagePolicy;
use crate::interview::models::{
    GradingResult, InterviewTurn, ObjectivesResult, PersonaGenerationResult,
};
use crate::interview::objectives::{generate_objectives, ObjectivesRequest};
use crate::interview::persona::{generate_personae, PersonaRequest};
use crate::llm_client::{LlmBackend, OpenAiClient, MODEL};

pub struct InterviewOrchestrator {
    llm: Arc<dyn LlmBackend>,
    image_policy: ImagePolicy,
}

impl InterviewOrchestrator {
    pub fn new(llm: Arc<dyn LlmBackend>, image_policy: ImagePolicy) -> Self {
        Self { llm, image_policy }
    }

    /// Builds the production orchestrator. Fails with
    /// `AppError::Configuration` if the API key is blank.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = OpenAiClient::new(&config.openai_api_key, &config.openai_base_url)?;
        info!("LLM client initialized (model: {})", MODEL);
        Ok(Self::new(Arc::new(client), config.image_policy.clone()))
    }

    pub async fn generate_personae(
        &self,
        request: &PersonaRequest,
    ) -> Result<PersonaGenerationResult, AppError> {
        generate_personae(self.llm.as_ref(), &self.image_policy, request).await
    }

    pub async fn generate_objectives(
        &self,
        request: &ObjectivesRequest,
    ) -> Result<ObjectivesResult, AppError> {
        generate_objectives(self.llm.as_ref(), request).await
    }

    pub async fn generate_interview_turn(
        &self,
        request: &InterviewTurnRequest,
    ) -> Result<InterviewTurn, AppError> {
        generate_interview_turn(self.llm.as_ref(), request).await
    }

    pub async fn grade_answer(&self, request: &GradeRequest) -> Result<GradingResult, AppError> {
        grade_answer(self.llm.as_ref(), request).await
    }
}
