//! Learning objective generation — three measurable objectives, one per
//! difficulty tier, each with a guide question.

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::models::ObjectivesResult;
use crate::interview::prompts::{MissingFieldError, PromptFields, PromptTemplate};
use crate::llm_client::extract::extract_as;
use crate::llm_client::{LlmBackend, DEFAULT_MAX_TOKENS};

/// Objectives per batch (기초/확장/도전).
pub const EXPECTED_OBJECTIVES: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectivesRequest {
    pub topic: String,
    pub subject: String,
    pub grade_level: String,
    #[serde(default)]
    pub duration_and_scope: Option<String>,
    #[serde(default)]
    pub prior_knowledge: Option<String>,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub disallowed: Option<String>,
}

pub fn build_objectives_prompt(request: &ObjectivesRequest) -> Result<String, MissingFieldError> {
    let fields = PromptFields::new()
        .set("topic", request.topic.as_str())
        .set("subject", request.subject.as_str())
        .set("grade_level", request.grade_level.as_str())
        .set_opt("duration_and_scope", request.duration_and_scope.as_deref())
        .set_opt("prior_knowledge", request.prior_knowledge.as_deref())
        .set_opt("focus", request.focus.as_deref())
        .set_opt("disallowed", request.disallowed.as_deref());

    PromptTemplate::Objectives.render(&fields)
}

pub async fn generate_objectives(
    llm: &dyn LlmBackend,
    request: &ObjectivesRequest,
) -> Result<ObjectivesResult, AppError> {
    let prompt = build_objectives_prompt(request)?;

    info!("Generating learning objectives for topic {:?}", request.topic);
    let raw = llm.complete(&prompt, DEFAULT_MAX_TOKENS).await?;
    let result: ObjectivesResult = extract_as(&raw, "objectives reply")?;

    if result.objectives.len() != EXPECTED_OBJECTIVES {
        warn!(
            "Expected {} objectives, model returned {}",
            EXPECTED_OBJECTIVES,
            result.objectives.len()
        );
    }

    Ok(result)
}
