//! Interview turns — the selected persona answers one student question.

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::models::{
    lenient, ChatTurn, InterviewTurn, ObjectivesResult, PersonaCard, ReadingLevel, Speaker,
};
use crate::interview::prompts::{PromptFields, PromptTemplate};
use crate::llm_client::extract::extract_as;
use crate::llm_client::LlmBackend;

/// Most recent turns replayed to the model.
pub const HISTORY_WINDOW: usize = 5;
/// Bounds the reply so a 500-character utterance fits.
pub const INTERVIEW_MAX_TOKENS: u32 = 2000;
pub const MAX_UTTERANCE_CHARS: usize = 500;
pub const MAX_FOLLOWUPS: usize = 2;

#[derive(Debug, Clone, Deserialize)]
pub struct InterviewTurnRequest {
    pub persona: PersonaCard,
    pub student_question: String,
    #[serde(default)]
    pub objectives: Option<ObjectivesResult>,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Overrides the persona card's own reading level.
    #[serde(default)]
    pub reading_level: Option<ReadingLevel>,
    #[serde(default)]
    pub disallowed: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InterviewReply {
    #[serde(deserialize_with = "lenient::opt_string")]
    persona: Option<String>,
    #[serde(deserialize_with = "lenient::string")]
    utterance: String,
    #[serde(deserialize_with = "lenient::strings")]
    suggested_followups: Vec<String>,
}

/// Renders the last `HISTORY_WINDOW` turns as `label: content` lines.
pub fn format_history(history: &[ChatTurn]) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Flattens objectives to `- title: guide question` lines. The persona may
/// steer toward these but the template forbids handing out answers.
pub fn format_objective_guidance(objectives: Option<&ObjectivesResult>) -> String {
    objectives
        .map(|o| {
            o.objectives
                .iter()
                .map(|obj| format!("- {}: {}", obj.title, obj.guide_question))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

pub fn build_interview_prompt(request: &InterviewTurnRequest) -> Result<String, AppError> {
    let persona_card_json = serde_json::to_string_pretty(&request.persona)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize persona card: {e}")))?;

    let reading_level = request
        .reading_level
        .as_ref()
        .or(request.persona.reading_level.as_ref())
        .map(ReadingLevel::as_str);

    let fields = PromptFields::new()
        .set("persona_card_json", persona_card_json)
        .set("student_question", request.student_question.as_str())
        .set(
            "learning_objectives",
            format_objective_guidance(request.objectives.as_ref()),
        )
        .set("chat_history", format_history(&request.history))
        .set_opt("reading_level", reading_level)
        .set_opt("disallowed", request.disallowed.as_deref());

    Ok(PromptTemplate::Interview.render(&fields)?)
}

pub async fn generate_interview_turn(
    llm: &dyn LlmBackend,
    request: &InterviewTurnRequest,
) -> Result<InterviewTurn, AppError> {
    let prompt = build_interview_prompt(request)?;

    info!(
        "Generating interview reply from {:?} ({} prior turns)",
        request.persona.display_name,
        request.history.len()
    );
    let raw = llm.complete(&prompt, INTERVIEW_MAX_TOKENS).await?;
    let reply: InterviewReply = extract_as(&raw, "interview reply")?;

    let utterance_chars = reply.utterance.chars().count();
    if utterance_chars > MAX_UTTERANCE_CHARS {
        warn!(
            "Interview utterance is {} characters (max {})",
            utterance_chars, MAX_UTTERANCE_CHARS
        );
    }

    let mut suggested_followups = reply.suggested_followups;
    suggested_followups.truncate(MAX_FOLLOWUPS);

    Ok(InterviewTurn {
        speaker: Speaker::Persona,
        persona: reply
            .persona
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| request.persona.display_name.clone()),
        utterance: reply.utterance,
        suggested_followups,
        image_url: request.persona.image_url.clone(),
    })
}
