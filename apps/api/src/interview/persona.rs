//! Persona generation — persona cards for a topic, each enriched with a
//! best-effort portrait.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::image_policy::ImagePolicy;
use crate::interview::models::{
    lenient, FallbackDescriptor, FallbackKind, PersonaCard, PersonaGenerationResult,
    MAX_DESCRIPTION_CHARS,
};
use crate::interview::prompts::{MissingFieldError, PromptFields, PromptTemplate};
use crate::llm_client::extract::extract_as;
use crate::llm_client::{LlmBackend, DEFAULT_MAX_TOKENS};

pub const MIN_PERSONAE: u8 = 1;
pub const MAX_PERSONAE: u8 = 3;
pub const DEFAULT_PERSONAE: u8 = 2;

const EMPTY_OK_REASON: &str = "모델이 페르소나를 생성하지 못했습니다.";

#[derive(Debug, Clone, Deserialize)]
pub struct PersonaRequest {
    pub topic: String,
    pub subject: String,
    pub grade_level: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub disallowed: Option<String>,
    #[serde(default)]
    pub allowed_sources: Option<String>,
    #[serde(default)]
    pub persona_style: Option<String>,
    /// Any integer; clamped to `MIN_PERSONAE..=MAX_PERSONAE` before use.
    #[serde(default = "default_count")]
    pub count: i64,
}

fn default_count() -> i64 {
    i64::from(DEFAULT_PERSONAE)
}

/// Model output before normalization; `status` and the two payloads are
/// not guaranteed to agree.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PersonaReply {
    #[serde(deserialize_with = "lenient::opt_string")]
    status: Option<String>,
    #[serde(deserialize_with = "lenient::seq")]
    personae: Vec<PersonaCard>,
    #[serde(deserialize_with = "lenient::or_default")]
    fallback: Option<FallbackDescriptor>,
}

pub fn clamp_count(count: i64) -> u8 {
    let clamped = count.clamp(i64::from(MIN_PERSONAE), i64::from(MAX_PERSONAE));
    u8::try_from(clamped).unwrap_or(DEFAULT_PERSONAE)
}

pub fn build_persona_prompt(request: &PersonaRequest) -> Result<String, MissingFieldError> {
    let fields = PromptFields::new()
        .set("topic", request.topic.as_str())
        .set("subject", request.subject.as_str())
        .set("grade_level", request.grade_level.as_str())
        .set("n", clamp_count(request.count).to_string())
        .set_opt("scope", request.scope.as_deref())
        .set_opt("disallowed", request.disallowed.as_deref())
        .set_opt("allowed_sources", request.allowed_sources.as_deref())
        .set_opt("persona_style", request.persona_style.as_deref());

    PromptTemplate::Persona.render(&fields)
}

/// Generates `count` personae (or a fallback) and attaches a portrait to each.
pub async fn generate_personae(
    llm: &dyn LlmBackend,
    policy: &ImagePolicy,
    request: &PersonaRequest,
) -> Result<PersonaGenerationResult, AppError> {
    let count = clamp_count(request.count);
    let prompt = build_persona_prompt(request)?;

    info!("Generating {} personae for topic {:?}", count, request.topic);
    let raw = llm.complete(&prompt, DEFAULT_MAX_TOKENS).await?;
    let reply: PersonaReply = extract_as(&raw, "persona reply")?;

    match normalize_reply(reply, count) {
        PersonaGenerationResult::Ok { personae } => {
            let personae = attach_portraits(llm, policy, personae).await;
            info!("Generated {} personae", personae.len());
            Ok(PersonaGenerationResult::Ok { personae })
        }
        fallback => {
            info!("Persona generation fell back: {:?}", fallback);
            Ok(fallback)
        }
    }
}

/// Reduces a raw reply to exactly one of personae or fallback.
fn normalize_reply(reply: PersonaReply, count: u8) -> PersonaGenerationResult {
    let declined = reply.status.as_deref().map(str::trim) == Some("fallback");

    if declined || reply.personae.is_empty() {
        let fallback = reply.fallback.unwrap_or_else(|| FallbackDescriptor {
            kind: FallbackKind::ExpertPanel,
            reason: EMPTY_OK_REASON.to_string(),
        });
        return PersonaGenerationResult::Fallback { fallback };
    }

    let mut personae = reply.personae;
    if personae.len() < count as usize {
        warn!(
            "Requested {} personae but the model returned {}",
            count,
            personae.len()
        );
    }
    personae.truncate(count as usize);

    for card in &mut personae {
        if card.description.chars().count() > MAX_DESCRIPTION_CHARS {
            card.description = card.description.chars().take(MAX_DESCRIPTION_CHARS).collect();
        }
        if card.speaking_style.trim().is_empty() {
            warn!("Persona {:?} has no speaking_style", card.display_name);
        }
    }

    PersonaGenerationResult::Ok { personae }
}

/// Requests all portraits concurrently; results keep persona order. A failed
/// request leaves that persona without an image.
async fn attach_portraits(
    llm: &dyn LlmBackend,
    policy: &ImagePolicy,
    personae: Vec<PersonaCard>,
) -> Vec<PersonaCard> {
    join_all(personae.into_iter().map(|mut card| async move {
        let prompt = policy.image_prompt(&card);
        card.image_url = llm.generate_image(&prompt).await;
        card
    }))
    .await
}
