//! Request-scoped value types produced from model output.
//!
//! Everything here is built fresh per call and handed back to the caller.
//! Fields the model may omit default to empty values so callers can read
//! partial output; enumerated labels keep unknown values verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Max characters in a persona card description.
pub const MAX_DESCRIPTION_CHARS: usize = 100;

/// Field deserializers for model output. A `null` or mistyped value reads as
/// the field's empty value instead of failing the whole reply.
pub(crate) mod lenient {
    use serde::de::DeserializeOwned;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(T::deserialize(value).unwrap_or_default())
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(scalar_text(Value::deserialize(deserializer)?))
    }

    /// A list of strings; a lone string becomes a one-item list.
    pub fn strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items.into_iter().filter_map(scalar_text).collect(),
            other => scalar_text(other).into_iter().collect(),
        })
    }

    /// A list of `T`; items that don't read as `T` are dropped.
    pub fn seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: DeserializeOwned,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| T::deserialize(item).ok())
                .collect(),
            _ => Vec::new(),
        })
    }

    /// A number, or a string holding one.
    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(as_f64(&Value::deserialize(deserializer)?).unwrap_or_default())
    }

    pub fn level<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = as_f64(&Value::deserialize(deserializer)?).unwrap_or_default();
        Ok(level.round().clamp(0.0, f64::from(u8::MAX)) as u8)
    }

    pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Value::deserialize(deserializer)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            _ => false,
        })
    }

    fn scalar_text(value: Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    fn as_f64(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Declares a label enum that parses known labels into variants and keeps
/// anything else as `Other`.
macro_rules! label_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Other(label) => label,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.trim() {
                    $($label => Self::$variant,)+
                    _ => Self::Other(value),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> String {
                value.as_str().to_string()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

label_enum! {
    /// Target reading level for a persona's answers.
    ReadingLevel {
        ElementaryHigh => "초등고",
        Middle => "중등",
        High => "고등",
        EarlyCollege => "대학초",
    }
}

label_enum! {
    /// Proposed alternative when persona generation declines.
    FallbackKind {
        ExpertPanel => "expert_panel",
        TextbookExplainer => "textbook_explainer",
        TimelineNavigator => "timeline_navigator",
    }
}

label_enum! {
    /// Objective difficulty tier.
    DifficultyLevel {
        Basic => "기초",
        Extended => "확장",
        Challenge => "도전",
    }
}

label_enum! {
    BloomCategory {
        Remember => "Remember",
        Understand => "Understand",
        Apply => "Apply",
        Analyze => "Analyze",
        Evaluate => "Evaluate",
        Create => "Create",
    }
}

label_enum! {
    /// The five rubric criteria.
    Criterion {
        Accuracy => "정확성",
        SourceCitation => "근거인용",
        InquiryDepth => "질문심층",
        StructureExpression => "구조·표현",
        Reflection => "성찰",
    }
}

label_enum! {
    /// Coarse grade derived from the weighted score.
    Band {
        Below => "미달",
        Basic => "기본",
        Meets => "충족",
        Exceeds => "우수",
    }
}

impl Criterion {
    pub const RUBRIC: [Criterion; 5] = [
        Criterion::Accuracy,
        Criterion::SourceCitation,
        Criterion::InquiryDepth,
        Criterion::StructureExpression,
        Criterion::Reflection,
    ];
}

impl Default for FallbackKind {
    fn default() -> Self {
        FallbackKind::ExpertPanel
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Personae
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalHints {
    #[serde(deserialize_with = "lenient::strings")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub primary_sources: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub secondary_sources: Vec<String>,
}

/// A simulated interview subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaCard {
    #[serde(deserialize_with = "lenient::string")]
    pub display_name: String,
    /// At most `MAX_DESCRIPTION_CHARS` characters.
    #[serde(deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(deserialize_with = "lenient::string")]
    pub role: String,
    #[serde(deserialize_with = "lenient::string")]
    pub time_place: String,
    /// Register, sentence length, vocabulary ceiling, period words, rhetoric,
    /// answer structure and citation style in one line.
    #[serde(deserialize_with = "lenient::string")]
    pub speaking_style: String,
    #[serde(deserialize_with = "lenient::strings")]
    pub bias_risks: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub interview_dos: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub interview_donts: Vec<String>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub rag_hints: RetrievalHints,
    #[serde(deserialize_with = "lenient::or_default")]
    pub reading_level: Option<ReadingLevel>,
    #[serde(deserialize_with = "lenient::string")]
    pub safety_notes: String,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackDescriptor {
    #[serde(rename = "type", deserialize_with = "lenient::or_default")]
    pub kind: FallbackKind,
    #[serde(deserialize_with = "lenient::string")]
    pub reason: String,
}

/// Outcome of persona generation: personae or a fallback, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PersonaGenerationResult {
    Ok { personae: Vec<PersonaCard> },
    Fallback { fallback: FallbackDescriptor },
}

#[cfg(test)]
impl PersonaGenerationResult {
    pub fn personae(&self) -> &[PersonaCard] {
        match self {
            PersonaGenerationResult::Ok { personae } => personae,
            PersonaGenerationResult::Fallback { .. } => &[],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Objectives
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningObjective {
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(deserialize_with = "lenient::or_default")]
    pub level: Option<DifficultyLevel>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub bloom: Option<BloomCategory>,
    #[serde(deserialize_with = "lenient::string")]
    pub objective: String,
    /// 2–4 observable criteria.
    #[serde(deserialize_with = "lenient::strings")]
    pub success_criteria: Vec<String>,
    #[serde(deserialize_with = "lenient::strings")]
    pub required_evidence: Vec<String>,
    #[serde(deserialize_with = "lenient::string")]
    pub guide_question: String,
    #[serde(deserialize_with = "lenient::strings")]
    pub rubric_links: Vec<String>,
}

/// One objective per difficulty tier, plus optional notes for the teacher.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectivesResult {
    #[serde(deserialize_with = "lenient::seq")]
    pub objectives: Vec<LearningObjective>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub notes: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Interview
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Student,
    Persona,
}

impl Speaker {
    /// Label used when replaying turns to the model.
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Student => "학생",
            Speaker::Persona => "페르소나",
        }
    }
}

/// A prior turn in the conversation with the current persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Speaker,
    pub content: String,
}

/// A turn from any persona's interview, as kept by the caller for grading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewLogEntry {
    pub persona: String,
    pub role: Speaker,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewTurn {
    pub speaker: Speaker,
    pub persona: String,
    pub utterance: String,
    pub suggested_followups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Grading
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RubricScore {
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::or_default"
    )]
    pub criterion: Option<Criterion>,
    /// 0–3
    #[serde(deserialize_with = "lenient::level")]
    pub level: u8,
    #[serde(deserialize_with = "lenient::string")]
    pub reason: String,
    #[serde(deserialize_with = "lenient::string")]
    pub fix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectiveAlignment {
    #[serde(deserialize_with = "lenient::string")]
    pub objective_title: String,
    #[serde(deserialize_with = "lenient::flag")]
    pub met: bool,
    #[serde(deserialize_with = "lenient::strings")]
    pub evidence_spans: Vec<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub gap: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightedTotal {
    #[serde(deserialize_with = "lenient::number")]
    pub raw: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub weighted: f64,
    #[serde(deserialize_with = "lenient::or_default")]
    pub band: Option<Band>,
}

/// Review flags raised by the grader. Matched by keyword since the model
/// tends to append its own qualifiers to the label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GradingFlag {
    PlagiarismSuspected,
    FactCheckNeeded,
    InsufficientSourcing,
    Other(String),
}

impl GradingFlag {
    pub fn as_str(&self) -> &str {
        match self {
            GradingFlag::PlagiarismSuspected => "표절의심(근거 요청)",
            GradingFlag::FactCheckNeeded => "사실확인 필요",
            GradingFlag::InsufficientSourcing => "출처 불충분",
            GradingFlag::Other(label) => label,
        }
    }
}

impl From<String> for GradingFlag {
    fn from(value: String) -> Self {
        if value.contains("표절") {
            GradingFlag::PlagiarismSuspected
        } else if value.contains("사실확인") || value.contains("사실 확인") {
            GradingFlag::FactCheckNeeded
        } else if value.contains("출처") {
            GradingFlag::InsufficientSourcing
        } else {
            GradingFlag::Other(value)
        }
    }
}

impl From<GradingFlag> for String {
    fn from(value: GradingFlag) -> String {
        value.as_str().to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingResult {
    #[serde(deserialize_with = "lenient::seq")]
    pub scores: Vec<RubricScore>,
    #[serde(deserialize_with = "lenient::seq")]
    pub objective_alignment: Vec<ObjectiveAlignment>,
    #[serde(deserialize_with = "lenient::or_default")]
    pub weighted_total: WeightedTotal,
    #[serde(deserialize_with = "lenient::strings")]
    pub next_steps: Vec<String>,
    #[serde(deserialize_with = "lenient::seq")]
    pub flags: Vec<GradingFlag>,
}
