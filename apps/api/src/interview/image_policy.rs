//! Portrait prompt selection for persona image enrichment.
//!
//! A best-effort keyword classifier over model-written text (display name,
//! role, time/place). Misclassification only changes the image style.

use serde::{Deserialize, Serialize};

use crate::interview::models::PersonaCard;

const HISTORICAL_ROLE_KEYWORDS: &[&str] = &[
    "king",
    "queen",
    "emperor",
    "ruler",
    "inventor",
    "scientist",
    "writer",
    "poet",
    "general",
    "doctor",
    "physician",
    "independence activist",
    "왕",
    "황제",
    "발명가",
    "과학자",
    "작가",
    "시인",
    "장군",
    "의사",
    "독립운동가",
];

const KOREAN_CONTEXT_KEYWORDS: &[&str] = &[
    "조선",
    "한국",
    "고려",
    "고구려",
    "백제",
    "신라",
    "Korea",
    "Joseon",
    "Goryeo",
];

const DEFAULT_ROLE: &str = "a person";
const DEFAULT_TIME_PLACE: &str = "historical period";
const DEFAULT_APPEARANCE: &str =
    "Show professional attire and setting appropriate to their role.";

/// Which portrait prompt a persona gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortraitStyle {
    KoreanHistorical,
    Historical,
    Professional,
}

/// Keyword tables driving `PortraitStyle` selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImagePolicy {
    /// Matched case-insensitively against the persona's role.
    pub historical_role_keywords: Vec<String>,
    /// Matched case-insensitively against the persona's time/place.
    pub korean_context_keywords: Vec<String>,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            historical_role_keywords: to_owned(HISTORICAL_ROLE_KEYWORDS),
            korean_context_keywords: to_owned(KOREAN_CONTEXT_KEYWORDS),
        }
    }
}

impl ImagePolicy {
    pub fn with_role_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.historical_role_keywords.push(keyword.into());
        self
    }

    pub fn with_context_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.korean_context_keywords.push(keyword.into());
        self
    }

    /// A parenthetical in the display name (conventionally a birth name, as in
    /// "세종(이도)") or a historical role keyword marks a real historical figure.
    pub fn is_historical_figure(&self, card: &PersonaCard) -> bool {
        card.display_name.contains('(')
            || card.display_name.contains('（')
            || contains_any(&card.role, &self.historical_role_keywords)
    }

    pub fn is_korean_context(&self, time_place: &str) -> bool {
        contains_any(time_place, &self.korean_context_keywords)
    }

    pub fn classify(&self, card: &PersonaCard) -> PortraitStyle {
        if !self.is_historical_figure(card) {
            PortraitStyle::Professional
        } else if self.is_korean_context(&card.time_place) {
            PortraitStyle::KoreanHistorical
        } else {
            PortraitStyle::Historical
        }
    }

    /// Image-generation prompt for `card`.
    pub fn image_prompt(&self, card: &PersonaCard) -> String {
        let role = non_blank(&card.role).unwrap_or(DEFAULT_ROLE);
        let time_place = non_blank(&card.time_place).unwrap_or(DEFAULT_TIME_PLACE);

        match self.classify(card) {
            PortraitStyle::KoreanHistorical => format!(
                "A historically accurate portrait illustration of {role} from {time_place}.
Show authentic Korean traditional clothing (hanbok) appropriate to their status and era, with accurate colors and patterns.
Include traditional Korean cultural elements, accessories, and headwear typical of {time_place}.
Based on Korean historical records and traditional portrait paintings (초상화).
Professional educational illustration style with Korean historical accuracy, detailed and respectful.
Suitable for K-12 Korean history education.
Realistic historical Korean portrait style with accurate period details and traditional aesthetics."
            ),
            PortraitStyle::Historical => format!(
                "A historically accurate portrait illustration of {role} from {time_place}.
Show authentic period-appropriate clothing, accessories, and hairstyle typical of their social status and era.
Include historically accurate details: traditional costume, cultural items, and setting that reflects {time_place}.
Based on historical records and period artwork.
Professional educational illustration style, detailed and respectful, suitable for K-12 history education.
Realistic historical portrait style with accurate period details."
            ),
            PortraitStyle::Professional => {
                let appearance = non_blank(&card.description).unwrap_or(DEFAULT_APPEARANCE);
                format!(
                    "A portrait illustration of {role} from {time_place}.
{appearance}
Professional educational illustration style, neutral background, suitable for K-12 education.
Clean, modern illustration style."
                )
            }
        }
    }
}

fn contains_any(haystack: &str, keywords: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn to_owned(keywords: &[&str]) -> Vec<String> {
    keywords.iter().map(|k| k.to_string()).collect()
}
