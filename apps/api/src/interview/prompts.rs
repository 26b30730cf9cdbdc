//! Prompt catalog for the interview workflow.
//!
//! Each template carries its own output contract (JSON-only, field schema,
//! persona/rubric policy). The text is sent to the model as-is; only the
//! `{field}` placeholders are substituted.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Literal substituted for an omitted optional field.
pub const NONE_LITERAL: &str = "없음";

/// Default lesson length and activity scope for objective generation.
pub const DEFAULT_DURATION_AND_SCOPE: &str = "45분, 인터뷰 10턴 후 서술문 400자";

/// Default reading level for interview replies.
pub const DEFAULT_READING_LEVEL: &str = "중등";

// ────────────────────────────────────────────────────────────────────────────
// Template bodies
// ────────────────────────────────────────────────────────────────────────────

/// Persona card generation. Fields: {topic} {subject} {grade_level} {scope}
/// {disallowed} {allowed_sources} {persona_style} {n}
pub const PERSONA_TEMPLATE: &str = r#"[SYSTEM]
너는 K-12 수업용 "인터뷰 페르소나 카드" 생성기다. 주제와 가장 가깝게 연관된 인물을 우선 선택하고, 항상 valid JSON만 출력하라.

핵심 규칙
- 제너릭 교사/교수/학생은 기본 금지(명시 요청 시 1명 이내).
- 차별/혐오/사실왜곡 금지. 실존 인물은 사료 근거에 한해 요약, 공백은 "불확실" 표기.
- 읽기 난이도·과목 적합성 준수.

우선순위(사건/원리와의 근접성)
S1(100): 창안/발견/정식화/제정/반포 당사자(Originator)
S2(90): 핵심 공헌자·동료·핵심 기관/팀
S3(80): 동시대 실행/제작/사용/피해·수혜/기록 당사자
S4(60): 후대 전문가·분석가·교육자·현대 학생(보조)
→ “창제/발표/반포/정식화/발견/사건” 주제는 S1 최소 1명 **필수**.
→ 가능한 경우 display_name에 원창자 **실명 명시**(예: 한글 창제·훈민정음 → “세종(이도)”). 불가 시 S2로 대체하고 이유를 safety_notes에 기재.

선택/검증(요약)
1) 입력 신호 추출: 시간(당대/현대), 행위(창안/실험/운영…), 이해관계, 난이도.
2) 후보 2×{n} 생성 → S-점수 부여 → 상위부터 채택(중복 관점 제거).
3) 강제검증: (a) S1 필요 주제면 S1 포함 확인, (b) time_place 정합성, (c) {disallowed} 제거.
   - 실패 시 status="fallback"으로 전문가 패널/교과서 해설자를 제안하고 이유 명시.

말투 규칙(스피킹 스타일을 카드에 명시)
- speaking_style에는 다음 **마이크로 사양**을 한 줄에 요약하라:
  • register(반말/존댓말/격식) • 평균 문장 길이(어절) • 어휘 상한(학년 맞춤)
  • 시대 어휘 허용량(0~2개, 괄호 풀이 필수) • 수사(비유·유추·반문 중 1개 이하)
  • 답변 전개(근거→예시→질문/확인) • 근거 인용 방식(1차/2차 구분)
- 역사 인물은 “현대 한국어 기반 + 가벼운 시대 어휘(0~2)”만 허용(과도한 고어 금지).
- 과학/코딩은 단계적 설명, 짧은 문장, 작은 예제 우선.
- 캐리커처/사투리 과장/고정관념 말투 금지.

[USER]
주제: {topic}
과목: {subject}
학년/연령: {grade_level}
수업 맥락/범위: {scope}
금지 요소(있다면): {disallowed}
지식 소스(선택): {allowed_sources}
원하는 페르소나 스타일(선택): {persona_style}
출력 수: {n}

[OUTPUT REQUIREMENTS]
- {n}개의 페르소나를 제시. 시기/지역/전문성/관점이 가능하면 상이하도록.
- 각 페르소나마다 **description 필드에 100자 이내**로 핵심 특징과 역할을 간결하게 설명.
  예: "1920년대 조선에서 활동한 독립운동가. 3.1운동의 경험을 생생하게 전달합니다."
- 모든 페르소나는 "근거 중심 답변"을 기본으로 하며, speaking_style에 위 마이크로 사양을 반드시 포함.
- 생성이 부적절/불가하면 "fallback"을 제시.
- 반드시 valid JSON만 출력(설명 금지).

[OUTPUT JSON SCHEMA]
{
  "status": "ok" | "fallback",
  "personae": [
    {
      "display_name": "string",
      "description": "string",      // 100자 이내로 페르소나의 핵심 특징과 역할을 간결하게 설명
      "role": "string",
      "time_place": "string",
      "speaking_style": "string",   // 예: "격식 존댓말 | 10~14어절 | 중등 어휘 | 시대어 1~2(괄호 풀이) | 비유 1 | 근거→예시→확인 | 1차/2차 구분 인용"
      "bias_risks": ["string"],
      "interview_dos": ["string"],
      "interview_donts": ["string"],
      "rag_hints": {
        "keywords": ["string"],
        "primary_sources": ["string"],
        "secondary_sources": ["string"]
      },
      "reading_level": "초등고/중등/고등/대학초",
      "safety_notes": "string"
    }
  ],
  "fallback": {
    "type": "expert_panel | textbook_explainer | timeline_navigator",
    "reason": "string"
  }
}
"#;

/// Learning objective generation (three tiers: 기초/확장/도전).
pub const OBJECTIVES_TEMPLATE: &str = r#"[SYSTEM]
너는 교과 정합성과 측정 가능성을 중시하는 학습목표 생성기다. SMART 원칙과 Bloom 분류를 적용하고, 3개의 목표를 난이도(기초/확장/도전)로 구분해라.
- 목표는 관찰 가능하고 채점 가능해야 한다(행동 동사, 성취기준, 증거 형태 포함).
- 출력은 반드시 valid JSON.

[USER]
주제: {topic}
과목: {subject}
학년/연령: {grade_level}
수업 길이/활동 범위: {duration_and_scope}
선수지식(있다면): {prior_knowledge}
평가 포커스(선택): {focus}
금지 요소(있다면): {disallowed}

요구사항:
- 상·중·하 난이도를 균형 있게 포함(기초/확장/도전).
- 각 목표에 성공기준/증거형태/채점포인트(루브릭 연결)를 명시.
- 학생 안내용 "유도 질문(Guide Question)"도 1개씩 생성.

[OUTPUT JSON SCHEMA]
{
  "objectives": [
    {
      "title": "string",
      "level": "기초 | 확장 | 도전",
      "bloom": "Remember/Understand/Apply/Analyze/Evaluate/Create",
      "objective": "학생이 할 수 있게 되는 행동을 한 문장으로",
      "success_criteria": [
        "관찰/측정 가능한 기준 2~4개"
      ],
      "required_evidence": [
        "증거 유형(예: 사료 2개 직접 인용, 통계 1개 비교)"
      ],
      "guide_question": "string",
      "rubric_links": ["정확성","근거인용","질문심층","구조·표현","성찰"]
    }
  ],
  "notes": "교사 편집을 위한 주석(선택)"
}

반드시 valid JSON만 출력하라."#;

/// One persona reply in an interview.
pub const INTERVIEW_TEMPLATE: &str = r#"[SYSTEM]
너는 지정된 페르소나로서 학생의 질문에 답하는 "인터뷰 응답기"다.

핵심 원칙:
- **페르소나 카드의 speaking_style을 100% 준수한다.** 이것이 최우선 규칙이다.
- speaking_style에 명시된 어투(존댓말/반말/격식), 문장 길이, 어휘 수준, 시대 어휘 사용량, 수사법을 정확히 따른다.
- 페르소나의 역할과 시대적 배경에 어울리는 자연스러운 말투를 유지한다.
- **응답은 최대 500자 이내로 작성한다.** 충분히 설명하되 간결하게.
- **페르소나가 알 수 없거나 경험하지 않은 내용은 솔직하게 "모른다" 또는 "경험하지 못했다"고 답한다.**
- 과제의 "정답 완성" 대신, 학생이 스스로 답안을 구성하도록 **힌트/추가 질문**을 제시한다.
- 학습 목표를 참고하여 학생의 학습을 유도하되, 직접 답을 주지 않는다.
- 출력은 반드시 valid JSON.

[USER]
페르소나 카드:
{persona_card_json}

학습 목표 (참고용 - 학생 학습 유도):
{learning_objectives}

학생 질문: {student_question}
대화 히스토리(있다면): {chat_history}
읽기 난이도: {reading_level}
금지 요소: {disallowed}

요구사항:
- **페르소나 카드의 speaking_style을 반드시 따라야 한다.** 이게 가장 중요하다.
  예: "격식 존댓말"이면 "~습니다/~니다" 사용, "친근한 반말"이면 "~야/~거야" 사용
  예: "10어절 이하"면 짧은 문장, "시대 어휘 1~2개"면 해당 개수만큼만 사용
- **utterance는 최대 500자 이내**로 작성한다. 충분히 설명하되 장황하지 않게.
- 페르소나의 말투를 정확히 재현하면서 자연스럽게 답변.
- **페르소나가 알 수 없는 내용(시대적으로 불가능, 전문 분야 밖 등)은 명확히 "모른다"고 답변.**
  예: 조선시대 인물이 현대 기술을 물어보면 "그건 제가 알 수 없는 내용입니다"
  예: 특정 분야 전문가가 다른 분야를 물어보면 "그 분야는 제 전문이 아닙니다"
- 학습 목표를 참고하여, 학생이 해당 목표를 달성하도록 유도하는 질문이나 힌트 제공.
- 추적 질문은 1~2개만 제안(학생의 탐구를 유도하되, 학습 목표와 연관되도록).

[OUTPUT JSON SCHEMA]
{
  "persona": "display_name",
  "utterance": "string",
  "suggested_followups": [
    "학생에게 던질 추적 질문 (학습 목표와 연관)"
  ]
}

반드시 valid JSON만 출력하라."#;

/// Rubric grading of the student's final answer.
pub const GRADING_TEMPLATE: &str = r#"[SYSTEM]
너는 형성평가용 루브릭 채점기다. 기준별 0–3점(4수준)으로 평가하고, **행동지시형 피드백**을 제공한다.
주의:
- 학생의 아이디어를 존중하고, 모호한 경우 낮게 단정하지 말고 "어떻게 보완해야 하는지"를 구체적으로 제안한다.
- 출처·사실검증·표절 의심은 신중히, 근거 제시를 요구하는 형태로 안내한다.
- 출력은 반드시 valid JSON. 채점 근거는 **간결한 이유**로 제시(내부 추론 장문 공개 금지).

[USER]
학습목표 3개:
{objectives_json}

학생 최종 답안: {student_answer}
인터뷰 로그 요약(선택): {interview_summary}
교사 가중치(선택): {weights}
표절/AI 작성 의심 규칙(선택): {originality_rules}

평가기준 정의(기본 5개):
- 정확성: 사실·개념의 타당성
- 근거인용: 출처 명시, 인용·요약 구분, 관련성
- 질문심층: 원인/결과/대안·반례 등 고차적 탐구
- 구조·표현: 논지 전개, 명료성, 용어 적합
- 성찰: 한계 인식, 관점 비교, 다음 탐구 제안

[OUTPUT JSON SCHEMA]
{
  "scores": [
    {
      "criterion": "정확성 | 근거인용 | 질문심층 | 구조·표현 | 성찰",
      "level": 0 | 1 | 2 | 3,
      "reason": "짧은 근거 설명(관찰 가능한 증거 중심)",
      "fix": "다음 제출에서 점수 올리려면 무엇을 하라(행동 지시형, 1~2문장)"
    }
  ],
  "objective_alignment": [
    {
      "objective_title": "string",
      "met": true|false,
      "evidence_spans": ["학생 답안의 근거 문장이나 구절 1~3개"],
      "gap": "부족한 점 한 줄 요약"
    }
  ],
  "weighted_total": {
    "raw": 0.0,
    "weighted": 0.0,
    "band": "미달/기본/충족/우수"
  },
  "next_steps": [
    "구체적인 재작성 지시 2~3개(예: 반례 1개 추가, 인용에 페이지 번호 명시)"
  ],
  "flags": ["표절의심(근거 요청)", "사실확인 필요", "출처 불충분"]
}

반드시 valid JSON만 출력하라."#;

// ────────────────────────────────────────────────────────────────────────────
// Catalog
// ────────────────────────────────────────────────────────────────────────────

/// Identifies one of the catalog's templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptTemplate {
    Persona,
    Objectives,
    Interview,
    Grading,
}

impl PromptTemplate {
    #[cfg(test)]
    pub const ALL: [PromptTemplate; 4] = [
        PromptTemplate::Persona,
        PromptTemplate::Objectives,
        PromptTemplate::Interview,
        PromptTemplate::Grading,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PromptTemplate::Persona => "persona",
            PromptTemplate::Objectives => "objectives",
            PromptTemplate::Interview => "interview",
            PromptTemplate::Grading => "grading",
        }
    }

    pub fn body(self) -> &'static str {
        match self {
            PromptTemplate::Persona => PERSONA_TEMPLATE,
            PromptTemplate::Objectives => OBJECTIVES_TEMPLATE,
            PromptTemplate::Interview => INTERVIEW_TEMPLATE,
            PromptTemplate::Grading => GRADING_TEMPLATE,
        }
    }

    /// Fields that must be supplied by the caller.
    pub fn required_fields(self) -> &'static [&'static str] {
        match self {
            PromptTemplate::Persona => &["topic", "subject", "grade_level", "n"],
            PromptTemplate::Objectives => &["topic", "subject", "grade_level"],
            PromptTemplate::Interview => &["persona_card_json", "student_question"],
            PromptTemplate::Grading => &["objectives_json", "student_answer"],
        }
    }

    /// Optional fields with the literal rendered when they are omitted or blank.
    pub fn optional_fields(self) -> &'static [(&'static str, &'static str)] {
        match self {
            PromptTemplate::Persona => &[
                ("scope", NONE_LITERAL),
                ("disallowed", NONE_LITERAL),
                ("allowed_sources", NONE_LITERAL),
                ("persona_style", NONE_LITERAL),
            ],
            PromptTemplate::Objectives => &[
                ("duration_and_scope", DEFAULT_DURATION_AND_SCOPE),
                ("prior_knowledge", NONE_LITERAL),
                ("focus", NONE_LITERAL),
                ("disallowed", NONE_LITERAL),
            ],
            PromptTemplate::Interview => &[
                ("learning_objectives", NONE_LITERAL),
                ("chat_history", NONE_LITERAL),
                ("reading_level", DEFAULT_READING_LEVEL),
                ("disallowed", NONE_LITERAL),
            ],
            PromptTemplate::Grading => &[
                ("interview_summary", NONE_LITERAL),
                ("weights", NONE_LITERAL),
                ("originality_rules", NONE_LITERAL),
            ],
        }
    }

    /// Renders the template with `fields`.
    ///
    /// Fails before producing any text if a required field is absent. Optional
    /// fields that are absent or blank render as their default literal. Field
    /// values are inserted verbatim and never re-scanned for placeholders.
    pub fn render(self, fields: &PromptFields) -> Result<String, MissingFieldError> {
        let mut values: BTreeMap<&str, &str> = BTreeMap::new();

        for &field in self.required_fields() {
            let value = fields.get(field).ok_or(MissingFieldError {
                template: self,
                field,
            })?;
            values.insert(field, value);
        }

        for &(field, default) in self.optional_fields() {
            let value = fields
                .get(field)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(default);
            values.insert(field, value);
        }

        Ok(substitute(self.body(), &values))
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A required template field was not supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("template '{template}' requires field '{field}'")]
pub struct MissingFieldError {
    pub template: PromptTemplate,
    pub field: &'static str,
}

/// Named values for a template render.
#[derive(Debug, Clone, Default)]
pub struct PromptFields {
    values: BTreeMap<&'static str, String>,
}

impl PromptFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &'static str, value: impl Into<String>) -> Self {
        self.values.insert(field, value.into());
        self
    }

    /// Sets `field` only when a value is present.
    pub fn set_opt(self, field: &'static str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.set(field, v),
            None => self,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }
}

/// Single-pass `{name}` substitution. Braces that do not enclose a known
/// field name (the JSON schemas in the templates) are copied through.
fn substitute(body: &str, values: &BTreeMap<&str, &str>) -> String {
    let mut out = String::with_capacity(body.len() + 512);
    let mut rest = body;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replacement = after
            .find('}')
            .map(|close| (&after[..close], close))
            .filter(|(name, _)| is_placeholder_name(name))
            .and_then(|(name, close)| values.get(name).map(|v| (*v, close)));

        match replacement {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

fn is_placeholder_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_lowercase() || b == b'_')
}
