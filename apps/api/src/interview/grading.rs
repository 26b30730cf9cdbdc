//! Rubric grading of the student's combined answer.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::interview::models::{Criterion, GradingResult, InterviewLogEntry, ObjectivesResult};
use crate::interview::prompts::{PromptFields, PromptTemplate};
use crate::llm_client::extract::extract_as;
use crate::llm_client::{LlmBackend, DEFAULT_MAX_TOKENS};

/// Most recent interview-log entries included in the grading summary.
pub const LOG_WINDOW: usize = 10;
/// Characters kept from each log entry.
pub const LOG_ENTRY_CHARS: usize = 100;
/// Summary sent when the student never interviewed anyone.
pub const NO_INTERVIEW_RECORD: &str = "인터뷰 기록 없음";

#[derive(Debug, Clone, Deserialize)]
pub struct GradeRequest {
    pub objectives: ObjectivesResult,
    /// All answers, combined by `combine_answers`.
    pub student_answer: String,
    #[serde(default)]
    pub interview_log: Vec<InterviewLogEntry>,
    #[serde(default)]
    pub weights: Option<String>,
    #[serde(default)]
    pub originality_rules: Option<String>,
}

/// Joins per-objective answers into one `[title]\nanswer` block per
/// objective, in objective order. Every objective needs a non-blank answer.
pub fn combine_answers(
    objectives: &ObjectivesResult,
    answers: &BTreeMap<String, String>,
) -> Result<String, AppError> {
    let mut blocks = Vec::with_capacity(objectives.objectives.len());

    for objective in &objectives.objectives {
        let answer = answers
            .get(&objective.title)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "an answer is required for objective '{}'",
                    objective.title
                ))
            })?;
        blocks.push(format!("[{}]\n{}", objective.title, answer));
    }

    Ok(blocks.join("\n\n"))
}

/// Summarizes the last `LOG_WINDOW` entries, each cut to `LOG_ENTRY_CHARS`.
pub fn summarize_interview_log(log: &[InterviewLogEntry]) -> String {
    if log.is_empty() {
        return NO_INTERVIEW_RECORD.to_string();
    }

    let start = log.len().saturating_sub(LOG_WINDOW);
    log[start..]
        .iter()
        .map(|entry| {
            let excerpt: String = entry.content.chars().take(LOG_ENTRY_CHARS).collect();
            format!("[{}] {}: {}...", entry.persona, entry.role.label(), excerpt)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_grading_prompt(request: &GradeRequest) -> Result<String, AppError> {
    let objectives_json = serde_json::to_string_pretty(&request.objectives)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize objectives: {e}")))?;

    let fields = PromptFields::new()
        .set("objectives_json", objectives_json)
        .set("student_answer", request.student_answer.as_str())
        .set(
            "interview_summary",
            summarize_interview_log(&request.interview_log),
        )
        .set_opt("weights", request.weights.as_deref())
        .set_opt("originality_rules", request.originality_rules.as_deref());

    Ok(PromptTemplate::Grading.render(&fields)?)
}

pub async fn grade_answer(
    llm: &dyn LlmBackend,
    request: &GradeRequest,
) -> Result<GradingResult, AppError> {
    let prompt = build_grading_prompt(request)?;

    info!(
        "Grading answer against {} objectives",
        request.objectives.objectives.len()
    );
    let raw = llm.complete(&prompt, DEFAULT_MAX_TOKENS).await?;
    let result: GradingResult = extract_as(&raw, "grading reply")?;

    if result.scores.len() != Criterion::RUBRIC.len() {
        warn!(
            "Expected {} rubric scores, model returned {}",
            Criterion::RUBRIC.len(),
            result.scores.len()
        );
    }
    if result.objective_alignment.len() != request.objectives.objectives.len() {
        warn!(
            "Expected {} objective alignments, model returned {}",
            request.objectives.objectives.len(),
            result.objective_alignment.len()
        );
    }

    info!(
        "Graded answer: weighted={} band={:?}",
        result.weighted_total.weighted, result.weighted_total.band
    );
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{Band, GradingFlag, LearningObjective, Speaker};
    use crate::llm_client::scripted::ScriptedBackend;
    use serde_json::json;

    const TITLES: [&str; 3] = ["창제 배경 설명하기", "반대 상소 분석하기", "오늘날 의미 평가하기"];

    fn objectives() -> ObjectivesResult {
        ObjectivesResult {
            objectives: TITLES
                .iter()
                .map(|t| LearningObjective {
                    title: t.to_string(),
                    guide_question: "왜?".to_string(),
                    ..LearningObjective::default()
                })
                .collect(),
            notes: None,
        }
    }

    fn log(n: usize, content: &str) -> Vec<InterviewLogEntry> {
        (0..n)
            .map(|i| InterviewLogEntry {
                persona: format!("p{i}"),
                role: if i % 2 == 0 {
                    Speaker::Student
                } else {
                    Speaker::Persona
                },
                content: content.to_string(),
            })
            .collect()
    }

    fn grading_reply() -> String {
        let scores: Vec<_> = Criterion::RUBRIC
            .iter()
            .map(|c| json!({"criterion": c.as_str(), "level": 2, "reason": "근거 제시", "fix": "반례 1개 추가"}))
            .collect();
        let alignment: Vec<_> = TITLES
            .iter()
            .map(|t| json!({"objective_title": t, "met": true, "evidence_spans": ["백성을 위해"]}))
            .collect();
        json!({
            "scores": scores,
            "objective_alignment": alignment,
            "weighted_total": {"raw": 2.0, "weighted": 2.2, "band": "충족"},
            "next_steps": ["인용에 출처 명시"],
            "flags": ["출처 불충분"]
        })
        .to_string()
    }

    #[test]
    fn test_empty_log_uses_sentinel() {
        assert_eq!(summarize_interview_log(&[]), NO_INTERVIEW_RECORD);
    }

    #[test]
    fn test_log_keeps_last_ten_entries() {
        let summary = summarize_interview_log(&log(14, "내용"));
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), LOG_WINDOW);
        assert_eq!(lines[0], "[p4] 학생: 내용...");
        assert_eq!(lines[9], "[p13] 페르소나: 내용...");
    }

    #[test]
    fn test_log_entries_are_truncated() {
        let long = "가".repeat(300);
        let summary = summarize_interview_log(&log(1, &long));
        let expected = format!("[p0] 학생: {}...", "가".repeat(LOG_ENTRY_CHARS));
        assert_eq!(summary, expected);
    }

    #[test]
    fn test_combine_answers_in_objective_order() {
        let answers: BTreeMap<String, String> = TITLES
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), format!(" 답{i} ")))
            .collect();
        let combined = combine_answers(&objectives(), &answers).unwrap();
        assert_eq!(
            combined,
            "[창제 배경 설명하기]\n답0\n\n[반대 상소 분석하기]\n답1\n\n[오늘날 의미 평가하기]\n답2"
        );
    }

    #[test]
    fn test_combine_answers_requires_every_objective() {
        let mut answers = BTreeMap::new();
        answers.insert(TITLES[0].to_string(), "답".to_string());
        answers.insert(TITLES[1].to_string(), "   ".to_string());
        let err = combine_answers(&objectives(), &answers).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains(TITLES[1])));
    }

    #[test]
    fn test_prompt_includes_sentinel_and_defaults() {
        let request = GradeRequest {
            objectives: objectives(),
            student_answer: "[창제 배경 설명하기]\n백성을 위해".to_string(),
            interview_log: vec![],
            weights: None,
            originality_rules: None,
        };
        let prompt = build_grading_prompt(&request).unwrap();
        assert!(prompt.contains("인터뷰 로그 요약(선택): 인터뷰 기록 없음"));
        assert!(prompt.contains("교사 가중치(선택): 없음"));
        assert!(prompt.contains("\"title\": \"반대 상소 분석하기\""));
    }

    #[tokio::test]
    async fn test_grading_scenario() {
        let llm = ScriptedBackend::new().reply(grading_reply());
        let request = GradeRequest {
            objectives: objectives(),
            student_answer: "[창제 배경 설명하기]\n백성을 위해 만들었다.".to_string(),
            interview_log: log(3, "질문과 답"),
            weights: Some("정확성 2배".to_string()),
            originality_rules: None,
        };

        let result = grade_answer(&llm, &request).await.unwrap();

        assert_eq!(result.scores.len(), 5);
        let criteria: Vec<_> = result.scores.iter().filter_map(|s| s.criterion.clone()).collect();
        assert_eq!(criteria, Criterion::RUBRIC.to_vec());
        assert_eq!(result.weighted_total.band, Some(Band::Meets));
        assert_eq!(result.objective_alignment.len(), 3);
        for (alignment, title) in result.objective_alignment.iter().zip(TITLES) {
            assert_eq!(alignment.objective_title, title);
        }
        assert_eq!(result.flags, vec![GradingFlag::InsufficientSourcing]);

        let completions = llm.completions();
        assert_eq!(completions[0].1, DEFAULT_MAX_TOKENS);
        assert!(completions[0].0.contains("교사 가중치(선택): 정확성 2배"));
        assert!(completions[0].0.contains("[p2] 학생: 질문과 답..."));
    }
}
