//! Parsing generated quizzes and scoring submissions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use crate::model::{
    Answers, CodingQuestion, DescriptiveQuestion, McqQuestion, POINTS_PER_QUESTION, Question,
    QuestionFeedback, QuizKind,
};

/// Answers shorter than this (after trimming) are not sent for review.
pub const MIN_REVIEWED_ANSWER_CHARS: usize = 10;
/// Reviewed answers at or above this many points count as correct.
pub const PASSING_POINTS: u32 = 7;
pub const DEFAULT_REVIEW_POINTS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("no JSON array found in model output")]
    NoJsonArray,

    #[error("model output is not valid JSON: {0}")]
    Malformed(String),

    #[error("Failed to generate quiz questions")]
    NoValidQuestions,
}

//
// ─── PARSING ───────────────────────────────────────────────────────────────────
//

fn required_keys(kind: QuizKind) -> &'static [&'static str] {
    match kind {
        QuizKind::Mcq => &["question", "options", "correct_answer", "explanation"],
        QuizKind::Descriptive => &["question", "key_points", "sample_answer"],
        QuizKind::Coding => &[
            "question",
            "requirements",
            "sample_input",
            "sample_output",
            "sample_solution",
        ],
    }
}

fn to_question(kind: QuizKind, value: Value) -> Option<Question> {
    let object = value.as_object()?;
    if !required_keys(kind).iter().all(|k| object.contains_key(*k)) {
        return None;
    }
    match kind {
        QuizKind::Mcq => {
            let q: McqQuestion = serde_json::from_value(value).ok()?;
            (q.options.len() == 4).then_some(Question::Mcq(q))
        }
        QuizKind::Descriptive => serde_json::from_value::<DescriptiveQuestion>(value)
            .ok()
            .map(Question::Descriptive),
        QuizKind::Coding => serde_json::from_value::<CodingQuestion>(value)
            .ok()
            .map(Question::Coding),
    }
}

/// Extract and validate questions from a model reply.
///
/// The reply is expected to contain a JSON array somewhere inside it.
/// Entries missing a required field are dropped. For multiple choice a
/// truncated reply is salvaged by closing the array after the last
/// complete object.
///
/// # Errors
///
/// Returns `QuizError::NoJsonArray` when there is no array to parse,
/// `QuizError::Malformed` when it cannot be parsed, and
/// `QuizError::NoValidQuestions` when nothing survives validation.
pub fn parse_questions(kind: QuizKind, reply: &str) -> Result<Vec<Question>, QuizError> {
    let reply = reply.trim();
    let start = reply.find('[').ok_or(QuizError::NoJsonArray)?;

    let parsed = match reply.rfind(']').filter(|end| *end > start) {
        Some(end) => serde_json::from_str::<Vec<Value>>(&reply[start..=end]),
        None if kind == QuizKind::Mcq => salvage(reply, start),
        None => return Err(QuizError::NoJsonArray),
    };

    let values = match parsed {
        Ok(values) => values,
        Err(err) if kind == QuizKind::Mcq => salvage(reply, start)
            .map_err(|_| QuizError::Malformed(err.to_string()))?,
        Err(err) => return Err(QuizError::Malformed(err.to_string())),
    };

    let questions: Vec<Question> = values
        .into_iter()
        .filter_map(|v| to_question(kind, v))
        .collect();
    if questions.is_empty() {
        return Err(QuizError::NoValidQuestions);
    }
    Ok(questions)
}

fn salvage(reply: &str, start: usize) -> Result<Vec<Value>, serde_json::Error> {
    let end = reply.rfind('}').filter(|end| *end > start).unwrap_or(start);
    let truncated = format!("{}]", &reply[start..=end]);
    serde_json::from_str(&truncated)
}

//
// ─── GRADING ───────────────────────────────────────────────────────────────────
//

/// Score total plus per-question feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grade {
    pub score: u32,
    pub feedback: Vec<QuestionFeedback>,
}

impl Grade {
    #[must_use]
    pub fn from_feedback(feedback: Vec<QuestionFeedback>) -> Self {
        let score = feedback.iter().map(|f| f.points).sum();
        Self { score, feedback }
    }
}

fn index_u32(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}

/// Exact-match grading for multiple choice.
#[must_use]
pub fn grade_mcq(questions: &[Question], answers: &Answers) -> Grade {
    let feedback = questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let number = index_u32(i);
            let student_answer = answers.get(&number).cloned().unwrap_or_default();
            let (correct, explanation) = match question {
                Question::Mcq(q) => (q.correct_answer.clone(), Some(q.explanation.clone())),
                _ => (String::new(), None),
            };
            let is_correct = !correct.is_empty() && student_answer == correct;
            QuestionFeedback {
                question_number: number,
                question: question.text().to_string(),
                feedback: if is_correct {
                    "Correct!".to_string()
                } else {
                    format!("Incorrect. The correct answer is: {correct}")
                },
                student_answer,
                correct_answer: Some(correct),
                is_correct,
                points: if is_correct { POINTS_PER_QUESTION } else { 0 },
                explanation,
            }
        })
        .collect();
    Grade::from_feedback(feedback)
}

/// Whether a free-text answer is long enough to send for review.
#[must_use]
pub fn needs_review(answer: &str) -> bool {
    answer.trim().chars().count() >= MIN_REVIEWED_ANSWER_CHARS
}

/// Zero-point feedback for an answer that was too short to review.
#[must_use]
pub fn rejected_answer(kind: QuizKind, number: u32, question: &Question, answer: &str) -> QuestionFeedback {
    let feedback = match kind {
        QuizKind::Coding => "No code submitted or too short",
        _ => "Answer too short or empty",
    };
    QuestionFeedback {
        question_number: number,
        question: question.text().to_string(),
        student_answer: answer.to_string(),
        correct_answer: None,
        is_correct: false,
        points: 0,
        feedback: feedback.to_string(),
        explanation: None,
    }
}

fn score_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"Score:\s*(\d+)").expect("valid score regex"));
    &PATTERN
}

fn feedback_pattern() -> &'static Regex {
    static PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?s)Feedback:\s*(.*)").expect("valid feedback regex"));
    &PATTERN
}

/// Read `Score: N` and `Feedback: ...` out of a reviewer reply.
///
/// Points are clamped to 0..=10 and default to 5; feedback falls back to
/// `default_feedback`.
#[must_use]
pub fn parse_review(reply: &str, default_feedback: &str) -> (u32, String) {
    let points = score_pattern()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map_or(DEFAULT_REVIEW_POINTS, |m| {
            m.as_str()
                .parse::<u64>()
                .map_or(POINTS_PER_QUESTION, |n| {
                    u32::try_from(n.min(u64::from(POINTS_PER_QUESTION))).unwrap_or(0)
                })
        });
    let feedback = feedback_pattern()
        .captures(reply)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| default_feedback.to_string());
    (points, feedback)
}

/// Feedback for an answer that went through model review.
#[must_use]
pub fn reviewed_answer(
    kind: QuizKind,
    number: u32,
    question: &Question,
    answer: &str,
    reply: &str,
) -> QuestionFeedback {
    let default_feedback = match kind {
        QuizKind::Coding => "Code reviewed.",
        _ => "Good effort!",
    };
    let (points, feedback) = parse_review(reply, default_feedback);
    QuestionFeedback {
        question_number: number,
        question: question.text().to_string(),
        student_answer: answer.to_string(),
        correct_answer: None,
        is_correct: points >= PASSING_POINTS,
        points,
        feedback,
        explanation: None,
    }
}
