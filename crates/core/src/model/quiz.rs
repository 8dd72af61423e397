use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{QuizId, UserId};

/// Points awarded per question.
pub const POINTS_PER_QUESTION: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizKind {
    Mcq,
    Descriptive,
    Coding,
}

impl QuizKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizKind::Mcq => "mcq",
            QuizKind::Descriptive => "descriptive",
            QuizKind::Coding => "coding",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "mcq" => Some(QuizKind::Mcq),
            "descriptive" => Some(QuizKind::Descriptive),
            "coding" => Some(QuizKind::Coding),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Capitalised label used in task titles.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizStatus {
    #[default]
    Pending,
    Completed,
}

impl QuizStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizStatus::Pending => "pending",
            QuizStatus::Completed => "completed",
        }
    }
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McqQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptiveQuestion {
    pub question: String,
    pub key_points: Vec<String>,
    pub sample_answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodingQuestion {
    pub question: String,
    pub requirements: Vec<String>,
    pub sample_input: String,
    pub sample_output: String,
    pub sample_solution: String,
}

/// A stored question; the shape depends on the quiz kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Question {
    Mcq(McqQuestion),
    Coding(CodingQuestion),
    Descriptive(DescriptiveQuestion),
}

impl Question {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Question::Mcq(q) => &q.question,
            Question::Descriptive(q) => &q.question,
            Question::Coding(q) => &q.question,
        }
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quiz {
    pub id: QuizId,
    pub user_id: UserId,
    pub topic: String,
    pub kind: QuizKind,
    pub day_number: Option<u32>,
    pub questions: Vec<Question>,
    pub score: Option<u32>,
    pub max_score: u32,
    pub time_taken_secs: Option<u32>,
    pub status: QuizStatus,
    pub created_at: DateTime<Utc>,
    pub attempted_at: Option<DateTime<Utc>>,
}

impl Quiz {
    /// A fresh, unattempted quiz.
    #[must_use]
    pub fn new(
        user_id: UserId,
        topic: impl Into<String>,
        kind: QuizKind,
        day_number: Option<u32>,
        questions: Vec<Question>,
        now: DateTime<Utc>,
    ) -> Self {
        let max_score = u32::try_from(questions.len())
            .unwrap_or(u32::MAX)
            .saturating_mul(POINTS_PER_QUESTION);
        Self {
            id: QuizId::generate(),
            user_id,
            topic: topic.into(),
            kind,
            day_number,
            questions,
            score: None,
            max_score,
            time_taken_secs: None,
            status: QuizStatus::Pending,
            created_at: now,
            attempted_at: None,
        }
    }

    /// Score as a percentage of the maximum, rounded to one decimal.
    #[must_use]
    pub fn percentage(&self) -> Option<f64> {
        let score = self.score?;
        Some(percentage(score, self.max_score))
    }

    #[must_use]
    pub fn is_perfect(&self) -> bool {
        self.status == QuizStatus::Completed && self.score == Some(self.max_score)
    }
}

#[must_use]
pub fn percentage(score: u32, max_score: u32) -> f64 {
    if max_score == 0 {
        return 0.0;
    }
    let raw = f64::from(score) / f64::from(max_score) * 100.0;
    (raw * 10.0).round() / 10.0
}

/// Graded outcome for one answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionFeedback {
    pub question_number: u32,
    pub question: String,
    pub student_answer: String,
    pub correct_answer: Option<String>,
    pub is_correct: bool,
    pub points: u32,
    pub feedback: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

/// Stored response row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizResponse {
    pub quiz_id: QuizId,
    #[serde(flatten)]
    pub graded: QuestionFeedback,
}

/// Answers keyed by zero-based question index.
pub type Answers = BTreeMap<u32, String>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn untagged_questions_pick_the_right_shape() {
        let raw = r#"[
            {"question":"Q1","options":["a","b","c","d"],"correct_answer":"a","explanation":"e"},
            {"question":"Q2","key_points":["k"],"sample_answer":"s"},
            {"question":"Q3","requirements":["r"],"sample_input":"1","sample_output":"2","sample_solution":"x"}
        ]"#;
        let questions: Vec<Question> = serde_json::from_str(raw).unwrap();
        assert!(matches!(questions[0], Question::Mcq(_)));
        assert!(matches!(questions[1], Question::Descriptive(_)));
        assert!(matches!(questions[2], Question::Coding(_)));
        assert_eq!(questions[2].text(), "Q3");
    }

    #[test]
    fn max_score_is_ten_per_question() {
        let q = Question::Descriptive(DescriptiveQuestion {
            question: "Explain".into(),
            key_points: vec![],
            sample_answer: String::new(),
        });
        let quiz = Quiz::new(
            UserId::generate(),
            "OS",
            QuizKind::Descriptive,
            Some(3),
            vec![q.clone(), q],
            fixed_now(),
        );
        assert_eq!(quiz.max_score, 20);
        assert_eq!(quiz.percentage(), None);
    }

    #[test]
    fn percentage_rounds_to_one_decimal() {
        assert!((percentage(20, 30) - 66.7).abs() < f64::EPSILON);
        assert!((percentage(0, 0)).abs() < f64::EPSILON);
    }
}
